//! Signup endpoint.

use axum::{Json, extract::State, extract::rejection::JsonRejection};
use sentry::SentryFutureExt;
use tracing::{Instrument, instrument};

use crate::error::{AppError, Result, add_breadcrumb};
use crate::services::{SignupOutcome, SignupRequest};
use crate::state::AppState;

/// Run a signup.
///
/// POST /signup
///
/// The pipeline runs in its own task: if the client disconnects, calls already
/// issued to the identity, profile or payment providers still complete and
/// are logged rather than being abandoned halfway.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for a malformed body, `AppError::Signup`
/// when a pipeline step fails.
#[instrument(skip_all)]
pub async fn signup(
    State(state): State<AppState>,
    payload: std::result::Result<Json<SignupRequest>, JsonRejection>,
) -> Result<Json<SignupOutcome>> {
    let Json(request) = payload.map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;

    let plan = request.plan_duration.clone().unwrap_or_default();
    add_breadcrumb("signup", "Signup submitted", Some(&[("plan", plan.as_str())]));

    let orchestrator = state.signup();
    let task = tokio::spawn(
        async move { orchestrator.handle_signup(request).await }
            .bind_hub(sentry::Hub::current())
            .in_current_span(),
    );

    let outcome = task
        .await
        .map_err(|e| AppError::Internal(format!("signup task failed: {e}")))??;

    Ok(Json(outcome))
}
