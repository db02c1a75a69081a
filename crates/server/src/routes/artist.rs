//! Public artist profile lookup.

use axum::{
    Json,
    extract::{Path, State},
};
use rhythm_deck_core::Subdomain;
use tracing::instrument;

use crate::error::{AppError, Result};
use crate::models::PublicProfile;
use crate::state::AppState;

/// Look up the public profile for a subdomain.
///
/// GET /artist/{subdomain}
///
/// Malformed subdomains are reported as not found; they cannot exist.
///
/// # Errors
///
/// Returns `AppError::NotFound` for unknown subdomains, `AppError::Database`
/// if the store fails.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(subdomain): Path<String>,
) -> Result<Json<PublicProfile>> {
    let not_found = || AppError::NotFound(format!("artist '{subdomain}'"));

    let key = Subdomain::parse(&subdomain).map_err(|_| not_found())?;
    let profile = state
        .profiles()
        .find_by_subdomain(&key)
        .await?
        .ok_or_else(not_found)?;

    Ok(Json(profile.into()))
}
