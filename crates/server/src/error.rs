//! Unified error handling with Sentry integration.
//!
//! Provides a unified `AppError` type that captures server-class errors to
//! Sentry before responding to the client. All route handlers return
//! `Result<T, AppError>`; every error body is `{"error": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::db::RepositoryError;
use crate::identity::IdentityError;
use crate::payments::PaymentError;
use crate::services::SignupError;

/// Application-level error type for the signup service.
#[derive(Debug, Error)]
pub enum AppError {
    /// Signup pipeline failed.
    #[error(transparent)]
    Signup(#[from] SignupError),

    /// Profile store lookup failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Signup(err) => match err {
                SignupError::Validation(_) => StatusCode::BAD_REQUEST,
                SignupError::Identity(e) if e.is_rejection() => StatusCode::BAD_REQUEST,
                SignupError::Profile(RepositoryError::SubdomainTaken(_)) => StatusCode::CONFLICT,
                SignupError::Identity(_) | SignupError::Profile(_) | SignupError::Payment(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show the client.
    fn public_message(&self) -> String {
        match self {
            Self::Signup(err) => match err {
                SignupError::Validation(e) => e.to_string(),
                SignupError::Identity(IdentityError::Rejected(msg)) => msg.clone(),
                SignupError::Identity(_) => "Could not create account, please try again".to_string(),
                SignupError::Profile(e @ RepositoryError::SubdomainTaken(_)) => e.to_string(),
                SignupError::Profile(_) => "Could not save profile".to_string(),
                // Card and request errors are written for display; auth,
                // throttling and outage messages can echo key fragments.
                SignupError::Payment(PaymentError::Api {
                    status: 400 | 402,
                    message,
                }) => message.clone(),
                SignupError::Payment(_) => "Could not start checkout, please try again".to_string(),
            },
            Self::Database(_) | Self::Internal(_) => "Internal server error".to_string(),
            Self::NotFound(what) => format!("{what} not found"),
            Self::BadRequest(msg) => msg.clone(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Capture server errors to Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::debug!(error = %self, status = status.as_u16(), "Request rejected");
        }

        let body = ErrorBody {
            error: self.public_message(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Add a breadcrumb for a signup step.
///
/// Breadcrumbs appear in Sentry error reports to show the trail of actions
/// leading up to an error.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use rhythm_deck_core::Subdomain;

    use super::*;
    use crate::services::ValidationError;

    fn signup(err: SignupError) -> AppError {
        AppError::Signup(err)
    }

    #[test]
    fn test_app_error_status_codes() {
        let cases = [
            (
                signup(SignupError::Validation(ValidationError::MissingField("email"))),
                StatusCode::BAD_REQUEST,
            ),
            (
                signup(SignupError::Identity(IdentityError::Rejected(
                    "User already registered".to_string(),
                ))),
                StatusCode::BAD_REQUEST,
            ),
            (
                signup(SignupError::Identity(IdentityError::Timeout(
                    Duration::from_secs(5),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                signup(SignupError::Profile(RepositoryError::SubdomainTaken(
                    Subdomain::parse("dj").unwrap(),
                ))),
                StatusCode::CONFLICT,
            ),
            (
                signup(SignupError::Profile(RepositoryError::Conflict(
                    "dup".to_string(),
                ))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                signup(SignupError::Payment(PaymentError::Parse("bad".to_string()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (AppError::NotFound("profile".to_string()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("x".to_string()), StatusCode::BAD_REQUEST),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_public_messages_hide_internals() {
        let err = signup(SignupError::Identity(IdentityError::Api {
            status: 500,
            message: "stack trace at gotrue/api.go:42".to_string(),
        }));
        assert!(!err.public_message().contains("gotrue"));

        let err = signup(SignupError::Identity(IdentityError::Rejected(
            "User already registered".to_string(),
        )));
        assert_eq!(err.public_message(), "User already registered");

        let err = signup(SignupError::Payment(PaymentError::Api {
            status: 400,
            message: "No such price".to_string(),
        }));
        assert_eq!(err.public_message(), "No such price");

        let err = signup(SignupError::Profile(RepositoryError::SubdomainTaken(
            Subdomain::parse("dj").unwrap(),
        )));
        assert_eq!(err.public_message(), "subdomain 'dj' is already taken");
    }

    #[test]
    fn test_stripe_auth_errors_are_not_shown() {
        for status in [401, 403, 429, 500] {
            let err = signup(SignupError::Payment(PaymentError::Api {
                status,
                message: "Invalid API Key provided: sk_live_*********************7dc".to_string(),
            }));
            assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
            let message = err.public_message();
            assert!(!message.contains("sk_live"), "{status}: {message}");
            assert_eq!(message, "Could not start checkout, please try again");
        }

        let declined = signup(SignupError::Payment(PaymentError::Api {
            status: 402,
            message: "Your card was declined.".to_string(),
        }));
        assert_eq!(declined.public_message(), "Your card was declined.");
    }
}
