//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /                      - Liveness banner
//! GET  /health                - Health check
//! GET  /health/ready          - Readiness (profile store reachable)
//! POST /signup                - Create account, profile and optional checkout
//! GET  /artist/{subdomain}    - Public profile lookup
//! *                           - Static files (fallback, configured in `app`)
//! ```

pub mod artist;
pub mod health;
pub mod home;
pub mod signup;

use axum::{
    Router,
    routing::{get, post},
};

use crate::middleware::signup_rate_limiter;
use crate::state::AppState;

/// Create the signup routes router.
///
/// The limiter needs a client IP from proxy headers or connect info; requests
/// carrying neither are rejected, so tests driving the router directly leave
/// it off.
pub fn signup_routes(rate_limited: bool) -> Router<AppState> {
    let router = Router::new().route("/signup", post(signup::signup));
    if rate_limited {
        router.route_layer(signup_rate_limiter())
    } else {
        router
    }
}

/// Create all routes for the service.
pub fn routes(rate_limit_signups: bool) -> Router<AppState> {
    Router::new()
        .route("/", get(home::home))
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/artist/{subdomain}", get(artist::show))
        .merge(signup_routes(rate_limit_signups))
}
