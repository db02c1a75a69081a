//! Rhythm Deck signup service library.
//!
//! Account signup for creator pages: creates the account at the identity
//! provider, stores the profile, and for paid plans opens a subscription
//! checkout. Exposed as a library so the router can be driven in-process by
//! tests with in-memory collaborators.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod models;
pub mod payments;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

use std::path::PathBuf;

use axum::{Router, body::Body, http::Request};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use state::AppState;

/// Router options that differ between deployments and tests.
#[derive(Debug, Clone, Default)]
pub struct AppOptions {
    /// Serve files from this directory for unmatched paths.
    pub static_dir: Option<PathBuf>,
    /// Limit `POST /signup` per client IP.
    pub rate_limit_signups: bool,
}

/// Build the application router.
pub fn app(state: AppState, options: AppOptions) -> Router {
    let mut router = routes::routes(options.rate_limit_signups);
    if let Some(dir) = options.static_dir {
        router = router.fallback_service(ServeDir::new(dir));
    }

    router
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            }),
        )
        .with_state(state)
}
