//! Integration tests for Rhythm Deck.
//!
//! The full axum router is driven in-process with `tower::ServiceExt::oneshot`
//! over in-memory collaborators, so no database, identity provider or Stripe
//! account is needed.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p rhythm-deck-integration-tests
//! ```

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use rhythm_deck_server::db::ProfileStore;
use rhythm_deck_server::identity::IdentityProvider;
use rhythm_deck_server::payments::{PaymentProvider, Payments};
use rhythm_deck_server::services::SignupOrchestrator;
use rhythm_deck_server::state::AppState;
use rhythm_deck_server::testing::{
    InMemoryIdentityProvider, InMemoryProfileStore, RecordingPaymentProvider, test_prices,
};
use rhythm_deck_server::{AppOptions, app};
use serde_json::Value;
use tower::ServiceExt;
use url::Url;

/// Public base URL the test app is configured with.
pub const BASE_URL: &str = "https://rhythmdeck.test";

/// A router over in-memory collaborators, with handles to inspect them.
pub struct TestContext {
    pub identity: Arc<InMemoryIdentityProvider>,
    pub profiles: Arc<InMemoryProfileStore>,
    pub payments: Arc<RecordingPaymentProvider>,
    router: Router,
}

/// Builder for [`TestContext`].
#[derive(Debug, Default)]
pub struct TestContextBuilder {
    without_payments: bool,
    options: AppOptions,
}

impl TestContextBuilder {
    /// Run as a deployment with no payment provider configured.
    #[must_use]
    pub const fn without_payments(mut self) -> Self {
        self.without_payments = true;
        self
    }

    /// Enable the per-IP signup limiter.
    #[must_use]
    pub const fn rate_limited(mut self) -> Self {
        self.options.rate_limit_signups = true;
        self
    }

    /// Serve static files from `dir` as the router fallback.
    #[must_use]
    pub fn static_dir(mut self, dir: impl Into<std::path::PathBuf>) -> Self {
        self.options.static_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn build(self) -> TestContext {
        let identity = Arc::new(InMemoryIdentityProvider::new());
        let profiles = Arc::new(InMemoryProfileStore::new());
        let payments = Arc::new(RecordingPaymentProvider::new());

        let configured = (!self.without_payments).then(|| {
            Payments::new(
                Arc::clone(&payments) as Arc<dyn PaymentProvider>,
                test_prices(),
            )
        });
        let store = Arc::clone(&profiles) as Arc<dyn ProfileStore>;
        let orchestrator = SignupOrchestrator::new(
            Arc::clone(&identity) as Arc<dyn IdentityProvider>,
            Arc::clone(&store),
            configured,
            Url::parse(BASE_URL).unwrap(),
            Duration::from_secs(2),
        );

        TestContext {
            identity,
            profiles,
            payments,
            router: app(AppState::new(orchestrator, store), self.options),
        }
    }
}

impl TestContext {
    #[must_use]
    pub fn builder() -> TestContextBuilder {
        TestContextBuilder::default()
    }

    /// Context with payments configured and no rate limiting.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Send a request through the router.
    pub async fn respond(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    /// Send a request and return the status and the body parsed as JSON
    /// (`Value::Null` for an empty body, a string for a non-JSON body).
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.respond(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();

        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// POST `body` as JSON to `/signup`.
    pub async fn signup(&self, body: &Value) -> (StatusCode, Value) {
        self.send(signup_request(body.to_string())).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A `POST /signup` request with a raw JSON body.
#[must_use]
pub fn signup_request(body: String) -> Request<Body> {
    Request::post("/signup")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body))
        .unwrap()
}
