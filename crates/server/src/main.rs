//! Rhythm Deck signup server.
//!
//! Serves `POST /signup`, public artist lookups and the static site on port
//! 3000.
//!
//! # Architecture
//!
//! - Axum web framework
//! - Supabase Auth for accounts, `PostgreSQL` for profiles
//! - Stripe Checkout for paid plans (optional)
//!
//! Migrations are NOT run on startup. Run them explicitly via:
//! `cargo run -p rhythm-deck-cli -- migrate`

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::net::SocketAddr;
use std::sync::Arc;

use rhythm_deck_server::config::ServerConfig;
use rhythm_deck_server::db::{self, ProfileRepository, ProfileStore};
use rhythm_deck_server::identity::{IdentityProvider, SupabaseAuthClient};
use rhythm_deck_server::payments::{Payments, StripeClient};
use rhythm_deck_server::services::SignupOrchestrator;
use rhythm_deck_server::state::AppState;
use rhythm_deck_server::{AppOptions, app};
use sentry::integrations::tracing as sentry_tracing;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &ServerConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

/// Build the payment collaborator, or `None` when Stripe is not configured.
fn init_payments(config: &ServerConfig) -> Option<Payments> {
    let Some(stripe) = &config.payments else {
        tracing::warn!("STRIPE_SECRET_KEY not set; paid plans will complete without checkout");
        return None;
    };

    let client = StripeClient::new(stripe, config.collaborator_timeout)
        .expect("Failed to create Stripe client");
    tracing::info!(
        price_1year = %stripe.prices.one_year,
        price_2year = %stripe.prices.two_year,
        price_3year = %stripe.prices.three_year,
        "Payments enabled"
    );
    Some(Payments::new(Arc::new(client), stripe.prices.clone()))
}

#[tokio::main]
async fn main() {
    // Load configuration from environment (needed for Sentry init)
    let config = ServerConfig::from_env().expect("Failed to load configuration");

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "rhythm_deck_server=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    let pool = db::create_pool(&config.database_url)
        .await
        .expect("Failed to create database pool");
    tracing::info!("Database pool created");

    let identity = SupabaseAuthClient::new(&config.identity, config.collaborator_timeout)
        .expect("Failed to create Supabase Auth client");
    let identity: Arc<dyn IdentityProvider> = Arc::new(identity);
    let profiles: Arc<dyn ProfileStore> = Arc::new(ProfileRepository::new(pool));

    let orchestrator = SignupOrchestrator::new(
        identity,
        Arc::clone(&profiles),
        init_payments(&config),
        config.base_url.clone(),
        config.collaborator_timeout,
    );
    let state = AppState::new(orchestrator, profiles);

    let options = AppOptions {
        static_dir: Some(config.static_dir.clone()),
        rate_limit_signups: true,
    };
    let app = app(state, options)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("rhythm-deck server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .expect("Server error");
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
