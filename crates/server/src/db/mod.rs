//! Profile store: the `PostgreSQL` database holding creator profiles.
//!
//! ## Tables
//!
//! - `profiles` - One row per account, unique `subdomain`
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/` and run via:
//! ```bash
//! cargo run -p rhythm-deck-cli -- migrate
//! ```

pub mod profiles;

pub use profiles::ProfileRepository;

use std::time::Duration;

use async_trait::async_trait;
use rhythm_deck_core::Subdomain;
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::models::{NewProfile, ProfileRecord};

/// Errors from profile store operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Another profile already uses this subdomain.
    #[error("subdomain '{0}' is already taken")]
    SubdomainTaken(Subdomain),

    /// Any other uniqueness conflict.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A stored row failed validation.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Database operation failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The call did not finish in time.
    #[error("profile store timed out after {0:?}")]
    Timeout(Duration),
}

/// Keyed store of creator profiles.
///
/// Subdomain uniqueness must be enforced atomically by the implementation;
/// callers never check-then-insert.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Insert a new profile with `paid = false`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::SubdomainTaken` if the subdomain is in use.
    async fn insert(&self, profile: &NewProfile) -> Result<ProfileRecord, RepositoryError>;

    /// Look up a profile by subdomain.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    async fn find_by_subdomain(
        &self,
        subdomain: &Subdomain,
    ) -> Result<Option<ProfileRecord>, RepositoryError>;

    /// Check that the store is reachable.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot answer.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Apply the bundled migrations.
///
/// # Errors
///
/// Returns `sqlx::migrate::MigrateError` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
