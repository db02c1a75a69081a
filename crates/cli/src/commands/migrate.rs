//! Database migration command.
//!
//! Applies `crates/server/migrations/` to the profile store named by
//! `PROFILE_DATABASE_URL` (or `DATABASE_URL`). Only the database URL is
//! read, so migrations can run before the rest of the deployment is
//! configured.

use rhythm_deck_server::db;
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: PROFILE_DATABASE_URL (or DATABASE_URL)")]
    MissingDatabaseUrl,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run profile store migrations.
///
/// # Errors
///
/// Returns `MigrationError` if the URL is missing, the database is
/// unreachable, or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let _ = dotenvy::dotenv();

    let database_url = std::env::var("PROFILE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .map(SecretString::from)
        .map_err(|_| MigrationError::MissingDatabaseUrl)?;

    tracing::info!("Connecting to profile database...");
    let pool = db::create_pool(&database_url).await?;

    tracing::info!("Running profile migrations...");
    db::run_migrations(&pool).await?;

    tracing::info!("Profile migrations complete!");
    Ok(())
}
