//! Root route handler.

/// Banner text served at `/`.
pub const BANNER: &str = "Rhythm Deck server is running!";

/// GET /
pub async fn home() -> &'static str {
    BANNER
}
