//! Lookup, health and static routes.

#![allow(clippy::unwrap_used)]

use axum::http::StatusCode;
use rhythm_deck_integration_tests::TestContext;
use serde_json::{Value, json};

#[tokio::test]
async fn test_root_banner() {
    let ctx = TestContext::new();
    let (status, body) = ctx.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("Rhythm Deck server is running!".to_string()));
}

#[tokio::test]
async fn test_artist_lookup_after_signup() {
    let ctx = TestContext::new();
    ctx.signup(&json!({
        "email": "nova@x.com",
        "password": "p",
        "name": "DJ Nova",
        "subdomain": "dj-nova",
        "planDuration": "2year",
    }))
    .await;

    let (status, body) = ctx.get("/artist/dj-nova").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({"subdomain": "dj-nova", "displayName": "DJ Nova", "plan": "pro"})
    );
}

#[tokio::test]
async fn test_unknown_or_malformed_artist_is_404() {
    let ctx = TestContext::new();

    for uri in ["/artist/nobody", "/artist/-bad-"] {
        let (status, body) = ctx.get(uri).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_health() {
    let ctx = TestContext::new();
    assert_eq!(ctx.get("/health").await.0, StatusCode::OK);
    assert_eq!(ctx.get("/health/ready").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_fails_when_store_is_down() {
    let ctx = TestContext::new();
    ctx.profiles.set_unavailable();
    assert_eq!(
        ctx.get("/health/ready").await.0,
        StatusCode::SERVICE_UNAVAILABLE
    );
    assert_eq!(ctx.get("/health").await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_static_files_are_the_fallback() {
    let dir = std::env::temp_dir().join(format!("rhythm-deck-static-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("signup.html"), "<h1>Sign up</h1>").unwrap();

    let ctx = TestContext::builder().static_dir(&dir).build();

    let (status, body) = ctx.get("/signup.html").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("<h1>Sign up</h1>".to_string()));

    assert_eq!(ctx.get("/missing.html").await.0, StatusCode::NOT_FOUND);
    // API routes still win over the fallback.
    assert_eq!(ctx.get("/health").await.0, StatusCode::OK);

    std::fs::remove_dir_all(&dir).unwrap();
}
