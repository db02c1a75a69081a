//! Supabase Auth (GoTrue) client for account creation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderValue};
use rhythm_deck_core::{Email, UserId};
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use url::Url;
use uuid::Uuid;

use super::{AccountAttributes, IdentityError, IdentityProvider, NewAccount, UserAccount};
use crate::config::IdentityConfig;

/// Supabase Auth API client.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    client: reqwest::Client,
    signup_url: Url,
}

impl SupabaseAuthClient {
    /// Create a new Supabase Auth client.
    ///
    /// `timeout` bounds each HTTP request at the transport level.
    ///
    /// # Errors
    ///
    /// Returns error if the API key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &IdentityConfig, timeout: Duration) -> Result<Self, IdentityError> {
        let key = config.anon_key.expose_secret();
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(key)
                .map_err(|e| IdentityError::Parse(format!("Invalid API key format: {e}")))?,
        );
        let mut authorization = HeaderValue::from_str(&format!("Bearer {key}"))
            .map_err(|e| IdentityError::Parse(format!("Invalid API key format: {e}")))?;
        authorization.set_sensitive(true);
        headers.insert("Authorization", authorization);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let signup_url = config
            .url
            .join("auth/v1/signup")
            .map_err(|e| IdentityError::Parse(format!("Invalid project URL: {e}")))?;

        Ok(Self { client, signup_url })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn create_account(&self, account: &NewAccount) -> Result<UserAccount, IdentityError> {
        let body = SignupBody {
            email: account.email.as_str(),
            password: account.password.expose_secret(),
            data: &account.attributes,
        };

        let response = self
            .client
            .post(self.signup_url.clone())
            .json(&body)
            .send()
            .await?;
        let status = response.status();

        if is_caller_rejection(status) {
            let payload = response.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected(error_message(&payload)));
        }
        if !status.is_success() {
            let payload = response.text().await.unwrap_or_default();
            return Err(IdentityError::Api {
                status: status.as_u16(),
                message: error_message(&payload),
            });
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| IdentityError::Parse(e.to_string()))?;

        // With email confirmation on, the user object is returned at the top
        // level; otherwise it sits under `user` next to the session.
        let user_value = match payload.get("user") {
            Some(user) if user.is_object() => user.clone(),
            _ => payload,
        };
        let user: AuthUser =
            serde_json::from_value(user_value).map_err(|e| IdentityError::Parse(e.to_string()))?;

        let email = match user.email.as_deref().map(Email::parse) {
            Some(Ok(email)) => email,
            _ => account.email.clone(),
        };

        Ok(UserAccount {
            id: UserId::new(user.id),
            email,
        })
    }
}

/// Request body for `POST /auth/v1/signup`.
#[derive(Serialize)]
struct SignupBody<'a> {
    email: &'a str,
    password: &'a str,
    data: &'a AccountAttributes,
}

/// User object returned by Supabase Auth.
#[derive(Debug, Deserialize)]
struct AuthUser {
    id: Uuid,
    email: Option<String>,
}

/// Statuses GoTrue uses for problems with the submitted email or password.
///
/// Auth failures (401/403) and GoTrue's own rate limit (429) are our
/// configuration or capacity problems, not the visitor's.
fn is_caller_rejection(status: StatusCode) -> bool {
    [
        StatusCode::BAD_REQUEST,
        StatusCode::CONFLICT,
        StatusCode::UNPROCESSABLE_ENTITY,
    ]
    .contains(&status)
}

/// Pull a human-readable message out of a GoTrue error body.
///
/// GoTrue has used `msg`, `error_description`, `message` and `error` across
/// versions.
fn error_message(payload: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(payload).ok();
    parsed
        .as_ref()
        .and_then(|v| {
            ["msg", "error_description", "message", "error"]
                .iter()
                .find_map(|key| v.get(*key).and_then(serde_json::Value::as_str))
        })
        .map(str::to_owned)
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| "Signup was rejected".to_string())
}
