//! Identity provider seam.
//!
//! The signup orchestrator only needs one operation from the identity
//! provider: create an account and hand back its stable ID. Production uses
//! [`SupabaseAuthClient`]; tests substitute an in-memory provider.

mod supabase;

pub use supabase::SupabaseAuthClient;

use std::time::Duration;

use async_trait::async_trait;
use rhythm_deck_core::{Email, PlanDuration, Subdomain, UserId};
use secrecy::SecretString;
use serde::Serialize;
use thiserror::Error;

/// Errors returned by an identity provider.
#[derive(Debug, Error)]
pub enum IdentityError {
    /// The provider refused the signup (duplicate email, weak password...).
    /// The message comes from the provider and is safe to show.
    #[error("signup rejected: {0}")]
    Rejected(String),

    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a server-side error.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The call did not finish in time.
    #[error("identity provider timed out after {0:?}")]
    Timeout(Duration),
}

impl IdentityError {
    /// Whether the failure is attributable to the caller's input.
    #[must_use]
    pub const fn is_rejection(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Attributes stored with the account.
///
/// Serialized in the provider's metadata shape so that a provider-side hook
/// can read them back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountAttributes {
    pub name: String,
    pub subdomain: Subdomain,
    #[serde(rename = "planDuration")]
    pub plan_duration: PlanDuration,
}

/// Everything needed to create an account.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub email: Email,
    pub password: SecretString,
    pub attributes: AccountAttributes,
}

/// An account created by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: UserId,
    pub email: Email,
}

/// Creates user accounts.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Create an account for `account.email`.
    ///
    /// # Errors
    ///
    /// Returns `IdentityError::Rejected` when the provider refuses the signup,
    /// or another variant when the provider cannot be reached.
    async fn create_account(&self, account: &NewAccount) -> Result<UserAccount, IdentityError>;
}
