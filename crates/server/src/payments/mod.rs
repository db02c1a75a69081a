//! Payment provider seam and the plan-to-price table.
//!
//! # Design
//!
//! - [`PaymentProvider`] creates subscription checkout sessions. Production
//!   uses [`StripeClient`].
//! - [`PriceTable`] has one field per [`PaidTerm`], so looking up a price is
//!   an exhaustive `match` and can never miss at request time. Completeness
//!   and format are checked once, when configuration loads.

mod stripe;

pub use stripe::StripeClient;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rhythm_deck_core::{Email, PaidTerm, UserId};
use thiserror::Error;
use url::Url;

/// Errors that can occur when creating a checkout session.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The call did not finish in time.
    #[error("payment provider timed out after {0:?}")]
    Timeout(Duration),
}

/// Error returned by [`PriceId::parse`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceIdError {
    #[error("price id is empty")]
    Empty,
    #[error("price id must start with 'price_'")]
    Prefix,
    #[error("price id may only contain letters, numbers and underscores")]
    InvalidCharacter,
    #[error("price id looks like a placeholder")]
    Placeholder,
}

/// A provider-side price identifier, e.g. `price_1PabcXYZ`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PriceId(String);

impl PriceId {
    const PREFIX: &'static str = "price_";

    /// Parse a price id.
    ///
    /// # Errors
    ///
    /// Returns a [`PriceIdError`] for empty, malformed or placeholder ids.
    pub fn parse(s: &str) -> Result<Self, PriceIdError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(PriceIdError::Empty);
        }
        let Some(rest) = s.strip_prefix(Self::PREFIX) else {
            return Err(PriceIdError::Prefix);
        };
        if rest.is_empty() || !rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(PriceIdError::InvalidCharacter);
        }
        if rest.to_ascii_lowercase().contains("xxx") {
            return Err(PriceIdError::Placeholder);
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PriceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Price for every billed term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
    pub one_year: PriceId,
    pub two_year: PriceId,
    pub three_year: PriceId,
}

impl PriceTable {
    /// The price billed for `term`.
    #[must_use]
    pub const fn price_for(&self, term: PaidTerm) -> &PriceId {
        match term {
            PaidTerm::OneYear => &self.one_year,
            PaidTerm::TwoYear => &self.two_year,
            PaidTerm::ThreeYear => &self.three_year,
        }
    }
}

/// Parameters of a subscription checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub price: PriceId,
    /// Correlates the session back to the account.
    pub client_reference_id: UserId,
    pub customer_email: Email,
    pub success_url: Url,
    pub cancel_url: Url,
}

/// A redirectable checkout session issued by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub client_reference_id: Option<String>,
}

/// Creates checkout sessions.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a subscription checkout session.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError` if the provider refuses or cannot be reached.
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError>;
}

/// A configured payment provider together with its prices.
///
/// Only exists when payments are enabled, so holding one proves both the
/// credentials and the full price table are present.
#[derive(Clone)]
pub struct Payments {
    provider: Arc<dyn PaymentProvider>,
    prices: PriceTable,
}

impl Payments {
    /// Bundle a provider with its price table.
    #[must_use]
    pub fn new(provider: Arc<dyn PaymentProvider>, prices: PriceTable) -> Self {
        Self { provider, prices }
    }

    /// The payment provider.
    #[must_use]
    pub fn provider(&self) -> &dyn PaymentProvider {
        self.provider.as_ref()
    }

    /// The price table.
    #[must_use]
    pub const fn prices(&self) -> &PriceTable {
        &self.prices
    }
}

impl fmt::Debug for Payments {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Payments")
            .field("prices", &self.prices)
            .finish_non_exhaustive()
    }
}
