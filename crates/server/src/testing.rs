//! In-memory collaborators for tests.
//!
//! Each double keeps call counters so tests can assert which pipeline steps
//! ran. Behaviour matches the production collaborators where it matters:
//! duplicate emails are rejected by identity, duplicate subdomains by the
//! profile store.

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rhythm_deck_core::{Subdomain, UserId};

use crate::db::{ProfileStore, RepositoryError};
use crate::identity::{IdentityError, IdentityProvider, NewAccount, UserAccount};
use crate::models::{NewProfile, ProfileRecord};
use crate::payments::{
    CheckoutRequest, CheckoutSession, PaymentError, PaymentProvider, PriceId, PriceTable,
};

/// Message the identity double returns for a duplicate email.
pub const DUPLICATE_EMAIL_MESSAGE: &str = "User already registered";

/// Price table with ids `price_test_1year`, `price_test_2year`, `price_test_3year`.
#[must_use]
pub fn test_prices() -> PriceTable {
    let price = |key: &str| PriceId::parse(&format!("price_test_{key}")).unwrap();
    PriceTable {
        one_year: price("1year"),
        two_year: price("2year"),
        three_year: price("3year"),
    }
}

// =============================================================================
// Identity
// =============================================================================

/// Identity provider keyed by email.
#[derive(Default)]
pub struct InMemoryIdentityProvider {
    accounts: Mutex<HashMap<String, NewAccount>>,
    ids: Mutex<HashMap<String, UserId>>,
    calls: AtomicUsize,
    delay: Mutex<Option<Duration>>,
    outage: Mutex<bool>,
}

impl InMemoryIdentityProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create_account` calls, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// ID assigned to `email`, if an account exists.
    pub fn id_for(&self, email: &str) -> Option<UserId> {
        self.ids.lock().unwrap().get(email).copied()
    }

    /// Attributes submitted for `email`.
    pub fn account_for(&self, email: &str) -> Option<NewAccount> {
        self.accounts.lock().unwrap().get(email).cloned()
    }

    /// Sleep this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Fail every call with a 503.
    pub fn fail_with_outage(&self) {
        *self.outage.lock().unwrap() = true;
    }
}

#[async_trait]
impl IdentityProvider for InMemoryIdentityProvider {
    async fn create_account(&self, account: &NewAccount) -> Result<UserAccount, IdentityError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if *self.outage.lock().unwrap() {
            return Err(IdentityError::Api {
                status: 503,
                message: "service unavailable".to_string(),
            });
        }

        let key = account.email.as_str().to_string();
        let mut ids = self.ids.lock().unwrap();
        if ids.contains_key(&key) {
            return Err(IdentityError::Rejected(DUPLICATE_EMAIL_MESSAGE.to_string()));
        }

        let id = UserId::random();
        ids.insert(key.clone(), id);
        self.accounts.lock().unwrap().insert(key, account.clone());

        Ok(UserAccount {
            id,
            email: account.email.clone(),
        })
    }
}

// =============================================================================
// Profile store
// =============================================================================

/// Profile store keyed by user ID with a unique subdomain.
#[derive(Default)]
pub struct InMemoryProfileStore {
    rows: Mutex<Vec<ProfileRecord>>,
    inserts: AtomicUsize,
    unavailable: Mutex<bool>,
    delay: Mutex<Option<Duration>>,
}

impl InMemoryProfileStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `insert` calls, successful or not.
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    /// Every stored profile, in insertion order.
    pub fn all(&self) -> Vec<ProfileRecord> {
        self.rows.lock().unwrap().clone()
    }

    /// Sleep this long before answering `insert`.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Make every call fail as if the database were down.
    pub fn set_unavailable(&self) {
        *self.unavailable.lock().unwrap() = true;
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if *self.unavailable.lock().unwrap() {
            return Err(RepositoryError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn insert(&self, profile: &NewProfile) -> Result<ProfileRecord, RepositoryError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.check_available()?;

        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|r| r.subdomain == profile.subdomain) {
            return Err(RepositoryError::SubdomainTaken(profile.subdomain.clone()));
        }
        if rows.iter().any(|r| r.id == profile.id) {
            return Err(RepositoryError::Conflict(format!(
                "profile for user {} already exists",
                profile.id
            )));
        }

        let record = ProfileRecord {
            id: profile.id,
            email: profile.email.clone(),
            display_name: profile.display_name.clone(),
            subdomain: profile.subdomain.clone(),
            plan: profile.plan(),
            plan_duration: profile.plan_duration,
            paid: false,
            created_at: Utc::now(),
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn find_by_subdomain(
        &self,
        subdomain: &Subdomain,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        self.check_available()?;
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| &r.subdomain == subdomain)
            .cloned())
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        self.check_available()
    }
}

// =============================================================================
// Payments
// =============================================================================

/// Payment provider that records each request and returns a fake session.
#[derive(Default)]
pub struct RecordingPaymentProvider {
    sessions: Mutex<Vec<(CheckoutSession, CheckoutRequest)>>,
    calls: AtomicUsize,
    failure: Mutex<Option<String>>,
    delay: Mutex<Option<Duration>>,
}

impl RecordingPaymentProvider {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `create_checkout_session` calls, successful or not.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// The most recent session issued and the request that produced it.
    pub fn last(&self) -> Option<(CheckoutSession, CheckoutRequest)> {
        self.sessions.lock().unwrap().last().cloned()
    }

    /// Sleep this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    /// Refuse every request with a 402 carrying `message`.
    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap() = Some(message.to_string());
    }
}

#[async_trait]
impl PaymentProvider for RecordingPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, PaymentError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(PaymentError::Api {
                status: 402,
                message,
            });
        }

        let id = format!("cs_test_{n}");
        let session = CheckoutSession {
            url: format!("https://checkout.stripe.test/c/pay/{id}"),
            id,
            client_reference_id: Some(request.client_reference_id.to_string()),
        };
        self.sessions
            .lock()
            .unwrap()
            .push((session.clone(), request.clone()));
        Ok(session)
    }
}
