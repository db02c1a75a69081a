//! Signup orchestration.
//!
//! One linear pipeline per request:
//!
//! ```text
//! validate -> create account -> insert profile -> free? -> payments on? -> checkout
//!                                                  |          |
//!                                             Immediate   Immediate + warning
//! ```
//!
//! Every step needs the user ID produced by identity creation, so the calls
//! are strictly sequential. Each call is bounded by the configured timeout.
//! Nothing is rolled back: an account whose profile or checkout fails is left
//! in place and logged so it can be reconciled.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rhythm_deck_core::{
    Email, EmailError, PaidTerm, PlanDuration, PlanDurationError, Subdomain, SubdomainError,
    UserId,
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::db::{ProfileStore, RepositoryError};
use crate::identity::{AccountAttributes, IdentityError, IdentityProvider, NewAccount};
use crate::models::NewProfile;
use crate::payments::{CheckoutRequest, PaymentError, Payments};

/// Display name used when none is supplied.
pub const DEFAULT_DISPLAY_NAME: &str = "User";

/// Warning returned when a paid plan is requested but payments are off.
pub const PAYMENT_NOT_CONFIGURED: &str = "payment not configured";

const MAX_DISPLAY_NAME_CHARS: usize = 100;

/// Page the checkout returns to after payment.
const SUCCESS_PATH: &str = "profile-admin-pro.html";

/// Page the checkout returns to when the visitor backs out.
const CANCEL_PATH: &str = "signup.html";

// =============================================================================
// Request / Outcome
// =============================================================================

/// A signup submission as received, before validation.
#[derive(Clone, Default, Deserialize)]
pub struct SignupRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub subdomain: Option<String>,
    #[serde(rename = "planDuration", alias = "plan_duration")]
    pub plan_duration: Option<String>,
}

impl fmt::Debug for SignupRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignupRequest")
            .field("email", &self.email)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("name", &self.name)
            .field("subdomain", &self.subdomain)
            .field("plan_duration", &self.plan_duration)
            .finish()
    }
}

/// A signup that passed validation.
#[derive(Debug, Clone)]
pub struct ValidSignup {
    pub email: Email,
    pub password: SecretString,
    pub display_name: String,
    pub subdomain: Subdomain,
    pub plan_duration: PlanDuration,
}

/// Where the visitor goes next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SignupOutcome {
    /// Signup is complete; no payment step.
    Immediate {
        success: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        warning: Option<String>,
    },
    /// Send the visitor to the provider's checkout page.
    Redirect { url: String },
}

impl SignupOutcome {
    const fn success() -> Self {
        Self::Immediate {
            success: true,
            warning: None,
        }
    }

    fn success_with_warning(warning: &str) -> Self {
        Self::Immediate {
            success: true,
            warning: Some(warning.to_string()),
        }
    }
}

// =============================================================================
// Errors
// =============================================================================

/// Input problems, reported before any collaborator is called.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),

    #[error(transparent)]
    Email(#[from] EmailError),

    #[error(transparent)]
    Subdomain(#[from] SubdomainError),

    #[error(transparent)]
    PlanDuration(#[from] PlanDurationError),

    #[error("name must be at most {max} characters")]
    NameTooLong { max: usize },
}

/// Why a signup failed, by pipeline step.
#[derive(Debug, Error)]
pub enum SignupError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("identity provider: {0}")]
    Identity(#[source] IdentityError),

    #[error("profile store: {0}")]
    Profile(#[source] RepositoryError),

    #[error("payment provider: {0}")]
    Payment(#[source] PaymentError),
}

// =============================================================================
// Validation
// =============================================================================

impl SignupRequest {
    /// Validate the submission without side effects.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, checking email, password,
    /// subdomain, name and plan duration in that order.
    pub fn validate(self) -> Result<ValidSignup, ValidationError> {
        let email = required(self.email.as_deref(), "email")?;
        let email = Email::parse(email)?;

        // Passwords are taken verbatim; only emptiness is checked here and
        // strength is the identity provider's policy.
        let password = match self.password {
            Some(p) if !p.is_empty() => SecretString::from(p),
            _ => return Err(ValidationError::MissingField("password")),
        };

        let subdomain = required(self.subdomain.as_deref(), "subdomain")?;
        let subdomain = Subdomain::parse(subdomain)?;

        let display_name = match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => DEFAULT_DISPLAY_NAME.to_string(),
        };
        if display_name.chars().count() > MAX_DISPLAY_NAME_CHARS {
            return Err(ValidationError::NameTooLong {
                max: MAX_DISPLAY_NAME_CHARS,
            });
        }

        let plan_duration = match self.plan_duration.as_deref().map(str::trim) {
            None | Some("") => PlanDuration::Free,
            Some(key) => key.parse()?,
        };

        Ok(ValidSignup {
            email,
            password,
            display_name,
            subdomain,
            plan_duration,
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ValidationError> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or(ValidationError::MissingField(field))
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Runs the signup pipeline against injected collaborators.
///
/// Holds no per-request state, so one instance is shared by all requests.
pub struct SignupOrchestrator {
    identity: Arc<dyn IdentityProvider>,
    profiles: Arc<dyn ProfileStore>,
    payments: Option<Payments>,
    base_url: Url,
    timeout: Duration,
}

impl SignupOrchestrator {
    /// Create an orchestrator.
    ///
    /// `payments` is `None` when the deployment has no payment provider; paid
    /// plans then complete with a warning instead of a checkout.
    #[must_use]
    pub fn new(
        identity: Arc<dyn IdentityProvider>,
        profiles: Arc<dyn ProfileStore>,
        payments: Option<Payments>,
        base_url: Url,
        timeout: Duration,
    ) -> Self {
        Self {
            identity,
            profiles,
            payments,
            base_url,
            timeout,
        }
    }

    /// Whether paid plans lead to a checkout.
    #[must_use]
    pub const fn payments_enabled(&self) -> bool {
        self.payments.is_some()
    }

    /// Run one signup.
    ///
    /// # Errors
    ///
    /// Returns a [`SignupError`] naming the step that failed. Steps after a
    /// failure are not attempted and earlier side effects are kept.
    pub async fn handle_signup(&self, request: SignupRequest) -> Result<SignupOutcome, SignupError> {
        let signup = request.validate()?;
        let plan_duration = signup.plan_duration;

        let account = NewAccount {
            email: signup.email.clone(),
            password: signup.password,
            attributes: AccountAttributes {
                name: signup.display_name.clone(),
                subdomain: signup.subdomain.clone(),
                plan_duration,
            },
        };
        let user = bounded(
            self.timeout,
            self.identity.create_account(&account),
            IdentityError::Timeout,
        )
        .await
        .map_err(SignupError::Identity)?;

        tracing::info!(user_id = %user.id, plan = %plan_duration, "account created");

        let profile = NewProfile {
            id: user.id,
            email: signup.email.clone(),
            display_name: signup.display_name,
            subdomain: signup.subdomain,
            plan_duration,
        };
        if let Err(e) = bounded(
            self.timeout,
            self.profiles.insert(&profile),
            RepositoryError::Timeout,
        )
        .await
        {
            log_orphan(user.id, "profile", &e);
            return Err(SignupError::Profile(e));
        }

        let Some(term) = plan_duration.paid_term() else {
            return Ok(SignupOutcome::success());
        };

        let Some(payments) = &self.payments else {
            tracing::warn!(
                user_id = %user.id,
                plan = %plan_duration,
                "paid plan requested but payments are not configured"
            );
            return Ok(SignupOutcome::success_with_warning(PAYMENT_NOT_CONFIGURED));
        };

        let checkout = self.checkout_request(payments, term, user.id, signup.email);
        let session = match bounded(
            self.timeout,
            payments.provider().create_checkout_session(&checkout),
            PaymentError::Timeout,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                log_orphan(user.id, "checkout", &e);
                return Err(SignupError::Payment(e));
            }
        };

        tracing::info!(user_id = %user.id, session_id = %session.id, "checkout session created");
        Ok(SignupOutcome::Redirect { url: session.url })
    }

    fn checkout_request(
        &self,
        payments: &Payments,
        term: PaidTerm,
        user_id: UserId,
        email: Email,
    ) -> CheckoutRequest {
        let mut success_url = self.page_url(SUCCESS_PATH);
        success_url
            .query_pairs_mut()
            .append_pair("user_id", &user_id.to_string());

        CheckoutRequest {
            price: payments.prices().price_for(term).clone(),
            client_reference_id: user_id,
            customer_email: email,
            success_url,
            cancel_url: self.page_url(CANCEL_PATH),
        }
    }

    /// Resolve a page relative to the site root, keeping any base path.
    fn page_url(&self, page: &str) -> Url {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(page);
        }
        url
    }
}

/// Await `call`, turning an elapsed `limit` into the step's own error.
async fn bounded<T, E>(
    limit: Duration,
    call: impl Future<Output = Result<T, E>>,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E> {
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(on_timeout(limit)))
}

fn log_orphan(user_id: UserId, step: &'static str, error: &dyn std::error::Error) {
    tracing::warn!(
        user_id = %user_id,
        step,
        error = %error,
        "signup step failed after account creation; account left in place"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::testing::{
        InMemoryIdentityProvider, InMemoryProfileStore, RecordingPaymentProvider, test_prices,
    };

    struct Harness {
        identity: Arc<InMemoryIdentityProvider>,
        profiles: Arc<InMemoryProfileStore>,
        payments: Arc<RecordingPaymentProvider>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                identity: Arc::new(InMemoryIdentityProvider::new()),
                profiles: Arc::new(InMemoryProfileStore::new()),
                payments: Arc::new(RecordingPaymentProvider::new()),
            }
        }

        fn orchestrator(&self, with_payments: bool) -> SignupOrchestrator {
            let payments = with_payments.then(|| {
                Payments::new(
                    Arc::clone(&self.payments) as Arc<dyn crate::payments::PaymentProvider>,
                    test_prices(),
                )
            });
            SignupOrchestrator::new(
                Arc::clone(&self.identity) as Arc<dyn IdentityProvider>,
                Arc::clone(&self.profiles) as Arc<dyn ProfileStore>,
                payments,
                Url::parse("https://rhythmdeck.app").unwrap(),
                Duration::from_millis(200),
            )
        }

        fn calls(&self) -> (usize, usize, usize) {
            (
                self.identity.calls(),
                self.profiles.inserts(),
                self.payments.calls(),
            )
        }
    }

    fn request(plan: Option<&str>) -> SignupRequest {
        SignupRequest {
            email: Some("a@x.com".to_string()),
            password: Some("p".to_string()),
            name: Some("A".to_string()),
            subdomain: Some("a".to_string()),
            plan_duration: plan.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_free_plan_completes_without_payment() {
        let h = Harness::new();
        let outcome = h
            .orchestrator(true)
            .handle_signup(request(Some("free")))
            .await
            .unwrap();

        assert_eq!(outcome, SignupOutcome::success());
        assert_eq!(h.calls(), (1, 1, 0));

        let stored = h.profiles.all();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].plan, rhythm_deck_core::Plan::Free);
        assert!(!stored[0].paid);
    }

    #[tokio::test]
    async fn test_absent_plan_defaults_to_free() {
        let h = Harness::new();
        let outcome = h.orchestrator(true).handle_signup(request(None)).await.unwrap();
        assert_eq!(outcome, SignupOutcome::success());
        assert_eq!(h.payments.calls(), 0);
    }

    #[tokio::test]
    async fn test_paid_plan_redirects_to_checkout() {
        let h = Harness::new();
        let outcome = h
            .orchestrator(true)
            .handle_signup(request(Some("1year")))
            .await
            .unwrap();

        let SignupOutcome::Redirect { url } = outcome else {
            panic!("expected redirect, got {outcome:?}");
        };
        let (session, checkout) = h.payments.last().unwrap();
        assert_eq!(url, session.url);

        let account_id = h.identity.id_for("a@x.com").unwrap();
        assert_eq!(checkout.client_reference_id, account_id);
        assert_eq!(session.client_reference_id, Some(account_id.to_string()));
        assert_eq!(checkout.price.as_str(), "price_test_1year");
        assert_eq!(checkout.customer_email.as_str(), "a@x.com");
        assert_eq!(
            checkout.success_url.as_str(),
            format!("https://rhythmdeck.app/profile-admin-pro.html?user_id={account_id}")
        );
        assert_eq!(checkout.cancel_url.as_str(), "https://rhythmdeck.app/signup.html");

        let stored = h.profiles.all();
        assert_eq!(stored[0].plan, rhythm_deck_core::Plan::Pro);
        assert!(!stored[0].paid);
    }

    #[tokio::test]
    async fn test_each_term_uses_its_own_price() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(true);
        for (i, key) in ["1year", "2year", "3year"].into_iter().enumerate() {
            let mut req = request(Some(key));
            req.email = Some(format!("u{i}@x.com"));
            req.subdomain = Some(format!("u{i}"));
            orchestrator.handle_signup(req).await.unwrap();
            let (_, checkout) = h.payments.last().unwrap();
            assert_eq!(checkout.price.as_str(), format!("price_test_{key}"));
        }
    }

    #[tokio::test]
    async fn test_paid_plan_without_payments_degrades() {
        let h = Harness::new();
        let outcome = h
            .orchestrator(false)
            .handle_signup(request(Some("1year")))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            SignupOutcome::success_with_warning(PAYMENT_NOT_CONFIGURED)
        );
        assert_eq!(h.calls(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_missing_fields_call_nothing() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(true);

        let cases: [(fn(&mut SignupRequest), &str); 4] = [
            (|r| r.email = None, "email"),
            (|r| r.password = Some(String::new()), "password"),
            (|r| r.subdomain = Some("  ".to_string()), "subdomain"),
            (|r| r.email = Some(String::new()), "email"),
        ];
        for (mutate, field) in cases {
            let mut req = request(Some("1year"));
            mutate(&mut req);
            let err = orchestrator.handle_signup(req).await.unwrap_err();
            assert!(
                matches!(err, SignupError::Validation(ValidationError::MissingField(f)) if f == field),
                "{field}: {err:?}"
            );
        }
        assert_eq!(h.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_unknown_plan_is_validation_error() {
        let h = Harness::new();
        let err = h
            .orchestrator(true)
            .handle_signup(request(Some("lifetime")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SignupError::Validation(ValidationError::PlanDuration(_))
        ));
        assert_eq!(h.calls(), (0, 0, 0));
    }

    #[tokio::test]
    async fn test_duplicate_email_is_identity_error() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(true);
        orchestrator.handle_signup(request(Some("free"))).await.unwrap();

        let mut again = request(Some("free"));
        again.subdomain = Some("other".to_string());
        let err = orchestrator.handle_signup(again).await.unwrap_err();

        assert!(matches!(err, SignupError::Identity(ref e) if e.is_rejection()));
        assert_eq!(h.profiles.inserts(), 1);
    }

    #[tokio::test]
    async fn test_identity_failure_stops_pipeline() {
        let h = Harness::new();
        h.identity.fail_with_outage();
        let err = h
            .orchestrator(true)
            .handle_signup(request(Some("1year")))
            .await
            .unwrap_err();

        assert!(matches!(err, SignupError::Identity(IdentityError::Api { .. })));
        assert_eq!(h.calls(), (1, 0, 0));
    }

    #[tokio::test]
    async fn test_taken_subdomain_skips_checkout_and_keeps_account() {
        let h = Harness::new();
        let orchestrator = h.orchestrator(true);
        orchestrator.handle_signup(request(Some("free"))).await.unwrap();

        let mut second = request(Some("1year"));
        second.email = Some("b@x.com".to_string());
        let err = orchestrator.handle_signup(second).await.unwrap_err();

        assert!(matches!(
            err,
            SignupError::Profile(RepositoryError::SubdomainTaken(_))
        ));
        assert_eq!(h.payments.calls(), 0);
        assert!(h.identity.id_for("b@x.com").is_some());
    }

    #[tokio::test]
    async fn test_payment_failure_keeps_account_and_profile() {
        let h = Harness::new();
        h.payments.fail_with("Your card was declined");
        let err = h
            .orchestrator(true)
            .handle_signup(request(Some("2year")))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SignupError::Payment(PaymentError::Api { ref message, .. }) if message == "Your card was declined"
        ));
        assert_eq!(h.calls(), (1, 1, 1));
        assert_eq!(h.profiles.all().len(), 1);
    }

    #[tokio::test]
    async fn test_slow_identity_provider_times_out() {
        let h = Harness::new();
        h.identity.set_delay(Duration::from_secs(5));
        let err = h
            .orchestrator(true)
            .handle_signup(request(Some("free")))
            .await
            .unwrap_err();

        assert!(matches!(err, SignupError::Identity(IdentityError::Timeout(_))));
        assert_eq!(h.profiles.inserts(), 0);
    }

    #[tokio::test]
    async fn test_slow_profile_store_times_out() {
        let h = Harness::new();
        h.profiles.set_delay(Duration::from_secs(5));
        let err = h
            .orchestrator(true)
            .handle_signup(request(Some("1year")))
            .await
            .unwrap_err();

        assert!(matches!(err, SignupError::Profile(RepositoryError::Timeout(_))));
        assert_eq!(h.calls(), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_slow_payment_provider_times_out() {
        let h = Harness::new();
        h.payments.set_delay(Duration::from_secs(5));
        let err = h
            .orchestrator(true)
            .handle_signup(request(Some("3year")))
            .await
            .unwrap_err();

        assert!(matches!(err, SignupError::Payment(PaymentError::Timeout(_))));
        assert_eq!(h.calls(), (1, 1, 1));
        assert_eq!(h.profiles.all().len(), 1);
    }

    #[tokio::test]
    async fn test_unavailable_profile_store_is_profile_error() {
        let h = Harness::new();
        h.profiles.set_unavailable();
        let err = h
            .orchestrator(true)
            .handle_signup(request(Some("1year")))
            .await
            .unwrap_err();

        assert!(matches!(err, SignupError::Profile(RepositoryError::Database(_))));
        assert_eq!(h.payments.calls(), 0);
    }

    #[test]
    fn test_validate_normalizes_and_defaults() {
        let mut req = request(None);
        req.name = Some("   ".to_string());
        req.email = Some(" A@X.com ".to_string());
        req.subdomain = Some("DJ-Nova".to_string());
        let valid = req.validate().unwrap();

        assert_eq!(valid.display_name, DEFAULT_DISPLAY_NAME);
        assert_eq!(valid.email.as_str(), "a@x.com");
        assert_eq!(valid.subdomain.as_str(), "dj-nova");
        assert_eq!(valid.plan_duration, PlanDuration::Free);
    }

    #[test]
    fn test_validate_rejects_long_name() {
        let mut req = request(None);
        req.name = Some("n".repeat(101));
        assert!(matches!(
            req.validate(),
            Err(ValidationError::NameTooLong { max: 100 })
        ));
    }

    #[test]
    fn test_outcome_wire_shapes() {
        let json = |o: &SignupOutcome| serde_json::to_value(o).unwrap();
        assert_eq!(json(&SignupOutcome::success()), serde_json::json!({"success": true}));
        assert_eq!(
            json(&SignupOutcome::success_with_warning("w")),
            serde_json::json!({"success": true, "warning": "w"})
        );
        assert_eq!(
            json(&SignupOutcome::Redirect { url: "u".to_string() }),
            serde_json::json!({"url": "u"})
        );
    }

    #[test]
    fn test_page_url_keeps_base_path() {
        let h = Harness::new();
        let mut orchestrator = h.orchestrator(false);
        orchestrator.base_url = Url::parse("https://host.example/app/?x=1").unwrap();
        assert_eq!(
            orchestrator.page_url(CANCEL_PATH).as_str(),
            "https://host.example/app/signup.html"
        );
    }

    #[test]
    fn test_debug_redacts_password() {
        let debug = format!("{:?}", request(None));
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("\"p\""));
    }
}
