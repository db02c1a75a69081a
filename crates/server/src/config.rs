//! Server configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `RHYTHM_DECK_BASE_URL` - Public URL used for checkout success/cancel links
//! - `SUPABASE_URL` - Identity provider project URL
//! - `SUPABASE_ANON_KEY` - Identity provider API key
//! - `PROFILE_DATABASE_URL` - `PostgreSQL` connection string for profiles
//!   (falls back to `DATABASE_URL`)
//!
//! ## Optional
//! - `RHYTHM_DECK_HOST` - Bind address (default: 127.0.0.1)
//! - `PORT` - Listen port (default: 3000)
//! - `STATIC_DIR` - Directory of public pages (default: public)
//! - `SIGNUP_COLLABORATOR_TIMEOUT_SECS` - Per-call timeout (default: 5)
//! - `STRIPE_SECRET_KEY` - Enables paid plans. When set, all of
//!   `STRIPE_PRICE_1YEAR`, `STRIPE_PRICE_2YEAR` and `STRIPE_PRICE_3YEAR`
//!   are required.
//! - `STRIPE_API_BASE` - Stripe API base URL (default: <https://api.stripe.com>)
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use rhythm_deck_core::PaidTerm;
use secrecy::SecretString;
use thiserror::Error;
use url::Url;

use crate::payments::{PriceId, PriceTable};

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_TIMEOUT_SECS: u64 = 5;
const MAX_TIMEOUT_SECS: u64 = 60;
const DEFAULT_STRIPE_API_BASE: &str = "https://api.stripe.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "put-your",
];

/// Configuration errors that can occur during loading.
///
/// All of these are fatal at startup; none is ever produced per request.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
    #[error("Price for plan '{term}' ({var}) is invalid: {reason}")]
    InvalidPrice {
        term: PaidTerm,
        var: &'static str,
        reason: String,
    },
}

/// Signup server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for success/cancel destinations
    pub base_url: Url,
    /// Directory of public static pages
    pub static_dir: PathBuf,
    /// Upper bound on each collaborator call during signup
    pub collaborator_timeout: Duration,
    /// Identity provider configuration
    pub identity: IdentityConfig,
    /// Profile store connection URL (contains password)
    pub database_url: SecretString,
    /// Payment provider configuration, `None` when paid plans are disabled
    pub payments: Option<StripeConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment name
    pub sentry_environment: Option<String>,
}

/// Identity provider (Supabase Auth) configuration.
///
/// Implements `Debug` manually to redact secret fields.
#[derive(Clone)]
pub struct IdentityConfig {
    /// Project URL, e.g. `https://abc.supabase.co`
    pub url: Url,
    /// Public API key sent as `apikey`
    pub anon_key: SecretString,
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("url", &self.url.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

/// Payment provider (Stripe) configuration.
#[derive(Clone)]
pub struct StripeConfig {
    /// Secret API key
    pub secret_key: SecretString,
    /// API base URL
    pub api_base: Url,
    /// Price for every billed term
    pub prices: PriceTable,
}

impl std::fmt::Debug for StripeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeConfig")
            .field("secret_key", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .field("prices", &self.prices)
            .finish()
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing or invalid,
    /// or if payments are enabled with an incomplete price table.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let env = Env(&lookup);

        let host = env
            .or_default("RHYTHM_DECK_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| invalid("RHYTHM_DECK_HOST", e))?;
        let port = env
            .or_default("PORT", "3000")
            .parse::<u16>()
            .map_err(|e| invalid("PORT", e))?;
        let base_url = parse_http_url("RHYTHM_DECK_BASE_URL", &env.required("RHYTHM_DECK_BASE_URL")?)?;
        let static_dir = PathBuf::from(env.or_default("STATIC_DIR", "public"));
        let collaborator_timeout = parse_timeout(&env)?;

        let identity = IdentityConfig {
            url: parse_http_url("SUPABASE_URL", &env.required("SUPABASE_URL")?)?,
            anon_key: SecretString::from(env.required("SUPABASE_ANON_KEY")?),
        };

        let database_url = env
            .optional("PROFILE_DATABASE_URL")
            .or_else(|| env.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("PROFILE_DATABASE_URL".to_string()))?;

        let payments = StripeConfig::from_env(&env)?;

        Ok(Self {
            host,
            port,
            base_url,
            static_dir,
            collaborator_timeout,
            identity,
            database_url,
            payments,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl StripeConfig {
    /// `None` when `STRIPE_SECRET_KEY` is unset: paid plans degrade instead of
    /// failing startup.
    fn from_env(env: &Env<'_>) -> Result<Option<Self>, ConfigError> {
        let Some(secret_key) = env.optional("STRIPE_SECRET_KEY") else {
            return Ok(None);
        };
        validate_secret_strength(&secret_key, "STRIPE_SECRET_KEY")?;

        let api_base = parse_http_url(
            "STRIPE_API_BASE",
            &env.or_default("STRIPE_API_BASE", DEFAULT_STRIPE_API_BASE),
        )?;

        let price = |term: PaidTerm| -> Result<PriceId, ConfigError> {
            let var = price_var(term);
            let raw = env.optional(var).unwrap_or_default();
            PriceId::parse(&raw).map_err(|e| ConfigError::InvalidPrice {
                term,
                var,
                reason: e.to_string(),
            })
        };

        let prices = PriceTable {
            one_year: price(PaidTerm::OneYear)?,
            two_year: price(PaidTerm::TwoYear)?,
            three_year: price(PaidTerm::ThreeYear)?,
        };

        Ok(Some(Self {
            secret_key: SecretString::from(secret_key),
            api_base,
            prices,
        }))
    }
}

/// Environment variable holding the price for a billed term.
#[must_use]
pub const fn price_var(term: PaidTerm) -> &'static str {
    match term {
        PaidTerm::OneYear => "STRIPE_PRICE_1YEAR",
        PaidTerm::TwoYear => "STRIPE_PRICE_2YEAR",
        PaidTerm::ThreeYear => "STRIPE_PRICE_3YEAR",
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable lookup with the usual required/optional/default accessors.
struct Env<'a>(&'a dyn Fn(&str) -> Option<String>);

impl Env<'_> {
    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|v| !v.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }
}

fn invalid(key: &str, err: impl std::fmt::Display) -> ConfigError {
    ConfigError::InvalidEnvVar(key.to_string(), err.to_string())
}

/// Parse an absolute http(s) URL.
fn parse_http_url(key: &str, value: &str) -> Result<Url, ConfigError> {
    let url = Url::parse(value).map_err(|e| invalid(key, e))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(invalid(key, "must be an http(s) URL with a host"));
    }
    Ok(url)
}

fn parse_timeout(env: &Env<'_>) -> Result<Duration, ConfigError> {
    let key = "SIGNUP_COLLABORATOR_TIMEOUT_SECS";
    let secs = match env.optional(key) {
        Some(raw) => raw.parse::<u64>().map_err(|e| invalid(key, e))?,
        None => DEFAULT_TIMEOUT_SECS,
    };
    if !(1..=MAX_TIMEOUT_SECS).contains(&secs) {
        return Err(invalid(key, format!("must be between 1 and {MAX_TIMEOUT_SECS}")));
    }
    Ok(Duration::from_secs(secs))
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    if let Some(pattern) = PLACEHOLDER_PATTERNS.iter().find(|p| lower.contains(*p)) {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!("appears to be a placeholder (contains '{pattern}')"),
        ));
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1})"
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const STRIPE_KEY: &str = "sk_test_51Nq8ZbK3vT7wQp2LmR9sYx4C";

    fn base_vars() -> HashMap<&'static str, String> {
        HashMap::from([
            ("RHYTHM_DECK_BASE_URL", "https://rhythmdeck.app".to_string()),
            ("SUPABASE_URL", "https://abc.supabase.co".to_string()),
            ("SUPABASE_ANON_KEY", "anon-key".to_string()),
            ("PROFILE_DATABASE_URL", "postgres://localhost/rd".to_string()),
        ])
    }

    fn load(vars: &HashMap<&'static str, String>) -> Result<ServerConfig, ConfigError> {
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn with_stripe(mut vars: HashMap<&'static str, String>) -> HashMap<&'static str, String> {
        vars.insert("STRIPE_SECRET_KEY", STRIPE_KEY.to_string());
        vars.insert("STRIPE_PRICE_1YEAR", "price_1Pa1yr".to_string());
        vars.insert("STRIPE_PRICE_2YEAR", "price_1Pa2yr".to_string());
        vars.insert("STRIPE_PRICE_3YEAR", "price_1Pa3yr".to_string());
        vars
    }

    #[test]
    fn test_defaults_without_payments() {
        let config = load(&base_vars()).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.socket_addr().ip().to_string(), "127.0.0.1");
        assert_eq!(config.collaborator_timeout, Duration::from_secs(5));
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert!(config.payments.is_none());
    }

    #[test]
    fn test_missing_identity_config_is_fatal() {
        let mut vars = base_vars();
        vars.remove("SUPABASE_ANON_KEY");
        let err = load(&vars).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref k) if k == "SUPABASE_ANON_KEY"));
    }

    #[test]
    fn test_missing_profile_database_is_fatal() {
        let mut vars = base_vars();
        vars.remove("PROFILE_DATABASE_URL");
        assert!(matches!(load(&vars), Err(ConfigError::MissingEnvVar(_))));

        vars.insert("DATABASE_URL", "postgres://fallback/rd".to_string());
        let config = load(&vars).unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fallback/rd");
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut vars = base_vars();
        vars.insert("RHYTHM_DECK_BASE_URL", "ftp://rhythmdeck.app".to_string());
        assert!(matches!(load(&vars), Err(ConfigError::InvalidEnvVar(_, _))));
    }

    #[test]
    fn test_timeout_bounds() {
        let mut vars = base_vars();
        vars.insert("SIGNUP_COLLABORATOR_TIMEOUT_SECS", "0".to_string());
        assert!(load(&vars).is_err());
        vars.insert("SIGNUP_COLLABORATOR_TIMEOUT_SECS", "12".to_string());
        assert_eq!(load(&vars).unwrap().collaborator_timeout, Duration::from_secs(12));
    }

    #[test]
    fn test_stripe_enabled_with_full_price_table() {
        let config = load(&with_stripe(base_vars())).unwrap();
        let stripe = config.payments.unwrap();
        assert_eq!(stripe.prices.price_for(PaidTerm::TwoYear).as_str(), "price_1Pa2yr");
        assert_eq!(stripe.api_base.as_str(), "https://api.stripe.com/");
    }

    #[test]
    fn test_stripe_missing_price_is_fatal() {
        let mut vars = with_stripe(base_vars());
        vars.remove("STRIPE_PRICE_3YEAR");
        let err = load(&vars).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidPrice {
                term: PaidTerm::ThreeYear,
                var: "STRIPE_PRICE_3YEAR",
                ..
            }
        ));
    }

    #[test]
    fn test_stripe_placeholder_price_is_fatal() {
        let mut vars = with_stripe(base_vars());
        vars.insert("STRIPE_PRICE_1YEAR", "price_1XXXXXX".to_string());
        assert!(matches!(load(&vars), Err(ConfigError::InvalidPrice { .. })));
    }

    #[test]
    fn test_stripe_placeholder_key_is_fatal() {
        let mut vars = with_stripe(base_vars());
        vars.insert("STRIPE_SECRET_KEY", "sk_test_changeme".to_string());
        assert!(matches!(load(&vars), Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_shannon_entropy() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("aaaaaaa") - 0.0).abs() < f64::EPSILON);
        assert!((shannon_entropy("ab") - 1.0).abs() < 0.01);
        assert!(shannon_entropy(STRIPE_KEY) > MIN_ENTROPY_BITS_PER_CHAR);
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = load(&with_stripe(base_vars())).unwrap();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("abc.supabase.co"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("anon-key"));
        assert!(!debug_output.contains(STRIPE_KEY));
    }
}
