//! Tenant subdomain type.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing a [`Subdomain`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SubdomainError {
    /// The input is empty after trimming.
    #[error("subdomain is required")]
    Empty,
    /// The input is longer than a DNS label allows.
    #[error("subdomain must be at most {max} characters")]
    TooLong {
        /// Maximum allowed length.
        max: usize,
    },
    /// The input contains a character outside `a-z`, `0-9` and `-`.
    #[error("subdomain may only contain letters, numbers and hyphens")]
    InvalidCharacter,
    /// The input starts or ends with a hyphen.
    #[error("subdomain cannot start or end with a hyphen")]
    EdgeHyphen,
    /// The input is reserved for the platform itself.
    #[error("subdomain '{0}' is reserved")]
    Reserved(String),
}

/// A creator's chosen subdomain, e.g. `dj-nova` in `dj-nova.rhythmdeck.app`.
///
/// Input is trimmed and lowercased, then checked against DNS label rules.
/// Uniqueness is not checked here; the profile store enforces it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Subdomain(String);

impl Subdomain {
    /// Maximum length of a DNS label.
    pub const MAX_LENGTH: usize = 63;

    /// Names the platform keeps for itself.
    pub const RESERVED: &'static [&'static str] = &["www", "api", "admin", "app"];

    /// Parse and normalize a `Subdomain`.
    ///
    /// # Errors
    ///
    /// Returns a [`SubdomainError`] describing the first violated rule.
    pub fn parse(s: &str) -> Result<Self, SubdomainError> {
        let normalized = s.trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(SubdomainError::Empty);
        }
        if normalized.len() > Self::MAX_LENGTH {
            return Err(SubdomainError::TooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if !normalized
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(SubdomainError::InvalidCharacter);
        }
        if normalized.starts_with('-') || normalized.ends_with('-') {
            return Err(SubdomainError::EdgeHyphen);
        }
        if Self::RESERVED.contains(&normalized.as_str()) {
            return Err(SubdomainError::Reserved(normalized));
        }
        Ok(Self(normalized))
    }

    /// Returns the subdomain as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Subdomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Subdomain {
    type Error = SubdomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Subdomain> for String {
    fn from(subdomain: Subdomain) -> Self {
        subdomain.0
    }
}

impl AsRef<str> for Subdomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(feature = "postgres")]
crate::impl_text_sqlx!(Subdomain);
