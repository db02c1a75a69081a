//! Subscription plans and plan durations.

use core::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when a plan duration key is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown plan duration '{0}' (expected one of: free, 1year, 2year, 3year)")]
pub struct PlanDurationError(pub String);

/// Error returned when a stored plan name is not recognized.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("unknown plan '{0}' (expected one of: free, pro)")]
pub struct PlanError(pub String);

/// The plan length a visitor picks at signup.
///
/// Wire keys are `free`, `1year`, `2year` and `3year`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PlanDuration {
    #[default]
    #[serde(rename = "free")]
    Free,
    #[serde(rename = "1year")]
    OneYear,
    #[serde(rename = "2year")]
    TwoYear,
    #[serde(rename = "3year")]
    ThreeYear,
}

impl PlanDuration {
    /// Every duration, in display order.
    pub const ALL: [Self; 4] = [Self::Free, Self::OneYear, Self::TwoYear, Self::ThreeYear];

    /// The wire key for this duration.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::OneYear => "1year",
            Self::TwoYear => "2year",
            Self::ThreeYear => "3year",
        }
    }

    /// The billed term, or `None` for the free tier.
    #[must_use]
    pub const fn paid_term(self) -> Option<PaidTerm> {
        match self {
            Self::Free => None,
            Self::OneYear => Some(PaidTerm::OneYear),
            Self::TwoYear => Some(PaidTerm::TwoYear),
            Self::ThreeYear => Some(PaidTerm::ThreeYear),
        }
    }

    /// The plan tier this duration grants once paid.
    #[must_use]
    pub const fn plan(self) -> Plan {
        match self {
            Self::Free => Plan::Free,
            Self::OneYear | Self::TwoYear | Self::ThreeYear => Plan::Pro,
        }
    }
}

impl fmt::Display for PlanDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanDuration {
    type Err = PlanDurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|duration| duration.as_str() == s)
            .ok_or_else(|| PlanDurationError(s.to_string()))
    }
}

/// A billed subscription term. Each term maps to one provider price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaidTerm {
    OneYear,
    TwoYear,
    ThreeYear,
}

impl PaidTerm {
    /// Every billed term.
    pub const ALL: [Self; 3] = [Self::OneYear, Self::TwoYear, Self::ThreeYear];

    /// The duration this term was selected as.
    #[must_use]
    pub const fn duration(self) -> PlanDuration {
        match self {
            Self::OneYear => PlanDuration::OneYear,
            Self::TwoYear => PlanDuration::TwoYear,
            Self::ThreeYear => PlanDuration::ThreeYear,
        }
    }
}

impl fmt::Display for PaidTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.duration().fmt(f)
    }
}

/// Plan tier stored on a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    /// Storage key for this plan.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Pro => "pro",
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Plan {
    type Err = PlanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "free" => Ok(Self::Free),
            "pro" => Ok(Self::Pro),
            other => Err(PlanError(other.to_string())),
        }
    }
}
