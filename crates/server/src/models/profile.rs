//! Profile domain types.
//!
//! These types represent validated domain objects separate from database row types.

use chrono::{DateTime, Utc};
use rhythm_deck_core::{Email, Plan, PlanDuration, Subdomain, UserId};
use serde::Serialize;

/// A creator profile (domain type).
///
/// Keyed by the identity provider's user ID. `paid` is only ever set by the
/// payment confirmation flow, never by signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRecord {
    /// Same ID as the identity provider account.
    pub id: UserId,
    pub email: Email,
    pub display_name: String,
    /// Unique across all profiles.
    pub subdomain: Subdomain,
    pub plan: Plan,
    pub plan_duration: PlanDuration,
    pub paid: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields supplied when inserting a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProfile {
    pub id: UserId,
    pub email: Email,
    pub display_name: String,
    pub subdomain: Subdomain,
    pub plan_duration: PlanDuration,
}

impl NewProfile {
    /// Plan tier the profile is created with.
    #[must_use]
    pub const fn plan(&self) -> Plan {
        self.plan_duration.plan()
    }
}

/// What `GET /artist/{subdomain}` exposes about a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfile {
    pub subdomain: Subdomain,
    pub display_name: String,
    pub plan: Plan,
}

impl From<ProfileRecord> for PublicProfile {
    fn from(record: ProfileRecord) -> Self {
        Self {
            subdomain: record.subdomain,
            display_name: record.display_name,
            plan: record.plan,
        }
    }
}
