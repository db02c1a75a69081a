//! Profile repository for database operations.
//!
//! Queries are checked at runtime (`query_as`), so building does not need a
//! live database or an offline query cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rhythm_deck_core::{Email, Plan, PlanDuration, Subdomain, UserId};
use sqlx::PgPool;
use uuid::Uuid;

use super::{ProfileStore, RepositoryError};
use crate::models::{NewProfile, ProfileRecord};

/// Name of the unique index on `profiles.subdomain`.
const SUBDOMAIN_CONSTRAINT: &str = "profiles_subdomain_key";

const PROFILE_COLUMNS: &str =
    "id, email, display_name, subdomain, plan, plan_duration, paid, created_at";

/// Repository for profile database operations.
#[derive(Clone)]
pub struct ProfileRepository {
    pool: PgPool,
}

impl ProfileRepository {
    /// Create a new profile repository.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn insert(&self, profile: &NewProfile) -> Result<ProfileRecord, RepositoryError> {
        let sql = format!(
            "INSERT INTO public.profiles \
                 (id, email, display_name, subdomain, plan, plan_duration, paid) \
             VALUES ($1, $2, $3, $4, $5, $6, FALSE) \
             RETURNING {PROFILE_COLUMNS}"
        );

        let row: ProfileRow = sqlx::query_as(&sql)
            .bind(profile.id)
            .bind(&profile.email)
            .bind(&profile.display_name)
            .bind(&profile.subdomain)
            .bind(profile.plan().as_str())
            .bind(profile.plan_duration.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.is_unique_violation()
                {
                    if db_err.constraint() == Some(SUBDOMAIN_CONSTRAINT) {
                        return RepositoryError::SubdomainTaken(profile.subdomain.clone());
                    }
                    return RepositoryError::Conflict(format!(
                        "profile for user {} already exists",
                        profile.id
                    ));
                }
                RepositoryError::Database(e)
            })?;

        row.try_into()
    }

    async fn find_by_subdomain(
        &self,
        subdomain: &Subdomain,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        let sql = format!("SELECT {PROFILE_COLUMNS} FROM public.profiles WHERE subdomain = $1");

        let row: Option<ProfileRow> = sqlx::query_as(&sql)
            .bind(subdomain)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ProfileRecord::try_from).transpose()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

/// Raw `profiles` row.
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    email: String,
    display_name: String,
    subdomain: String,
    plan: String,
    plan_duration: String,
    paid: bool,
    created_at: DateTime<Utc>,
}

impl TryFrom<ProfileRow> for ProfileRecord {
    type Error = RepositoryError;

    fn try_from(row: ProfileRow) -> Result<Self, Self::Error> {
        let corrupt = |field: &str, e: &dyn std::fmt::Display| {
            RepositoryError::DataCorruption(format!("invalid {field} in profile {}: {e}", row.id))
        };

        Ok(Self {
            id: UserId::new(row.id),
            email: Email::parse(&row.email).map_err(|e| corrupt("email", &e))?,
            subdomain: Subdomain::parse(&row.subdomain).map_err(|e| corrupt("subdomain", &e))?,
            plan: row
                .plan
                .parse::<Plan>()
                .map_err(|e| corrupt("plan", &e))?,
            plan_duration: row
                .plan_duration
                .parse::<PlanDuration>()
                .map_err(|e| corrupt("plan_duration", &e))?,
            display_name: row.display_name,
            paid: row.paid,
            created_at: row.created_at,
        })
    }
}
