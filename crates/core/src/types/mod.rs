//! Core types for Rhythm Deck.
//!
//! This module provides type-safe wrappers for the signup domain.

pub mod email;
pub mod id;
pub mod plan;
pub mod subdomain;

pub use email::{Email, EmailError};
pub use id::UserId;
pub use plan::{PaidTerm, Plan, PlanDuration, PlanDurationError, PlanError};
pub use subdomain::{Subdomain, SubdomainError};
