//! Domain models for the signup service.

pub mod profile;

pub use profile::{NewProfile, ProfileRecord, PublicProfile};
