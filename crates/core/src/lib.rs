//! Rhythm Deck Core - Shared signup types.
//!
//! This crate provides the validated value types used by the signup service
//! and the CLI:
//! - `server` - Signup orchestration and HTTP surface
//! - `cli` - Migrations and configuration checks
//!
//! # Architecture
//!
//! The core crate contains only types - no I/O, no database access,
//! no HTTP clients. Everything here can be constructed only through a
//! validating constructor, so a value that exists is a value that is valid.
//!
//! # Modules
//!
//! - [`types`] - Newtypes for user IDs, emails, subdomains and plans

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
