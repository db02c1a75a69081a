//! Business logic services.

pub mod signup;

pub use signup::{
    SignupError, SignupOrchestrator, SignupOutcome, SignupRequest, ValidSignup, ValidationError,
};
