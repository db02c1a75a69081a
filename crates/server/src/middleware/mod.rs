//! HTTP middleware stack.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (hub per request, transaction)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (correlates logs, Sentry events and responses)
//! 4. Signup rate limiting (governor, `POST /signup` only)

pub mod rate_limit;
pub mod request_id;

pub use rate_limit::signup_rate_limiter;
pub use request_id::request_id_middleware;
