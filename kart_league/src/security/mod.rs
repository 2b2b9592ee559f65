//! Security helpers shared by the service.
//!
//! - Argon2id password hashing with a server-side pepper
//! - Random participant and refresh tokens with constant-time comparison
//! - Input sanitization for names and labels
//! - Sliding-window rate limiting for login and participant reporting
//!
//! Every domain error type offers a `client_message()` that hides database
//! and token internals; see the individual modules.

pub mod errors;
pub mod password;
pub mod rate_limiter;
pub mod sanitize;
pub mod tokens;

pub use errors::{InputError, PasswordError, RateLimitError, RateLimiterResult};
pub use password::PasswordHasherWithPepper;
pub use rate_limiter::{RateLimitConfig, RateLimitResult, RateLimiter};
pub use tokens::{generate_token, tokens_match};
