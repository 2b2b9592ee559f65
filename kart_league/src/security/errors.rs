//! Error types for the security module

use thiserror::Error;

/// Result type for rate limiting operations
pub type RateLimiterResult<T> = Result<T, RateLimitError>;

/// Rate limiting errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateLimitError {
    /// No limit configured for the endpoint
    #[error("Invalid endpoint configuration: {0}")]
    InvalidEndpoint(String),
}

/// Password hashing errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PasswordError {
    #[error("Password hashing failed")]
    HashingFailed,

    #[error("Invalid password")]
    Mismatch,
}

/// Input rejected by sanitization
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("{field} must not be empty")]
    Empty { field: &'static str },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: &'static str, max: usize },
}
