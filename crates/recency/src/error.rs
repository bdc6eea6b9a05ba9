//! Error types for recency

use std::fmt;

/// Result type alias for recency operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while building a cache
///
/// Lookups and removals never fail; a missing key is reported through
/// `Option`/`bool` return values instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The cache was configured with parameters it cannot honour
    InvalidConfiguration(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::InvalidConfiguration(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for Error {}
