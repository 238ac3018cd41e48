//! Error types for cache backend operations.

use thiserror::Error;

/// Result type alias for cache backend operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Error type for cache backend operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// The cache could not be reached (connection refused, broken pipe).
    #[error("Cache unavailable: {0}")]
    Unavailable(String),

    /// A cache operation exceeded its deadline.
    #[error("Cache operation timed out")]
    Timeout,

    /// The backend reported an error for a reachable cache.
    #[error("Cache backend error: {0}")]
    Backend(String),
}
