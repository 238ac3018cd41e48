//! Error types for session store operations.

use thiserror::Error;
use vantage_cache::CacheError;

/// Result type alias for session store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for session store operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Session absent or expired. A normal outcome, never logged as an error.
    #[error("Session not found: {0}")]
    NotFound(String),

    /// The shared cache could not be reached or timed out.
    #[error("Session store unavailable: {0}")]
    Store(#[from] CacheError),

    /// Caller-supplied input was rejected before touching the cache.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Session is valid but lacks a required permission.
    #[error("Permission denied: missing {0}")]
    PermissionDenied(String),

    /// A stored record failed to serialize or deserialize.
    #[error("Malformed session record: {0}")]
    Codec(#[from] serde_json::Error),
}
