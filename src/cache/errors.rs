//! Cache error types.
//!
//! These surface only from backend construction and from internal raw
//! operations. The public backend interface is fail-open: read/write paths
//! catch these, count them, and degrade to a miss or no-op.

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to connect to the backing store
    #[error("Cache connection error: {0}")]
    ConnectionError(String),

    /// Failed to serialize or deserialize a cache entry or payload
    #[error("Cache serialization error: {0}")]
    SerializationError(String),

    /// Supplied key pattern is not a valid expression
    #[error("Invalid key pattern: {0}")]
    InvalidPattern(String),

    /// Generic backend error
    #[error("Cache backend error: {0}")]
    BackendError(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;
