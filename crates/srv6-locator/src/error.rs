//! Error types for locator pool operations.

use srv6_types::Ipv6Prefix;
use thiserror::Error;

/// Result type alias for locator pool operations.
pub type LocatorResult<T> = Result<T, LocatorError>;

/// Errors that can occur while managing locator pools.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocatorError {
    /// A pool with this name is already registered.
    #[error("locator pool '{name}' already exists")]
    PoolExists { name: String },

    /// The requested range overlaps an existing pool's range.
    #[error("range {range} overlaps existing pool '{name}'")]
    PoolOverlap { name: String, range: Ipv6Prefix },

    /// No pool is registered under this name.
    #[error("locator pool '{name}' not found")]
    PoolNotFound { name: String },

    /// Every address in the pool's range is currently issued.
    #[error("locator pool '{name}' exhausted")]
    PoolExhausted { name: String },
}
