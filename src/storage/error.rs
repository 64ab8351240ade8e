//! Error types for cache operations.
//!
//! Absence and expiry are not errors: lookups return `None` for both.
//! The only failure a running store reports is [`CacheError::AlreadyExists`]
//! from `add`; the remaining variants come from construction.

use thiserror::Error;

/// Result type alias for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur when building or writing to a store.
#[derive(Debug, Error)]
pub enum CacheError {
    /// `add` found a live entry for the key; nothing was changed
    #[error("key already exists")]
    AlreadyExists,

    /// The configuration cannot describe a working store
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The background sweeper thread or its runtime could not be started
    #[error("failed to start sweeper: {0}")]
    SweeperSpawn(#[from] std::io::Error),
}

impl CacheError {
    /// Returns true for the recoverable `AlreadyExists` condition.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, CacheError::AlreadyExists)
    }
}
