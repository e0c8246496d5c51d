//! Error types for the store subsystem
//!
//! Covers every failure a backend can report: preparation (init and
//! erase), session open and commit, and per-key reads and writes.

use super::value::ScalarKind;
use thiserror::Error;

/// Errors reported by a store backend or one of its sessions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// Key has never been written in this namespace
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Stored value has a different scalar kind than requested
    #[error("Type mismatch for '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: ScalarKind,
        found: ScalarKind,
    },

    /// Namespace has no room for another entry
    #[error("No space left in namespace '{0}'")]
    NoSpace(String),

    /// Key is empty or too long
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Namespace is empty, too long, or contains unsupported characters
    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    /// Backend was used before `init` succeeded
    #[error("Store not initialized")]
    NotInitialized,

    /// Storage partition is full or fragmented and must be erased
    #[error("Storage has no free pages")]
    NoFreePages,

    /// Storage was written by an incompatible format version
    #[error("Storage format version {found} found, expected {expected}")]
    NewVersionFound { found: u8, expected: u8 },

    /// Stored data failed validation
    #[error("Corrupted data: {0}")]
    Corrupted(String),

    /// Any other backend failure (I/O, injected faults)
    #[error("Backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Whether an `init` failure can be cleared by erasing the backend and retrying
    pub fn is_recoverable_init(&self) -> bool {
        matches!(
            self,
            StoreError::NoFreePages | StoreError::NewVersionFound { .. }
        )
    }
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}
