//! Typed setting cells
//!
//! A [`Setting`] is one named value with its own lock and dirty flag.
//! The registry drives persistence through the [`Persist`] capability
//! without knowing the scalar type behind it.

mod cell;
mod scalar;

pub use cell::Setting;
pub use scalar::Scalar;

use crate::store::{StoreError, StoreSession};
use std::time::Duration;
use thiserror::Error;

/// Per-cell failure during a batch step
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingError {
    /// The store rejected the read or write
    #[error("Setting '{name}': {source}")]
    Store {
        name: String,
        #[source]
        source: StoreError,
    },

    /// The cell lock was not acquired within the batch lock timeout
    #[error("Setting '{name}': lock not acquired within {timeout:?}")]
    LockTimeout { name: String, timeout: Duration },
}

impl SettingError {
    /// Name of the setting that failed
    pub fn name(&self) -> &str {
        match self {
            SettingError::Store { name, .. } | SettingError::LockTimeout { name, .. } => name,
        }
    }

    /// Whether the failure was a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SettingError::Store {
                source: StoreError::NotFound(_),
                ..
            }
        )
    }
}

/// Result of persisting one cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    /// The value was written to the session
    Written,
    /// Nothing to write, the cell was clean
    Clean,
}

/// Save/load entry points the registry calls on every cell
pub trait Persist: Send + Sync {
    fn name(&self) -> &str;

    fn is_dirty(&self) -> bool;

    /// Write the value if dirty; clears the dirty flag on success
    fn persist(
        &self,
        session: &mut dyn StoreSession,
        lock_timeout: Duration,
    ) -> Result<PersistOutcome, SettingError>;

    /// Replace the value with the stored one; on failure the value is kept
    fn restore(
        &self,
        session: &mut dyn StoreSession,
        lock_timeout: Duration,
    ) -> Result<(), SettingError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_setting_error_display() {
        let err = SettingError::Store {
            name: "volume".to_string(),
            source: StoreError::NoSpace("Global".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Setting 'volume': No space left in namespace 'Global'"
        );
        assert_eq!(err.name(), "volume");
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_detection() {
        let err = SettingError::Store {
            name: "volume".to_string(),
            source: StoreError::NotFound("volume".to_string()),
        };
        assert!(err.is_not_found());

        let err = SettingError::LockTimeout {
            name: "volume".to_string(),
            timeout: Duration::from_millis(5),
        };
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("5ms"));
    }
}
