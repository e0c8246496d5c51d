//! Store adapter
//!
//! Abstract contract for the persistent key-value backend settings are
//! written to. A backend is prepared once (`init`, with `erase` as the
//! recovery step), then hands out one session per batch. Sessions stage
//! writes until `commit` and must be closed when the batch ends.

pub mod errors;
pub mod file_store;
pub mod memory_store;
pub mod value;

pub use errors::{StoreError, StoreResult};
pub use file_store::FileStore;
pub use memory_store::MemoryStore;
pub use value::{ScalarKind, ScalarValue};

/// Maximum key length in bytes
pub const MAX_KEY_LEN: usize = 15;

/// Maximum namespace length in bytes
pub const MAX_NAMESPACE_LEN: usize = 15;

/// Persistent key-value backend
pub trait StoreBackend: Send + Sync {
    /// Prepare the backend for use
    ///
    /// `NoFreePages` and `NewVersionFound` signal a condition that `erase`
    /// followed by another `init` can clear.
    fn init(&self) -> StoreResult<()>;

    /// Wipe all stored namespaces
    fn erase(&self) -> StoreResult<()>;

    /// Open a read-write session on `namespace`
    fn open(&self, namespace: &str) -> StoreResult<Box<dyn StoreSession>>;
}

/// An open namespace, valid for one batch
pub trait StoreSession: Send {
    fn namespace(&self) -> &str;

    /// Read the value stored under `key`, which must have kind `kind`
    fn read(&mut self, key: &str, kind: ScalarKind) -> StoreResult<ScalarValue>;

    /// Stage `value` under `key`
    fn write(&mut self, key: &str, value: ScalarValue) -> StoreResult<()>;

    /// Make all staged writes durable
    fn commit(&mut self) -> StoreResult<()>;

    /// Release the session; staged writes that were not committed are dropped
    fn close(&mut self);
}

/// Check a namespace against the backend naming rules
pub fn validate_namespace(namespace: &str) -> StoreResult<()> {
    let valid = !namespace.is_empty()
        && namespace.len() <= MAX_NAMESPACE_LEN
        && namespace
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidNamespace(namespace.to_string()))
    }
}

/// Check a key against the backend naming rules
pub fn validate_key(key: &str) -> StoreResult<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}
