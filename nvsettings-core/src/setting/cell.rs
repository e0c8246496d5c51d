use super::{Persist, PersistOutcome, Scalar, SettingError};
use crate::registry::Registry;
use crate::store::StoreSession;
use parking_lot::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

/// A named, typed setting
///
/// The value lives behind the cell lock. The dirty flag is only changed
/// while that lock is held but can be read without it, so a batch skips a
/// clean cell even when another thread holds the lock. `get`/`set` never
/// touch storage; the owning [`Registry`] persists dirty cells in batches.
///
/// # Example
/// ```
/// use nvsettings_core::{MemoryStore, Registry, Setting};
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let registry = Registry::new("Global", Arc::new(MemoryStore::new()));
/// let volume = Setting::new("volume", 5u8, &registry);
///
/// volume.set(7);
/// assert_eq!(volume.get(), 7);
/// assert!(volume.is_dirty());
///
/// registry.save().unwrap();
/// assert!(!volume.is_dirty());
/// ```
#[derive(Debug)]
pub struct Setting<T: Scalar> {
    name: String,
    state: Mutex<T>,
    dirty: AtomicBool,
}

impl<T: Scalar> Setting<T> {
    /// Declare a setting with a default value and register it with `registry`
    ///
    /// The registry only keeps a weak reference; the returned `Arc` owns the cell.
    #[must_use = "the registry only holds a weak reference; dropping the cell unregisters it"]
    pub fn new(name: impl Into<String>, default: T, registry: &Registry) -> Arc<Self> {
        let cell = Self::detached(name, default);
        registry.register(&cell);
        cell
    }

    /// Create a setting that belongs to no registry
    #[must_use]
    pub fn detached(name: impl Into<String>, default: T) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(default),
            dirty: AtomicBool::new(false),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current in-memory value
    pub fn get(&self) -> T {
        *self.state.lock()
    }

    /// Replace the value and mark the cell dirty
    ///
    /// Blocks until the cell lock is free.
    pub fn set(&self, value: T) {
        let mut state = self.state.lock();
        *state = value;
        self.dirty.store(true, Ordering::Release);
    }

    /// Like [`Setting::set`], giving up after `timeout`
    pub fn try_set_for(&self, value: T, timeout: Duration) -> Result<(), SettingError> {
        let mut state = self.lock_for(timeout)?;
        *state = value;
        self.dirty.store(true, Ordering::Release);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    fn lock_for(&self, timeout: Duration) -> Result<MutexGuard<'_, T>, SettingError> {
        self.state
            .try_lock_for(timeout)
            .ok_or_else(|| SettingError::LockTimeout {
                name: self.name.clone(),
                timeout,
            })
    }
}

impl<T: Scalar + Default> Setting<T> {
    /// Declare a setting whose default is the type's zero value
    #[must_use = "the registry only holds a weak reference; dropping the cell unregisters it"]
    pub fn zeroed(name: impl Into<String>, registry: &Registry) -> Arc<Self> {
        Self::new(name, T::default(), registry)
    }
}

impl<T: Scalar> Persist for Setting<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_dirty(&self) -> bool {
        Setting::is_dirty(self)
    }

    fn persist(
        &self,
        session: &mut dyn StoreSession,
        lock_timeout: Duration,
    ) -> Result<PersistOutcome, SettingError> {
        if !self.is_dirty() {
            return Ok(PersistOutcome::Clean);
        }
        let state = self.lock_for(lock_timeout).inspect_err(|err| {
            warn!(setting = %self.name, error = %err, "skipping save");
        })?;
        // Another batch may have written it while we waited
        if !self.is_dirty() {
            return Ok(PersistOutcome::Clean);
        }

        match session.write(&self.name, (*state).into_value()) {
            Ok(()) => {
                self.dirty.store(false, Ordering::Release);
                debug!(setting = %self.name, value = ?*state, "setting written");
                Ok(PersistOutcome::Written)
            }
            Err(source) => {
                error!(setting = %self.name, error = %source, "error while saving setting");
                Err(SettingError::Store {
                    name: self.name.clone(),
                    source,
                })
            }
        }
    }

    fn restore(
        &self,
        session: &mut dyn StoreSession,
        lock_timeout: Duration,
    ) -> Result<(), SettingError> {
        let mut state = self.lock_for(lock_timeout).inspect_err(|err| {
            warn!(setting = %self.name, error = %err, "skipping load");
        })?;

        let stored = session
            .read(&self.name, T::KIND)
            .and_then(|value| {
                T::from_value(value).ok_or_else(|| crate::store::StoreError::TypeMismatch {
                    key: self.name.clone(),
                    expected: T::KIND,
                    found: value.kind(),
                })
            })
            .map_err(|source| SettingError::Store {
                name: self.name.clone(),
                source,
            });

        match stored {
            Ok(value) => {
                *state = value;
                self.dirty.store(false, Ordering::Release);
                Ok(())
            }
            Err(err) if err.is_not_found() => {
                debug!(setting = %self.name, "no stored value, keeping default");
                Err(err)
            }
            Err(err) => {
                error!(setting = %self.name, error = %err, "error while loading setting");
                Err(err)
            }
        }
    }
}
