//! In-memory store backend
//!
//! Non-persistent backend for tests and host tools. Supports:
//! - Call counting (init, erase, open, close, read, write, commit)
//! - Fault injection for init, open, commit and per-key reads/writes
//! - Shared state across clones, so a test can keep a handle for inspection
//!   after giving the store to a registry

use super::{
    validate_key, validate_namespace, ScalarKind, ScalarValue, StoreBackend, StoreError,
    StoreResult, StoreSession,
};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Helper to convert poison errors into StoreError
fn handle_poison<T>(_err: PoisonError<T>) -> StoreError {
    StoreError::Backend("Lock poisoned: a thread panicked while holding the lock".to_string())
}

/// Call counters for a [`MemoryStore`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryStoreStats {
    pub inits: usize,
    pub erases: usize,
    pub opens: usize,
    pub closes: usize,
    pub reads: usize,
    pub writes: usize,
    pub commits: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    initialized: bool,
    namespaces: HashMap<String, BTreeMap<String, ScalarValue>>,
    max_entries: Option<usize>,
    stats: MemoryStoreStats,
    init_failures: VecDeque<StoreError>,
    open_failure: Option<StoreError>,
    commit_failure: Option<StoreError>,
    read_failures: HashMap<String, StoreError>,
    write_failures: HashMap<String, StoreError>,
}

/// In-memory store (non-persistent, for tests)
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Create a new, uninitialized memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of keys per namespace
    pub fn with_max_entries(self, max_entries: usize) -> Self {
        self.state().max_entries = Some(max_entries);
        self
    }

    /// Inspection access that survives a poisoned lock
    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of the call counters
    pub fn stats(&self) -> MemoryStoreStats {
        self.state().stats
    }

    /// Committed value for `key` in `namespace`
    pub fn value(&self, namespace: &str, key: &str) -> Option<ScalarValue> {
        self.state()
            .namespaces
            .get(namespace)
            .and_then(|entries| entries.get(key))
            .copied()
    }

    /// Seed a committed value directly, bypassing sessions
    pub fn insert(&self, namespace: &str, key: &str, value: ScalarValue) {
        self.state()
            .namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(key.to_string(), value);
    }

    /// Number of committed keys in `namespace`
    pub fn len(&self, namespace: &str) -> usize {
        self.state()
            .namespaces
            .get(namespace)
            .map_or(0, |entries| entries.len())
    }

    /// Queue an error for the next `init` call (errors are consumed in order)
    pub fn fail_next_init(&self, err: StoreError) {
        self.state().init_failures.push_back(err);
    }

    /// Make every `open` fail with `err` until cleared with `None`
    pub fn set_open_failure(&self, err: Option<StoreError>) {
        self.state().open_failure = err;
    }

    /// Make every `commit` fail with `err` until cleared with `None`
    pub fn set_commit_failure(&self, err: Option<StoreError>) {
        self.state().commit_failure = err;
    }

    /// Make reads of `key` fail with `err` until cleared
    pub fn fail_reads_for(&self, key: &str, err: StoreError) {
        self.state().read_failures.insert(key.to_string(), err);
    }

    /// Make writes of `key` fail with `err` until cleared
    pub fn fail_writes_for(&self, key: &str, err: StoreError) {
        self.state().write_failures.insert(key.to_string(), err);
    }

    /// Remove injected read and write failures for `key`
    pub fn clear_failures_for(&self, key: &str) {
        let mut state = self.state();
        state.read_failures.remove(key);
        state.write_failures.remove(key);
    }
}

impl StoreBackend for MemoryStore {
    fn init(&self) -> StoreResult<()> {
        let mut state = self.state.lock().map_err(handle_poison)?;
        state.stats.inits += 1;
        if let Some(err) = state.init_failures.pop_front() {
            return Err(err);
        }
        state.initialized = true;
        Ok(())
    }

    fn erase(&self) -> StoreResult<()> {
        let mut state = self.state.lock().map_err(handle_poison)?;
        state.stats.erases += 1;
        state.namespaces.clear();
        state.initialized = false;
        Ok(())
    }

    fn open(&self, namespace: &str) -> StoreResult<Box<dyn StoreSession>> {
        validate_namespace(namespace)?;
        let mut state = self.state.lock().map_err(handle_poison)?;
        if !state.initialized {
            return Err(StoreError::NotInitialized);
        }
        if let Some(err) = state.open_failure.clone() {
            return Err(err);
        }
        state.stats.opens += 1;
        drop(state);

        Ok(Box::new(MemorySession {
            state: Arc::clone(&self.state),
            namespace: namespace.to_string(),
            pending: BTreeMap::new(),
            closed: false,
        }))
    }
}

/// Session over a [`MemoryStore`] namespace
struct MemorySession {
    state: Arc<Mutex<MemoryState>>,
    namespace: String,
    pending: BTreeMap<String, ScalarValue>,
    closed: bool,
}

impl StoreSession for MemorySession {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn read(&mut self, key: &str, kind: ScalarKind) -> StoreResult<ScalarValue> {
        validate_key(key)?;
        let mut state = self.state.lock().map_err(handle_poison)?;
        state.stats.reads += 1;
        if let Some(err) = state.read_failures.get(key) {
            return Err(err.clone());
        }

        let stored = self.pending.get(key).copied().or_else(|| {
            state
                .namespaces
                .get(&self.namespace)
                .and_then(|entries| entries.get(key))
                .copied()
        });

        match stored {
            Some(value) if value.kind() == kind => Ok(value),
            Some(value) => Err(StoreError::TypeMismatch {
                key: key.to_string(),
                expected: kind,
                found: value.kind(),
            }),
            None => Err(StoreError::NotFound(key.to_string())),
        }
    }

    fn write(&mut self, key: &str, value: ScalarValue) -> StoreResult<()> {
        validate_key(key)?;
        let mut state = self.state.lock().map_err(handle_poison)?;
        state.stats.writes += 1;
        if let Some(err) = state.write_failures.get(key) {
            return Err(err.clone());
        }

        if let Some(max_entries) = state.max_entries {
            let committed = state.namespaces.get(&self.namespace);
            let exists = self.pending.contains_key(key)
                || committed.is_some_and(|entries| entries.contains_key(key));
            if !exists {
                let new_keys = self
                    .pending
                    .keys()
                    .filter(|k| !committed.is_some_and(|entries| entries.contains_key(*k)))
                    .count();
                let used = committed.map_or(0, |entries| entries.len()) + new_keys;
                if used >= max_entries {
                    return Err(StoreError::NoSpace(self.namespace.clone()));
                }
            }
        }

        self.pending.insert(key.to_string(), value);
        Ok(())
    }

    fn commit(&mut self) -> StoreResult<()> {
        let mut state = self.state.lock().map_err(handle_poison)?;
        state.stats.commits += 1;
        if let Some(err) = state.commit_failure.clone() {
            return Err(err);
        }
        let entries = state.namespaces.entry(self.namespace.clone()).or_default();
        entries.append(&mut self.pending);
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.pending.clear();
        if let Ok(mut state) = self.state.lock() {
            state.stats.closes += 1;
        }
    }
}

impl Drop for MemorySession {
    fn drop(&mut self) {
        self.close();
    }
}
