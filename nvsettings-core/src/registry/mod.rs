//! Settings registry
//!
//! A [`Registry`] owns one storage namespace and the ordered list of cells
//! declared against it. `save` and `load` run a batch over every cell under
//! a single store session:
//!
//! ```text
//! ensure initialized ──► open session ──► visit cells in order ──► commit (save only)
//!        │                    │                   │                        │
//!   fatal on failure    abort batch,        failures collected,     failure reported,
//!                       cells untouched     batch continues         dirty flags kept cleared
//! ```
//! The session is closed on every exit path.

mod report;

pub use report::{BatchKind, BatchReport};

use crate::config::RegistryConfig;
use crate::metrics;
use crate::setting::{Persist, PersistOutcome};
use crate::store::{StoreBackend, StoreError, StoreSession};
use parking_lot::{Mutex, RwLock};
use std::sync::{Arc, Weak};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Default bounded wait for a cell lock during a batch
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Failures that abort a whole batch
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RegistryError {
    /// The backend could not be prepared, even after erase-and-retry
    #[error("Storage initialization failed: {0}")]
    Init(#[source] StoreError),

    /// The namespace could not be opened for this batch
    #[error("Failed to open namespace '{namespace}': {source}")]
    Open {
        namespace: String,
        #[source]
        source: StoreError,
    },
}

/// Storage preparation state of a registry
#[derive(Debug, Clone, PartialEq)]
pub enum StorageState {
    Uninitialized,
    Initializing,
    Ready,
    /// Preparation failed for good; no batch can run
    Failed(StoreError),
}

/// Closes the session when the batch scope ends
struct SessionGuard {
    session: Box<dyn StoreSession>,
}

impl SessionGuard {
    fn as_mut(&mut self) -> &mut dyn StoreSession {
        self.session.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.session.close();
    }
}

/// Ordered collection of settings sharing one namespace
///
/// Cells are owned by whoever declares them; the registry keeps weak
/// references and skips cells that have been dropped. Overlapping batches on
/// the same registry are not serialized.
pub struct Registry {
    namespace: String,
    backend: Arc<dyn StoreBackend>,
    cells: RwLock<Vec<Weak<dyn Persist>>>,
    state: Mutex<StorageState>,
    lock_timeout: Duration,
}

impl Registry {
    /// Create a registry for `namespace` on `backend`
    pub fn new(namespace: impl Into<String>, backend: Arc<dyn StoreBackend>) -> Self {
        Self {
            namespace: namespace.into(),
            backend,
            cells: RwLock::new(Vec::new()),
            state: Mutex::new(StorageState::Uninitialized),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Create a registry from configuration
    pub fn with_config(config: &RegistryConfig, backend: Arc<dyn StoreBackend>) -> Self {
        Self::new(config.namespace.clone(), backend).with_lock_timeout(config.lock_timeout)
    }

    /// Set the bounded wait for cell locks during batches
    pub fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn storage_state(&self) -> StorageState {
        self.state.lock().clone()
    }

    /// Append a cell; batches visit cells in registration order
    ///
    /// Names are expected to be unique within the registry; this is not checked.
    pub fn register<S: Persist + 'static>(&self, cell: &Arc<S>) {
        let cell: Arc<dyn Persist> = cell.clone();
        debug!(namespace = %self.namespace, setting = cell.name(), "registered setting");
        self.cells.write().push(Arc::downgrade(&cell));
    }

    /// Number of live registered cells
    pub fn len(&self) -> usize {
        self.cells
            .read()
            .iter()
            .filter(|cell| cell.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of live cells in registration order
    pub fn names(&self) -> Vec<String> {
        self.cells
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .map(|cell| cell.name().to_string())
            .collect()
    }

    /// Whether any live cell holds an unsaved value
    pub fn has_dirty(&self) -> bool {
        self.cells
            .read()
            .iter()
            .filter_map(Weak::upgrade)
            .any(|cell| cell.is_dirty())
    }

    /// Persist every dirty cell in one session and commit
    ///
    /// Returns `Err` only when storage cannot be prepared or the namespace
    /// cannot be opened; in that case no cell is touched.
    pub fn save(&self) -> Result<BatchReport, RegistryError> {
        self.ensure_initialized()?;
        let mut session = self.open_session()?;
        let timer = metrics::Timer::start();

        let mut report = BatchReport::new(BatchKind::Save, &self.namespace);
        for cell in self.live_cells(&mut report) {
            report.visited += 1;
            match cell.persist(session.as_mut(), self.lock_timeout) {
                Ok(PersistOutcome::Written) => report.written += 1,
                Ok(PersistOutcome::Clean) => report.clean += 1,
                Err(err) => report.failures.push(err),
            }
        }

        // Dirty flags cleared above stay cleared even if the commit fails
        if let Err(err) = session.as_mut().commit() {
            error!(namespace = %self.namespace, error = %err, "error while committing changes");
            report.commit_error = Some(err);
        }
        drop(session);
        timer.stop();

        self.finish(&report);
        Ok(report)
    }

    /// Replace every cell's value with its stored value where one exists
    ///
    /// Cells without a stored value keep their current value.
    pub fn load(&self) -> Result<BatchReport, RegistryError> {
        self.ensure_initialized()?;
        let mut session = self.open_session()?;
        let timer = metrics::Timer::start();

        let mut report = BatchReport::new(BatchKind::Load, &self.namespace);
        for cell in self.live_cells(&mut report) {
            report.visited += 1;
            match cell.restore(session.as_mut(), self.lock_timeout) {
                Ok(()) => report.loaded += 1,
                Err(err) => report.failures.push(err),
            }
        }
        drop(session);
        timer.stop();

        self.finish(&report);
        Ok(report)
    }

    /// Run backend preparation once; one erase-and-retry for recoverable conditions
    fn ensure_initialized(&self) -> Result<(), RegistryError> {
        let mut state = self.state.lock();
        match &*state {
            StorageState::Ready => return Ok(()),
            StorageState::Failed(err) => return Err(RegistryError::Init(err.clone())),
            StorageState::Uninitialized | StorageState::Initializing => {}
        }

        *state = StorageState::Initializing;
        let result = self.backend.init().or_else(|err| {
            if !err.is_recoverable_init() {
                return Err(err);
            }
            warn!(namespace = %self.namespace, error = %err, "erasing storage and retrying init");
            self.backend.erase()?;
            self.backend.init()
        });

        match result {
            Ok(()) => {
                debug!(namespace = %self.namespace, "storage ready");
                *state = StorageState::Ready;
                Ok(())
            }
            Err(err) => {
                error!(namespace = %self.namespace, error = %err, "storage initialization failed");
                metrics::record_init_failure();
                *state = StorageState::Failed(err.clone());
                Err(RegistryError::Init(err))
            }
        }
    }

    fn open_session(&self) -> Result<SessionGuard, RegistryError> {
        match self.backend.open(&self.namespace) {
            Ok(session) => Ok(SessionGuard { session }),
            Err(source) => {
                error!(namespace = %self.namespace, error = %source, "error while opening handle");
                metrics::record_open_failure();
                Err(RegistryError::Open {
                    namespace: self.namespace.clone(),
                    source,
                })
            }
        }
    }

    /// Upgrade all cell references, pruning the ones that were dropped
    fn live_cells(&self, report: &mut BatchReport) -> Vec<Arc<dyn Persist>> {
        let mut cells = self.cells.write();
        let registered = cells.len();
        let mut live = Vec::with_capacity(registered);
        cells.retain(|weak| match weak.upgrade() {
            Some(cell) => {
                live.push(cell);
                true
            }
            None => false,
        });
        report.expired = registered - live.len();
        live
    }

    fn finish(&self, report: &BatchReport) {
        metrics::record_batch(report);
        if report.is_complete() {
            debug!(namespace = %self.namespace, "{}", report);
        } else {
            info!(namespace = %self.namespace, "{}", report);
        }
    }
}
