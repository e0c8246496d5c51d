//! Debounced background saving
//!
//! Application code calls [`AutosaveHandle::schedule`] after every change.
//! Requests arriving within the debounce window restart the timer, so a burst
//! of edits becomes a single batch and a single commit. Batches run on the
//! blocking pool because store backends do synchronous I/O.

use crate::registry::{BatchReport, Registry, RegistryError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};

const REQUEST_QUEUE_DEPTH: usize = 16;

/// Errors surfaced to callers of [`AutosaveHandle::save_now`]
#[derive(Debug, Error)]
pub enum AutosaveError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error("Autosave task has stopped")]
    Stopped,

    #[error("Save task panicked: {0}")]
    Join(String),
}

type SaveReply = oneshot::Sender<Result<BatchReport, AutosaveError>>;

enum SaveRequest {
    /// Save once the debounce window passes without further requests
    Schedule,
    /// Save right away and report back
    Immediate(SaveReply),
}

/// Handle for requesting saves from the autosave task
///
/// Clones share one task. Once every handle is dropped the task flushes any
/// pending save and exits.
#[derive(Clone)]
pub struct AutosaveHandle {
    tx: mpsc::Sender<SaveRequest>,
}

impl AutosaveHandle {
    /// Request a debounced save
    pub fn schedule(&self) {
        match self.tx.try_send(SaveRequest::Schedule) {
            Ok(()) => {}
            // A full queue already holds a request that will restart the timer
            Err(mpsc::error::TrySendError::Full(_)) => {}
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("autosave task stopped, dropping save request");
            }
        }
    }

    /// Save immediately, bypassing the debounce window
    pub async fn save_now(&self) -> Result<BatchReport, AutosaveError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(SaveRequest::Immediate(reply_tx))
            .await
            .map_err(|_| AutosaveError::Stopped)?;
        reply_rx.await.map_err(|_| AutosaveError::Stopped)?
    }
}

/// Start the autosave task for `registry`
///
/// Must be called from within a tokio runtime.
pub fn spawn_autosave(
    registry: Arc<Registry>,
    debounce: Duration,
) -> (AutosaveHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(REQUEST_QUEUE_DEPTH);
    let task = tokio::spawn(run(registry, debounce, rx));
    (AutosaveHandle { tx }, task)
}

async fn run(registry: Arc<Registry>, debounce: Duration, mut rx: mpsc::Receiver<SaveRequest>) {
    info!(namespace = %registry.namespace(), ?debounce, "autosave task started");
    let mut deadline: Option<Instant> = None;

    loop {
        let request = match deadline {
            Some(at) => tokio::select! {
                request = rx.recv() => request,
                _ = sleep_until(at) => {
                    deadline = None;
                    scheduled_save(&registry).await;
                    continue;
                }
            },
            None => rx.recv().await,
        };

        match request {
            Some(SaveRequest::Schedule) => {
                deadline = Some(Instant::now() + debounce);
            }
            Some(SaveRequest::Immediate(reply)) => {
                deadline = None;
                let _ = reply.send(save(&registry).await);
            }
            None => {
                if deadline.is_some() {
                    scheduled_save(&registry).await;
                }
                break;
            }
        }
    }

    info!(namespace = %registry.namespace(), "autosave task stopped");
}

async fn scheduled_save(registry: &Arc<Registry>) {
    if !registry.has_dirty() {
        debug!(namespace = %registry.namespace(), "no modified settings, skipping save");
        return;
    }
    match save(registry).await {
        Ok(report) if report.is_complete() => {}
        Ok(report) => warn!(namespace = %registry.namespace(), "{}", report),
        Err(err) => error!(namespace = %registry.namespace(), error = %err, "autosave failed"),
    }
}

async fn save(registry: &Arc<Registry>) -> Result<BatchReport, AutosaveError> {
    let registry = Arc::clone(registry);
    tokio::task::spawn_blocking(move || registry.save())
        .await
        .map_err(|e| AutosaveError::Join(e.to_string()))?
        .map_err(AutosaveError::from)
}
