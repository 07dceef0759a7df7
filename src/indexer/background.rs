//! Background index runs.
//!
//! At most one run is active per [`BackgroundIndexer`]. Each run opens its own
//! store handle so it never shares a connection with the query path.

use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::indexer::{IndexOptions, Indexer};
use super::progress::{IndexProgress, IndexSummary};
use crate::error::IndexError;
use crate::storage::open_store;
use crate::Result;

struct ActiveRun {
    root: PathBuf,
    cancel: CancellationToken,
    handle: JoinHandle<Result<IndexSummary>>,
}

/// Runs [`Indexer::index_root`] on a blocking task.
#[derive(Clone)]
pub struct BackgroundIndexer {
    db_path: PathBuf,
    options: IndexOptions,
    active: Arc<Mutex<Option<ActiveRun>>>,
}

impl BackgroundIndexer {
    /// Create a runner for the store at `db_path`.
    #[must_use]
    pub fn new(db_path: impl Into<PathBuf>, options: IndexOptions) -> Self {
        Self {
            db_path: db_path.into(),
            options,
            active: Arc::new(Mutex::new(None)),
        }
    }

    /// Start indexing `root`. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns `IndexError::AlreadyRunning` if a previous run has not finished.
    pub fn start<F>(&self, root: impl Into<PathBuf>, on_progress: F) -> Result<()>
    where
        F: FnMut(&IndexProgress) + Send + 'static,
    {
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|run| !run.handle.is_finished()) {
            return Err(IndexError::AlreadyRunning.into());
        }

        let root = root.into();
        let cancel = CancellationToken::new();
        let db_path = self.db_path.clone();
        let options = self.options.clone();
        let task_root = root.clone();
        let task_cancel = cancel.clone();

        let handle = tokio::task::spawn_blocking(move || {
            let db = open_store(&db_path)?;
            Indexer::new(db, options).index_root(&task_root, &task_cancel, on_progress)
        });

        tracing::info!(root = %root.display(), "Background index run started");
        *active = Some(ActiveRun {
            root,
            cancel,
            handle,
        });
        Ok(())
    }

    /// Whether a run is in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .as_ref()
            .is_some_and(|run| !run.handle.is_finished())
    }

    /// Request cancellation of the active run, if any.
    pub fn cancel(&self) {
        if let Some(run) = self.active.lock().as_ref() {
            tracing::info!(root = %run.root.display(), "Cancelling index run");
            run.cancel.cancel();
        }
    }

    /// Wait for the current run to finish.
    ///
    /// Returns `None` when nothing was started since the last wait.
    ///
    /// # Errors
    ///
    /// Returns the run's own error, or `IndexError::TaskFailed` if the task
    /// panicked.
    pub async fn wait(&self) -> Result<Option<IndexSummary>> {
        let Some(run) = self.active.lock().take() else {
            return Ok(None);
        };

        let summary = run
            .handle
            .await
            .map_err(|e| IndexError::TaskFailed(e.to_string()))??;
        Ok(Some(summary))
    }
}

impl std::fmt::Debug for BackgroundIndexer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundIndexer")
            .field("db_path", &self.db_path)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}
