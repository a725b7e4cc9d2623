//! Batch scheduler split into focused submodules.
//!
//! The [`BatchScheduler`] struct and its methods are organized by domain:
//! - [`control`] - Run control surface (start/pause/resume/cancel/status)
//! - [`run_loop`] - The phase machine driving one run
//! - [`batch`] - Bounded-concurrency dispatch and batch settlement
//! - [`maintenance`] - Submit, failure triage, export and reset

mod batch;
mod control;
mod maintenance;
mod run_loop;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::fetcher::{Fetcher, HttpFetcher};
use crate::progress::ProgressStore;
use crate::store::DurableStore;
use crate::types::{Event, RunState};
use crate::work_set::WorkSet;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

/// Ownership record of the current run
pub(crate) struct RunSlot {
    pub(crate) state: RunState,
    /// Incremented on every start; a loop only settles the state of its own run
    pub(crate) generation: u64,
    /// Set while a run loop exists, including the wind-down after a cancel
    pub(crate) loop_alive: bool,
    /// Token shared with every fetch of the current run
    pub(crate) cancel: CancellationToken,
}

/// Run flags shared between the loop and control calls
#[derive(Clone)]
pub(crate) struct RunControl {
    pub(crate) slot: Arc<tokio::sync::Mutex<RunSlot>>,
    /// Cooperative pause request, observed between batches only
    pub(crate) pause_requested: Arc<AtomicBool>,
    /// Wakes a loop waiting out a rate-limit backoff when a pause is requested
    pub(crate) pause_notify: Arc<Notify>,
}

impl RunControl {
    fn new() -> Self {
        Self {
            slot: Arc::new(tokio::sync::Mutex::new(RunSlot {
                state: RunState::Idle,
                generation: 0,
                loop_alive: false,
                cancel: CancellationToken::new(),
            })),
            pause_requested: Arc::new(AtomicBool::new(false)),
            pause_notify: Arc::new(Notify::new()),
        }
    }
}

/// Drives a resumable fetch job (cloneable - all fields are Arc-wrapped)
///
/// One scheduler owns one job. Running two schedulers against the same
/// progress records concurrently is not supported.
#[derive(Clone)]
pub struct BatchScheduler {
    pub(crate) work_set: WorkSet,
    pub(crate) progress: ProgressStore,
    pub(crate) fetcher: Arc<dyn Fetcher>,
    pub(crate) control: RunControl,
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl BatchScheduler {
    /// Create a scheduler for `job` over injected storage and fetcher
    pub fn new(store: Arc<dyn DurableStore>, fetcher: Arc<dyn Fetcher>, job: &str) -> Self {
        // Buffer of 1000 events; slow subscribers get RecvError::Lagged
        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);

        Self {
            work_set: WorkSet::new(store.clone(), job),
            progress: ProgressStore::new(store, job),
            fetcher,
            control: RunControl::new(),
            event_tx,
        }
    }

    /// Open the SQLite database and HTTP fetcher described by `config`
    pub async fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let db = Database::new(&config.persistence.database_path).await?;
        let fetcher = HttpFetcher::new(&config.fetcher)?;

        tracing::info!(
            job = %config.persistence.job,
            database = %config.persistence.database_path.display(),
            kind = ?config.fetcher.kind,
            "Scheduler initialized"
        );

        Ok(Self::new(
            Arc::new(db),
            Arc::new(fetcher),
            &config.persistence.job,
        ))
    }

    /// Subscribe to run events
    ///
    /// Each subscriber receives all events independently.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Work set of this job
    pub fn work_set(&self) -> &WorkSet {
        &self.work_set
    }

    /// Progress records of this job
    pub fn progress(&self) -> &ProgressStore {
        &self.progress
    }

    pub(crate) fn emit_event(&self, event: Event) {
        // send() only fails when nobody is subscribed
        self.event_tx.send(event).ok();
    }
}
