//! Run control surface (start, pause, resume, cancel, status)

use crate::config::RunConfig;
use crate::error::{Error, Result};
use crate::types::{Event, OutcomeStatus, RunOutcome, RunState, RunStatus};
use std::sync::atomic::Ordering;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::BatchScheduler;

impl BatchScheduler {
    /// Run the job until the pending set is empty, a pause is observed, or
    /// the run is cancelled.
    ///
    /// Returns [`Error::AlreadyRunning`] if a run is active and a
    /// configuration error if `config` is invalid; in both cases nothing is
    /// fetched. Storage errors abort the run and are returned as-is; records
    /// committed before the error are kept.
    pub async fn start(&self, config: &RunConfig) -> Result<RunOutcome> {
        let (generation, cancel) = self.begin_run(config).await?;
        self.execute(generation, config, cancel).await
    }

    /// Like [`start`](Self::start), but the run executes on a background task.
    ///
    /// The run slot is claimed before this returns, so a `pause` or `cancel`
    /// issued right after is never lost.
    pub async fn spawn(&self, config: RunConfig) -> Result<JoinHandle<Result<RunOutcome>>> {
        let (generation, cancel) = self.begin_run(&config).await?;
        let scheduler = self.clone();
        Ok(tokio::spawn(async move {
            scheduler.execute(generation, &config, cancel).await
        }))
    }

    /// Continue a paused or interrupted job.
    ///
    /// Only keys without an outcome record are fetched; there is no separate
    /// resume cursor.
    pub async fn resume(&self, config: &RunConfig) -> Result<RunOutcome> {
        self.start(config).await
    }

    /// Request a pause at the next batch boundary.
    ///
    /// The in-flight batch is allowed to settle and commit. A run waiting out
    /// a rate-limit backoff pauses right away. Has no effect unless a run is
    /// active.
    pub async fn pause(&self) {
        let slot = self.control.slot.lock().await;
        if slot.state == RunState::Running {
            self.control.pause_requested.store(true, Ordering::SeqCst);
            self.control.pause_notify.notify_waiters();
            tracing::info!(job = %self.work_set.job(), "Pause requested");
        }
    }

    /// Stop the active run immediately.
    ///
    /// In-flight fetches are abandoned and their batch is not committed; the
    /// items stay pending. State becomes idle at once, but a new run,
    /// [`clear_all`](Self::clear_all) and deleting selections are refused with
    /// [`Error::AlreadyRunning`] until the cancelled loop has exited.
    pub async fn cancel(&self) {
        let mut slot = self.control.slot.lock().await;
        if slot.state == RunState::Running {
            slot.cancel.cancel();
            tracing::info!(job = %self.work_set.job(), "Cancel requested");
        }
        slot.state = RunState::Idle;
    }

    /// Current state and committed/pending counts of the job.
    pub async fn status(&self) -> Result<RunStatus> {
        let state = self.control.slot.lock().await.state;
        let keys = self.work_set.all().await?;
        let records = self.progress.get_all().await?;

        let mut successful = 0;
        let mut failed = 0;
        for key in &keys {
            match records.get(key).map(|r| r.status()) {
                Some(OutcomeStatus::Success) => successful += 1,
                Some(OutcomeStatus::Failure) => failed += 1,
                None => {}
            }
        }
        let committed = successful + failed;

        Ok(RunStatus {
            state,
            total: keys.len(),
            committed,
            successful,
            failed,
            pending: keys.len() - committed,
        })
    }

    /// Current run state without touching storage
    pub async fn state(&self) -> RunState {
        self.control.slot.lock().await.state
    }

    /// True while a run is active or a cancelled loop is still winding down
    pub(crate) async fn is_running(&self) -> bool {
        let slot = self.control.slot.lock().await;
        slot.state == RunState::Running || slot.loop_alive
    }

    /// Validate `config` and claim the run slot.
    async fn begin_run(&self, config: &RunConfig) -> Result<(u64, CancellationToken)> {
        config.validate()?;

        let mut slot = self.control.slot.lock().await;
        if slot.state == RunState::Running || slot.loop_alive {
            return Err(Error::AlreadyRunning);
        }

        slot.generation += 1;
        slot.state = RunState::Running;
        slot.loop_alive = true;
        slot.cancel = CancellationToken::new();
        self.control.pause_requested.store(false, Ordering::SeqCst);

        Ok((slot.generation, slot.cancel.clone()))
    }

    async fn execute(
        &self,
        generation: u64,
        config: &RunConfig,
        cancel: CancellationToken,
    ) -> Result<RunOutcome> {
        let result = match self.pending_keys().await {
            Ok(pending) => {
                tracing::info!(
                    job = %self.work_set.job(),
                    pending = pending.len(),
                    concurrency = config.concurrency,
                    "Run started"
                );
                self.emit_event(Event::Started {
                    pending: pending.len(),
                });
                self.run_loop(config, &cancel).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = &result {
            tracing::error!(job = %self.work_set.job(), error = %e, "Run aborted");
        }

        self.finish_run(generation, &result).await;
        result
    }

    /// Release the slot and settle the run state.
    async fn finish_run(&self, generation: u64, result: &Result<RunOutcome>) {
        let mut slot = self.control.slot.lock().await;
        if slot.generation != generation {
            return;
        }
        slot.loop_alive = false;
        slot.state = match result {
            Ok(RunOutcome::Paused) => RunState::Paused,
            _ => RunState::Idle,
        };
        self.control.pause_requested.store(false, Ordering::SeqCst);
    }
}
