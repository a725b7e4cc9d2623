//! The phase machine driving one run.
//!
//! ```text
//! Selecting ──pending empty──▶ done (Completed)
//!     │ ▲
//!     ▼ └──────────── Pacing ◀── Committing ──pause──▶ done (Paused)
//! Dispatching ──any 429──▶ BackoffSleeping ──timer──▶ Selecting
//!     │                         └──pause──▶ done (Paused)
//!     └──otherwise──▶ Committing
//! ```
//!
//! Cancellation is checked before every phase and every commit and raced
//! against every suspension point; it ends the run without committing the
//! rest of the current batch. A pause request also cuts a rate-limit backoff
//! short.

use crate::backoff::{jittered_delay, sleep_with_cancellation};
use crate::config::RunConfig;
use crate::error::Result;
use crate::types::{Event, ItemKey, OutcomeRecord, RunOutcome};
use std::collections::HashSet;
use std::sync::atomic::Ordering;
use tokio_util::sync::CancellationToken;

use super::BatchScheduler;
use super::batch::{BatchVerdict, dispatch_batch, settle};

/// Position of the run loop
enum Phase {
    /// Recompute pending keys and take the next batch
    Selecting,
    /// Fetch the batch and wait for every call to settle
    Dispatching(Vec<ItemKey>),
    /// Persist the settled batch
    Committing(Vec<(ItemKey, OutcomeRecord)>),
    /// Fixed wait after a rate-limited batch
    BackoffSleeping { discarded: usize },
    /// Jittered wait between batches
    Pacing,
}

impl BatchScheduler {
    /// Keys of the work set that have no outcome record yet, in discovery order.
    ///
    /// Read fresh on every call so keys merged mid-run are picked up.
    pub(crate) async fn pending_keys(&self) -> Result<Vec<ItemKey>> {
        let all = self.work_set.all().await?;
        let committed: HashSet<ItemKey> = self.progress.get_all().await?.into_keys().collect();
        Ok(all
            .into_iter()
            .filter(|key| !committed.contains(key))
            .collect())
    }

    pub(super) async fn run_loop(
        &self,
        config: &RunConfig,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome> {
        let mut phase = Phase::Selecting;

        loop {
            if cancel.is_cancelled() {
                return Ok(self.cancelled());
            }

            phase = match phase {
                Phase::Selecting => {
                    if self.control.pause_requested.load(Ordering::SeqCst) {
                        return self.paused().await;
                    }

                    let pending = self.pending_keys().await?;
                    if pending.is_empty() {
                        let total = self.work_set.all().await?.len();
                        tracing::info!(job = %self.work_set.job(), total, "All items committed");
                        self.emit_event(Event::Completed { total });
                        return Ok(RunOutcome::Completed);
                    }

                    let batch: Vec<ItemKey> =
                        pending.into_iter().take(config.concurrency).collect();
                    Phase::Dispatching(batch)
                }

                Phase::Dispatching(batch) => {
                    tracing::debug!(batch_size = batch.len(), "Dispatching batch");
                    self.emit_event(Event::BatchDispatched {
                        keys: batch.clone(),
                    });

                    let results = tokio::select! {
                        _ = cancel.cancelled() => return Ok(self.cancelled()),
                        results = dispatch_batch(&self.fetcher, &batch, config.concurrency, cancel) => results,
                    };

                    match settle(results) {
                        BatchVerdict::Commit(records) => Phase::Committing(records),
                        BatchVerdict::RateLimited { discarded, limited } => {
                            tracing::warn!(
                                discarded,
                                limited,
                                wait_ms = config.rate_limit_wait.as_millis(),
                                "Rate limited, discarding batch"
                            );
                            Phase::BackoffSleeping { discarded }
                        }
                        BatchVerdict::Cancelled => return Ok(self.cancelled()),
                    }
                }

                Phase::Committing(records) => {
                    for (key, record) in &records {
                        if cancel.is_cancelled() {
                            return Ok(self.cancelled());
                        }
                        self.progress.commit(key, record).await?;
                        self.emit_event(Event::ItemCommitted {
                            key: key.clone(),
                            status: record.status(),
                        });
                    }
                    tracing::debug!(committed = records.len(), "Batch committed");

                    if self.control.pause_requested.load(Ordering::SeqCst) {
                        return self.paused().await;
                    }
                    Phase::Pacing
                }

                Phase::BackoffSleeping { discarded } => {
                    self.emit_event(Event::RateLimited {
                        discarded,
                        wait: config.rate_limit_wait,
                    });

                    let pause = self.control.pause_notify.notified();
                    tokio::pin!(pause);
                    pause.as_mut().enable();
                    if self.control.pause_requested.load(Ordering::SeqCst) {
                        return self.paused().await;
                    }

                    tokio::select! {
                        awake = sleep_with_cancellation(config.rate_limit_wait, cancel) => {
                            if !awake {
                                return Ok(self.cancelled());
                            }
                        }
                        _ = &mut pause => return self.paused().await,
                    }
                    Phase::Selecting
                }

                Phase::Pacing => {
                    let delay = jittered_delay(config.min_delay, config.max_delay);
                    if !sleep_with_cancellation(delay, cancel).await {
                        return Ok(self.cancelled());
                    }
                    Phase::Selecting
                }
            };
        }
    }

    async fn paused(&self) -> Result<RunOutcome> {
        let pending = self.pending_keys().await?.len();
        tracing::info!(job = %self.work_set.job(), pending, "Run paused");
        self.emit_event(Event::Paused { pending });
        Ok(RunOutcome::Paused)
    }

    fn cancelled(&self) -> RunOutcome {
        tracing::info!(job = %self.work_set.job(), "Run cancelled");
        self.emit_event(Event::Cancelled);
        RunOutcome::Cancelled
    }
}
