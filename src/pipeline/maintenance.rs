//! Submit, failure triage, export and reset

use crate::config::ExportConfig;
use crate::error::{Error, Result};
use crate::export::{ExportPayload, build_export_payload};
use crate::selection::{self, Selection};
use crate::types::{ItemKey, RunState};

use super::BatchScheduler;

impl BatchScheduler {
    /// Add keys to the work set, returning how many were new.
    ///
    /// Safe while a run is active; new keys are picked up at the next batch.
    pub async fn submit(&self, keys: &[ItemKey]) -> Result<usize> {
        let added = self.work_set.merge(keys).await?;
        tracing::info!(
            job = %self.work_set.job(),
            submitted = keys.len(),
            added,
            "Keys submitted"
        );
        Ok(added)
    }

    /// Failed keys whose message matches `pattern`, optionally deleting their
    /// records so the next run retries them.
    ///
    /// Deleting is refused with [`Error::AlreadyRunning`] while a run is active.
    pub async fn filter_failures(&self, pattern: Option<&str>, delete: bool) -> Result<Vec<ItemKey>> {
        let mut selection = Selection::failures(pattern);
        selection.delete = delete;
        self.select(&selection).await
    }

    /// Keys of committed records matching `selection`.
    pub async fn select(&self, selection: &Selection) -> Result<Vec<ItemKey>> {
        if selection.delete && self.is_running().await {
            return Err(Error::AlreadyRunning);
        }
        selection::select(&self.progress, selection).await
    }

    /// Fold the job's success records into an export payload.
    pub async fn export(&self, config: &ExportConfig) -> Result<ExportPayload> {
        build_export_payload(&self.work_set, &self.progress, config).await
    }

    /// Delete the work set and every outcome record of the job.
    ///
    /// Refused with [`Error::AlreadyRunning`] while a run is active or a
    /// cancelled run is still winding down. A paused job becomes idle.
    pub async fn clear_all(&self) -> Result<()> {
        let mut slot = self.control.slot.lock().await;
        if slot.state == RunState::Running || slot.loop_alive {
            return Err(Error::AlreadyRunning);
        }
        self.progress.clear().await?;
        self.work_set.clear().await?;
        slot.state = RunState::Idle;
        tracing::info!(job = %self.work_set.job(), "Job state cleared");
        Ok(())
    }
}
