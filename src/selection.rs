//! Failure triage over committed outcome records
//!
//! Deleting a record makes its key pending again, so the next run re-fetches
//! it. Must not be used to delete while a scheduler run is active on the same
//! job; [`BatchScheduler`](crate::BatchScheduler) enforces this for its own
//! maintenance calls.

use crate::error::Result;
use crate::progress::ProgressStore;
use crate::types::{ItemKey, OutcomeRecord, OutcomeStatus};
use regex::{Regex, RegexBuilder};

/// Criteria for [`select`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    /// Only records with this status; all statuses when `None`
    pub status: Option<OutcomeStatus>,
    /// Regex searched in failure messages; success records never match a pattern
    pub pattern: Option<String>,
    /// Remove each matched record from the progress store
    pub delete: bool,
}

impl Selection {
    /// Failures whose message matches `pattern`, or all failures
    pub fn failures(pattern: Option<&str>) -> Self {
        Self {
            status: Some(OutcomeStatus::Failure),
            pattern: pattern.map(str::to_string),
            delete: false,
        }
    }
}

/// Keys of committed records matching `selection`, sorted.
///
/// A malformed pattern is reported through tracing and yields an empty list
/// without touching the store.
pub async fn select(progress: &ProgressStore, selection: &Selection) -> Result<Vec<ItemKey>> {
    let compiled = selection
        .pattern
        .as_deref()
        .map(|p| RegexBuilder::new(p).size_limit(1024 * 1024).build())
        .transpose();
    let pattern = match compiled {
        Ok(pattern) => pattern,
        Err(e) => {
            tracing::warn!(
                pattern = selection.pattern.as_deref().unwrap_or_default(),
                error = %e,
                "Invalid selection pattern"
            );
            return Ok(Vec::new());
        }
    };

    let mut matched: Vec<ItemKey> = progress
        .get_all()
        .await?
        .into_iter()
        .filter(|(_, record)| selection.status.is_none_or(|s| record.status() == s))
        .filter(|(_, record)| matches_pattern(record, pattern.as_ref()))
        .map(|(key, _)| key)
        .collect();
    matched.sort();

    if selection.delete {
        for key in &matched {
            progress.remove(key).await?;
        }
        tracing::info!(removed = matched.len(), "Outcome records removed");
    }

    Ok(matched)
}

/// Failures whose message matches `pattern` (all failures when `None`),
/// optionally deleting them so they are retried on the next run.
pub async fn filter_failures(
    progress: &ProgressStore,
    pattern: Option<&str>,
    delete: bool,
) -> Result<Vec<ItemKey>> {
    let mut selection = Selection::failures(pattern);
    selection.delete = delete;
    select(progress, &selection).await
}

fn matches_pattern(record: &OutcomeRecord, pattern: Option<&Regex>) -> bool {
    match (pattern, record) {
        (None, _) => true,
        (Some(re), OutcomeRecord::Failure { message }) => re.is_match(message),
        (Some(_), OutcomeRecord::Success { .. }) => false,
    }
}
