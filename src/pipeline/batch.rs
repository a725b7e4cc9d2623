//! Bounded-concurrency dispatch and batch settlement.

use crate::fetcher::{FetchOutcome, Fetcher};
use crate::types::{ItemKey, OutcomeRecord};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// What to do with a fully settled batch
#[derive(Debug, PartialEq, Eq)]
pub(super) enum BatchVerdict {
    /// No rate limit seen; every record is committed
    Commit(Vec<(ItemKey, OutcomeRecord)>),
    /// At least one item was rate limited; nothing is committed
    RateLimited {
        /// Items in the discarded batch
        discarded: usize,
        /// Items that reported the rate limit
        limited: usize,
    },
    /// A fetch observed cancellation
    Cancelled,
}

/// Fetch every key of `batch` with at most `concurrency` calls in flight.
///
/// Returns once all calls have settled, in batch order.
pub(super) async fn dispatch_batch(
    fetcher: &Arc<dyn Fetcher>,
    batch: &[ItemKey],
    concurrency: usize,
    cancel: &CancellationToken,
) -> Vec<(ItemKey, FetchOutcome)> {
    futures::stream::iter(batch.iter().cloned())
        .map(|key| {
            let fetcher = Arc::clone(fetcher);
            let cancel = cancel.clone();
            async move {
                let outcome = fetcher.fetch(&key, &cancel).await;
                (key, outcome)
            }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Turn settled fetch outcomes into a commit decision.
///
/// A single rate-limited item discards the whole batch, successes included.
pub(super) fn settle(results: Vec<(ItemKey, FetchOutcome)>) -> BatchVerdict {
    let discarded = results.len();
    let mut limited = 0;
    let mut records = Vec::with_capacity(discarded);

    for (key, outcome) in results {
        match outcome {
            FetchOutcome::Success(payload) => {
                records.push((key, OutcomeRecord::Success { payload }))
            }
            FetchOutcome::ItemError(message) => {
                records.push((key, OutcomeRecord::Failure { message }))
            }
            FetchOutcome::RateLimited => limited += 1,
            FetchOutcome::Cancelled => return BatchVerdict::Cancelled,
        }
    }

    if limited > 0 {
        BatchVerdict::RateLimited { discarded, limited }
    } else {
        BatchVerdict::Commit(records)
    }
}
