//! Inter-batch pacing and rate-limit backoff
//!
//! Batches are spaced by a delay sampled uniformly from `[min_delay, max_delay]`
//! so successive runs never settle into a fixed request cadence. Every sleep
//! races the run's cancellation token.

use rand::Rng;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Sample a delay uniformly from `[min, max]`.
///
/// A degenerate range (`min >= max`) yields `min`.
pub fn jittered_delay(min: Duration, max: Duration) -> Duration {
    if min >= max {
        return min;
    }
    let mut rng = rand::thread_rng();
    let millis = rng.gen_range(min.as_millis()..=max.as_millis());
    Duration::from_millis(millis as u64)
}

/// Sleep for `delay` unless `cancel` fires first.
///
/// Returns `false` if the sleep was cut short by cancellation.
pub async fn sleep_with_cancellation(delay: Duration, cancel: &CancellationToken) -> bool {
    if delay.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }

    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
