//! # metafetch
//!
//! Resumable, rate-limit-aware batch fetcher for remote item metadata.
//!
//! ## Design Philosophy
//!
//! metafetch is designed to be:
//! - **Resumable** - Every settled item is persisted; a restarted run only fetches what is missing
//! - **Polite** - Bounded concurrency, jittered pacing, and whole-batch backoff on rate limits
//! - **Library-first** - The binary is a thin CLI over [`BatchScheduler`]
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use metafetch::{BatchScheduler, Config, ItemKey};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let scheduler = BatchScheduler::from_config(&config).await?;
//!
//!     scheduler.submit(&[ItemKey::from("猫耳"), ItemKey::from("landscape")]).await?;
//!
//!     // Subscribe to events
//!     let mut events = scheduler.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let outcome = scheduler.start(&config.run).await?;
//!     println!("{outcome:?}: {:?}", scheduler.status().await?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Pacing jitter and cancellable sleeps
pub mod backoff;
/// Configuration types
pub mod config;
/// Database persistence layer
pub mod db;
/// Error types
pub mod error;
/// Export of successful records
pub mod export;
/// Remote fetch adapter
pub mod fetcher;
/// Batch scheduler (decomposed into focused submodules)
pub mod pipeline;
/// Per-item outcome records
pub mod progress;
/// Failure triage
pub mod selection;
/// Durable key-value store abstraction
pub mod store;
/// Core types and events
pub mod types;
/// Deduplicated registry of submitted keys
pub mod work_set;

// Re-export commonly used types
pub use config::{Config, ExportConfig, ExportFormat, FetcherConfig, PersistenceConfig, RunConfig};
pub use db::Database;
pub use error::{DatabaseError, Error, Result};
pub use export::{
    ExportPayload, ExportSink, FileSink, ManifestEntry, SqlStatement, build_export_payload,
};
pub use fetcher::{FetchOutcome, Fetcher, HttpFetcher};
pub use pipeline::BatchScheduler;
pub use progress::ProgressStore;
pub use selection::{Selection, filter_failures, select};
pub use store::{DurableStore, MemoryStore};
pub use types::{
    ArtworkMetadata, Event, ItemKey, ItemKind, OutcomeRecord, OutcomeStatus, Payload, RunOutcome,
    RunState, RunStatus, TagMetadata,
};
pub use work_set::WorkSet;

/// Run the scheduler to completion with graceful signal handling.
///
/// The first termination signal requests a cooperative pause, so the batch in
/// flight is committed before the run returns. A second signal cancels the run
/// outright, abandoning that batch.
///
/// On Unix both SIGTERM and SIGINT count as a stop request; elsewhere only
/// Ctrl+C does.
///
/// # Example
///
/// ```no_run
/// use metafetch::{BatchScheduler, Config, run_until_signal};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::default();
///     let scheduler = BatchScheduler::from_config(&config).await?;
///
///     // Ctrl+C pauses at the next batch boundary
///     let outcome = run_until_signal(&scheduler, config.run.clone()).await?;
///     println!("{outcome:?}");
///
///     Ok(())
/// }
/// ```
pub async fn run_until_signal(scheduler: &BatchScheduler, config: RunConfig) -> Result<RunOutcome> {
    let mut handle = scheduler.spawn(config).await?;

    let joined = tokio::select! {
        joined = &mut handle => joined,
        signal = next_stop_signal() => {
            tracing::info!(signal, job = %scheduler.work_set().job(), "Stop requested, pausing after the current batch");
            scheduler.pause().await;
            tokio::select! {
                joined = &mut handle => joined,
                signal = next_stop_signal() => {
                    tracing::warn!(signal, job = %scheduler.work_set().job(), "Second stop request, cancelling run");
                    scheduler.cancel().await;
                    (&mut handle).await
                }
            }
        }
    };

    joined.map_err(|e| Error::Other(format!("run task failed: {e}")))?
}

/// Wait for the next stop request and return the signal's name.
///
/// A listener that cannot be registered is skipped with a warning. With no
/// listener at all this never resolves, so the run is not paused spuriously.
#[cfg(unix)]
async fn next_stop_signal() -> &'static str {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    fn listen(kind: SignalKind, name: &'static str) -> Option<Signal> {
        signal(kind)
            .map_err(|e| tracing::warn!(signal = name, error = %e, "Signal listener unavailable"))
            .ok()
    }

    async fn recv(listener: &mut Option<Signal>) {
        match listener {
            Some(listener) => {
                listener.recv().await;
            }
            None => std::future::pending().await,
        }
    }

    let mut terminate = listen(SignalKind::terminate(), "SIGTERM");
    let mut interrupt = listen(SignalKind::interrupt(), "SIGINT");

    tokio::select! {
        _ = recv(&mut terminate) => "SIGTERM",
        _ = recv(&mut interrupt) => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn next_stop_signal() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(signal = "Ctrl+C", error = %e, "Signal listener unavailable");
        std::future::pending::<()>().await;
    }
    "Ctrl+C"
}
