//! Database layer for metafetch
//!
//! SQLite persistence for the durable key-value store behind the work set and
//! the progress store.
//!
//! ## Submodules
//!
//! Methods on [`Database`] are organized by domain:
//! - [`migrations`] — Database lifecycle, schema migrations
//! - [`kv`] — Namespaced key-value entries ([`DurableStore`](crate::store::DurableStore) impl)

use sqlx::sqlite::SqlitePool;

mod kv;
mod migrations;

/// Database handle for metafetch
pub struct Database {
    pool: SqlitePool,
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
