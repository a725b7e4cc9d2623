//! Namespaced key-value entries backing the work set and progress store.

use crate::error::DatabaseError;
use crate::store::DurableStore;
use crate::{Error, Result};
use async_trait::async_trait;

use super::Database;

#[async_trait]
impl DurableStore for Database {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            SELECT value FROM kv_entries WHERE namespace = ? AND key = ?
            "#,
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read {}/{}: {}",
                namespace, key, e
            )))
        })
    }

    async fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to write {}/{}: {}",
                namespace, key, e
            )))
        })?;

        Ok(())
    }

    async fn remove(&self, namespace: &str, key: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM kv_entries WHERE namespace = ? AND key = ?
            "#,
        )
        .bind(namespace)
        .bind(key)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to remove {}/{}: {}",
                namespace, key, e
            )))
        })?;

        Ok(())
    }

    async fn entries(&self, namespace: &str) -> Result<Vec<(String, String)>> {
        // rowid survives ON CONFLICT updates, so this is first-insert order
        sqlx::query_as::<_, (String, String)>(
            r#"
            SELECT key, value FROM kv_entries WHERE namespace = ? ORDER BY rowid
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to list namespace {}: {}",
                namespace, e
            )))
        })
    }

    async fn clear(&self, namespace: &str) -> Result<()> {
        sqlx::query(
            r#"
            DELETE FROM kv_entries WHERE namespace = ?
            "#,
        )
        .bind(namespace)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to clear namespace {}: {}",
                namespace, e
            )))
        })?;

        Ok(())
    }
}
