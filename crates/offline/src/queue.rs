//! Durable queue of locally-originated writes awaiting remote delivery.
//!
//! Entries are appended by [`LocalStore::save`]/[`LocalStore::update`] and
//! drained by the sync worker. Retries are bounded: each operation failure
//! increments `attempts`, and after [`MAX_ATTEMPTS`] the entry moves to the
//! `Dead` status where it stays visible to operators instead of retrying
//! silently forever.
//!
//! [`LocalStore::save`]: crate::store::LocalStore::save
//! [`LocalStore::update`]: crate::store::LocalStore::update

use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;
use uuid::Uuid;

use tillpoint_core::{RecordId, TenantId};

use crate::store::{connect, default_db_path, DbLocation};

/// Retry budget before an entry dead-letters.
pub const MAX_ATTEMPTS: u32 = 5;

/// Kind of write an entry carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Lifecycle status of a queue entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Pending,
    Syncing,
    Failed,
    /// Out of retry budget; awaiting operator action.
    Dead,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Pending => "pending",
            EntryStatus::Syncing => "syncing",
            EntryStatus::Failed => "failed",
            EntryStatus::Dead => "dead",
        }
    }
}

/// A locally-originated write not yet confirmed against the remote service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub tenant_id: Option<TenantId>,
    pub op: Operation,
    pub table: String,
    pub record_id: RecordId,
    pub payload: Value,
    pub status: EntryStatus,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub error: Option<String>,
}

/// SQLite-backed sync queue. Cheap to clone, safe to share across tasks.
#[derive(Debug, Clone)]
pub struct SyncQueue {
    pool: Arc<Mutex<Option<SqlitePool>>>,
    location: DbLocation,
}

impl SyncQueue {
    /// Queue backed by the default on-disk database (lazy init).
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            pool: Arc::new(Mutex::new(None)),
            location: DbLocation::OnDisk(default_db_path()?),
        })
    }

    /// Queue backed by an in-memory database (tests).
    pub fn in_memory() -> Self {
        Self {
            pool: Arc::new(Mutex::new(None)),
            location: DbLocation::InMemory,
        }
    }

    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        let pool = connect(&self.location).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_queue (
                id          TEXT PRIMARY KEY,
                tenant_id   TEXT NULL,
                op          TEXT NOT NULL,
                table_name  TEXT NOT NULL,
                record_id   TEXT NOT NULL,
                payload     TEXT NOT NULL,
                status      TEXT NOT NULL,
                attempts    INTEGER NOT NULL DEFAULT 0,
                created_at  TEXT NOT NULL,
                error       TEXT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create sync_queue table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        Ok(pool_guard.as_ref().cloned().unwrap())
    }

    /// Append a new entry.
    pub async fn enqueue(
        &self,
        op: Operation,
        table: &str,
        record_id: RecordId,
        tenant_id: Option<TenantId>,
        payload: Value,
    ) -> anyhow::Result<QueueEntry> {
        let entry = QueueEntry {
            id: Uuid::now_v7(),
            tenant_id,
            op,
            table: table.to_string(),
            record_id,
            payload,
            status: EntryStatus::Pending,
            attempts: 0,
            created_at: Utc::now(),
            error: None,
        };

        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            INSERT INTO sync_queue (
                id, tenant_id, op, table_name, record_id,
                payload, status, attempts, created_at, error
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, NULL)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.tenant_id.map(|t| t.to_string()))
        .bind(entry.op.as_str())
        .bind(&entry.table)
        .bind(entry.record_id.to_string())
        .bind(entry.payload.to_string())
        .bind(entry.status.as_str())
        .bind(entry.created_at.to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to insert sync-queue entry")?;

        Ok(entry)
    }

    /// All entries eligible for a sync pass, oldest first.
    pub async fn list_pending(&self) -> anyhow::Result<Vec<QueueEntry>> {
        self.list_by_status(&["pending", "failed", "syncing"]).await
    }

    /// Entries that exhausted their retry budget.
    pub async fn list_dead(&self) -> anyhow::Result<Vec<QueueEntry>> {
        self.list_by_status(&["dead"]).await
    }

    async fn list_by_status(&self, statuses: &[&str]) -> anyhow::Result<Vec<QueueEntry>> {
        let pool = self.get_pool().await?;

        // SQLite has no array binds; the status list is internal and fixed.
        let placeholders = statuses
            .iter()
            .map(|s| format!("'{}'", s))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT id, tenant_id, op, table_name, record_id,
                   payload, status, attempts, created_at, error
            FROM sync_queue
            WHERE status IN ({})
            ORDER BY created_at ASC
            "#,
            placeholders
        );

        let rows = sqlx::query(&sql)
            .fetch_all(&pool)
            .await
            .context("failed to list sync-queue entries")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(row_to_entry(row)?);
        }
        Ok(entries)
    }

    /// Mark an entry as in-flight.
    pub async fn mark_syncing(&self, id: Uuid) -> anyhow::Result<()> {
        self.set_status(id, EntryStatus::Syncing).await
    }

    /// Put an in-flight entry back to pending (connectivity failure; does
    /// not count against the retry budget).
    pub async fn mark_pending(&self, id: Uuid) -> anyhow::Result<()> {
        self.set_status(id, EntryStatus::Pending).await
    }

    /// Remove an entry after its remote write was confirmed.
    pub async fn complete(&self, id: Uuid) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM sync_queue WHERE id = ?1")
            .bind(id.to_string())
            .execute(&pool)
            .await
            .context("failed to remove completed sync-queue entry")?;
        Ok(())
    }

    /// Record an operation failure: increments `attempts` and moves the
    /// entry to `Failed`, or to `Dead` once the budget is exhausted.
    /// Returns the resulting status.
    pub async fn mark_failed(&self, id: Uuid, error: &str) -> anyhow::Result<EntryStatus> {
        let pool = self.get_pool().await?;

        let row = sqlx::query("SELECT attempts FROM sync_queue WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&pool)
            .await
            .context("failed to read sync-queue attempts")?
            .context("sync-queue entry vanished while marking failed")?;
        let attempts: i64 = row.try_get("attempts")?;
        let attempts = attempts as u32 + 1;

        let status = if attempts >= MAX_ATTEMPTS {
            EntryStatus::Dead
        } else {
            EntryStatus::Failed
        };

        sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = ?2,
                attempts = ?3,
                error = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(attempts as i64)
        .bind(error)
        .execute(&pool)
        .await
        .context("failed to mark sync-queue entry failed")?;

        Ok(status)
    }

    /// Re-arm a dead entry for delivery, resetting its retry budget.
    pub async fn retry_dead(&self, id: Uuid) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = 'pending',
                attempts = 0,
                error = NULL
            WHERE id = ?1
              AND status = 'dead'
            "#,
        )
        .bind(id.to_string())
        .execute(&pool)
        .await
        .context("failed to retry dead sync-queue entry")?;
        Ok(())
    }

    /// Pending entry count for one record (test/observability helper).
    pub async fn pending_for(&self, record_id: RecordId) -> anyhow::Result<usize> {
        let entries = self.list_pending().await?;
        Ok(entries
            .iter()
            .filter(|e| e.record_id == record_id)
            .count())
    }

    async fn set_status(&self, id: Uuid, status: EntryStatus) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE sync_queue
            SET status = ?2
            WHERE id = ?1
            "#,
        )
        .bind(id.to_string())
        .bind(status.as_str())
        .execute(&pool)
        .await
        .context("failed to update sync-queue entry status")?;
        Ok(())
    }
}

/// Map a database row into a `QueueEntry`.
fn row_to_entry(row: sqlx::sqlite::SqliteRow) -> anyhow::Result<QueueEntry> {
    let id_str: String = row.try_get("id")?;
    let id = Uuid::parse_str(&id_str).context("invalid UUID in sync_queue.id")?;

    let tenant_str: Option<String> = row.try_get("tenant_id")?;
    let tenant_id = match tenant_str {
        Some(s) => Some(s.parse::<TenantId>().context("invalid tenant_id in sync_queue")?),
        None => None,
    };

    let op_str: String = row.try_get("op")?;
    let op = match op_str.as_str() {
        "create" => Operation::Create,
        "update" => Operation::Update,
        "delete" => Operation::Delete,
        other => return Err(anyhow::anyhow!("unknown operation '{}' in sync_queue", other)),
    };

    let table: String = row.try_get("table_name")?;

    let record_str: String = row.try_get("record_id")?;
    let record_id = record_str
        .parse::<RecordId>()
        .context("invalid record_id in sync_queue")?;

    let payload_str: String = row.try_get("payload")?;
    let payload: Value =
        serde_json::from_str(&payload_str).context("invalid JSON payload in sync_queue")?;

    let status_str: String = row.try_get("status")?;
    let status = match status_str.as_str() {
        "pending" => EntryStatus::Pending,
        "syncing" => EntryStatus::Syncing,
        "failed" => EntryStatus::Failed,
        "dead" => EntryStatus::Dead,
        other => return Err(anyhow::anyhow!("unknown status '{}' in sync_queue", other)),
    };

    let attempts: i64 = row.try_get("attempts")?;

    let created_at_str: String = row.try_get("created_at")?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .context("invalid created_at in sync_queue")?;

    let error: Option<String> = row.try_get("error")?;

    Ok(QueueEntry {
        id,
        tenant_id,
        op,
        table,
        record_id,
        payload,
        status,
        attempts: attempts as u32,
        created_at,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn entries_drain_in_fifo_order() {
        let queue = SyncQueue::in_memory();
        let first = queue
            .enqueue(Operation::Create, "products", RecordId::new(), None, json!({"n": 1}))
            .await
            .unwrap();
        let second = queue
            .enqueue(Operation::Update, "products", RecordId::new(), None, json!({"n": 2}))
            .await
            .unwrap();

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[1].id, second.id);
    }

    #[tokio::test]
    async fn complete_removes_the_entry() {
        let queue = SyncQueue::in_memory();
        let record_id = RecordId::new();
        let entry = queue
            .enqueue(Operation::Update, "users", record_id, None, json!({}))
            .await
            .unwrap();
        assert_eq!(queue.pending_for(record_id).await.unwrap(), 1);

        queue.complete(entry.id).await.unwrap();

        assert_eq!(queue.pending_for(record_id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn failure_increments_attempts_and_keeps_entry() {
        let queue = SyncQueue::in_memory();
        let entry = queue
            .enqueue(Operation::Create, "products", RecordId::new(), None, json!({}))
            .await
            .unwrap();

        let status = queue.mark_failed(entry.id, "boom").await.unwrap();
        assert_eq!(status, EntryStatus::Failed);

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn entry_dead_letters_after_max_attempts() {
        let queue = SyncQueue::in_memory();
        let entry = queue
            .enqueue(Operation::Create, "products", RecordId::new(), None, json!({}))
            .await
            .unwrap();

        for attempt in 1..=MAX_ATTEMPTS {
            let status = queue.mark_failed(entry.id, "schema mismatch").await.unwrap();
            if attempt < MAX_ATTEMPTS {
                assert_eq!(status, EntryStatus::Failed);
            } else {
                assert_eq!(status, EntryStatus::Dead);
            }
        }

        assert!(queue.list_pending().await.unwrap().is_empty());
        let dead = queue.list_dead().await.unwrap();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].attempts, MAX_ATTEMPTS);
    }

    #[tokio::test]
    async fn retry_dead_rearms_with_fresh_budget() {
        let queue = SyncQueue::in_memory();
        let entry = queue
            .enqueue(Operation::Delete, "products", RecordId::new(), None, json!({}))
            .await
            .unwrap();
        for _ in 0..MAX_ATTEMPTS {
            queue.mark_failed(entry.id, "boom").await.unwrap();
        }

        queue.retry_dead(entry.id).await.unwrap();

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 0);
        assert!(pending[0].error.is_none());
    }
}
