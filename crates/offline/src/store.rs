//! Local shadow store for entity records (offline support).
//!
//! Records are stored as JSON payloads keyed by (table, record id), with
//! the two synchronization fields from the data model — `sync_status` and
//! `last_modified` — held as columns so reads hand back the plain entity
//! with sync bookkeeping stripped.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use tillpoint_core::{Record, RecordId, TenantId};

use crate::queue::{Operation, SyncQueue};

/// Synchronization state of a locally-held record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The local copy has unconfirmed writes.
    Pending,
    /// The local copy matches the last confirmed remote state.
    Synced,
    /// Delivery of this record's writes has been given up on.
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Pending => "pending",
            SyncStatus::Synced => "synced",
            SyncStatus::Error => "error",
        }
    }
}

/// Where the backing SQLite database lives.
#[derive(Debug, Clone)]
pub(crate) enum DbLocation {
    OnDisk(PathBuf),
    InMemory,
}

/// Open a pool for the given location, creating schema directories as needed.
pub(crate) async fn connect(location: &DbLocation) -> anyhow::Result<SqlitePool> {
    match location {
        DbLocation::OnDisk(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create data directory at {:?}", parent))?;
            }
            let db_url = format!("sqlite://{}?mode=rwc", path.to_string_lossy());
            SqlitePool::connect(&db_url)
                .await
                .with_context(|| format!("failed to open SQLite database at {:?}", path))
        }
        // One connection so every handle sees the same in-memory database.
        DbLocation::InMemory => SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory SQLite database"),
    }
}

/// Resolve the default database path: `{app_data_dir}/tillpoint/local.db`.
pub(crate) fn default_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory")?;

    let mut dir = base;
    dir.push("tillpoint");
    dir.push("local.db");
    Ok(dir)
}

/// SQLite-backed local record store.
///
/// Cheap to clone and safe to share across tasks. Writes through [`save`]
/// and [`update`] mark the record `pending` and append a sync-queue entry;
/// [`mirror`] records remote-confirmed state without queueing.
///
/// [`save`]: LocalStore::save
/// [`update`]: LocalStore::update
/// [`mirror`]: LocalStore::mirror
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: Arc<Mutex<Option<SqlitePool>>>,
    location: DbLocation,
    queue: SyncQueue,
}

impl LocalStore {
    /// Create a store backed by the default on-disk database (lazy init).
    pub fn new(queue: SyncQueue) -> anyhow::Result<Self> {
        Ok(Self {
            pool: Arc::new(Mutex::new(None)),
            location: DbLocation::OnDisk(default_db_path()?),
            queue,
        })
    }

    /// Create a store backed by an in-memory database (tests).
    pub fn in_memory(queue: SyncQueue) -> Self {
        Self {
            pool: Arc::new(Mutex::new(None)),
            location: DbLocation::InMemory,
            queue,
        }
    }

    /// Initialize the database connection (called lazily on first use).
    async fn ensure_initialized(&self) -> anyhow::Result<()> {
        let mut pool_guard = self.pool.lock().await;
        if pool_guard.is_some() {
            return Ok(());
        }

        let pool = connect(&self.location).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                table_name    TEXT NOT NULL,
                record_id     TEXT NOT NULL,
                tenant_id     TEXT NULL,
                data          TEXT NOT NULL,
                sync_status   TEXT NOT NULL,
                last_modified TEXT NOT NULL,
                PRIMARY KEY (table_name, record_id)
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create records table")?;

        *pool_guard = Some(pool);
        Ok(())
    }

    async fn get_pool(&self) -> anyhow::Result<SqlitePool> {
        self.ensure_initialized().await?;
        let pool_guard = self.pool.lock().await;
        Ok(pool_guard.as_ref().cloned().unwrap())
    }

    /// Get a record by id, or `None` when absent.
    pub async fn get<R: Record>(&self, id: RecordId) -> anyhow::Result<Option<R>> {
        let pool = self.get_pool().await?;

        let row = sqlx::query(
            r#"
            SELECT data
            FROM records
            WHERE table_name = ?1 AND record_id = ?2
            "#,
        )
        .bind(R::TABLE)
        .bind(id.to_string())
        .fetch_optional(&pool)
        .await
        .with_context(|| format!("failed to read {} record from local store", R::TABLE))?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                let record = serde_json::from_str(&data)
                    .with_context(|| format!("failed to deserialize cached {} record", R::TABLE))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// Get the first record whose JSON field equals the given value.
    pub async fn get_by_field<R: Record>(
        &self,
        field: &str,
        value: &str,
    ) -> anyhow::Result<Option<R>> {
        let pool = self.get_pool().await?;
        let path = format!("$.{}", field);

        let row = sqlx::query(
            r#"
            SELECT data
            FROM records
            WHERE table_name = ?1
              AND json_extract(data, ?2) = ?3
            LIMIT 1
            "#,
        )
        .bind(R::TABLE)
        .bind(&path)
        .bind(value)
        .fetch_optional(&pool)
        .await
        .with_context(|| format!("failed to query {} by {}", R::TABLE, field))?;

        match row {
            Some(row) => {
                let data: String = row.try_get("data")?;
                let record = serde_json::from_str(&data)
                    .with_context(|| format!("failed to deserialize cached {} record", R::TABLE))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List all locally-held records of a table for one tenant.
    pub async fn list<R: Record>(&self, tenant_id: TenantId) -> anyhow::Result<Vec<R>> {
        let pool = self.get_pool().await?;

        let rows = sqlx::query(
            r#"
            SELECT data
            FROM records
            WHERE table_name = ?1 AND tenant_id = ?2
            ORDER BY last_modified ASC
            "#,
        )
        .bind(R::TABLE)
        .bind(tenant_id.to_string())
        .fetch_all(&pool)
        .await
        .with_context(|| format!("failed to list {} records from local store", R::TABLE))?;

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            let data: String = row.try_get("data")?;
            records.push(
                serde_json::from_str(&data)
                    .with_context(|| format!("failed to deserialize cached {} record", R::TABLE))?,
            );
        }
        Ok(records)
    }

    /// Save a record as a locally-originated write: upsert with
    /// `sync_status = pending` and append a `create` sync-queue entry.
    pub async fn save<R: Record>(&self, record: &R) -> anyhow::Result<()> {
        self.upsert(record, SyncStatus::Pending).await?;
        self.queue
            .enqueue(
                Operation::Create,
                R::TABLE,
                record.id(),
                record.tenant_id(),
                serde_json::to_value(record).context("failed to serialize record for queue")?,
            )
            .await?;
        Ok(())
    }

    /// Merge a partial update into an existing record and re-queue it.
    ///
    /// Fails when the record does not exist locally.
    pub async fn update<R: Record>(&self, id: RecordId, partial: Value) -> anyhow::Result<R> {
        let existing: R = self
            .get(id)
            .await?
            .with_context(|| format!("{} record {} not found in local store", R::TABLE, id))?;

        let mut merged = serde_json::to_value(&existing)
            .context("failed to serialize existing record for merge")?;
        merge_into(&mut merged, partial);
        let updated: R = serde_json::from_value(merged)
            .with_context(|| format!("merged {} record no longer deserializes", R::TABLE))?;

        self.upsert(&updated, SyncStatus::Pending).await?;
        self.queue
            .enqueue(
                Operation::Update,
                R::TABLE,
                id,
                updated.tenant_id(),
                serde_json::to_value(&updated)
                    .context("failed to serialize record for queue")?,
            )
            .await?;
        Ok(updated)
    }

    /// Record remote-confirmed state: upsert as `synced`, no queue entry.
    pub async fn mirror<R: Record>(&self, record: &R) -> anyhow::Result<()> {
        self.upsert(record, SyncStatus::Synced).await
    }

    /// Flip a record to `synced` after its queued write was delivered.
    pub async fn mark_synced(&self, table: &str, id: RecordId) -> anyhow::Result<()> {
        self.set_status(table, id, SyncStatus::Synced).await
    }

    /// Flip a record to `error` after its queued write dead-lettered.
    pub async fn mark_error(&self, table: &str, id: RecordId) -> anyhow::Result<()> {
        self.set_status(table, id, SyncStatus::Error).await
    }

    /// Current sync status of a record, if held locally.
    pub async fn sync_status(&self, table: &str, id: RecordId) -> anyhow::Result<Option<SyncStatus>> {
        let pool = self.get_pool().await?;
        let row = sqlx::query(
            r#"
            SELECT sync_status
            FROM records
            WHERE table_name = ?1 AND record_id = ?2
            "#,
        )
        .bind(table)
        .bind(id.to_string())
        .fetch_optional(&pool)
        .await
        .context("failed to read sync status")?;

        match row {
            Some(row) => {
                let status: String = row.try_get("sync_status")?;
                match status.as_str() {
                    "pending" => Ok(Some(SyncStatus::Pending)),
                    "synced" => Ok(Some(SyncStatus::Synced)),
                    "error" => Ok(Some(SyncStatus::Error)),
                    other => Err(anyhow::anyhow!("unknown sync status '{}' in records", other)),
                }
            }
            None => Ok(None),
        }
    }

    /// Remove one record from the local store.
    pub async fn remove(&self, table: &str, id: RecordId) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            DELETE FROM records
            WHERE table_name = ?1 AND record_id = ?2
            "#,
        )
        .bind(table)
        .bind(id.to_string())
        .execute(&pool)
        .await
        .context("failed to remove record from local store")?;
        Ok(())
    }

    /// Clear all locally-held data for one tenant.
    pub async fn clear_tenant(&self, tenant_id: TenantId) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            DELETE FROM records
            WHERE tenant_id = ?1
            "#,
        )
        .bind(tenant_id.to_string())
        .execute(&pool)
        .await
        .context("failed to clear tenant data")?;
        Ok(())
    }

    /// Clear the entire local store.
    pub async fn clear_all(&self) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query("DELETE FROM records")
            .execute(&pool)
            .await
            .context("failed to clear local store")?;
        Ok(())
    }

    async fn upsert<R: Record>(&self, record: &R, status: SyncStatus) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        let payload =
            serde_json::to_string(record).context("failed to serialize record for local store")?;

        sqlx::query(
            r#"
            INSERT INTO records (
                table_name,
                record_id,
                tenant_id,
                data,
                sync_status,
                last_modified
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(table_name, record_id)
            DO UPDATE SET
                tenant_id = excluded.tenant_id,
                data = excluded.data,
                sync_status = excluded.sync_status,
                last_modified = excluded.last_modified
            "#,
        )
        .bind(R::TABLE)
        .bind(record.id().to_string())
        .bind(record.tenant_id().map(|t| t.to_string()))
        .bind(&payload)
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .with_context(|| format!("failed to upsert {} record in local store", R::TABLE))?;

        Ok(())
    }

    async fn set_status(&self, table: &str, id: RecordId, status: SyncStatus) -> anyhow::Result<()> {
        let pool = self.get_pool().await?;
        sqlx::query(
            r#"
            UPDATE records
            SET sync_status = ?3,
                last_modified = ?4
            WHERE table_name = ?1 AND record_id = ?2
            "#,
        )
        .bind(table)
        .bind(id.to_string())
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .execute(&pool)
        .await
        .context("failed to update record sync status")?;
        Ok(())
    }
}

/// Shallow-merge `partial`'s top-level keys over `base`.
fn merge_into(base: &mut Value, partial: Value) {
    if let (Value::Object(base_map), Value::Object(partial_map)) = (base, partial) {
        for (key, value) in partial_map {
            base_map.insert(key, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tillpoint_records::Product;

    fn fixtures() -> (LocalStore, SyncQueue) {
        let queue = SyncQueue::in_memory();
        let store = LocalStore::in_memory(queue.clone());
        (store, queue)
    }

    fn product() -> Product {
        Product::new(TenantId::new(), "Beans", "SKU-1", 1299, 3).unwrap()
    }

    #[tokio::test]
    async fn save_marks_pending_and_enqueues_create() {
        let (store, queue) = fixtures();
        let p = product();

        store.save(&p).await.unwrap();

        let got: Product = store.get(p.id).await.unwrap().unwrap();
        assert_eq!(got, p);
        assert_eq!(
            store.sync_status(Product::TABLE, p.id).await.unwrap(),
            Some(SyncStatus::Pending)
        );

        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op, Operation::Create);
        assert_eq!(pending[0].record_id, p.id);
    }

    #[tokio::test]
    async fn mirror_does_not_enqueue() {
        let (store, queue) = fixtures();
        let p = product();

        store.mirror(&p).await.unwrap();

        assert_eq!(
            store.sync_status(Product::TABLE, p.id).await.unwrap(),
            Some(SyncStatus::Synced)
        );
        assert!(queue.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_of_missing_record_fails() {
        let (store, _queue) = fixtures();
        let err = store
            .update::<Product>(RecordId::new(), json!({ "name": "x" }))
            .await;
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn update_merges_partial_and_requeues() {
        let (store, queue) = fixtures();
        let p = product();
        store.mirror(&p).await.unwrap();

        let updated: Product = store
            .update(p.id, json!({ "quantity": 1 }))
            .await
            .unwrap();

        assert_eq!(updated.quantity, 1);
        assert_eq!(updated.name, p.name);
        assert_eq!(
            store.sync_status(Product::TABLE, p.id).await.unwrap(),
            Some(SyncStatus::Pending)
        );
        let pending = queue.list_pending().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].op, Operation::Update);
    }

    #[tokio::test]
    async fn get_by_field_finds_record() {
        let (store, _queue) = fixtures();
        let p = product();
        store.mirror(&p).await.unwrap();

        let got: Option<Product> = store.get_by_field("sku", "SKU-1").await.unwrap();
        assert_eq!(got.unwrap().id, p.id);

        let missing: Option<Product> = store.get_by_field("sku", "SKU-404").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn clear_tenant_only_touches_that_tenant() {
        let (store, _queue) = fixtures();
        let a = product();
        let b = product();
        store.mirror(&a).await.unwrap();
        store.mirror(&b).await.unwrap();

        store.clear_tenant(a.tenant_id).await.unwrap();

        assert!(store.get::<Product>(a.id).await.unwrap().is_none());
        assert!(store.get::<Product>(b.id).await.unwrap().is_some());
    }
}
