//! Data adapter: one read/write surface per entity type.
//!
//! Callers never see the local/remote split or a raw error from a read
//! path: reads go local-first with remote fallback, failures are logged
//! and collapse to `None`/empty collections so public and demo views stay
//! functional without a session.

use std::sync::Arc;

use serde_json::Value;

use tillpoint_core::{Record, RecordId, TenantId, UserId, WritePolicy};
use tillpoint_notifications::{reconcile, Notification, ReconcileOutcome};
use tillpoint_records::{Customer, Product, Return, Sale};

use crate::remote::RemoteStore;
use crate::store::LocalStore;

/// The authenticated principal and their tenant binding.
///
/// Issued by the auth layer (a collaborator); the adapter only consumes it.
/// A user who has not registered a store yet has no tenant binding.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: UserId,
    pub tenant_id: Option<TenantId>,
}

impl Session {
    pub fn new(user_id: UserId, tenant_id: Option<TenantId>) -> Self {
        Self { user_id, tenant_id }
    }
}

/// Facade over the two-tier storage.
#[derive(Clone)]
pub struct DataAdapter {
    store: LocalStore,
    remote: Arc<dyn RemoteStore>,
}

impl DataAdapter {
    pub fn new(store: LocalStore, remote: Arc<dyn RemoteStore>) -> Self {
        Self { store, remote }
    }

    /// Get a record by id: local store first, remote fallback with a local
    /// mirror on hit. `None` on not-found in both tiers and on any error.
    pub async fn get<R: Record>(&self, id: RecordId) -> Option<R> {
        match self.store.get::<R>(id).await {
            Ok(Some(record)) => return Some(record),
            Ok(None) => {}
            Err(e) => tracing::warn!(table = R::TABLE, %id, "local read failed: {e:?}"),
        }

        let value = match self.remote.fetch(R::TABLE, id).await {
            Ok(Some(value)) => value,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(table = R::TABLE, %id, error = %e, "remote read failed");
                return None;
            }
        };

        let record: R = match serde_json::from_value(value) {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(table = R::TABLE, %id, "remote payload did not deserialize: {e}");
                return None;
            }
        };

        if let Err(e) = self.store.mirror(&record).await {
            tracing::warn!(table = R::TABLE, %id, "failed to mirror remote record: {e:?}");
        }
        Some(record)
    }

    /// Add a record, routed by its write policy. Returns whether the write
    /// was accepted.
    ///
    /// Remote-first types write to the remote service and only mirror
    /// locally on success; a remote failure means no local write and no
    /// queue entry. Queue-first types are saved locally and delivered by
    /// the sync worker.
    pub async fn add<R: Record>(&self, record: &R) -> bool {
        match R::WRITE_POLICY {
            WritePolicy::RemoteFirst => {
                let payload = match serde_json::to_value(record) {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::error!(table = R::TABLE, "record failed to serialize: {e}");
                        return false;
                    }
                };
                if let Err(e) = self.remote.upsert(R::TABLE, record.id(), &payload).await {
                    tracing::warn!(table = R::TABLE, id = %record.id(), error = %e, "remote write failed");
                    return false;
                }
                if let Err(e) = self.store.mirror(record).await {
                    tracing::warn!(table = R::TABLE, id = %record.id(), "failed to mirror write: {e:?}");
                }
                true
            }
            WritePolicy::QueueFirst => match self.store.save(record).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(table = R::TABLE, id = %record.id(), "local save failed: {e:?}");
                    false
                }
            },
        }
    }

    /// Merge a partial update into a record, routed by its write policy.
    /// Returns the updated record, or `None` on failure.
    pub async fn update<R: Record>(&self, id: RecordId, partial: Value) -> Option<R> {
        match R::WRITE_POLICY {
            WritePolicy::RemoteFirst => {
                let current: R = self.get(id).await?;
                let mut merged = match serde_json::to_value(&current) {
                    Ok(value) => value,
                    Err(e) => {
                        tracing::error!(table = R::TABLE, %id, "record failed to serialize: {e}");
                        return None;
                    }
                };
                if let (Value::Object(base), Value::Object(fields)) = (&mut merged, partial) {
                    for (key, value) in fields {
                        base.insert(key, value);
                    }
                }
                let updated: R = match serde_json::from_value(merged.clone()) {
                    Ok(record) => record,
                    Err(e) => {
                        tracing::warn!(table = R::TABLE, %id, "merged record did not deserialize: {e}");
                        return None;
                    }
                };
                if let Err(e) = self.remote.upsert(R::TABLE, id, &merged).await {
                    tracing::warn!(table = R::TABLE, %id, error = %e, "remote update failed");
                    return None;
                }
                if let Err(e) = self.store.mirror(&updated).await {
                    tracing::warn!(table = R::TABLE, %id, "failed to mirror update: {e:?}");
                }
                Some(updated)
            }
            WritePolicy::QueueFirst => match self.store.update(id, partial).await {
                Ok(updated) => Some(updated),
                Err(e) => {
                    tracing::warn!(table = R::TABLE, %id, "local update failed: {e:?}");
                    None
                }
            },
        }
    }

    /// List a table's records for the session's tenant.
    ///
    /// No session or no tenant binding yields an empty collection rather
    /// than an error. A remote failure falls back to the local shadow.
    pub async fn list<R: Record>(&self, session: Option<&Session>) -> Vec<R> {
        let Some(tenant_id) = session.and_then(|s| s.tenant_id) else {
            tracing::debug!(table = R::TABLE, "no tenant context; returning empty list");
            return Vec::new();
        };

        let values = match self.remote.list_by_tenant(R::TABLE, tenant_id).await {
            Ok(values) => values,
            Err(e) => {
                tracing::warn!(table = R::TABLE, %tenant_id, error = %e, "remote list failed; using local shadow");
                return self.store.list(tenant_id).await.unwrap_or_else(|e| {
                    tracing::warn!(table = R::TABLE, "local list failed: {e:?}");
                    Vec::new()
                });
            }
        };

        let mut records = Vec::with_capacity(values.len());
        for value in values {
            match serde_json::from_value::<R>(value) {
                Ok(record) => {
                    if let Err(e) = self.store.mirror(&record).await {
                        tracing::warn!(table = R::TABLE, "failed to mirror listed record: {e:?}");
                    }
                    records.push(record);
                }
                Err(e) => tracing::warn!(table = R::TABLE, "skipping malformed row: {e}"),
            }
        }
        records
    }

    pub async fn products(&self, session: Option<&Session>) -> Vec<Product> {
        self.list(session).await
    }

    pub async fn customers(&self, session: Option<&Session>) -> Vec<Customer> {
        self.list(session).await
    }

    pub async fn sales(&self, session: Option<&Session>) -> Vec<Sale> {
        self.list(session).await
    }

    pub async fn returns(&self, session: Option<&Session>) -> Vec<Return> {
        self.list(session).await
    }

    /// Run one notification reconciliation sweep for the session's tenant
    /// and persist the result.
    ///
    /// Called after sales, after product mutations, and from the polling
    /// surface while the notification panel is closed. `None` when there is
    /// no tenant context.
    pub async fn reconcile_low_stock(&self, session: Option<&Session>) -> Option<ReconcileOutcome> {
        session.and_then(|s| s.tenant_id)?;

        let products: Vec<Product> = self.list(session).await;
        let mut notifications: Vec<Notification> = self.list(session).await;
        let before: Vec<RecordId> = notifications.iter().map(|n| n.id).collect();

        let outcome = reconcile::reconcile(&mut notifications, &products);

        for id in &before {
            if !notifications.iter().any(|n| n.id == *id) {
                if let Err(e) = self.remote.delete(Notification::TABLE, *id).await {
                    tracing::warn!(%id, error = %e, "failed to delete superseded notification");
                }
                if let Err(e) = self.store.remove(Notification::TABLE, *id).await {
                    tracing::warn!(%id, "failed to drop superseded notification locally: {e:?}");
                }
            }
        }
        for notification in notifications.iter().filter(|n| !before.contains(&n.id)) {
            self.add(notification).await;
        }

        Some(outcome)
    }

    /// Mark one notification as read. Returns whether anything changed.
    pub async fn mark_notification_read(&self, session: Option<&Session>, id: RecordId) -> bool {
        let mut notifications: Vec<Notification> = self.list(session).await;
        if !reconcile::mark_read(&mut notifications, id) {
            return false;
        }
        if let Some(read) = notifications.iter().find(|n| n.id == id) {
            self.add(read).await;
        }
        true
    }

    /// Mark every notification as read. Returns how many were flipped.
    pub async fn mark_all_notifications_read(&self, session: Option<&Session>) -> usize {
        let mut notifications: Vec<Notification> = self.list(session).await;
        let unread = reconcile::unread_count(&notifications);
        reconcile::mark_all_read(&mut notifications);
        for notification in notifications.iter().filter(|n| n.is_read) {
            self.add(notification).await;
        }
        unread
    }

    /// Administrative reset: delete the tenant's entire notification
    /// collection. Manual recovery tool for drifted state.
    pub async fn clear_notifications(&self, session: Option<&Session>) -> usize {
        let notifications: Vec<Notification> = self.list(session).await;
        for notification in &notifications {
            if let Err(e) = self.remote.delete(Notification::TABLE, notification.id).await {
                tracing::warn!(id = %notification.id, error = %e, "failed to delete notification");
            }
            if let Err(e) = self.store.remove(Notification::TABLE, notification.id).await {
                tracing::warn!(id = %notification.id, "failed to drop notification locally: {e:?}");
            }
        }
        tracing::warn!(cleared = notifications.len(), "notification collection reset");
        notifications.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::SyncQueue;
    use crate::remote::testing::{FakeRemote, Fault};
    use serde_json::json;
    use tillpoint_core::TenantId;
    use tillpoint_notifications::Priority;
    use tillpoint_records::User;

    fn fixtures() -> (DataAdapter, LocalStore, SyncQueue, Arc<FakeRemote>) {
        tillpoint_observability::init_for_tests();
        let queue = SyncQueue::in_memory();
        let store = LocalStore::in_memory(queue.clone());
        let remote = Arc::new(FakeRemote::new());
        let adapter = DataAdapter::new(store.clone(), remote.clone());
        (adapter, store, queue, remote)
    }

    fn product(tenant_id: TenantId, quantity: i64) -> Product {
        let mut p = Product::new(tenant_id, "Beans", "SKU-1", 1299, quantity).unwrap();
        p.set_min_stock(Some(5)).unwrap();
        p
    }

    fn session(tenant_id: TenantId) -> Session {
        Session::new(UserId::new(), Some(tenant_id))
    }

    #[tokio::test]
    async fn read_through_mirrors_remote_hit() {
        let (adapter, _store, _queue, remote) = fixtures();
        let p = product(TenantId::new(), 10);
        remote.insert(Product::TABLE, p.id, serde_json::to_value(&p).unwrap());

        let got: Product = adapter.get(p.id).await.unwrap();
        assert_eq!(got, p);

        // Remote goes away; the mirrored copy still answers.
        remote.set_fault(Fault::Network);
        let cached: Option<Product> = adapter.get(p.id).await;
        assert_eq!(cached.unwrap().id, p.id);
    }

    #[tokio::test]
    async fn get_is_none_when_absent_everywhere() {
        let (adapter, _store, _queue, _remote) = fixtures();
        let missing: Option<Product> = adapter.get(RecordId::new()).await;
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn remote_first_add_failure_writes_nothing_locally() {
        let (adapter, store, queue, remote) = fixtures();
        let p = product(TenantId::new(), 10);
        remote.set_fault(Fault::Network);

        assert!(!adapter.add(&p).await);

        assert!(store.get::<Product>(p.id).await.unwrap().is_none());
        assert!(queue.list_pending().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn queue_first_add_defers_remote_delivery() {
        let (adapter, _store, queue, remote) = fixtures();
        let user = User::new("owner@example.com", "Owner").unwrap();

        assert!(adapter.add(&user).await);

        assert_eq!(queue.pending_for(user.id).await.unwrap(), 1);
        assert!(!remote.contains(User::TABLE, user.id));
    }

    #[tokio::test]
    async fn list_without_session_is_empty() {
        let (adapter, _store, _queue, remote) = fixtures();
        let p = product(TenantId::new(), 10);
        remote.insert(Product::TABLE, p.id, serde_json::to_value(&p).unwrap());

        assert!(adapter.products(None).await.is_empty());

        let unbound = Session::new(UserId::new(), None);
        assert!(adapter.products(Some(&unbound)).await.is_empty());
    }

    #[tokio::test]
    async fn list_is_scoped_to_the_session_tenant() {
        let (adapter, _store, _queue, remote) = fixtures();
        let mine = product(TenantId::new(), 10);
        let theirs = product(TenantId::new(), 10);
        remote.insert(Product::TABLE, mine.id, serde_json::to_value(&mine).unwrap());
        remote.insert(Product::TABLE, theirs.id, serde_json::to_value(&theirs).unwrap());

        let listed = adapter.products(Some(&session(mine.tenant_id))).await;

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, mine.id);
    }

    #[tokio::test]
    async fn remote_first_update_merges_and_upserts() {
        let (adapter, _store, _queue, remote) = fixtures();
        let p = product(TenantId::new(), 10);
        remote.insert(Product::TABLE, p.id, serde_json::to_value(&p).unwrap());

        let updated: Product = adapter
            .update(p.id, json!({ "quantity": 2 }))
            .await
            .unwrap();

        assert_eq!(updated.quantity, 2);
        assert_eq!(updated.name, p.name);
        let remote_copy = remote.records.lock().unwrap()
            [&(Product::TABLE.to_string(), p.id)]
            .clone();
        assert_eq!(remote_copy["quantity"], 2);
    }

    #[tokio::test]
    async fn reconcile_creates_supersedes_and_sweeps() {
        let (adapter, _store, _queue, remote) = fixtures();
        let tenant_id = TenantId::new();
        let session = session(tenant_id);
        let p = product(tenant_id, 3);
        remote.insert(Product::TABLE, p.id, serde_json::to_value(&p).unwrap());

        // First pass: one medium-priority alert appears.
        let outcome = adapter.reconcile_low_stock(Some(&session)).await.unwrap();
        assert_eq!(outcome.created, 1);
        let alerts: Vec<Notification> = adapter.list(Some(&session)).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].priority, Priority::Medium);
        assert_eq!(alerts[0].related_product, Some(p.id));

        // Unchanged inventory: idempotent.
        let outcome = adapter.reconcile_low_stock(Some(&session)).await.unwrap();
        assert_eq!(outcome.created, 0);

        // Stock hits zero: a fresh unread high-priority alert joins the
        // stale one.
        adapter
            .update::<Product>(p.id, json!({ "quantity": 0 }))
            .await
            .unwrap();
        let outcome = adapter.reconcile_low_stock(Some(&session)).await.unwrap();
        assert_eq!(outcome.created, 1);
        let alerts: Vec<Notification> = adapter.list(Some(&session)).await;
        assert_eq!(alerts.len(), 2);

        // Next pass sweeps the stale alert away.
        let outcome = adapter.reconcile_low_stock(Some(&session)).await.unwrap();
        assert_eq!(outcome.removed, 1);
        let alerts: Vec<Notification> = adapter.list(Some(&session)).await;
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].title, "Out of Stock Alert");
    }

    #[tokio::test]
    async fn mark_all_read_then_clear() {
        let (adapter, _store, _queue, remote) = fixtures();
        let tenant_id = TenantId::new();
        let session = session(tenant_id);
        let p = product(tenant_id, 0);
        remote.insert(Product::TABLE, p.id, serde_json::to_value(&p).unwrap());
        adapter.reconcile_low_stock(Some(&session)).await.unwrap();

        assert_eq!(adapter.mark_all_notifications_read(Some(&session)).await, 1);
        let alerts: Vec<Notification> = adapter.list(Some(&session)).await;
        assert!(alerts.iter().all(|n| n.is_read));

        assert_eq!(adapter.clear_notifications(Some(&session)).await, 1);
        let alerts: Vec<Notification> = adapter.list(Some(&session)).await;
        assert!(alerts.is_empty());
    }
}
