//! Record trait: the shape every synchronized table row shares.

use chrono::{DateTime, Utc};

use crate::id::{RecordId, TenantId};

/// How writes for a record type reach the remote service.
///
/// Account-level records need offline durability: the local store is written
/// first and a sync-queue entry carries the write to the remote service in
/// the background. Operational tenant data treats the remote service as
/// immediately authoritative: the write goes remote-first and the local
/// store only mirrors confirmed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WritePolicy {
    /// Local store first, remote delivery via the sync queue.
    QueueFirst,
    /// Remote service first; local store holds a mirror only.
    RemoteFirst,
}

/// A persistable, tenant-scoped record.
///
/// Implemented by every canonical entity struct; the local store, sync queue
/// and data adapter are generic over this trait.
pub trait Record: serde::Serialize + serde::de::DeserializeOwned {
    /// Canonical remote table name (also the local collection name).
    const TABLE: &'static str;

    /// Write routing for this record type.
    const WRITE_POLICY: WritePolicy;

    /// Record identifier.
    fn id(&self) -> RecordId;

    /// Owning tenant, where the record type is tenant-scoped.
    ///
    /// `None` for records that exist above the tenant boundary (users).
    fn tenant_id(&self) -> Option<TenantId>;

    /// Last domain-level modification time.
    fn touched_at(&self) -> DateTime<Utc>;
}
