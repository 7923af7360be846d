//! Account-level records: users, stores and subscriptions.
//!
//! These are the offline-durable record types: writes go to the local store
//! first and reach the remote service through the sync queue
//! (`WritePolicy::QueueFirst`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{
    DomainError, DomainResult, Record, RecordId, TenantId, UserId, WritePolicy,
};

/// An authenticated account holder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: RecordId,
    pub email: String,
    pub display_name: String,
    /// Tenant this user belongs to, once they have registered a store.
    pub store_id: Option<TenantId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: impl Into<String>, display_name: impl Into<String>) -> DomainResult<Self> {
        let email = email.into();
        let display_name = display_name.into();
        if !email.contains('@') {
            return Err(DomainError::validation("email must contain '@'"));
        }
        if display_name.trim().is_empty() {
            return Err(DomainError::validation("display name cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id: RecordId::new(),
            email,
            display_name,
            store_id: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// The user's principal identity (shares the record's UUID).
    pub fn user_id(&self) -> UserId {
        UserId::from_uuid(*self.id.as_uuid())
    }
}

impl Record for User {
    const TABLE: &'static str = "users";
    const WRITE_POLICY: WritePolicy = WritePolicy::QueueFirst;

    fn id(&self) -> RecordId {
        self.id
    }

    // Users exist above the tenant boundary; their store binding is a
    // domain field, not a scoping key.
    fn tenant_id(&self) -> Option<TenantId> {
        None
    }

    fn touched_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// A registered store. A store is its own tenant: the record's UUID doubles
/// as the `TenantId` every other record is scoped by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    pub id: RecordId,
    pub owner: UserId,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Store {
    pub fn new(owner: UserId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("store name cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id: RecordId::new(),
            owner,
            name,
            address: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn tenant(&self) -> TenantId {
        TenantId::from_uuid(*self.id.as_uuid())
    }
}

impl Record for Store {
    const TABLE: &'static str = "stores";
    const WRITE_POLICY: WritePolicy = WritePolicy::QueueFirst;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant())
    }

    fn touched_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

/// Subscription tier gating feature access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    Free,
    Basic,
    Premium,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Expired,
    Cancelled,
}

/// A tenant's subscription.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub tier: SubscriptionTier,
    pub status: SubscriptionStatus,
    pub started_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    pub fn new(tenant_id: TenantId, tier: SubscriptionTier) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            tenant_id,
            tier,
            status: SubscriptionStatus::Active,
            started_at: now,
            expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        if self.status != SubscriptionStatus::Active {
            return false;
        }
        match self.expires_at {
            Some(expires) => at < expires,
            None => true,
        }
    }
}

impl Record for Subscription {
    const TABLE: &'static str = "subscriptions";
    const WRITE_POLICY: WritePolicy = WritePolicy::QueueFirst;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }

    fn touched_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}
