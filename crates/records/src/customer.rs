use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{DomainError, DomainResult, Record, RecordId, TenantId, WritePolicy};

/// A customer of one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Outstanding balance in smallest currency unit (owed to the store).
    pub balance_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(tenant_id: TenantId, name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("customer name cannot be empty"));
        }
        let now = Utc::now();
        Ok(Self {
            id: RecordId::new(),
            tenant_id,
            name,
            email: None,
            phone: None,
            balance_cents: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Record a payment against the outstanding balance.
    pub fn record_payment(&mut self, amount_cents: i64) -> DomainResult<()> {
        if amount_cents <= 0 {
            return Err(DomainError::validation("payment must be positive"));
        }
        self.balance_cents -= amount_cents;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Add an amount owed (e.g. a credit sale).
    pub fn add_charge(&mut self, amount_cents: i64) -> DomainResult<()> {
        if amount_cents <= 0 {
            return Err(DomainError::validation("charge must be positive"));
        }
        self.balance_cents += amount_cents;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Record for Customer {
    const TABLE: &'static str = "customers";
    const WRITE_POLICY: WritePolicy = WritePolicy::RemoteFirst;

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
