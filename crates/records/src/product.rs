use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{DomainError, DomainResult, Record, RecordId, TenantId, WritePolicy};

/// Stock threshold applied when a product has no configured minimum.
pub const DEFAULT_MIN_STOCK: i64 = 5;

/// A sellable product with tracked stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub name: String,
    pub sku: String,
    /// Price in smallest currency unit (e.g., cents).
    pub price_cents: i64,
    pub quantity: i64,
    /// Configured low-stock threshold; `None` falls back to [`DEFAULT_MIN_STOCK`].
    pub min_stock_level: Option<i64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Create a new product with validated fields.
    pub fn new(
        tenant_id: TenantId,
        name: impl Into<String>,
        sku: impl Into<String>,
        price_cents: i64,
        quantity: i64,
    ) -> DomainResult<Self> {
        let name = name.into();
        let sku = sku.into();
        if name.trim().is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        if sku.trim().is_empty() {
            return Err(DomainError::validation("product SKU cannot be empty"));
        }
        if price_cents < 0 {
            return Err(DomainError::validation("price cannot be negative"));
        }
        if quantity < 0 {
            return Err(DomainError::validation("quantity cannot be negative"));
        }
        let now = Utc::now();
        Ok(Self {
            id: RecordId::new(),
            tenant_id,
            name,
            sku,
            price_cents,
            quantity,
            min_stock_level: None,
            created_at: now,
            updated_at: now,
        })
    }

    /// Threshold at or below which the product counts as low stock.
    pub fn effective_min_stock(&self) -> i64 {
        self.min_stock_level.unwrap_or(DEFAULT_MIN_STOCK)
    }

    pub fn is_low_stock(&self) -> bool {
        self.quantity <= self.effective_min_stock()
    }

    pub fn is_out_of_stock(&self) -> bool {
        self.quantity <= 0
    }

    /// Adjust stock by a signed delta. Stock cannot go negative.
    pub fn adjust_quantity(&mut self, delta: i64) -> DomainResult<()> {
        let new_quantity = self.quantity + delta;
        if new_quantity < 0 {
            return Err(DomainError::validation("stock cannot go negative"));
        }
        self.quantity = new_quantity;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn set_min_stock(&mut self, level: Option<i64>) -> DomainResult<()> {
        if let Some(level) = level {
            if level < 0 {
                return Err(DomainError::validation("minimum stock cannot be negative"));
            }
        }
        self.min_stock_level = level;
        self.updated_at = Utc::now();
        Ok(())
    }
}

impl Record for Product {
    const TABLE: &'static str = "products";
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
