use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{DomainError, DomainResult, Record, RecordId, TenantId, WritePolicy};

/// Payment state of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Partial,
    Unpaid,
}

/// One line of a sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub product_id: RecordId,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

/// A recorded sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sale {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub customer_id: Option<RecordId>,
    pub lines: Vec<SaleLine>,
    pub total_cents: i64,
    pub amount_paid_cents: i64,
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Record a sale. The total is derived from the lines; payment status
    /// from the amount paid.
    pub fn new(
        tenant_id: TenantId,
        customer_id: Option<RecordId>,
        lines: Vec<SaleLine>,
        amount_paid_cents: i64,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("sale must have at least one line"));
        }
        for line in &lines {
            if line.quantity <= 0 {
                return Err(DomainError::validation("line quantity must be positive"));
            }
            if line.unit_price_cents < 0 {
                return Err(DomainError::validation("unit price cannot be negative"));
            }
        }
        if amount_paid_cents < 0 {
            return Err(DomainError::validation("amount paid cannot be negative"));
        }

        let total_cents: i64 = lines
            .iter()
            .map(|l| l.quantity * l.unit_price_cents)
            .sum();
        let payment_status = payment_status_for(total_cents, amount_paid_cents);

        let now = Utc::now();
        Ok(Self {
            id: RecordId::new(),
            tenant_id,
            customer_id,
            lines,
            total_cents,
            amount_paid_cents,
            payment_status,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply an additional payment toward the sale total.
    pub fn apply_payment(&mut self, amount_cents: i64) -> DomainResult<()> {
        if amount_cents <= 0 {
            return Err(DomainError::validation("payment must be positive"));
        }
        self.amount_paid_cents += amount_cents;
        self.payment_status = payment_status_for(self.total_cents, self.amount_paid_cents);
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn outstanding_cents(&self) -> i64 {
        (self.total_cents - self.amount_paid_cents).max(0)
    }
}

fn payment_status_for(total_cents: i64, paid_cents: i64) -> PaymentStatus {
    if paid_cents >= total_cents {
        PaymentStatus::Paid
    } else if paid_cents > 0 {
        PaymentStatus::Partial
    } else {
        PaymentStatus::Unpaid
    }
}

impl Record for Sale {
    const TABLE: &'static str = "sales";
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

/// A return of previously sold items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Return {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub sale_id: RecordId,
    pub product_id: RecordId,
    pub quantity: i64,
    pub refund_cents: i64,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Return {
    pub fn new(
        tenant_id: TenantId,
        sale_id: RecordId,
        product_id: RecordId,
        quantity: i64,
        refund_cents: i64,
    ) -> DomainResult<Self> {
        if quantity <= 0 {
            return Err(DomainError::validation("return quantity must be positive"));
        }
        if refund_cents < 0 {
            return Err(DomainError::validation("refund cannot be negative"));
        }
        let now = Utc::now();
        Ok(Self {
            id: RecordId::new(),
            tenant_id,
            sale_id,
            product_id,
            quantity,
            refund_cents,
            reason: None,
            created_at: now,
            updated_at: now,
        })
    }
}

impl Record for Return {
    const TABLE: &'static str = "returns";
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
