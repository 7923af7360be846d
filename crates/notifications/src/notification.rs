use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tillpoint_core::{Record, RecordId, TenantId, WritePolicy};
use tillpoint_records::Product;

/// Category of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LowStock,
    System,
    Order,
    Customer,
}

/// Display priority of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A derived alert shown in the notification panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: RecordId,
    pub tenant_id: TenantId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub priority: Priority,
    pub is_read: bool,
    /// For `LowStock`: the product this notification is keyed by.
    pub related_product: Option<RecordId>,
    pub action_link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Build the low-stock alert for a product's current state.
    ///
    /// Out-of-stock products get the high-priority "Out of Stock Alert"
    /// wording; everything else gets the medium-priority low-stock wording
    /// with the remaining quantity, so a quantity change produces a
    /// different message.
    pub fn low_stock(product: &Product) -> Self {
        let (title, message, priority) = if product.is_out_of_stock() {
            (
                "Out of Stock Alert".to_string(),
                format!("{} is out of stock", product.name),
                Priority::High,
            )
        } else {
            (
                "Low Stock Alert".to_string(),
                format!(
                    "{} is running low: {} left (minimum {})",
                    product.name,
                    product.quantity,
                    product.effective_min_stock()
                ),
                Priority::Medium,
            )
        };

        Self {
            id: RecordId::new(),
            tenant_id: product.tenant_id,
            kind: NotificationKind::LowStock,
            title,
            message,
            priority,
            is_read: false,
            related_product: Some(product.id),
            action_link: Some(format!("/inventory/{}", product.id)),
            created_at: Utc::now(),
        }
    }

    pub fn system(tenant_id: TenantId, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: RecordId::new(),
            tenant_id,
            kind: NotificationKind::System,
            title: title.into(),
            message: message.into(),
            priority: Priority::Low,
            is_read: false,
            related_product: None,
            action_link: None,
            created_at: Utc::now(),
        }
    }

    /// Whether this notification already describes the product's current state.
    pub fn matches_state(&self, product: &Product) -> bool {
        let current = Notification::low_stock(product);
        self.title == current.title && self.message == current.message
    }
}

impl Record for Notification {
    const TABLE: &'static str = "notifications";
    const WRITE_POLICY: WritePolicy = WritePolicy::RemoteFirst;

    fn id(&self) -> RecordId {
        self.id
    }

    fn tenant_id(&self) -> Option<TenantId> {
        Some(self.tenant_id)
    }

    fn touched_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
