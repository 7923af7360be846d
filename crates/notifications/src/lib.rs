//! `tillpoint-notifications`
//!
//! **Responsibility:** the notification model and the reconciliation engine
//! that keeps low-stock alerts synchronized with live inventory.
//!
//! The engine is pure collection logic: it takes the current notification
//! collection and inventory snapshot and returns the updated collection.
//! Persistence is the caller's concern.

pub mod notification;
pub mod reconcile;

pub use notification::{Notification, NotificationKind, Priority};
pub use reconcile::{reconcile, ReconcileOutcome};
