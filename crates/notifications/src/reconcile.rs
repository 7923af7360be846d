//! Reconciliation sweep: dedup + low-stock generation.
//!
//! Intended invariant: at most one *current* low-stock notification per
//! product. The sweep enforces it best-effort before generation rather than
//! at write time, because a meaningful stock change deliberately supersedes
//! the old notification with a fresh unread one (so the bell shows a new
//! item) and the stale one lingers until the next pass.

use std::collections::HashMap;

use tillpoint_core::RecordId;
use tillpoint_records::Product;

use crate::notification::{Notification, NotificationKind};

/// Counts reported to the caller for logging purposes only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Newly created notifications.
    pub created: usize,
    /// Duplicates removed by the sweep.
    pub removed: usize,
}

/// Run one reconciliation pass over the notification collection.
///
/// 1. Deduplicate existing low-stock notifications per product, keeping the
///    newest unread one (or the newest overall if all are read).
/// 2. For every product at or below its threshold: create a notification if
///    none exists, supersede with a new unread one if the wording no longer
///    matches the current state, otherwise leave it alone.
///
/// Running the pass twice with no inventory change in between creates
/// nothing on the second run.
pub fn reconcile(notifications: &mut Vec<Notification>, products: &[Product]) -> ReconcileOutcome {
    let removed = dedup_sweep(notifications);

    let mut created = 0;
    for product in products.iter().filter(|p| p.is_low_stock()) {
        let existing = notifications.iter().find(|n| {
            n.kind == NotificationKind::LowStock && n.related_product == Some(product.id)
        });

        match existing {
            None => {
                notifications.push(Notification::low_stock(product));
                created += 1;
            }
            Some(current) if !current.matches_state(product) => {
                // Supersede: push a fresh unread notification, leave the
                // stale one for the next sweep.
                notifications.push(Notification::low_stock(product));
                created += 1;
            }
            Some(_) => {}
        }
    }

    if created > 0 || removed > 0 {
        tracing::debug!(created, removed, "reconciled low-stock notifications");
    }

    ReconcileOutcome { created, removed }
}

/// Remove duplicate low-stock notifications, one survivor per product.
///
/// The survivor is the newest unread notification for that product, or the
/// newest overall when every one has been read. Returns the number removed.
pub fn dedup_sweep(notifications: &mut Vec<Notification>) -> usize {
    let mut keep: HashMap<RecordId, RecordId> = HashMap::new();

    for (product_id, group) in group_low_stock(notifications) {
        let survivor = group
            .iter()
            .filter(|n| !n.is_read)
            .max_by_key(|n| n.created_at)
            .or_else(|| group.iter().max_by_key(|n| n.created_at))
            .map(|n| n.id);
        if let Some(id) = survivor {
            keep.insert(product_id, id);
        }
    }

    let before = notifications.len();
    notifications.retain(|n| {
        if n.kind != NotificationKind::LowStock {
            return true;
        }
        match n.related_product {
            Some(product_id) => keep.get(&product_id) == Some(&n.id),
            // A low-stock notification without a product key is malformed;
            // drop it in the sweep.
            None => false,
        }
    });
    before - notifications.len()
}

fn group_low_stock(notifications: &[Notification]) -> HashMap<RecordId, Vec<&Notification>> {
    let mut groups: HashMap<RecordId, Vec<&Notification>> = HashMap::new();
    for n in notifications {
        if n.kind == NotificationKind::LowStock {
            if let Some(product_id) = n.related_product {
                groups.entry(product_id).or_default().push(n);
            }
        }
    }
    groups
}

/// Mark one notification as read. Returns whether anything changed.
pub fn mark_read(notifications: &mut [Notification], id: RecordId) -> bool {
    match notifications.iter_mut().find(|n| n.id == id) {
        Some(n) if !n.is_read => {
            n.is_read = true;
            true
        }
        _ => false,
    }
}

/// Mark every notification as read.
pub fn mark_all_read(notifications: &mut [Notification]) {
    for n in notifications.iter_mut() {
        n.is_read = true;
    }
}

pub fn unread_count(notifications: &[Notification]) -> usize {
    notifications.iter().filter(|n| !n.is_read).count()
}

/// Administrative reset: unconditionally clear the whole collection.
///
/// Manual recovery tool for when notification state has drifted.
pub fn clear_all(notifications: &mut Vec<Notification>) {
    let dropped = notifications.len();
    notifications.clear();
    tracing::warn!(dropped, "notification collection reset");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notification::Priority;
    use chrono::Duration;
    use proptest::prelude::*;
    use tillpoint_core::TenantId;

    fn product(quantity: i64, min: Option<i64>) -> Product {
        let mut p = Product::new(TenantId::new(), "Beans", "SKU-1", 1299, quantity).unwrap();
        p.set_min_stock(min).unwrap();
        p
    }

    fn aged(mut n: Notification, minutes_ago: i64) -> Notification {
        n.created_at -= Duration::minutes(minutes_ago);
        n
    }

    #[test]
    fn low_product_without_notification_gets_one() {
        let p = product(3, Some(5));
        let mut notifications = Vec::new();

        let outcome = reconcile(&mut notifications, &[p.clone()]);

        assert_eq!(outcome.created, 1);
        assert_eq!(notifications.len(), 1);
        let n = &notifications[0];
        assert_eq!(n.kind, NotificationKind::LowStock);
        assert_eq!(n.priority, Priority::Medium);
        assert_eq!(n.related_product, Some(p.id));
        assert!(!n.is_read);
        assert!(n.message.contains("3 left"));
    }

    #[test]
    fn reconcile_is_idempotent_without_inventory_change() {
        let p = product(3, Some(5));
        let mut notifications = Vec::new();

        reconcile(&mut notifications, &[p.clone()]);
        let second = reconcile(&mut notifications, &[p]);

        assert_eq!(second.created, 0);
        assert_eq!(notifications.len(), 1);
    }

    #[test]
    fn quantity_drop_to_zero_supersedes_with_new_unread() {
        let mut p = product(3, Some(5));
        let mut notifications = Vec::new();
        reconcile(&mut notifications, &[p.clone()]);

        p.adjust_quantity(-3).unwrap();
        let outcome = reconcile(&mut notifications, &[p.clone()]);

        assert_eq!(outcome.created, 1);
        // Stale notification stays in place until the next sweep.
        assert_eq!(notifications.len(), 2);
        let fresh = notifications.last().unwrap();
        assert_eq!(fresh.title, "Out of Stock Alert");
        assert_eq!(fresh.priority, Priority::High);
        assert!(!fresh.is_read);

        // Next pass sweeps the stale one and creates nothing.
        let next = reconcile(&mut notifications, &[p]);
        assert_eq!(next.created, 0);
        assert_eq!(next.removed, 1);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title, "Out of Stock Alert");
    }

    #[test]
    fn sweep_keeps_exactly_one_of_preexisting_duplicates() {
        let p = product(10, Some(2)); // not low: no generation interference
        let dup = Notification::low_stock(&product(1, Some(2)));
        let mut duplicates: Vec<Notification> = (0..3)
            .map(|i| {
                let mut n = dup.clone();
                n.id = RecordId::new();
                aged(n, i * 10)
            })
            .collect();
        // Mark the newest as read so the newest *unread* must win instead.
        duplicates[0].is_read = true;
        for n in duplicates.iter_mut() {
            n.related_product = Some(p.id);
        }
        let expected_survivor = duplicates[1].id;
        let mut notifications = duplicates;

        let outcome = reconcile(&mut notifications, &[p]);

        assert_eq!(outcome.removed, 2);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].id, expected_survivor);
    }

    #[test]
    fn sweep_falls_back_to_newest_when_all_read() {
        let p = product(1, Some(2));
        let mut notifications: Vec<Notification> = (0..2)
            .map(|i| {
                let mut n = Notification::low_stock(&p);
                n.is_read = true;
                aged(n, i * 10)
            })
            .collect();
        let newest = notifications[0].id;

        let removed = dedup_sweep(&mut notifications);

        assert_eq!(removed, 1);
        assert_eq!(notifications[0].id, newest);
    }

    #[test]
    fn non_low_stock_notifications_survive_the_sweep() {
        let tenant = TenantId::new();
        let mut notifications = vec![
            Notification::system(tenant, "Welcome", "Store registered"),
            Notification::system(tenant, "Billing", "Subscription renewed"),
        ];
        assert_eq!(dedup_sweep(&mut notifications), 0);
        assert_eq!(notifications.len(), 2);
    }

    #[test]
    fn recovered_product_generates_nothing_new() {
        let mut p = product(1, Some(5));
        let mut notifications = Vec::new();
        reconcile(&mut notifications, &[p.clone()]);

        p.adjust_quantity(100).unwrap();
        let outcome = reconcile(&mut notifications, &[p]);

        assert_eq!(outcome.created, 0);
        // The stale alert stays until read or cleared; only dedup removes
        // duplicates, not recovered products.
        assert_eq!(notifications.len(), 1);
    }

    #[test]
    fn mark_all_read_zeroes_unread_count() {
        let p = product(0, None);
        let mut notifications = vec![
            Notification::low_stock(&p),
            Notification::system(p.tenant_id, "Welcome", "hi"),
        ];
        assert_eq!(unread_count(&notifications), 2);

        mark_all_read(&mut notifications);

        assert_eq!(unread_count(&notifications), 0);
        assert!(notifications.iter().all(|n| n.is_read));
    }

    #[test]
    fn mark_read_reports_change_once() {
        let p = product(0, None);
        let mut notifications = vec![Notification::low_stock(&p)];
        let id = notifications[0].id;

        assert!(mark_read(&mut notifications, id));
        assert!(!mark_read(&mut notifications, id));
        assert!(!mark_read(&mut notifications, RecordId::new()));
    }

    #[test]
    fn clear_all_empties_the_collection() {
        let p = product(0, None);
        let mut notifications = vec![Notification::low_stock(&p)];
        clear_all(&mut notifications);
        assert!(notifications.is_empty());
    }

    proptest! {
        /// After a sweep there is at most one low-stock notification per
        /// product, and if any unread duplicate existed the survivor is
        /// unread.
        #[test]
        fn sweep_leaves_at_most_one_per_product(
            read_flags in proptest::collection::vec(any::<bool>(), 1..8),
            product_count in 1usize..4,
        ) {
            let products: Vec<Product> = (0..product_count)
                .map(|_| product(1, Some(3)))
                .collect();

            let mut notifications = Vec::new();
            for (i, read) in read_flags.iter().enumerate() {
                let p = &products[i % products.len()];
                let mut n = Notification::low_stock(p);
                n.is_read = *read;
                n.created_at -= Duration::minutes(i as i64);
                notifications.push(n);
            }
            let had_unread: Vec<RecordId> = products
                .iter()
                .filter(|p| {
                    notifications.iter().any(|n| {
                        n.related_product == Some(p.id) && !n.is_read
                    })
                })
                .map(|p| p.id)
                .collect();

            dedup_sweep(&mut notifications);

            for p in &products {
                let remaining: Vec<_> = notifications
                    .iter()
                    .filter(|n| n.related_product == Some(p.id))
                    .collect();
                prop_assert!(remaining.len() <= 1);
                if had_unread.contains(&p.id) {
                    prop_assert!(!remaining[0].is_read);
                }
            }
        }
    }
}
