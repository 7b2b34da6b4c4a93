use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, error, info, warn};

use crate::engine::matching::DriverMatcher;
use crate::error::AppError;
use crate::models::alert::AlertSeverity;
use crate::models::notification::{NotificationRecord, NotificationTarget};
use crate::models::order::{Order, OrderStatus, TimelineEvent};
use crate::models::records::ActivityEntry;
use crate::observability::metrics::Metrics;
use crate::store::{Store, WriteBatch};

/// Reacts to order creation and status-transition events: activity log,
/// timeline, notifications, driver assignment and release.
#[derive(Clone)]
pub struct OrderLifecycle {
    store: Arc<dyn Store>,
    matcher: DriverMatcher,
    metrics: Metrics,
}

impl OrderLifecycle {
    pub fn new(store: Arc<dyn Store>, matcher: DriverMatcher, metrics: Metrics) -> Self {
        Self {
            store,
            matcher,
            metrics,
        }
    }

    /// Creation side effects are independent: a failed log or notification
    /// is reported and counted but never blocks the matching attempt.
    pub async fn on_order_created(&self, order: &Order) -> Result<(), AppError> {
        let now = Utc::now();

        let entry = ActivityEntry::new(
            "order.created",
            format!(
                "order {} created, {} item(s), total {:.2}",
                order.id, order.items_count, order.total
            ),
            "system",
            order.id,
            now,
        );
        if let Err(err) = self.store.append_activity(entry).await {
            error!(order_id = %order.id, error = %err, "activity append failed");
            self.count_failed_effect("activity");
        }

        if order.timeline.is_empty() {
            let event = TimelineEvent {
                kind: "system".to_string(),
                title: "Order created".to_string(),
                description: "Order received and queued for dispatch".to_string(),
                actor: "system".to_string(),
                at: now,
            };
            if let Err(err) = self.store.seed_timeline(order.id, event).await {
                error!(order_id = %order.id, error = %err, "timeline seed failed");
                self.count_failed_effect("timeline");
            }
        }

        let notification = NotificationRecord::new(
            NotificationTarget::Admin,
            "order.created",
            AlertSeverity::Info,
            "New order",
            format!(
                "{} item(s), total {:.2} (delivery fee {:.2})",
                order.items_count, order.total, order.delivery_fee
            ),
            now,
        );
        if let Err(err) = self.store.append_notification(notification).await {
            error!(order_id = %order.id, error = %err, "admin notification failed");
            self.count_failed_effect("notification");
        }

        match self.matcher.auto_assign_driver(order).await? {
            Some(driver) => {
                debug!(order_id = %order.id, driver_id = %driver.id, "auto-match succeeded");
            }
            None => {
                info!(order_id = %order.id, "order left unassigned, awaiting next pass");
            }
        }

        Ok(())
    }

    /// Transition side effects commit as one batch: the log, the customer
    /// and admin notifications, and any driver release stand or fall
    /// together.
    pub async fn on_order_status_change(
        &self,
        before: &Order,
        after: &Order,
    ) -> Result<(), AppError> {
        if before.status == after.status {
            debug!(order_id = %after.id, status = before.status.as_str(), "duplicate status event ignored");
            return Ok(());
        }

        if before.status.is_terminal() {
            warn!(
                order_id = %after.id,
                from = before.status.as_str(),
                to = after.status.as_str(),
                "transition out of terminal status rejected"
            );
            return Err(AppError::Conflict(format!(
                "order {} is already {}",
                after.id,
                before.status.as_str()
            )));
        }

        let now = Utc::now();
        let mut batch = WriteBatch::new();

        batch.activity(ActivityEntry::new(
            "order.status_changed",
            format!(
                "order {}: {} -> {}",
                after.id,
                before.status.as_str(),
                after.status.as_str()
            ),
            "system",
            after.id,
            now,
        ));

        batch.notification(NotificationRecord::new(
            NotificationTarget::User(after.customer_id),
            "order.status",
            AlertSeverity::Info,
            "Order update",
            format!("Your order is now {}", after.status.as_str()),
            now,
        ));

        match after.status {
            OrderStatus::Cancelled => {
                batch.notification(NotificationRecord::new(
                    NotificationTarget::Admin,
                    "order.cancelled",
                    AlertSeverity::Warning,
                    "Order cancelled",
                    format!("Order {} was cancelled", after.id),
                    now,
                ));
            }
            OrderStatus::Delivered => {
                batch.notification(NotificationRecord::new(
                    NotificationTarget::Admin,
                    "order.delivered",
                    AlertSeverity::Info,
                    "Order delivered",
                    format!("Order {} was delivered", after.id),
                    now,
                ));
            }
            _ => {}
        }

        if after.status.is_terminal() {
            // sole path a claimed driver returns to rotation
            if let Some(driver_id) = after.driver_id.or(before.driver_id) {
                batch.release_driver(driver_id);
                batch.notification(NotificationRecord::new(
                    NotificationTarget::User(driver_id),
                    "delivery.completed",
                    AlertSeverity::Info,
                    "Delivery closed",
                    format!(
                        "Order {} reached {}; you are back in rotation",
                        after.id,
                        after.status.as_str()
                    ),
                    now,
                ));
            }
        }

        // covers manual reassignment as well as auto-matching
        if after.status == OrderStatus::Shipped && before.driver_id.is_none() {
            if let Some(driver_id) = after.driver_id {
                batch.notification(NotificationRecord::new(
                    NotificationTarget::User(driver_id),
                    "delivery.assigned",
                    AlertSeverity::Info,
                    "New delivery",
                    format!("Order {} is ready for pickup", after.id),
                    now,
                ));
            }
        }

        self.store.commit(batch).await?;
        self.metrics
            .transitions_total
            .with_label_values(&[after.status.as_str()])
            .inc();

        info!(
            order_id = %after.id,
            from = before.status.as_str(),
            to = after.status.as_str(),
            "order transition applied"
        );
        Ok(())
    }

    fn count_failed_effect(&self, effect: &str) {
        self.metrics
            .side_effect_failures_total
            .with_label_values(&[effect])
            .inc();
    }
}
