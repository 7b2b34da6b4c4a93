use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Duration, Timelike, Utc};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::HealthThresholds;
use crate::error::AppError;
use crate::models::alert::{Alert, AlertRecord, AlertSeverity};
use crate::models::candidate::EngineEvent;
use crate::models::driver::{Driver, DriverStatus};
use crate::models::notification::{NotificationRecord, NotificationTarget};
use crate::models::order::{Order, OrderStatus};
use crate::models::records::{Dispute, DisputeStatus, Verification, VerificationStatus};
use crate::models::user::UserProfile;
use crate::observability::metrics::Metrics;
use crate::outbound::{AlertWebhook, PushSender};
use crate::store::Store;

pub const RULE_NO_DRIVERS: &str = "no-drivers-online";
pub const RULE_HIGH_UTILIZATION: &str = "high-utilization";
pub const RULE_HIGH_DISPUTES: &str = "high-disputes";
pub const RULE_VERIFICATION_BACKLOG: &str = "verification-backlog";
pub const RULE_LOW_ON_TIME: &str = "low-on-time-rate";
pub const RULE_NO_REVENUE: &str = "no-revenue-today";
pub const RULE_STALE_SHIPPED: &str = "stale-shipped-orders";
pub const RULE_NO_SIGNUPS: &str = "no-signups-today";

/// Full-scan view of the platform taken at the start of a run. Counts are
/// eventually consistent with the triggers mutating the store underneath.
pub struct PlatformSnapshot {
    pub drivers: Vec<Driver>,
    pub orders: Vec<Order>,
    pub disputes: Vec<Dispute>,
    pub verifications: Vec<Verification>,
    pub users: Vec<UserProfile>,
}

/// Scans aggregate platform state on a fixed cadence, deduplicates alerts
/// against a rolling window and fans the survivors out.
pub struct HealthMonitor {
    store: Arc<dyn Store>,
    webhook: Arc<dyn AlertWebhook>,
    push: Arc<dyn PushSender>,
    thresholds: HealthThresholds,
    dedup_window_minutes: i64,
    admin_tokens: Vec<String>,
    metrics: Metrics,
    events_tx: broadcast::Sender<EngineEvent>,
}

impl HealthMonitor {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn Store>,
        webhook: Arc<dyn AlertWebhook>,
        push: Arc<dyn PushSender>,
        thresholds: HealthThresholds,
        dedup_window_minutes: i64,
        admin_tokens: Vec<String>,
        metrics: Metrics,
        events_tx: broadcast::Sender<EngineEvent>,
    ) -> Self {
        Self {
            store,
            webhook,
            push,
            thresholds,
            dedup_window_minutes,
            admin_tokens,
            metrics,
            events_tx,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        let snapshot = PlatformSnapshot {
            drivers: self.store.list_drivers().await?,
            orders: self.store.list_orders().await?,
            disputes: self.store.list_disputes().await?,
            verifications: self.store.list_verifications().await?,
            users: self.store.list_users().await?,
        };

        let raised = evaluate(&snapshot, &self.thresholds, now);
        if raised.is_empty() {
            debug!("health scan clean");
            return Ok(());
        }

        let since = now - Duration::minutes(self.dedup_window_minutes);
        let recently_fired: HashSet<String> = self
            .store
            .recent_alerts(since)
            .await?
            .into_iter()
            .map(|record| record.alert.rule)
            .collect();

        let fresh: Vec<Alert> = raised
            .into_iter()
            .filter(|alert| !recently_fired.contains(&alert.rule))
            .collect();

        if fresh.is_empty() {
            debug!("all raised alerts suppressed by dedup window");
            return Ok(());
        }

        // History is the durability boundary: record before any outbound
        // delivery so a retry cannot re-arm the same alerts.
        for alert in &fresh {
            self.store
                .append_alert(AlertRecord {
                    alert: alert.clone(),
                    fired_at: now,
                })
                .await?;
            self.store
                .append_notification(NotificationRecord::new(
                    NotificationTarget::Admin,
                    "health.alert",
                    alert.severity,
                    alert.title.clone(),
                    alert.message.clone(),
                    now,
                ))
                .await?;
            self.metrics
                .alerts_emitted_total
                .with_label_values(&[alert.severity.as_str()])
                .inc();
            let _ = self.events_tx.send(EngineEvent::AlertRaised {
                rule: alert.rule.clone(),
                severity: alert.severity,
                title: alert.title.clone(),
                at: now,
            });
            info!(rule = %alert.rule, severity = alert.severity.as_str(), "alert raised");
        }

        if let Err(err) = self.webhook.send(&fresh).await {
            warn!(error = %err, count = fresh.len(), "alert webhook delivery failed");
            self.metrics
                .outbound_failures_total
                .with_label_values(&["webhook"])
                .inc();
        }

        let headline = fresh
            .iter()
            .find(|alert| alert.severity == AlertSeverity::Critical)
            .unwrap_or(&fresh[0]);
        let body = if fresh.len() > 1 {
            format!("{} (+{} more alerts)", headline.message, fresh.len() - 1)
        } else {
            headline.message.clone()
        };
        if let Err(err) = self
            .push
            .multicast(&self.admin_tokens, &headline.title, &body)
            .await
        {
            warn!(error = %err, "admin push delivery failed");
            self.metrics
                .outbound_failures_total
                .with_label_values(&["push"])
                .inc();
        }

        Ok(())
    }
}

fn alert(rule: &str, severity: AlertSeverity, title: &str, message: String, team: &str) -> Alert {
    Alert {
        rule: rule.to_string(),
        severity,
        title: title.to_string(),
        message,
        team: team.to_string(),
    }
}

/// Evaluates every threshold rule against one snapshot. Pure.
pub fn evaluate(
    snapshot: &PlatformSnapshot,
    thresholds: &HealthThresholds,
    now: DateTime<Utc>,
) -> Vec<Alert> {
    let mut alerts = Vec::new();
    let today = now.date_naive();

    let total_drivers = snapshot.drivers.len();
    let online = snapshot
        .drivers
        .iter()
        .filter(|d| d.status == DriverStatus::Online)
        .count();
    let busy = snapshot
        .drivers
        .iter()
        .filter(|d| d.status == DriverStatus::Busy)
        .count();

    if total_drivers > 0 && online + busy == 0 {
        alerts.push(alert(
            RULE_NO_DRIVERS,
            AlertSeverity::Critical,
            "No drivers on the road",
            format!("All {total_drivers} registered drivers are offline or on break"),
            "dispatch",
        ));
    }

    if online + busy > 0 {
        let utilization = busy as f64 / (online + busy) as f64;
        if utilization > thresholds.max_utilization {
            alerts.push(alert(
                RULE_HIGH_UTILIZATION,
                AlertSeverity::Warning,
                "Driver fleet saturated",
                format!(
                    "{busy} of {} active drivers are busy ({:.0}% utilization)",
                    online + busy,
                    utilization * 100.0
                ),
                "dispatch",
            ));
        }
    }

    let open_disputes = snapshot
        .disputes
        .iter()
        .filter(|d| d.status == DisputeStatus::Open)
        .count();
    if open_disputes > thresholds.max_open_disputes {
        alerts.push(alert(
            RULE_HIGH_DISPUTES,
            AlertSeverity::Critical,
            "Dispute backlog",
            format!("{open_disputes} disputes are open"),
            "support",
        ));
    }

    let pending_verifications = snapshot
        .verifications
        .iter()
        .filter(|v| v.status == VerificationStatus::Pending)
        .count();
    if pending_verifications > thresholds.max_pending_verifications {
        alerts.push(alert(
            RULE_VERIFICATION_BACKLOG,
            AlertSeverity::Warning,
            "Verification backlog",
            format!("{pending_verifications} verifications are waiting for review"),
            "operations",
        ));
    }

    let judged: Vec<&Order> = snapshot
        .orders
        .iter()
        .filter(|o| o.status == OrderStatus::Delivered && o.estimated_delivery.is_some())
        .collect();
    if judged.len() > thresholds.on_time_min_sample {
        let on_time = judged
            .iter()
            .filter(|o| {
                o.estimated_delivery
                    .is_some_and(|eta| o.delivered_at.unwrap_or(o.updated_at) <= eta)
            })
            .count();
        let rate = on_time as f64 / judged.len() as f64;
        if rate < thresholds.min_on_time_rate {
            alerts.push(alert(
                RULE_LOW_ON_TIME,
                AlertSeverity::Warning,
                "On-time rate dropped",
                format!(
                    "{on_time} of {} delivered orders arrived on time ({:.0}%)",
                    judged.len(),
                    rate * 100.0
                ),
                "operations",
            ));
        }
    }

    let revenue_today: f64 = snapshot
        .orders
        .iter()
        .filter(|o| o.status != OrderStatus::Cancelled && o.created_at.date_naive() == today)
        .map(|o| o.total)
        .sum();
    if now.hour() >= thresholds.revenue_check_hour
        && revenue_today == 0.0
        && snapshot.orders.len() > thresholds.revenue_min_orders
    {
        alerts.push(alert(
            RULE_NO_REVENUE,
            AlertSeverity::Warning,
            "No revenue today",
            format!("No paid orders so far today (hour {})", now.hour()),
            "operations",
        ));
    }

    let stale_shipped = snapshot
        .orders
        .iter()
        .filter(|o| {
            o.status == OrderStatus::Shipped
                && now - o.shipped_or_updated_at() > Duration::hours(thresholds.stale_shipped_hours)
        })
        .count();
    if stale_shipped > 0 {
        alerts.push(alert(
            RULE_STALE_SHIPPED,
            AlertSeverity::Warning,
            "Shipments running late",
            format!(
                "{stale_shipped} order(s) have been in transit for over {}h",
                thresholds.stale_shipped_hours
            ),
            "dispatch",
        ));
    }

    let signups_today = snapshot
        .users
        .iter()
        .filter(|u| u.created_at.date_naive() == today)
        .count();
    if now.hour() >= thresholds.signup_check_hour
        && signups_today == 0
        && snapshot.users.len() > thresholds.signup_min_users
    {
        alerts.push(alert(
            RULE_NO_SIGNUPS,
            AlertSeverity::Info,
            "No signups today",
            format!("No new users registered as of hour {}", now.hour()),
            "growth",
        ));
    }

    alerts
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use tokio::sync::broadcast;
    use uuid::Uuid;

    use super::*;
    use crate::error::OutboundError;
    use crate::models::driver::{DriverLocation, GeoPoint};
    use crate::models::user::UserRole;
    use crate::store::memory::MemoryStore;

    #[derive(Default)]
    struct RecordingWebhook {
        batches: Mutex<Vec<Vec<Alert>>>,
    }

    #[async_trait]
    impl AlertWebhook for RecordingWebhook {
        async fn send(&self, alerts: &[Alert]) -> Result<(), OutboundError> {
            self.batches.lock().unwrap().push(alerts.to_vec());
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingPush {
        messages: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl PushSender for RecordingPush {
        async fn multicast(
            &self,
            _tokens: &[String],
            title: &str,
            body: &str,
        ) -> Result<(), OutboundError> {
            self.messages
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
            Ok(())
        }
    }

    fn driver(seed: u128, status: DriverStatus) -> Driver {
        let now = Utc::now();
        Driver {
            id: Uuid::from_u128(seed),
            name: format!("driver-{seed}"),
            email: String::new(),
            phone: String::new(),
            status,
            is_available: status == DriverStatus::Online,
            current_order_id: None,
            vehicle_type: "bike".to_string(),
            location: Some(DriverLocation {
                point: GeoPoint {
                    lat: 48.85,
                    lng: 2.35,
                },
                heading: 0.0,
                speed: 0.0,
                recorded_at: now,
            }),
            rating: Some(4.0),
            completed_deliveries: 10,
            last_seen_at: now,
        }
    }

    fn dispute(seed: u128, status: DisputeStatus) -> Dispute {
        Dispute {
            id: Uuid::from_u128(seed),
            status,
            created_at: Utc::now(),
        }
    }

    fn empty_snapshot() -> PlatformSnapshot {
        PlatformSnapshot {
            drivers: Vec::new(),
            orders: Vec::new(),
            disputes: Vec::new(),
            verifications: Vec::new(),
            users: Vec::new(),
        }
    }

    fn quiet_hour() -> chrono::DateTime<Utc> {
        // before any hour-gated rule becomes active
        Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap()
    }

    #[test]
    fn clean_platform_raises_nothing() {
        let mut snapshot = empty_snapshot();
        snapshot.drivers.push(driver(1, DriverStatus::Online));

        let alerts = evaluate(&snapshot, &HealthThresholds::default(), quiet_hour());
        assert!(alerts.is_empty());
    }

    #[test]
    fn all_drivers_offline_is_critical() {
        let mut snapshot = empty_snapshot();
        snapshot.drivers.push(driver(1, DriverStatus::Offline));
        snapshot.drivers.push(driver(2, DriverStatus::Break));

        let alerts = evaluate(&snapshot, &HealthThresholds::default(), quiet_hour());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule, RULE_NO_DRIVERS);
        assert_eq!(alerts[0].severity, AlertSeverity::Critical);
    }

    #[test]
    fn no_drivers_registered_raises_nothing() {
        let alerts = evaluate(&empty_snapshot(), &HealthThresholds::default(), quiet_hour());
        assert!(alerts.is_empty());
    }

    #[test]
    fn saturation_above_ninety_percent_warns() {
        let mut snapshot = empty_snapshot();
        snapshot.drivers.push(driver(1, DriverStatus::Online));
        for seed in 2..=20u128 {
            snapshot.drivers.push(driver(seed, DriverStatus::Busy));
        }

        let alerts = evaluate(&snapshot, &HealthThresholds::default(), quiet_hour());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule, RULE_HIGH_UTILIZATION);
    }

    #[test]
    fn eleven_open_disputes_cross_the_threshold() {
        let mut snapshot = empty_snapshot();
        snapshot.drivers.push(driver(1, DriverStatus::Online));
        for seed in 1..=11u128 {
            snapshot.disputes.push(dispute(seed, DisputeStatus::Open));
        }
        snapshot.disputes.push(dispute(12, DisputeStatus::Resolved));

        let alerts = evaluate(&snapshot, &HealthThresholds::default(), quiet_hour());
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].rule, RULE_HIGH_DISPUTES);
    }

    #[test]
    fn ten_open_disputes_do_not() {
        let mut snapshot = empty_snapshot();
        snapshot.drivers.push(driver(1, DriverStatus::Online));
        for seed in 1..=10u128 {
            snapshot.disputes.push(dispute(seed, DisputeStatus::Open));
        }

        let alerts = evaluate(&snapshot, &HealthThresholds::default(), quiet_hour());
        assert!(alerts.is_empty());
    }

    #[test]
    fn evening_without_signups_is_informational() {
        let mut snapshot = empty_snapshot();
        snapshot.drivers.push(driver(1, DriverStatus::Online));
        let last_week = Utc.with_ymd_and_hms(2025, 5, 20, 10, 0, 0).unwrap();
        for seed in 1..=21u128 {
            snapshot.users.push(UserProfile {
                id: Uuid::from_u128(seed),
                role: UserRole::Client,
                name: format!("user-{seed}"),
                email: String::new(),
                phone: String::new(),
                created_at: last_week,
            });
        }

        let evening = Utc.with_ymd_and_hms(2025, 6, 1, 19, 0, 0).unwrap();
        let alerts = evaluate(&snapshot, &HealthThresholds::default(), evening);
        let signup_alert = alerts
            .iter()
            .find(|a| a.rule == RULE_NO_SIGNUPS)
            .expect("signup alert");
        assert_eq!(signup_alert.severity, AlertSeverity::Info);
    }

    async fn monitor_fixture(
        store: Arc<MemoryStore>,
    ) -> (HealthMonitor, Arc<RecordingWebhook>, Arc<RecordingPush>) {
        let webhook = Arc::new(RecordingWebhook::default());
        let push = Arc::new(RecordingPush::default());
        let (events_tx, _rx) = broadcast::channel(16);
        let monitor = HealthMonitor::new(
            store,
            webhook.clone(),
            push.clone(),
            HealthThresholds::default(),
            30,
            vec!["token-1".to_string()],
            Metrics::new(),
            events_tx,
        );
        (monitor, webhook, push)
    }

    #[tokio::test]
    async fn same_rule_is_suppressed_within_the_window_and_rearmed_after() {
        use crate::store::Store;

        let store = Arc::new(MemoryStore::new());
        store
            .upsert_driver(driver(1, DriverStatus::Online))
            .await
            .unwrap();
        for seed in 1..=11u128 {
            store
                .upsert_dispute(dispute(seed, DisputeStatus::Open))
                .await
                .unwrap();
        }

        let (monitor, webhook, _push) = monitor_fixture(store.clone()).await;
        let start = quiet_hour();

        monitor.run_once(start).await.unwrap();
        assert_eq!(webhook.batches.lock().unwrap().len(), 1);
        assert_eq!(store.alert_history().len(), 1);

        // ten minutes later the condition persists but the alert is deduped
        monitor.run_once(start + Duration::minutes(10)).await.unwrap();
        assert_eq!(webhook.batches.lock().unwrap().len(), 1);
        assert_eq!(store.alert_history().len(), 1);

        // after the window it fires again
        monitor.run_once(start + Duration::minutes(31)).await.unwrap();
        assert_eq!(webhook.batches.lock().unwrap().len(), 2);
        assert_eq!(store.alert_history().len(), 2);
    }

    #[tokio::test]
    async fn push_collapses_alerts_behind_a_critical_headline() {
        use crate::store::Store;

        let store = Arc::new(MemoryStore::new());
        // offline fleet (critical) plus a verification backlog (warning)
        store
            .upsert_driver(driver(1, DriverStatus::Offline))
            .await
            .unwrap();
        for seed in 1..=21u128 {
            store
                .upsert_verification(Verification {
                    id: Uuid::from_u128(seed),
                    status: VerificationStatus::Pending,
                    created_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let (monitor, webhook, push) = monitor_fixture(store.clone()).await;
        monitor.run_once(quiet_hour()).await.unwrap();

        let batches = webhook.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);

        let messages = push.messages.lock().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "No drivers on the road");
        assert!(messages[0].1.contains("+1 more alert"));
    }

    #[tokio::test]
    async fn admin_notifications_written_per_alert() {
        use crate::store::Store;

        let store = Arc::new(MemoryStore::new());
        store
            .upsert_driver(driver(1, DriverStatus::Offline))
            .await
            .unwrap();

        let (monitor, _webhook, _push) = monitor_fixture(store.clone()).await;
        monitor.run_once(quiet_hour()).await.unwrap();

        let notifications = store.notifications();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, "health.alert");
        assert_eq!(notifications[0].severity, AlertSeverity::Critical);
    }
}
