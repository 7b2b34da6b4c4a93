use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::driver::DriverStatus;
use crate::models::metric::MetricSample;
use crate::models::order::OrderStatus;
use crate::models::records::{DisputeStatus, VerificationStatus};
use crate::models::user::UserRole;
use crate::observability::metrics::Metrics;
use crate::outbound::MetricsSink;
use crate::store::Store;

/// Derives the business counters once per cadence tick and ships them as a
/// single batch. A failed push skips the run; the next tick rebuilds
/// everything from scratch.
pub struct MetricsAggregator {
    store: Arc<dyn Store>,
    sink: Arc<dyn MetricsSink>,
    interval_secs: u64,
    metrics: Metrics,
}

impl MetricsAggregator {
    pub fn new(
        store: Arc<dyn Store>,
        sink: Arc<dyn MetricsSink>,
        interval_secs: u64,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            sink,
            interval_secs,
            metrics,
        }
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<(), AppError> {
        let samples = self.collect(now).await?;

        if let Err(err) = self.sink.push(&samples).await {
            warn!(error = %err, count = samples.len(), "metrics push failed, run skipped");
            self.metrics
                .outbound_failures_total
                .with_label_values(&["sink"])
                .inc();
            return Ok(());
        }

        debug!(count = samples.len(), "metrics batch shipped");
        Ok(())
    }

    /// One full scan; every sample in the batch shares `now` as timestamp.
    pub async fn collect(&self, now: DateTime<Utc>) -> Result<Vec<MetricSample>, AppError> {
        let orders = self.store.list_orders().await?;
        let users = self.store.list_users().await?;
        let drivers = self.store.list_drivers().await?;
        let verifications = self.store.list_verifications().await?;
        let disputes = self.store.list_disputes().await?;
        let shops = self.store.list_shops().await?;

        let today = now.date_naive();
        let time = now.timestamp();
        let interval = self.interval_secs;
        let mut samples = Vec::with_capacity(40);
        let mut sample =
            |name: &str, value: f64| samples.push(MetricSample::new(name, value, interval, time));

        sample("orders.total", orders.len() as f64);
        sample(
            "orders.today",
            orders
                .iter()
                .filter(|o| o.created_at.date_naive() == today)
                .count() as f64,
        );
        for status in [
            OrderStatus::Created,
            OrderStatus::Paid,
            OrderStatus::Confirmed,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            sample(
                &format!("orders.status.{}", status.as_str()),
                orders.iter().filter(|o| o.status == status).count() as f64,
            );
        }

        let billable: Vec<f64> = orders
            .iter()
            .filter(|o| o.status != OrderStatus::Cancelled)
            .map(|o| o.total)
            .collect();
        let revenue_total: f64 = billable.iter().sum();
        sample("orders.revenue.total", revenue_total);
        sample(
            "orders.revenue.today",
            orders
                .iter()
                .filter(|o| o.status != OrderStatus::Cancelled && o.created_at.date_naive() == today)
                .map(|o| o.total)
                .sum(),
        );
        sample(
            "orders.avg_value",
            if billable.is_empty() {
                0.0
            } else {
                revenue_total / billable.len() as f64
            },
        );
        sample(
            "orders.delivery_fees.total",
            orders.iter().map(|o| o.delivery_fee).sum(),
        );

        let judged: Vec<_> = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered && o.estimated_delivery.is_some())
            .collect();
        let on_time_rate = if judged.is_empty() {
            // nothing delivered yet counts as a perfect record
            100.0
        } else {
            let on_time = judged
                .iter()
                .filter(|o| {
                    o.estimated_delivery
                        .is_some_and(|eta| o.delivered_at.unwrap_or(o.updated_at) <= eta)
                })
                .count();
            (on_time as f64 * 100.0 / judged.len() as f64).round()
        };
        sample("orders.on_time_rate", on_time_rate);

        let delivery_minutes: Vec<f64> = orders
            .iter()
            .filter(|o| o.status == OrderStatus::Delivered)
            .filter_map(|o| o.delivered_at.map(|done| (done - o.created_at).num_minutes() as f64))
            .collect();
        sample(
            "orders.avg_delivery_minutes",
            if delivery_minutes.is_empty() {
                0.0
            } else {
                delivery_minutes.iter().sum::<f64>() / delivery_minutes.len() as f64
            },
        );

        let mut zones: BTreeMap<String, usize> = BTreeMap::new();
        for order in &orders {
            if let Some(zone) = &order.zone {
                *zones.entry(zone.clone()).or_default() += 1;
            }
        }
        for (zone, count) in zones {
            sample(&format!("orders.zone.{zone}"), count as f64);
        }

        sample("users.total", users.len() as f64);
        sample(
            "users.today",
            users
                .iter()
                .filter(|u| u.created_at.date_naive() == today)
                .count() as f64,
        );
        for (name, role) in [
            ("users.role.client", UserRole::Client),
            ("users.role.driver", UserRole::Driver),
            ("users.role.merchant", UserRole::Merchant),
        ] {
            sample(name, users.iter().filter(|u| u.role == role).count() as f64);
        }

        // active customers by order recency
        for (name, days) in [("users.dau", 1), ("users.wau", 7), ("users.mau", 30)] {
            let cutoff = now - Duration::days(days);
            let active: HashSet<Uuid> = orders
                .iter()
                .filter(|o| o.created_at >= cutoff)
                .map(|o| o.customer_id)
                .collect();
            sample(name, active.len() as f64);
        }

        let online = drivers
            .iter()
            .filter(|d| d.status == DriverStatus::Online)
            .count();
        let busy = drivers
            .iter()
            .filter(|d| d.status == DriverStatus::Busy)
            .count();
        sample("drivers.total", drivers.len() as f64);
        sample("drivers.online", online as f64);
        sample("drivers.busy", busy as f64);
        sample(
            "drivers.available",
            drivers.iter().filter(|d| d.is_available).count() as f64,
        );
        sample(
            "drivers.utilization_pct",
            if online + busy == 0 {
                0.0
            } else {
                (busy as f64 * 100.0 / (online + busy) as f64).round()
            },
        );
        let ratings: Vec<f64> = drivers.iter().filter_map(|d| d.rating).collect();
        sample(
            "drivers.avg_rating",
            if ratings.is_empty() {
                0.0
            } else {
                ratings.iter().sum::<f64>() / ratings.len() as f64
            },
        );

        sample(
            "verifications.pending",
            verifications
                .iter()
                .filter(|v| v.status == VerificationStatus::Pending)
                .count() as f64,
        );
        sample(
            "verifications.approved",
            verifications
                .iter()
                .filter(|v| v.status == VerificationStatus::Approved)
                .count() as f64,
        );
        sample(
            "disputes.open",
            disputes
                .iter()
                .filter(|d| d.status == DisputeStatus::Open)
                .count() as f64,
        );
        sample("disputes.total", disputes.len() as f64);
        sample("shops.total", shops.len() as f64);

        Ok(samples)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    use super::MetricsAggregator;
    use crate::error::OutboundError;
    use crate::models::driver::GeoPoint;
    use crate::models::metric::MetricSample;
    use crate::models::order::{Order, OrderStatus};
    use crate::observability::metrics::Metrics;
    use crate::outbound::MetricsSink;
    use crate::store::Store;
    use crate::store::memory::MemoryStore;

    #[derive(Default)]
    struct RecordingSink {
        batches: Mutex<Vec<Vec<MetricSample>>>,
    }

    #[async_trait]
    impl MetricsSink for RecordingSink {
        async fn push(&self, samples: &[MetricSample]) -> Result<(), OutboundError> {
            self.batches.lock().unwrap().push(samples.to_vec());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl MetricsSink for FailingSink {
        async fn push(&self, _samples: &[MetricSample]) -> Result<(), OutboundError> {
            Err(OutboundError::Timeout)
        }
    }

    fn order(seed: u128, customer_seed: u128, status: OrderStatus, ago: Duration) -> Order {
        let created = Utc::now() - ago;
        Order {
            id: Uuid::from_u128(seed),
            status,
            customer_id: Uuid::from_u128(customer_seed),
            driver_id: None,
            driver_name: None,
            driver_phone: None,
            shop_id: None,
            total: 20.0,
            delivery_fee: 2.5,
            items_count: 1,
            pickup: GeoPoint {
                lat: 48.85,
                lng: 2.35,
            },
            dropoff: GeoPoint {
                lat: 48.87,
                lng: 2.36,
            },
            zone: Some("center".to_string()),
            timeline: Vec::new(),
            created_at: created,
            updated_at: created,
            shipped_at: None,
            delivered_at: None,
            estimated_delivery: None,
        }
    }

    fn aggregator(store: Arc<MemoryStore>, sink: Arc<dyn MetricsSink>) -> MetricsAggregator {
        MetricsAggregator::new(store, sink, 300, Metrics::new())
    }

    fn value_of(samples: &[MetricSample], name: &str) -> f64 {
        samples
            .iter()
            .find(|s| s.name == name)
            .unwrap_or_else(|| panic!("missing sample {name}"))
            .value
    }

    #[tokio::test]
    async fn on_time_rate_is_perfect_without_deliveries() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_order(order(1, 1, OrderStatus::Created, Duration::zero()))
            .await
            .unwrap();

        let samples = aggregator(store, Arc::new(RecordingSink::default()))
            .collect(Utc::now())
            .await
            .unwrap();

        assert_eq!(value_of(&samples, "orders.on_time_rate"), 100.0);
    }

    #[tokio::test]
    async fn active_user_windows_count_distinct_customers() {
        let store = Arc::new(MemoryStore::new());
        // customer 1 ordered twice today, customer 2 five days ago,
        // customer 3 three weeks ago
        store
            .upsert_order(order(1, 1, OrderStatus::Delivered, Duration::hours(2)))
            .await
            .unwrap();
        store
            .upsert_order(order(2, 1, OrderStatus::Created, Duration::hours(5)))
            .await
            .unwrap();
        store
            .upsert_order(order(3, 2, OrderStatus::Delivered, Duration::days(5)))
            .await
            .unwrap();
        store
            .upsert_order(order(4, 3, OrderStatus::Delivered, Duration::days(21)))
            .await
            .unwrap();

        let samples = aggregator(store, Arc::new(RecordingSink::default()))
            .collect(Utc::now())
            .await
            .unwrap();

        assert_eq!(value_of(&samples, "users.dau"), 1.0);
        assert_eq!(value_of(&samples, "users.wau"), 2.0);
        assert_eq!(value_of(&samples, "users.mau"), 3.0);
    }

    #[tokio::test]
    async fn one_batch_per_run_with_a_shared_timestamp() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_order(order(1, 1, OrderStatus::Created, Duration::zero()))
            .await
            .unwrap();

        let sink = Arc::new(RecordingSink::default());
        aggregator(store, sink.clone())
            .run_once(Utc::now())
            .await
            .unwrap();

        let batches = sink.batches.lock().unwrap();
        assert_eq!(batches.len(), 1);
        let batch = &batches[0];
        assert!(batch.len() >= 28);
        assert!(batch.iter().all(|s| s.time == batch[0].time));
        assert!(batch.iter().all(|s| s.interval == 300));
    }

    #[tokio::test]
    async fn failed_push_skips_the_run_without_erroring() {
        let store = Arc::new(MemoryStore::new());
        let result = aggregator(store, Arc::new(FailingSink))
            .run_once(Utc::now())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn cancelled_orders_are_excluded_from_revenue() {
        let store = Arc::new(MemoryStore::new());
        store
            .upsert_order(order(1, 1, OrderStatus::Delivered, Duration::hours(1)))
            .await
            .unwrap();
        store
            .upsert_order(order(2, 2, OrderStatus::Cancelled, Duration::hours(1)))
            .await
            .unwrap();

        let samples = aggregator(store, Arc::new(RecordingSink::default()))
            .collect(Utc::now())
            .await
            .unwrap();

        assert_eq!(value_of(&samples, "orders.revenue.total"), 20.0);
        assert_eq!(value_of(&samples, "orders.status.cancelled"), 1.0);
        assert_eq!(value_of(&samples, "orders.zone.center"), 2.0);
    }
}
