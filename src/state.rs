use std::sync::Arc;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::engine::lifecycle::OrderLifecycle;
use crate::engine::matching::DriverMatcher;
use crate::engine::profile_sync::DriverProfileSync;
use crate::models::candidate::EngineEvent;
use crate::monitor::aggregator::MetricsAggregator;
use crate::monitor::health::HealthMonitor;
use crate::observability::metrics::Metrics;
use crate::outbound::{AlertWebhook, MetricsSink, PushSender};
use crate::store::Store;

/// Everything the handlers and monitor loops share. All components receive
/// their collaborators here; nothing reaches for process-wide globals.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub lifecycle: OrderLifecycle,
    pub profile_sync: DriverProfileSync,
    pub health: HealthMonitor,
    pub aggregator: MetricsAggregator,
    pub events_tx: broadcast::Sender<EngineEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        webhook: Arc<dyn AlertWebhook>,
        push: Arc<dyn PushSender>,
        sink: Arc<dyn MetricsSink>,
    ) -> Self {
        let metrics = Metrics::new();
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);

        let matcher = DriverMatcher::new(
            store.clone(),
            config.service_radius_km,
            metrics.clone(),
            events_tx.clone(),
        );
        let lifecycle = OrderLifecycle::new(store.clone(), matcher, metrics.clone());
        let profile_sync = DriverProfileSync::new(store.clone());
        let health = HealthMonitor::new(
            store.clone(),
            webhook,
            push,
            config.thresholds.clone(),
            config.alert_dedup_minutes,
            config.admin_device_tokens.clone(),
            metrics.clone(),
            events_tx.clone(),
        );
        let aggregator = MetricsAggregator::new(
            store.clone(),
            sink,
            config.monitor_interval_secs,
            metrics.clone(),
        );

        Self {
            store,
            lifecycle,
            profile_sync,
            health,
            aggregator,
            events_tx,
            metrics,
        }
    }
}
