pub mod aggregator;
pub mod health;

use std::sync::Arc;

use chrono::Utc;
use tokio::time::{Duration, interval};
use tracing::{error, info};

use crate::state::AppState;

/// Drives the health monitor on its fixed cadence. Failures are reported
/// and retried naturally on the next tick.
pub async fn run_health_loop(state: Arc<AppState>, interval_secs: u64) {
    info!(interval_secs, "health monitor started");
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;
        let outcome = match state.health.run_once(Utc::now()).await {
            Ok(()) => "success",
            Err(err) => {
                error!(error = %err, "health run failed");
                "error"
            }
        };
        state
            .metrics
            .monitor_runs_total
            .with_label_values(&["health", outcome])
            .inc();
    }
}

/// Drives the metrics aggregator independently on the same cadence.
pub async fn run_aggregator_loop(state: Arc<AppState>, interval_secs: u64) {
    info!(interval_secs, "metrics aggregator started");
    let mut ticker = interval(Duration::from_secs(interval_secs));

    loop {
        ticker.tick().await;
        let outcome = match state.aggregator.run_once(Utc::now()).await {
            Ok(()) => "success",
            Err(err) => {
                error!(error = %err, "aggregation run failed");
                "error"
            }
        };
        state
            .metrics
            .monitor_runs_total
            .with_label_values(&["aggregator", outcome])
            .inc();
    }
}
