mod api;
mod config;
mod engine;
mod error;
mod feed;
mod geo;
mod models;
mod monitor;
mod observability;
mod outbound;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::outbound::push::MulticastPush;
use crate::outbound::sink::HttpMetricsSink;
use crate::outbound::webhook::EmbedWebhook;
use crate::outbound::{AlertWebhook, MetricsSink, NullPush, NullSink, NullWebhook, PushSender};
use crate::store::memory::MemoryStore;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let store: Arc<dyn store::Store> = Arc::new(MemoryStore::new());
    let timeout = config.outbound_timeout();

    let webhook: Arc<dyn AlertWebhook> = match &config.alert_webhook_url {
        Some(url) => Arc::new(EmbedWebhook::new(url.clone(), timeout)?),
        None => Arc::new(NullWebhook),
    };
    let push: Arc<dyn PushSender> = match &config.push_endpoint {
        Some(url) => Arc::new(MulticastPush::new(url.clone(), timeout)?),
        None => Arc::new(NullPush),
    };
    let sink: Arc<dyn MetricsSink> = match &config.metrics_sink_url {
        Some(url) => Arc::new(HttpMetricsSink::new(url.clone(), timeout)?),
        None => Arc::new(NullSink),
    };

    let shared_state = Arc::new(state::AppState::new(&config, store, webhook, push, sink));

    let app = api::rest::router(shared_state.clone());

    tokio::spawn(monitor::run_health_loop(
        shared_state.clone(),
        config.monitor_interval_secs,
    ));
    tokio::spawn(monitor::run_aggregator_loop(
        shared_state.clone(),
        config.monitor_interval_secs,
    ));

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
