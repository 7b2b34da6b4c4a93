pub mod push;
pub mod sink;
pub mod webhook;

use async_trait::async_trait;
use tracing::debug;

use crate::error::OutboundError;
use crate::models::alert::Alert;
use crate::models::metric::MetricSample;

/// Batched alert delivery to an external webhook, one call per run.
#[async_trait]
pub trait AlertWebhook: Send + Sync {
    async fn send(&self, alerts: &[Alert]) -> Result<(), OutboundError>;
}

/// Multicast push to a set of device tokens, collapsed to one message.
#[async_trait]
pub trait PushSender: Send + Sync {
    async fn multicast(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
    ) -> Result<(), OutboundError>;
}

/// Batched sample delivery to the external time-series sink.
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn push(&self, samples: &[MetricSample]) -> Result<(), OutboundError>;
}

/// Drop-and-log stand-ins used when no endpoint is configured.
pub struct NullWebhook;

#[async_trait]
impl AlertWebhook for NullWebhook {
    async fn send(&self, alerts: &[Alert]) -> Result<(), OutboundError> {
        debug!(count = alerts.len(), "no webhook configured, alerts dropped");
        Ok(())
    }
}

pub struct NullPush;

#[async_trait]
impl PushSender for NullPush {
    async fn multicast(
        &self,
        tokens: &[String],
        title: &str,
        _body: &str,
    ) -> Result<(), OutboundError> {
        debug!(tokens = tokens.len(), title, "no push endpoint configured");
        Ok(())
    }
}

pub struct NullSink;

#[async_trait]
impl MetricsSink for NullSink {
    async fn push(&self, samples: &[MetricSample]) -> Result<(), OutboundError> {
        debug!(count = samples.len(), "no metrics sink configured, batch dropped");
        Ok(())
    }
}
