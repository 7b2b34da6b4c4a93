use std::time::Duration;

use async_trait::async_trait;

use crate::error::OutboundError;
use crate::models::metric::MetricSample;
use crate::outbound::MetricsSink;

/// Ships one `[{name, value, interval, time}]` batch per aggregation run.
pub struct HttpMetricsSink {
    client: reqwest::Client,
    url: String,
}

impl HttpMetricsSink {
    pub fn new(url: String, timeout: Duration) -> Result<Self, OutboundError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OutboundError::from)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl MetricsSink for HttpMetricsSink {
    async fn push(&self, samples: &[MetricSample]) -> Result<(), OutboundError> {
        self.client
            .post(&self.url)
            .json(samples)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
