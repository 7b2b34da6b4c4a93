use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Value, json};

use crate::error::OutboundError;
use crate::models::alert::{Alert, AlertSeverity};
use crate::outbound::AlertWebhook;

const COLOR_CRITICAL: u32 = 0xe7_4c_3c;
const COLOR_WARNING: u32 = 0xf1_c4_0f;
const COLOR_INFO: u32 = 0x34_98_db;

/// Posts one embed-formatted batch per health-check run.
pub struct EmbedWebhook {
    client: reqwest::Client,
    url: String,
}

impl EmbedWebhook {
    pub fn new(url: String, timeout: Duration) -> Result<Self, OutboundError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OutboundError::from)?;
        Ok(Self { client, url })
    }

    fn embed(alert: &Alert) -> Value {
        let color = match alert.severity {
            AlertSeverity::Critical => COLOR_CRITICAL,
            AlertSeverity::Warning => COLOR_WARNING,
            AlertSeverity::Info => COLOR_INFO,
        };

        json!({
            "title": alert.title,
            "description": alert.message,
            "color": color,
            "fields": [
                { "name": "Severity", "value": alert.severity.as_str(), "inline": true },
                { "name": "Team", "value": alert.team, "inline": true },
            ],
            "timestamp": Utc::now().to_rfc3339(),
        })
    }
}

#[async_trait]
impl AlertWebhook for EmbedWebhook {
    async fn send(&self, alerts: &[Alert]) -> Result<(), OutboundError> {
        let embeds: Vec<Value> = alerts.iter().map(Self::embed).collect();

        self.client
            .post(&self.url)
            .json(&json!({ "embeds": embeds }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
