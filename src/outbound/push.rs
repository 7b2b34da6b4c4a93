use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::error::OutboundError;
use crate::outbound::PushSender;

/// Sends one multicast message to all admin device tokens.
pub struct MulticastPush {
    client: reqwest::Client,
    url: String,
}

impl MulticastPush {
    pub fn new(url: String, timeout: Duration) -> Result<Self, OutboundError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(OutboundError::from)?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl PushSender for MulticastPush {
    async fn multicast(
        &self,
        tokens: &[String],
        title: &str,
        body: &str,
    ) -> Result<(), OutboundError> {
        if tokens.is_empty() {
            return Ok(());
        }

        self.client
            .post(&self.url)
            .json(&json!({
                "registration_ids": tokens,
                "collapse_key": "platform-alerts",
                "notification": {
                    "title": title,
                    "body": body,
                },
            }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }
}
