//! Slack operator alerts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cdd_cache::{LogOnlyNotifier, NotificationSink};
use cdd_core::{ConfigError, NotifyError};
use reqwest::Client;
use serde::Serialize;

use crate::config::NotifierConfig;
use crate::constants::{SLACK_ICON_EMOJI, SLACK_TIMEOUT_SECS};

/// Body of a Slack incoming-webhook message.
#[derive(Debug, Clone, Serialize)]
struct SlackMessage<'a> {
    channel: &'a str,
    username: &'a str,
    text: &'a str,
    icon_emoji: &'a str,
}

/// Posts alerts to a Slack incoming webhook.
///
/// The message is sent form-encoded as `payload=<json>`.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    client: Client,
    webhook_url: String,
    channel: String,
    username: String,
}

impl SlackNotifier {
    pub fn new(
        webhook_url: impl Into<String>,
        channel: impl Into<String>,
        username: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let webhook_url = webhook_url.into();
        reqwest::Url::parse(&webhook_url).map_err(|e| ConfigError::InvalidValue {
            field: "CDD_SLACK_URL".to_string(),
            value: webhook_url.clone(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .timeout(Duration::from_secs(SLACK_TIMEOUT_SECS))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "CDD_SLACK_URL".to_string(),
                value: webhook_url.clone(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            webhook_url,
            channel: channel.into(),
            username: username.into(),
        })
    }

    fn payload(&self, text: &str) -> Result<String, NotifyError> {
        serde_json::to_string(&SlackMessage {
            channel: &self.channel,
            username: &self.username,
            text,
            icon_emoji: SLACK_ICON_EMOJI,
        })
        .map_err(|e| NotifyError::Delivery {
            reason: format!("Failed to encode Slack payload: {}", e),
        })
    }
}

#[async_trait]
impl NotificationSink for SlackNotifier {
    async fn notify(&self, message: &str) -> Result<(), NotifyError> {
        let payload = self.payload(message)?;

        let response = self
            .client
            .post(&self.webhook_url)
            .form(&[("payload", payload)])
            .send()
            .await
            .map_err(|e| NotifyError::Delivery {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(status = %status, "Slack rejected operator alert");
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
            });
        }

        tracing::info!(channel = %self.channel, "Operator alert sent to Slack");
        Ok(())
    }
}

/// Build the configured sink: Slack when a webhook URL is set, otherwise
/// one that only logs.
pub fn build_notifier(config: &NotifierConfig) -> Result<Arc<dyn NotificationSink>, ConfigError> {
    match &config.slack_url {
        Some(url) => Ok(Arc::new(SlackNotifier::new(
            url.clone(),
            config.channel.clone(),
            config.username.clone(),
        )?)),
        None => {
            tracing::warn!("CDD_SLACK_URL not set; operator alerts will only be logged");
            Ok(Arc::new(LogOnlyNotifier))
        }
    }
}
