//! Slack incoming webhook channel

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::DeployError;
use crate::notify::notifier::NotificationChannel;

/// Attachment color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Warning,
    Good,
    Danger,
}

/// A webhook message with one attachment per notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    pub title: String,
    pub color: Color,
    pub text: String,
    pub footer: String,
    pub footer_icon: String,
}

/// Posts messages to a Slack incoming webhook
pub struct SlackWebhook {
    client: Client,
    url: SecretString,
}

impl SlackWebhook {
    pub fn new(url: SecretString) -> Result<Self, DeployError> {
        Url::parse(url.expose_secret())
            .map_err(|e| DeployError::ConfigError(format!("Invalid webhook URL: {}", e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationChannel for SlackWebhook {
    async fn send(&self, message: &SlackMessage) -> Result<(), DeployError> {
        debug!("POST webhook ({} attachments)", message.attachments.len());

        let response = self
            .client
            .post(self.url.expose_secret())
            .json(message)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Webhook POST failed: {} - {}", status, body);
            return Err(DeployError::NotificationError(format!("{}: {}", status, body)));
        }

        Ok(())
    }
}
