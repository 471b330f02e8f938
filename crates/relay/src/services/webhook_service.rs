use std::time::Duration;

use async_trait::async_trait;
use common::models::Signal;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Webhook request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Webhook answered with status {0}")]
    Status(u16),
}

/// Best-effort sink told about every persisted signal.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalNotifier: Send + Sync {
    async fn notify(&self, signal: &Signal) -> Result<(), NotificationError>;
}

/// POSTs the persisted signal as JSON to a fixed URL.
pub struct WebhookNotifier {
    client: Client,
    url: String,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder()
            .user_agent(concat!("candle_signal_relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, url: url.into() })
    }
}

#[async_trait]
impl SignalNotifier for WebhookNotifier {
    async fn notify(&self, signal: &Signal) -> Result<(), NotificationError> {
        let response = self.client.post(&self.url).json(signal).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(NotificationError::Status(status.as_u16()));
        }
        debug!("Webhook {} accepted signal {:?}", self.url, signal.id);
        Ok(())
    }
}
