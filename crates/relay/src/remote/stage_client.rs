use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use common::models::{Candle, Pattern, Signal};
use reqwest::Client;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::api::payloads::{DetectCall, DetectResponse, DispatchCall, GenerateCall, GenerateResponse};
use crate::config::{StageTimeouts, StageUrls};
use crate::services::dispatch_service::DispatchReceipt;
use crate::stages::{DispatchStage, PatternStage, SignalStage, StageError};

/// JSON-over-HTTP call to one stage endpoint of another relay process.
#[derive(Clone)]
pub struct StageClient {
    client: Client,
    url: String,
    stage: &'static str,
}

impl StageClient {
    pub fn new(stage: &'static str, url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("candle_signal_relay/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            stage,
        })
    }

    fn upstream(&self, reason: impl Display) -> StageError {
        StageError::Upstream {
            stage: self.stage,
            reason: reason.to_string(),
        }
    }

    async fn call<B, R>(&self, body: &B) -> Result<R, StageError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.upstream(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.upstream(format!("{} answered {}: {}", self.url, status.as_u16(), text)));
        }

        let raw = response.text().await.map_err(|e| self.upstream(e))?;
        debug!("{} <- {}", self.stage, raw);
        serde_json::from_str(&raw).map_err(|e| self.upstream(format!("undecodable reply: {}", e)))
    }
}

pub struct RemotePatternStage(StageClient);
pub struct RemoteSignalStage(StageClient);
pub struct RemoteDispatchStage(StageClient);

impl RemotePatternStage {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self(StageClient::new("pattern detector", url, timeout)?))
    }
}

impl RemoteSignalStage {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self(StageClient::new("signal generator", url, timeout)?))
    }
}

impl RemoteDispatchStage {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self(StageClient::new("signal dispatcher", url, timeout)?))
    }
}

/// All three remote stages, each bounded by its own timeout.
pub fn remote_stages(
    urls: &StageUrls,
    timeouts: &StageTimeouts,
) -> Result<(RemotePatternStage, RemoteSignalStage, RemoteDispatchStage), reqwest::Error> {
    Ok((
        RemotePatternStage::new(&urls.detector, timeouts.detect)?,
        RemoteSignalStage::new(&urls.generator, timeouts.generate)?,
        RemoteDispatchStage::new(&urls.dispatcher, timeouts.dispatch)?,
    ))
}

#[async_trait]
impl PatternStage for RemotePatternStage {
    async fn detect(&self, candle: &Candle, history: &[Candle]) -> Result<Pattern, StageError> {
        let reply: DetectResponse = self.0.call(&DetectCall { candle, history }).await?;
        Ok(reply.pattern)
    }
}

#[async_trait]
impl SignalStage for RemoteSignalStage {
    async fn generate(&self, pattern: &Pattern, candle: &Candle) -> Result<Option<Signal>, StageError> {
        let reply: GenerateResponse = self.0.call(&GenerateCall { pattern, candle }).await?;
        Ok(reply.signal)
    }
}

#[async_trait]
impl DispatchStage for RemoteDispatchStage {
    async fn dispatch(&self, signal: Signal) -> Result<DispatchReceipt, StageError> {
        self.0.call(&DispatchCall { signal: &signal }).await
    }
}
