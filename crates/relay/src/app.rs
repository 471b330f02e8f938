use std::sync::Arc;

use storage::{SignalLog, StorageError};
use strategy::errors::StrategyConfigError;
use strategy::{DetectionBackendError, build_detector, build_generator};
use thiserror::Error;
use tracing::info;

use crate::api::AppState;
use crate::config::{RelayConfig, Role};
use crate::remote::remote_stages;
use crate::services::dispatch_service::SignalDispatcher;
use crate::services::orchestrator::Orchestrator;
use crate::services::webhook_service::{NotificationError, WebhookNotifier};
use crate::stages::{LocalPatternStage, LocalSignalStage};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Pattern detector setup failed: {0}")]
    Detector(#[from] DetectionBackendError),
    #[error("Signal generator setup failed: {0}")]
    Generator(#[from] StrategyConfigError),
    #[error("Signal log setup failed: {0}")]
    Storage(#[from] StorageError),
    #[error("Webhook setup failed: {0}")]
    Webhook(#[from] NotificationError),
    #[error("Stage client setup failed: {0}")]
    StageClient(#[from] reqwest::Error),
}

/// Everything one role needs, wired from configuration.
pub struct App {
    pub state: AppState,
    pub log: Option<Arc<SignalLog>>,
}

impl App {
    pub async fn build(role: Role, config: &RelayConfig) -> Result<Self, StartupError> {
        let detector = if role.serves_detector() {
            Some(build_detector(&config.detector)?)
        } else {
            None
        };

        let generator = if role.serves_generator() {
            Some(build_generator(&config.signals)?)
        } else {
            None
        };

        let (log, dispatcher) = if role.serves_dispatcher() {
            let log = Arc::new(SignalLog::open(&config.log_dir).await?);
            let mut dispatcher = SignalDispatcher::new(log.clone());
            if let Some(url) = &config.webhook_url {
                info!("Webhook notifications to {}", url);
                let notifier = WebhookNotifier::new(url.clone(), config.webhook_timeout)?;
                dispatcher = dispatcher.with_notifier(Arc::new(notifier));
            }
            (Some(log), Some(Arc::new(dispatcher)))
        } else {
            (None, None)
        };

        let orchestrator = match (role, &detector, &generator, &dispatcher) {
            (Role::All, Some(detector), Some(generator), Some(dispatcher)) => Some(Orchestrator::new(
                Arc::new(LocalPatternStage::new(detector.clone())),
                Arc::new(LocalSignalStage::new(generator.clone())),
                dispatcher.clone(),
                config.timeouts.clone(),
            )),
            (Role::Mcp, ..) => {
                info!(
                    "Remote stages: detect={} generate={} dispatch={}",
                    config.stage_urls.detector, config.stage_urls.generator, config.stage_urls.dispatcher
                );
                let (detect, generate, dispatch) = remote_stages(&config.stage_urls, &config.timeouts)?;
                Some(Orchestrator::new(
                    Arc::new(detect),
                    Arc::new(generate),
                    Arc::new(dispatch),
                    config.timeouts.clone(),
                ))
            }
            _ => None,
        };

        Ok(Self {
            state: AppState {
                service: role.service_name(),
                orchestrator: orchestrator.map(Arc::new),
                detector,
                generator,
                dispatcher,
            },
            log,
        })
    }

    /// Lets queued notifications finish, then flushes and closes every open
    /// partition.
    pub async fn shutdown(&self) {
        if let Some(dispatcher) = &self.state.dispatcher {
            dispatcher.drain_notifications().await;
        }
        if let Some(log) = &self.log {
            log.close().await;
        }
    }
}
