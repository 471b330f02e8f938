//! The three ports the orchestrator drives. Each is served either in process
//! (`local`) or by another relay process over HTTP (`crate::remote`).

use async_trait::async_trait;
use common::ValidationError;
use common::models::{Candle, Pattern, Signal};
use storage::StorageError;
use thiserror::Error;

use crate::services::dispatch_service::DispatchReceipt;

pub mod local;

pub use local::{LocalPatternStage, LocalSignalStage};

#[derive(Error, Debug)]
pub enum StageError {
    #[error("Invalid payload: {0}")]
    Validation(#[from] ValidationError),
    #[error("Log store error: {0}")]
    Storage(#[from] StorageError),
    #[error("{stage} call failed: {reason}")]
    Upstream { stage: &'static str, reason: String },
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PatternStage: Send + Sync {
    async fn detect(&self, candle: &Candle, history: &[Candle]) -> Result<Pattern, StageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalStage: Send + Sync {
    /// `Ok(None)` is a deliberate decline, not a failure.
    async fn generate(&self, pattern: &Pattern, candle: &Candle) -> Result<Option<Signal>, StageError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DispatchStage: Send + Sync {
    async fn dispatch(&self, signal: Signal) -> Result<DispatchReceipt, StageError>;
}
