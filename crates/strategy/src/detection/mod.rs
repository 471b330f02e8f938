use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::models::{Candle, Pattern};
use tracing::info;

use crate::errors::{DetectionBackendError, StrategyConfigError};
use crate::remote::OllamaClient;

pub mod ai;
pub mod prompt;
pub mod rule_based;

pub use ai::AiDetector;
pub use rule_based::RuleBasedDetector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorKind {
    Ai,
    Rule,
}

impl fmt::Display for DetectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ai => write!(f, "ai"),
            Self::Rule => write!(f, "rule"),
        }
    }
}

impl FromStr for DetectorKind {
    type Err = StrategyConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" | "ollama" => Ok(Self::Ai),
            "rule" | "rules" => Ok(Self::Rule),
            other => Err(StrategyConfigError::UnknownVariant {
                name: "pattern strategy",
                value: other.to_string(),
            }),
        }
    }
}

/// Classifies one candle, optionally with the candles that preceded it.
///
/// Implementations always return a pattern. The variant that actually
/// produced it is recorded in [`Pattern::method`].
#[async_trait]
pub trait PatternDetector: Send + Sync {
    fn kind(&self) -> DetectorKind;

    async fn detect(&self, candle: &Candle, history: &[Candle]) -> Pattern;

    /// Same contract as `detect`, asking for a longer narrative where the
    /// variant supports it.
    async fn explain(&self, candle: &Candle, history: &[Candle]) -> Pattern {
        self.detect(candle, history).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AiConfig {
    pub api_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:11434/api/chat".to_string(),
            model: "llama3:8b".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
    pub kind: DetectorKind,
    pub ai: AiConfig,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            kind: DetectorKind::Rule,
            ai: AiConfig::default(),
        }
    }
}

pub fn build_detector(config: &DetectorConfig) -> Result<Arc<dyn PatternDetector>, DetectionBackendError> {
    match config.kind {
        DetectorKind::Rule => {
            info!("Pattern detection: rule-based");
            Ok(Arc::new(RuleBasedDetector::new()))
        }
        DetectorKind::Ai => {
            info!(
                "Pattern detection: AI via {} ({}), rule-based fallback",
                config.ai.api_url, config.ai.model
            );
            let client = OllamaClient::new(&config.ai)?;
            Ok(Arc::new(AiDetector::new(Arc::new(client), config.ai.timeout)))
        }
    }
}
