use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::models::{Candle, Pattern};
use tokio::time;
use tracing::{debug, info, warn};

use crate::detection::prompt::Prompt;
use crate::detection::{DetectorKind, PatternDetector, RuleBasedDetector};
use crate::errors::DetectionBackendError;
use crate::remote::{LanguageModel, llm_response};

/// Language-model classification with a per-call rule-based fallback.
pub struct AiDetector {
    model: Arc<dyn LanguageModel>,
    fallback: RuleBasedDetector,
    timeout: Duration,
}

impl AiDetector {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model,
            fallback: RuleBasedDetector::new(),
            timeout,
        }
    }

    async fn ask(&self, prompt: Prompt, candle: &Candle, history: &[Candle]) -> Pattern {
        match self.query(&prompt).await {
            Ok(pattern) => {
                info!(
                    "AI detected {} ({}, strength {}) for {}",
                    pattern.pattern_type, pattern.direction, pattern.strength, candle.symbol
                );
                pattern
            }
            Err(e) => {
                warn!(
                    "AI detection failed for {} at {}: {}. Using rule-based fallback.",
                    candle.symbol, candle.timestamp, e
                );
                self.fallback.classify(candle, history)
            }
        }
    }

    async fn query(&self, prompt: &Prompt) -> Result<Pattern, DetectionBackendError> {
        let reply = time::timeout(self.timeout, self.model.complete(prompt))
            .await
            .map_err(|_| DetectionBackendError::Timeout(self.timeout))??;

        debug!("AI raw reply: {}", reply);
        llm_response::parse_pattern(&reply)
    }
}

#[async_trait]
impl PatternDetector for AiDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Ai
    }

    async fn detect(&self, candle: &Candle, history: &[Candle]) -> Pattern {
        self.ask(Prompt::classify(candle, history), candle, history).await
    }

    async fn explain(&self, candle: &Candle, history: &[Candle]) -> Pattern {
        self.ask(Prompt::explain(candle, history), candle, history).await
    }
}
