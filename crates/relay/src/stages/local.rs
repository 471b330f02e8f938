use std::sync::Arc;

use async_trait::async_trait;
use common::models::{Candle, Pattern, Signal};
use strategy::{PatternDetector, SignalGenerator};

use crate::services::dispatch_service::{DispatchReceipt, SignalDispatcher};
use crate::stages::{DispatchStage, PatternStage, SignalStage, StageError};

pub struct LocalPatternStage {
    detector: Arc<dyn PatternDetector>,
}

impl LocalPatternStage {
    pub fn new(detector: Arc<dyn PatternDetector>) -> Self {
        Self { detector }
    }
}

#[async_trait]
impl PatternStage for LocalPatternStage {
    async fn detect(&self, candle: &Candle, history: &[Candle]) -> Result<Pattern, StageError> {
        Ok(self.detector.detect(candle, history).await)
    }
}

pub struct LocalSignalStage {
    generator: Arc<dyn SignalGenerator>,
}

impl LocalSignalStage {
    pub fn new(generator: Arc<dyn SignalGenerator>) -> Self {
        Self { generator }
    }
}

#[async_trait]
impl SignalStage for LocalSignalStage {
    async fn generate(&self, pattern: &Pattern, candle: &Candle) -> Result<Option<Signal>, StageError> {
        Ok(self.generator.generate(pattern, candle))
    }
}

#[async_trait]
impl DispatchStage for SignalDispatcher {
    async fn dispatch(&self, signal: Signal) -> Result<DispatchReceipt, StageError> {
        SignalDispatcher::dispatch(self, signal).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use common::models::{CandleSource, DetectionMethod, Direction, SignalType};
    use strategy::detection::RuleBasedDetector;
    use strategy::signals::{PatternSignalConfig, PatternSignalGenerator};

    fn candle(open: f64, high: f64, low: f64, close: f64, minute: u32) -> Candle {
        Candle {
            symbol: "XAUUSD".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap(),
            open,
            high,
            low,
            close,
            volume: 10.0,
            source: CandleSource::Live,
        }
    }

    #[tokio::test]
    async fn test_local_stages_delegate() {
        let detect = LocalPatternStage::new(Arc::new(RuleBasedDetector::new()));
        let prev = candle(2003.0, 2004.0, 2000.0, 2001.0, 0);
        let current = candle(2000.0, 2010.0, 1990.0, 2005.0, 1);

        let pattern = detect.detect(&current, &[prev]).await.unwrap();
        assert_eq!(pattern.pattern_type, "Engulfing");
        assert_eq!(pattern.direction, Direction::Bullish);
        assert_eq!(pattern.method, DetectionMethod::Rule);

        let generate = LocalSignalStage::new(Arc::new(
            PatternSignalGenerator::new(PatternSignalConfig::default()).unwrap(),
        ));
        let signal = generate.generate(&pattern, &current).await.unwrap().unwrap();
        assert_eq!(signal.signal_type, SignalType::Buy);

        let neutral = Pattern::neutral(DetectionMethod::Rule);
        assert!(generate.generate(&neutral, &current).await.unwrap().is_none());
    }
}
