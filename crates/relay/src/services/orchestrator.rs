use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::ValidationError;
use common::models::{Candle, Pattern, Signal};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::StageTimeouts;
use crate::services::dispatch_service::DispatchReceipt;
use crate::stages::{DispatchStage, PatternStage, SignalStage, StageError};

/// What happened to one candle. Every variant is a normal response; only a
/// malformed candle is rejected outright.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PipelineOutcome {
    NoSignal { pattern: Pattern },
    Dispatched { signal: Signal, receipt: DispatchReceipt },
    PatternDetectionFailed { error: String },
    SignalGenerationFailed { pattern: Pattern, error: String },
    DispatchedSignalNotPersisted { signal: Signal, error: String },
}

impl PipelineOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            Self::NoSignal { .. } => "no_signal",
            Self::Dispatched { .. } => "dispatched",
            Self::PatternDetectionFailed { .. } => "pattern_detection_failed",
            Self::SignalGenerationFailed { .. } => "signal_generation_failed",
            Self::DispatchedSignalNotPersisted { .. } => "dispatched_signal_not_persisted",
        }
    }
}

pub struct Orchestrator {
    detector: Arc<dyn PatternStage>,
    generator: Arc<dyn SignalStage>,
    dispatcher: Arc<dyn DispatchStage>,
    timeouts: StageTimeouts,
    // symbol -> newest candle seen
    last_seen: Mutex<HashMap<String, Candle>>,
}

impl Orchestrator {
    pub fn new(
        detector: Arc<dyn PatternStage>,
        generator: Arc<dyn SignalStage>,
        dispatcher: Arc<dyn DispatchStage>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            detector,
            generator,
            dispatcher,
            timeouts,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    pub async fn handle(&self, candle: Candle) -> Result<PipelineOutcome, ValidationError> {
        candle.validate()?;
        let history = self.remember(&candle);
        info!(
            "Candle {} @ {} O={} H={} L={} C={}",
            candle.symbol, candle.timestamp, candle.open, candle.high, candle.low, candle.close
        );

        let detected = bounded(
            self.timeouts.detect,
            "pattern detection",
            self.detector.detect(&candle, &history),
        )
        .await;
        let pattern = match detected {
            Ok(pattern) => pattern,
            Err(e) => {
                error!("Pattern detection failed for {}: {}", candle.symbol, e);
                return Ok(PipelineOutcome::PatternDetectionFailed { error: e.to_string() });
            }
        };
        info!(
            "{}: {} {} (strength {}, via {:?})",
            candle.symbol, pattern.direction, pattern.pattern_type, pattern.strength, pattern.method
        );

        if pattern.is_neutral() {
            return Ok(PipelineOutcome::NoSignal { pattern });
        }

        let generated = bounded(
            self.timeouts.generate,
            "signal generation",
            self.generator.generate(&pattern, &candle),
        )
        .await;
        let signal = match generated {
            Ok(Some(signal)) => signal,
            Ok(None) => {
                debug!("Generator declined {} for {}", pattern.pattern_type, candle.symbol);
                return Ok(PipelineOutcome::NoSignal { pattern });
            }
            Err(e) => {
                error!("Signal generation failed for {}: {}", candle.symbol, e);
                return Ok(PipelineOutcome::SignalGenerationFailed {
                    pattern,
                    error: e.to_string(),
                });
            }
        };

        match bounded(self.timeouts.dispatch, "signal dispatch", self.dispatcher.dispatch(signal.clone())).await {
            Ok(receipt) => {
                info!("{} {} signal dispatched as {}", signal.symbol, signal.signal_type, receipt.id);
                let signal = Signal {
                    id: Some(receipt.id.clone()),
                    dispatched_at: Some(receipt.dispatched_at),
                    ..signal
                };
                Ok(PipelineOutcome::Dispatched { signal, receipt })
            }
            Err(e) => {
                warn!("{} {} signal generated but not persisted: {}", signal.symbol, signal.signal_type, e);
                Ok(PipelineOutcome::DispatchedSignalNotPersisted {
                    signal,
                    error: e.to_string(),
                })
            }
        }
    }

    /// Returns the history to detect against and records `candle` as the
    /// symbol's newest one. Only a strictly older candle counts as history;
    /// a late candle never replaces a newer one.
    fn remember(&self, candle: &Candle) -> Vec<Candle> {
        let mut last_seen = match self.last_seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let previous = last_seen.get(&candle.symbol).cloned();
        let history = match previous {
            Some(ref prev) if prev.timestamp < candle.timestamp => vec![prev.clone()],
            _ => Vec::new(),
        };

        if previous.is_none_or(|prev| prev.timestamp <= candle.timestamp) {
            last_seen.insert(candle.symbol.clone(), candle.clone());
        }
        history
    }
}

#[derive(Error, Debug)]
enum BoundedError {
    #[error("{0} timed out after {1:?}")]
    Elapsed(&'static str, Duration),
    #[error(transparent)]
    Stage(#[from] StageError),
}

async fn bounded<T, F>(limit: Duration, stage: &'static str, call: F) -> Result<T, BoundedError>
where
    F: Future<Output = Result<T, StageError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(BoundedError::Elapsed(stage, limit)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::dispatch_service::{NotificationOutcome, SignalDispatcher};
    use crate::services::webhook_service::{MockSignalNotifier, NotificationError, SignalNotifier};
    use crate::stages::{MockDispatchStage, MockPatternStage, MockSignalStage};
    use async_trait::async_trait;
    use storage::SignalLog;
    use chrono::{TimeZone, Utc};
    use common::models::{CandleSource, DetectionMethod, Direction, SignalSource, SignalType};

    fn candle(symbol: &str, minute: u32) -> Candle {
        Candle {
            symbol: symbol.to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, minute, 0).unwrap(),
            open: 2000.0,
            high: 2010.0,
            low: 1990.0,
            close: 2005.0,
            volume: 5.0,
            source: CandleSource::Live,
        }
    }

    fn bullish() -> Pattern {
        Pattern {
            pattern_type: "Engulfing".to_string(),
            direction: Direction::Bullish,
            strength: 80,
            description: String::new(),
            prediction: String::new(),
            method: DetectionMethod::Rule,
        }
    }

    fn signal_for(candle: &Candle) -> Signal {
        Signal {
            id: None,
            dispatched_at: None,
            symbol: candle.symbol.clone(),
            timestamp: Utc::now(),
            candle_timestamp: candle.timestamp,
            signal_type: SignalType::Buy,
            entry_price: 2005.0,
            stop_loss: 1991.0,
            take_profit: 2044.0,
            pattern: bullish(),
            source: SignalSource::Live,
        }
    }

    fn receipt() -> DispatchReceipt {
        DispatchReceipt {
            status: "persisted".to_string(),
            id: "sig-1".to_string(),
            dispatched_at: Utc::now(),
            partition: Utc::now().date_naive(),
            seq: 1,
            notification: NotificationOutcome::Skipped,
        }
    }

    fn orchestrator(
        detector: MockPatternStage,
        generator: MockSignalStage,
        dispatcher: MockDispatchStage,
    ) -> Orchestrator {
        Orchestrator::new(
            Arc::new(detector),
            Arc::new(generator),
            Arc::new(dispatcher),
            StageTimeouts::default(),
        )
    }

    #[tokio::test]
    async fn test_malformed_candle_makes_no_calls() {
        let mut detector = MockPatternStage::new();
        detector.expect_detect().times(0);
        let orchestrator = orchestrator(detector, MockSignalStage::new(), MockDispatchStage::new());

        let mut bad = candle("XAUUSD", 0);
        bad.high = 1000.0;
        assert!(matches!(
            orchestrator.handle(bad).await,
            Err(ValidationError::HighBelowBody { .. })
        ));

        let mut nan = candle("XAUUSD", 0);
        nan.close = f64::NAN;
        assert!(orchestrator.handle(nan).await.is_err());
    }

    #[tokio::test]
    async fn test_neutral_pattern_short_circuits() {
        let mut detector = MockPatternStage::new();
        detector
            .expect_detect()
            .returning(|_, _| Ok(Pattern::neutral(DetectionMethod::Rule)));
        let mut generator = MockSignalStage::new();
        generator.expect_generate().times(0);
        let mut dispatcher = MockDispatchStage::new();
        dispatcher.expect_dispatch().times(0);

        let outcome = orchestrator(detector, generator, dispatcher)
            .handle(candle("XAUUSD", 0))
            .await
            .unwrap();
        assert_eq!(outcome.label(), "no_signal");
    }

    #[tokio::test]
    async fn test_full_pipeline_dispatches() {
        let mut detector = MockPatternStage::new();
        detector.expect_detect().times(1).returning(|_, _| Ok(bullish()));
        let mut generator = MockSignalStage::new();
        generator
            .expect_generate()
            .times(1)
            .returning(|_, c| Ok(Some(signal_for(c))));
        let mut dispatcher = MockDispatchStage::new();
        dispatcher
            .expect_dispatch()
            .withf(|s: &Signal| s.signal_type == SignalType::Buy && s.entry_price == 2005.0)
            .times(1)
            .returning(|_| Ok(receipt()));

        let outcome = orchestrator(detector, generator, dispatcher)
            .handle(candle("XAUUSD", 0))
            .await
            .unwrap();
        match outcome {
            PipelineOutcome::Dispatched { signal, receipt } => {
                assert_eq!(signal.symbol, "XAUUSD");
                assert_eq!(receipt.id, "sig-1");
                assert_eq!(signal.id.as_deref(), Some("sig-1"));
                assert_eq!(signal.dispatched_at, Some(receipt.dispatched_at));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_declined_generation_is_no_signal() {
        let mut detector = MockPatternStage::new();
        detector.expect_detect().returning(|_, _| Ok(bullish()));
        let mut generator = MockSignalStage::new();
        generator.expect_generate().returning(|_, _| Ok(None));
        let mut dispatcher = MockDispatchStage::new();
        dispatcher.expect_dispatch().times(0);

        let outcome = orchestrator(detector, generator, dispatcher)
            .handle(candle("XAUUSD", 0))
            .await
            .unwrap();
        assert_eq!(outcome, PipelineOutcome::NoSignal { pattern: bullish() });
    }

    #[tokio::test]
    async fn test_stage_failures_map_to_outcomes() {
        let mut detector = MockPatternStage::new();
        detector.expect_detect().returning(|_, _| {
            Err(StageError::Upstream {
                stage: "detect",
                reason: "connection refused".to_string(),
            })
        });
        let failed = orchestrator(detector, MockSignalStage::new(), MockDispatchStage::new())
            .handle(candle("XAUUSD", 0))
            .await
            .unwrap();
        assert_eq!(failed.label(), "pattern_detection_failed");

        let mut detector = MockPatternStage::new();
        detector.expect_detect().returning(|_, _| Ok(bullish()));
        let mut generator = MockSignalStage::new();
        generator.expect_generate().returning(|_, _| {
            Err(StageError::Upstream {
                stage: "generate",
                reason: "status 500".to_string(),
            })
        });
        let failed = orchestrator(detector, generator, MockDispatchStage::new())
            .handle(candle("XAUUSD", 0))
            .await
            .unwrap();
        assert_eq!(failed.label(), "signal_generation_failed");

        let mut detector = MockPatternStage::new();
        detector.expect_detect().returning(|_, _| Ok(bullish()));
        let mut generator = MockSignalStage::new();
        generator.expect_generate().returning(|_, c| Ok(Some(signal_for(c))));
        let mut dispatcher = MockDispatchStage::new();
        dispatcher.expect_dispatch().times(1).returning(|_| {
            Err(StageError::Upstream {
                stage: "dispatch",
                reason: "disk full".to_string(),
            })
        });
        let degraded = orchestrator(detector, generator, dispatcher)
            .handle(candle("XAUUSD", 0))
            .await
            .unwrap();
        match degraded {
            PipelineOutcome::DispatchedSignalNotPersisted { signal, error } => {
                assert_eq!(signal.signal_type, SignalType::Buy);
                assert!(error.contains("disk full"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    struct StalledDetector;

    #[async_trait]
    impl PatternStage for StalledDetector {
        async fn detect(&self, _candle: &Candle, _history: &[Candle]) -> Result<Pattern, StageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(bullish())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_detection_timeout_aborts_pipeline() {
        let mut generator = MockSignalStage::new();
        generator.expect_generate().times(0);
        let orchestrator = Orchestrator::new(
            Arc::new(StalledDetector),
            Arc::new(generator),
            Arc::new(MockDispatchStage::new()),
            StageTimeouts {
                detect: Duration::from_millis(250),
                ..StageTimeouts::default()
            },
        );

        match orchestrator.handle(candle("XAUUSD", 0)).await.unwrap() {
            PipelineOutcome::PatternDetectionFailed { error } => assert!(error.contains("timed out")),
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    struct StalledGenerator;

    #[async_trait]
    impl SignalStage for StalledGenerator {
        async fn generate(&self, _pattern: &Pattern, _candle: &Candle) -> Result<Option<Signal>, StageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(None)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_generation_timeout_reports_pattern() {
        let mut detector = MockPatternStage::new();
        detector.expect_detect().returning(|_, _| Ok(bullish()));
        let mut dispatcher = MockDispatchStage::new();
        dispatcher.expect_dispatch().times(0);
        let orchestrator = Orchestrator::new(
            Arc::new(detector),
            Arc::new(StalledGenerator),
            Arc::new(dispatcher),
            StageTimeouts {
                generate: Duration::from_millis(250),
                ..StageTimeouts::default()
            },
        );

        match orchestrator.handle(candle("XAUUSD", 0)).await.unwrap() {
            PipelineOutcome::SignalGenerationFailed { pattern, error } => {
                assert_eq!(pattern, bullish());
                assert!(error.contains("signal generation timed out"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    struct StalledDispatcher;

    #[async_trait]
    impl DispatchStage for StalledDispatcher {
        async fn dispatch(&self, _signal: Signal) -> Result<DispatchReceipt, StageError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(receipt())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_timeout_keeps_the_signal() {
        let mut detector = MockPatternStage::new();
        detector.expect_detect().returning(|_, _| Ok(bullish()));
        let mut generator = MockSignalStage::new();
        generator.expect_generate().returning(|_, c| Ok(Some(signal_for(c))));
        let orchestrator = Orchestrator::new(
            Arc::new(detector),
            Arc::new(generator),
            Arc::new(StalledDispatcher),
            StageTimeouts {
                dispatch: Duration::from_millis(250),
                ..StageTimeouts::default()
            },
        );

        match orchestrator.handle(candle("XAUUSD", 0)).await.unwrap() {
            PipelineOutcome::DispatchedSignalNotPersisted { signal, error } => {
                assert_eq!(signal.entry_price, 2005.0);
                assert!(signal.id.is_none());
                assert!(error.contains("signal dispatch timed out"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    struct SlowNotifier;

    #[async_trait]
    impl SignalNotifier for SlowNotifier {
        async fn notify(&self, _signal: &Signal) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    async fn with_real_dispatcher(
        dir: &tempfile::TempDir,
        notifier: Arc<dyn SignalNotifier>,
    ) -> (Arc<SignalLog>, Arc<SignalDispatcher>, Orchestrator) {
        let log = Arc::new(SignalLog::open(dir.path()).await.unwrap());
        let dispatcher = Arc::new(SignalDispatcher::new(log.clone()).with_notifier(notifier));

        let mut detector = MockPatternStage::new();
        detector.expect_detect().returning(|_, _| Ok(bullish()));
        let mut generator = MockSignalStage::new();
        generator.expect_generate().returning(|_, c| Ok(Some(signal_for(c))));
        let orchestrator = Orchestrator::new(
            Arc::new(detector),
            Arc::new(generator),
            dispatcher.clone(),
            StageTimeouts {
                dispatch: Duration::from_secs(2),
                ..StageTimeouts::default()
            },
        );
        (log, dispatcher, orchestrator)
    }

    #[tokio::test]
    async fn test_slow_webhook_does_not_turn_a_persisted_signal_into_a_failure() {
        let dir = tempfile::tempdir().unwrap();
        let (log, _dispatcher, orchestrator) = with_real_dispatcher(&dir, Arc::new(SlowNotifier)).await;

        match orchestrator.handle(candle("XAUUSD", 0)).await.unwrap() {
            PipelineOutcome::Dispatched { signal, receipt } => {
                assert_eq!(receipt.notification, NotificationOutcome::Queued);
                let stored = log.for_date(receipt.partition).await.unwrap();
                assert_eq!(stored.len(), 1);
                assert_eq!(stored[0].id, signal.id);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        log.close().await;
    }

    #[tokio::test]
    async fn test_failing_webhook_still_reports_dispatched() {
        let dir = tempfile::tempdir().unwrap();
        let mut notifier = MockSignalNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .returning(|_| Err(NotificationError::Status(503)));
        let (log, dispatcher, orchestrator) = with_real_dispatcher(&dir, Arc::new(notifier)).await;

        let outcome = orchestrator.handle(candle("XAUUSD", 0)).await.unwrap();
        assert_eq!(outcome.label(), "dispatched");
        dispatcher.drain_notifications().await;
        assert_eq!(log.recent(10).await.unwrap().len(), 1);
        log.close().await;
    }

    #[tokio::test]
    async fn test_history_is_per_symbol_and_only_older() {
        let mut detector = MockPatternStage::new();
        let mut seq = mockall::Sequence::new();
        // first XAUUSD candle: nothing seen yet
        detector
            .expect_detect()
            .withf(|_, h: &[Candle]| h.is_empty())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Pattern::neutral(DetectionMethod::Rule)));
        // EURUSD has its own history
        detector
            .expect_detect()
            .withf(|c: &Candle, h: &[Candle]| c.symbol == "EURUSD" && h.is_empty())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Pattern::neutral(DetectionMethod::Rule)));
        // next XAUUSD candle gets the 10:05 one
        detector
            .expect_detect()
            .withf(|_, h: &[Candle]| h.len() == 1 && h[0].timestamp.format("%M").to_string() == "05")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Pattern::neutral(DetectionMethod::Rule)));
        // a late 10:01 candle sees no history
        detector
            .expect_detect()
            .withf(|_, h: &[Candle]| h.is_empty())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Pattern::neutral(DetectionMethod::Rule)));
        // and did not displace 10:06
        detector
            .expect_detect()
            .withf(|_, h: &[Candle]| h.len() == 1 && h[0].timestamp.format("%M").to_string() == "06")
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(Pattern::neutral(DetectionMethod::Rule)));

        let orchestrator = orchestrator(detector, MockSignalStage::new(), MockDispatchStage::new());
        for (symbol, minute) in [("XAUUSD", 5), ("EURUSD", 7), ("XAUUSD", 6), ("XAUUSD", 1), ("XAUUSD", 8)] {
            orchestrator.handle(candle(symbol, minute)).await.unwrap();
        }
    }

    #[test]
    fn test_outcome_wire_tag() {
        let outcome = PipelineOutcome::PatternDetectionFailed {
            error: "timed out".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "pattern_detection_failed");
        assert_eq!(json["error"], "timed out");
    }
}
