use chrono::Utc;
use common::models::{Candle, Direction, Pattern, Signal, SignalType};
use tracing::{debug, warn};

use crate::errors::StrategyConfigError;
use crate::signals::{SignalGenerator, SignalMode};

/// Floor for the volatility proxy, as a share of the entry price, so a
/// zero-range candle still gets distinct levels.
const MIN_VOLATILITY_FRACTION: f64 = 0.001;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternSignalConfig {
    pub min_strength: u8,
    /// Stop distance in candle ranges at strength 50.
    pub stop_loss_range_factor: f64,
    /// Target distance in candle ranges at strength 50.
    pub take_profit_range_factor: f64,
}

impl Default for PatternSignalConfig {
    fn default() -> Self {
        Self {
            min_strength: 30,
            stop_loss_range_factor: 1.0,
            take_profit_range_factor: 1.5,
        }
    }
}

pub struct PatternSignalGenerator {
    config: PatternSignalConfig,
}

impl PatternSignalGenerator {
    pub fn new(config: PatternSignalConfig) -> Result<Self, StrategyConfigError> {
        for (name, value) in [
            ("STOP_LOSS_RANGE_FACTOR", config.stop_loss_range_factor),
            ("TAKE_PROFIT_RANGE_FACTOR", config.take_profit_range_factor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(StrategyConfigError::Factor { name, value });
            }
        }
        Ok(Self { config })
    }

    /// Stronger patterns get a tighter stop and a farther target.
    fn levels(&self, side: SignalType, entry: f64, range: f64, strength: u8) -> (f64, f64) {
        let volatility = range.max(entry.abs() * MIN_VOLATILITY_FRACTION);
        let conviction = strength as f64 / Pattern::MAX_STRENGTH as f64;

        let stop_distance = volatility * self.config.stop_loss_range_factor * (1.5 - conviction);
        let take_distance = volatility * self.config.take_profit_range_factor * (0.5 + conviction);

        match side {
            SignalType::Buy => (entry - stop_distance, entry + take_distance),
            SignalType::Sell => (entry + stop_distance, entry - take_distance),
        }
    }
}

impl SignalGenerator for PatternSignalGenerator {
    fn mode(&self) -> SignalMode {
        SignalMode::Pattern
    }

    fn generate(&self, pattern: &Pattern, candle: &Candle) -> Option<Signal> {
        let side = match pattern.direction {
            Direction::Bullish => SignalType::Buy,
            Direction::Bearish => SignalType::Sell,
            Direction::Neutral => return None,
        };

        if pattern.strength < self.config.min_strength {
            debug!(
                "{} strength {} below threshold {}, no signal for {}",
                pattern.pattern_type, pattern.strength, self.config.min_strength, candle.symbol
            );
            return None;
        }

        let entry = candle.close;
        let (stop_loss, take_profit) = self.levels(side, entry, candle.range(), pattern.strength);
        if !(stop_loss < entry && entry < take_profit) && !(take_profit < entry && entry < stop_loss) {
            warn!("Degenerate levels for {} at entry {}, no signal", candle.symbol, entry);
            return None;
        }

        Some(Signal {
            id: None,
            dispatched_at: None,
            symbol: candle.symbol.clone(),
            timestamp: Utc::now(),
            candle_timestamp: candle.timestamp,
            signal_type: side,
            entry_price: entry,
            stop_loss,
            take_profit,
            pattern: pattern.clone(),
            source: candle.source.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::models::{CandleSource, DetectionMethod, SignalSource};

    fn candle() -> Candle {
        Candle {
            symbol: "XAUUSD".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            open: 2000.0,
            high: 2010.0,
            low: 1990.0,
            close: 2005.0,
            volume: 100.0,
            source: CandleSource::Live,
        }
    }

    fn pattern(direction: Direction, strength: u8) -> Pattern {
        Pattern {
            pattern_type: "Engulfing".to_string(),
            direction,
            strength,
            description: String::new(),
            prediction: String::new(),
            method: DetectionMethod::Rule,
        }
    }

    fn generator() -> PatternSignalGenerator {
        PatternSignalGenerator::new(PatternSignalConfig::default()).unwrap()
    }

    #[test]
    fn test_neutral_never_signals() {
        for strength in [0, 50, 100] {
            assert!(generator().generate(&pattern(Direction::Neutral, strength), &candle()).is_none());
        }
    }

    #[test]
    fn test_weak_pattern_is_declined() {
        assert!(generator().generate(&pattern(Direction::Bullish, 29), &candle()).is_none());
        assert!(generator().generate(&pattern(Direction::Bullish, 30), &candle()).is_some());
    }

    #[test]
    fn test_bullish_gives_buy_bracketing_entry() {
        let signal = generator().generate(&pattern(Direction::Bullish, 80), &candle()).unwrap();
        assert_eq!(signal.signal_type, SignalType::Buy);
        assert_eq!(signal.entry_price, 2005.0);
        assert!((signal.stop_loss - 1991.0).abs() < 1e-9);
        assert!((signal.take_profit - 2044.0).abs() < 1e-9);
        assert_eq!(signal.source, SignalSource::Live);
        assert_eq!(signal.candle_timestamp, candle().timestamp);
        assert!(signal.id.is_none());
        assert!(signal.validate().is_ok());
    }

    #[test]
    fn test_bearish_gives_sell_mirrored() {
        let mut c = candle();
        c.source = CandleSource::Mock;
        let signal = generator().generate(&pattern(Direction::Bearish, 60), &c).unwrap();
        assert_eq!(signal.signal_type, SignalType::Sell);
        assert!(signal.take_profit < signal.entry_price && signal.entry_price < signal.stop_loss);
        assert_eq!(signal.source, SignalSource::Dummy);
    }

    #[test]
    fn test_stronger_pattern_tightens_stop() {
        let weak = generator().generate(&pattern(Direction::Bullish, 40), &candle()).unwrap();
        let strong = generator().generate(&pattern(Direction::Bullish, 95), &candle()).unwrap();
        assert!(strong.stop_loss > weak.stop_loss);
        assert!(strong.take_profit > weak.take_profit);
    }

    #[test]
    fn test_flat_candle_uses_volatility_floor() {
        let mut c = candle();
        c.open = 2005.0;
        c.high = 2005.0;
        c.low = 2005.0;
        let signal = generator().generate(&pattern(Direction::Bullish, 50), &c).unwrap();
        assert!(signal.stop_loss < 2005.0 && 2005.0 < signal.take_profit);
    }

    #[test]
    fn test_rejects_non_positive_factor() {
        let config = PatternSignalConfig {
            take_profit_range_factor: 0.0,
            ..PatternSignalConfig::default()
        };
        assert!(matches!(
            PatternSignalGenerator::new(config),
            Err(StrategyConfigError::Factor { name: "TAKE_PROFIT_RANGE_FACTOR", .. })
        ));
    }
}
