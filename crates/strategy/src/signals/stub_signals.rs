//! Frequency-controlled random signals for development runs.
//!
//! The pattern is ignored when deciding; it is only embedded unchanged in
//! the emitted signal. Every stub signal is tagged `DUMMY`.

use std::sync::Mutex;

use chrono::Utc;
use common::models::{Candle, Pattern, Signal, SignalSource, SignalType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::info;

use crate::errors::StrategyConfigError;
use crate::signals::{SignalGenerator, SignalMode};

const STOP_LOSS_FRACTION: f64 = 0.01;
const TAKE_PROFIT_FRACTION: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
pub struct StubConfig {
    pub buy_probability: f64,
    pub sell_probability: f64,
}

impl Default for StubConfig {
    fn default() -> Self {
        Self {
            buy_probability: 0.3,
            sell_probability: 0.3,
        }
    }
}

pub struct StubSignalGenerator {
    config: StubConfig,
    rng: Mutex<StdRng>,
}

impl StubSignalGenerator {
    pub fn new(config: StubConfig) -> Result<Self, StrategyConfigError> {
        Self::with_rng(config, StdRng::from_os_rng())
    }

    pub fn with_seed(config: StubConfig, seed: u64) -> Result<Self, StrategyConfigError> {
        Self::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: StubConfig, rng: StdRng) -> Result<Self, StrategyConfigError> {
        for (name, value) in [
            ("STUB_BUY_PROBABILITY", config.buy_probability),
            ("STUB_SELL_PROBABILITY", config.sell_probability),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(StrategyConfigError::Probability { name, value });
            }
        }
        if config.buy_probability + config.sell_probability > 1.0 {
            return Err(StrategyConfigError::ProbabilitySum {
                buy: config.buy_probability,
                sell: config.sell_probability,
            });
        }
        Ok(Self {
            config,
            rng: Mutex::new(rng),
        })
    }

    /// One draw: `[0, buy)` is BUY, `[buy, buy + sell)` is SELL, the rest is
    /// no signal.
    fn roll(&self) -> Option<SignalType> {
        let draw = {
            let mut rng = match self.rng.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            rng.random::<f64>()
        };
        if draw < self.config.buy_probability {
            Some(SignalType::Buy)
        } else if draw < self.config.buy_probability + self.config.sell_probability {
            Some(SignalType::Sell)
        } else {
            None
        }
    }
}

impl SignalGenerator for StubSignalGenerator {
    fn mode(&self) -> SignalMode {
        SignalMode::Stub
    }

    fn generate(&self, pattern: &Pattern, candle: &Candle) -> Option<Signal> {
        let entry = candle.close;
        if entry <= 0.0 {
            return None;
        }
        let side = self.roll()?;

        let (stop_loss, take_profit) = match side {
            SignalType::Buy => (entry * (1.0 - STOP_LOSS_FRACTION), entry * (1.0 + TAKE_PROFIT_FRACTION)),
            SignalType::Sell => (entry * (1.0 + STOP_LOSS_FRACTION), entry * (1.0 - TAKE_PROFIT_FRACTION)),
        };
        info!("Stub generating {} signal for {}", side, candle.symbol);

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
            source: SignalSource::Dummy,
        })
    }
}
