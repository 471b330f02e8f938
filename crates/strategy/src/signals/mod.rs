use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use common::models::{Candle, Pattern, Signal};
use tracing::info;

use crate::errors::StrategyConfigError;

pub mod pattern_signals;
pub mod stub_signals;

pub use pattern_signals::{PatternSignalConfig, PatternSignalGenerator};
pub use stub_signals::{StubConfig, StubSignalGenerator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalMode {
    Pattern,
    Stub,
}

impl fmt::Display for SignalMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => write!(f, "pattern"),
            Self::Stub => write!(f, "stub"),
        }
    }
}

impl FromStr for SignalMode {
    type Err = StrategyConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pattern" => Ok(Self::Pattern),
            "stub" | "stubs" => Ok(Self::Stub),
            other => Err(StrategyConfigError::UnknownVariant {
                name: "signal mode",
                value: other.to_string(),
            }),
        }
    }
}

/// Turns a detected pattern and its candle into a trade recommendation.
pub trait SignalGenerator: Send + Sync {
    fn mode(&self) -> SignalMode;

    fn generate(&self, pattern: &Pattern, candle: &Candle) -> Option<Signal>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalConfig {
    pub mode: SignalMode,
    pub pattern: PatternSignalConfig,
    pub stub: StubConfig,
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            mode: SignalMode::Pattern,
            pattern: PatternSignalConfig::default(),
            stub: StubConfig::default(),
        }
    }
}

pub fn build_generator(config: &SignalConfig) -> Result<Arc<dyn SignalGenerator>, StrategyConfigError> {
    match config.mode {
        SignalMode::Pattern => {
            info!(
                "Signal generation: pattern-driven (min strength {})",
                config.pattern.min_strength
            );
            Ok(Arc::new(PatternSignalGenerator::new(config.pattern.clone())?))
        }
        SignalMode::Stub => {
            info!(
                "Signal generation: STUB mode (buy p={}, sell p={})",
                config.stub.buy_probability, config.stub.sell_probability
            );
            Ok(Arc::new(StubSignalGenerator::new(config.stub.clone())?))
        }
    }
}
