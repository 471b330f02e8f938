use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ensure_finite};
use crate::models::timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CandleSource {
    #[default]
    #[serde(alias = "LIVE")]
    Live,
    #[serde(alias = "MOCK", alias = "DUMMY", alias = "dummy")]
    Mock,
}

/// One OHLCV bar as received from the candle source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub symbol: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default, alias = "type_of_data")]
    pub source: CandleSource,
}

impl Candle {
    /// Checks the numeric fields and the high/low envelope around the body.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }

        ensure_finite("open", self.open)?;
        ensure_finite("high", self.high)?;
        ensure_finite("low", self.low)?;
        ensure_finite("close", self.close)?;
        ensure_finite("volume", self.volume)?;

        for (field, value) in [("open", self.open), ("high", self.high), ("low", self.low), ("close", self.close)] {
            if value <= 0.0 {
                return Err(ValidationError::NonPositive { field, value });
            }
        }
        if self.volume < 0.0 {
            return Err(ValidationError::Negative {
                field: "volume",
                value: self.volume,
            });
        }
        if self.high < self.body_top() {
            return Err(ValidationError::HighBelowBody {
                high: self.high,
                body_top: self.body_top(),
            });
        }
        if self.low > self.body_bottom() {
            return Err(ValidationError::LowAboveBody {
                low: self.low,
                body_bottom: self.body_bottom(),
            });
        }
        Ok(())
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    pub fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.body_top()
    }

    pub fn lower_wick(&self) -> f64 {
        self.body_bottom() - self.low
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}
