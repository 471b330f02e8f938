use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{ValidationError, ensure_finite};
use crate::models::{CandleSource, Pattern, timestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalType {
    Buy,
    Sell,
}

impl fmt::Display for SignalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "BUY"),
            Self::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalSource {
    Live,
    Dummy,
}

impl From<CandleSource> for SignalSource {
    fn from(source: CandleSource) -> Self {
        match source {
            CandleSource::Live => Self::Live,
            CandleSource::Mock => Self::Dummy,
        }
    }
}

/// A trade recommendation. `id` and `dispatched_at` stay empty until the
/// dispatcher persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispatched_at: Option<DateTime<Utc>>,
    pub symbol: String,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub timestamp: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::deserialize")]
    pub candle_timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub pattern: Pattern,
    #[serde(alias = "type_of_data")]
    pub source: SignalSource,
}

impl Signal {
    /// UTC calendar date of dispatch, which selects the log partition.
    pub fn partition_date(&self) -> Option<NaiveDate> {
        self.dispatched_at.map(|at| at.date_naive())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.symbol.trim().is_empty() {
            return Err(ValidationError::EmptySymbol);
        }
        ensure_finite("entry_price", self.entry_price)?;
        ensure_finite("stop_loss", self.stop_loss)?;
        ensure_finite("take_profit", self.take_profit)?;
        self.pattern.validate()?;

        let ordered = match self.signal_type {
            SignalType::Buy => self.stop_loss < self.entry_price && self.entry_price < self.take_profit,
            SignalType::Sell => self.take_profit < self.entry_price && self.entry_price < self.stop_loss,
        };
        if !ordered {
            return Err(ValidationError::InvertedLevels {
                side: match self.signal_type {
                    SignalType::Buy => "BUY",
                    SignalType::Sell => "SELL",
                },
                entry: self.entry_price,
                stop_loss: self.stop_loss,
                take_profit: self.take_profit,
            });
        }
        Ok(())
    }

    pub fn risk_reward(&self) -> Option<f64> {
        let (risk, reward) = match self.signal_type {
            SignalType::Buy => (self.entry_price - self.stop_loss, self.take_profit - self.entry_price),
            SignalType::Sell => (self.stop_loss - self.entry_price, self.entry_price - self.take_profit),
        };
        (risk > 0.0).then(|| reward / risk)
    }

    /// Multi-line alert text written to the log for every dispatched signal.
    pub fn alert(&self) -> String {
        let ratio = self
            .risk_reward()
            .map(|r| format!("1:{:.2}", r))
            .unwrap_or_else(|| "n/a".to_string());

        format!(
            "SIGNAL ALERT\nSymbol: {}\nAction: {}\nPattern: {} {} (Strength: {}%, via {:?})\nEntry: {}\nStop Loss: {}\nTake Profit: {}\nRisk/Reward: {}\nTimestamp: {}\nID: {}",
            self.symbol,
            self.signal_type,
            self.pattern.direction,
            self.pattern.pattern_type.to_uppercase(),
            self.pattern.strength,
            self.pattern.method,
            self.entry_price,
            self.stop_loss,
            self.take_profit,
            ratio,
            self.timestamp.to_rfc3339(),
            self.id.as_deref().unwrap_or("-"),
        )
    }
}
