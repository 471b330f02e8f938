use thiserror::Error;

/// A candle, pattern or signal payload that must be rejected before any stage runs.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Symbol must not be empty")]
    EmptySymbol,
    #[error("Field `{field}` must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },
    #[error("Price `{field}` must be positive, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("Field `{field}` must not be negative, got {value}")]
    Negative { field: &'static str, value: f64 },
    #[error("High {high} is below the candle body top {body_top}")]
    HighBelowBody { high: f64, body_top: f64 },
    #[error("Low {low} is above the candle body bottom {body_bottom}")]
    LowAboveBody { low: f64, body_bottom: f64 },
    #[error("Pattern strength {0} is outside 0..=100")]
    StrengthOutOfRange(f64),
    #[error("Pattern type must not be empty")]
    EmptyPatternType,
    #[error("Unknown direction `{0}`, expected bullish, bearish or neutral")]
    UnknownDirection(String),
    #[error(
        "{side} signal needs stop-loss {stop_loss} and take-profit {take_profit} on opposite sides of entry {entry}"
    )]
    InvertedLevels {
        side: &'static str,
        entry: f64,
        stop_loss: f64,
        take_profit: f64,
    },
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<f64, ValidationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ValidationError::NonFinite { field, value })
    }
}
