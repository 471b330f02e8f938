//! JSON bodies exchanged between relay processes and with callers.

use common::ValidationError;
use common::models::{Candle, Pattern, Signal};
use serde::{Deserialize, Serialize};

/// `/detect` and `/explain` take either `{candle, history?}` or a bare candle.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DetectRequest {
    Wrapped {
        candle: Candle,
        #[serde(default)]
        history: Vec<Candle>,
    },
    Bare(Candle),
}

impl DetectRequest {
    pub fn into_parts(self) -> (Candle, Vec<Candle>) {
        match self {
            Self::Wrapped { candle, history } => (candle, history),
            Self::Bare(candle) => (candle, Vec::new()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DetectCall<'a> {
    pub candle: &'a Candle,
    pub history: &'a [Candle],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectResponse {
    pub pattern: Pattern,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub pattern: Pattern,
    pub candle: Candle,
}

#[derive(Debug, Serialize)]
pub struct GenerateCall<'a> {
    pub pattern: &'a Pattern,
    pub candle: &'a Candle,
}

/// `signal: null` is the explicit empty result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub signal: Option<Signal>,
}

/// `/dispatch` takes `{signal}` or a bare signal.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DispatchRequest {
    Wrapped { signal: Signal },
    Bare(Signal),
}

impl DispatchRequest {
    pub fn into_signal(self) -> Signal {
        match self {
            Self::Wrapped { signal } | Self::Bare(signal) => signal,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DispatchCall<'a> {
    pub signal: &'a Signal,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SignalsQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

pub fn validate_all(candle: &Candle, history: &[Candle]) -> Result<(), ValidationError> {
    candle.validate()?;
    history.iter().try_for_each(Candle::validate)
}
