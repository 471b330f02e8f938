use std::time::Duration;

use thiserror::Error;

/// Failures of the language-model path. Never leaves the AI detector.
#[derive(Error, Debug)]
pub enum DetectionBackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Backend answered with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("Backend did not answer within {0:?}")]
    Timeout(Duration),
    #[error("Reply contains no JSON object")]
    NoJson,
    #[error("Reply JSON is malformed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Reply violates the pattern schema: {0}")]
    Schema(String),
}

/// Configuration that cannot produce a working strategy.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyConfigError {
    #[error("{name} must be within 0..=1, got {value}")]
    Probability { name: &'static str, value: f64 },
    #[error("STUB_BUY_PROBABILITY {buy} and STUB_SELL_PROBABILITY {sell} add up to more than 1")]
    ProbabilitySum { buy: f64, sell: f64 },
    #[error("{name} must be a positive finite number, got {value}")]
    Factor { name: &'static str, value: f64 },
    #[error("Unknown {name} `{value}`")]
    UnknownVariant { name: &'static str, value: String },
}
