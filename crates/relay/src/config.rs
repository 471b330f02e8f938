use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::ValueEnum;
use common::env::{self, EnvError, parse_flag, parse_or};
use strategy::detection::AiConfig;
use strategy::errors::StrategyConfigError;
use strategy::signals::{PatternSignalConfig, StubConfig};
use strategy::{DetectorConfig, DetectorKind, SignalConfig, SignalMode};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error(transparent)]
    Env(#[from] EnvError),
    #[error(transparent)]
    Strategy(#[from] StrategyConfigError),
    #[error("{key} is out of range: {reason}")]
    OutOfRange { key: &'static str, reason: String },
}

/// Which stages one process serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Role {
    All,
    Mcp,
    Detector,
    Generator,
    Dispatcher,
}

impl Role {
    pub fn default_port(self) -> u16 {
        match self {
            Self::All | Self::Mcp => 8000,
            Self::Detector => 8001,
            Self::Generator => 8002,
            Self::Dispatcher => 8003,
        }
    }

    pub fn service_name(self) -> &'static str {
        match self {
            Self::All => "candle-signal-relay",
            Self::Mcp => "mcp-server",
            Self::Detector => "pattern-detector",
            Self::Generator => "signal-generator",
            Self::Dispatcher => "signal-dispatcher",
        }
    }

    pub fn serves_detector(self) -> bool {
        matches!(self, Self::All | Self::Detector)
    }

    pub fn serves_generator(self) -> bool {
        matches!(self, Self::All | Self::Generator)
    }

    pub fn serves_dispatcher(self) -> bool {
        matches!(self, Self::All | Self::Dispatcher)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.service_name())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StageTimeouts {
    pub detect: Duration,
    pub generate: Duration,
    pub dispatch: Duration,
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            detect: Duration::from_millis(20_000),
            generate: Duration::from_millis(5_000),
            dispatch: Duration::from_millis(5_000),
        }
    }
}

/// Endpoints the `mcp` role calls when the stages run as their own services.
#[derive(Debug, Clone, PartialEq)]
pub struct StageUrls {
    pub detector: String,
    pub generator: String,
    pub dispatcher: String,
}

impl Default for StageUrls {
    fn default() -> Self {
        Self {
            detector: "http://localhost:8001/detect".to_string(),
            generator: "http://localhost:8002/generate".to_string(),
            dispatcher: "http://localhost:8003/dispatch".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    pub detector: DetectorConfig,
    pub signals: SignalConfig,
    pub log_dir: PathBuf,
    pub webhook_url: Option<String>,
    pub webhook_timeout: Duration,
    pub timeouts: StageTimeouts,
    pub stage_urls: StageUrls,
    pub bind_address: String,
    pub port: Option<u16>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig::default(),
            signals: SignalConfig::default(),
            log_dir: PathBuf::from("./signal_logs"),
            webhook_url: None,
            webhook_timeout: Duration::from_millis(5_000),
            timeouts: StageTimeouts::default(),
            stage_urls: StageUrls::default(),
            bind_address: "0.0.0.0".to_string(),
            port: None,
        }
    }
}

impl RelayConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env::var_opt)
    }

    /// Builds the configuration from any key lookup; missing keys keep their
    /// defaults and malformed ones are reported with the offending key.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let ai_defaults = AiConfig::default();
        let detector = DetectorConfig {
            kind: get("PATTERN_STRATEGY")
                .map(|raw| raw.parse::<DetectorKind>())
                .transpose()?
                .unwrap_or(defaults.detector.kind),
            ai: AiConfig {
                api_url: get("OLLAMA_API_URL").unwrap_or(ai_defaults.api_url),
                model: get("OLLAMA_MODEL").unwrap_or(ai_defaults.model),
                timeout: Duration::from_secs(parse_or(
                    "OLLAMA_TIMEOUT",
                    get("OLLAMA_TIMEOUT"),
                    ai_defaults.timeout.as_secs(),
                )?),
            },
        };

        let pattern_defaults = PatternSignalConfig::default();
        let min_strength: u8 = parse_or(
            "MIN_PATTERN_STRENGTH",
            get("MIN_PATTERN_STRENGTH"),
            pattern_defaults.min_strength,
        )?;
        if min_strength > 100 {
            return Err(ConfigError::OutOfRange {
                key: "MIN_PATTERN_STRENGTH",
                reason: format!("{} exceeds 100", min_strength),
            });
        }

        let stub_defaults = StubConfig::default();
        let use_stubs = parse_flag("USE_SIGNAL_STUBS", get("USE_SIGNAL_STUBS"), false)?;
        let mode = match get("SIGNAL_MODE") {
            Some(raw) => raw.parse::<SignalMode>()?,
            None if use_stubs => SignalMode::Stub,
            None => SignalMode::Pattern,
        };
        let signals = SignalConfig {
            mode,
            pattern: PatternSignalConfig {
                min_strength,
                stop_loss_range_factor: parse_or(
                    "STOP_LOSS_RANGE_FACTOR",
                    get("STOP_LOSS_RANGE_FACTOR"),
                    pattern_defaults.stop_loss_range_factor,
                )?,
                take_profit_range_factor: parse_or(
                    "TAKE_PROFIT_RANGE_FACTOR",
                    get("TAKE_PROFIT_RANGE_FACTOR"),
                    pattern_defaults.take_profit_range_factor,
                )?,
            },
            stub: StubConfig {
                buy_probability: parse_or(
                    "STUB_BUY_PROBABILITY",
                    get("STUB_BUY_PROBABILITY"),
                    stub_defaults.buy_probability,
                )?,
                sell_probability: parse_or(
                    "STUB_SELL_PROBABILITY",
                    get("STUB_SELL_PROBABILITY"),
                    stub_defaults.sell_probability,
                )?,
            },
        };

        let millis = |key: &str, default: Duration| -> Result<Duration, ConfigError> {
            Ok(Duration::from_millis(parse_or(key, get(key), default.as_millis() as u64)?))
        };

        let timeouts = StageTimeouts {
            detect: millis("DETECT_TIMEOUT_MS", defaults.timeouts.detect)?,
            generate: millis("GENERATE_TIMEOUT_MS", defaults.timeouts.generate)?,
            dispatch: millis("DISPATCH_TIMEOUT_MS", defaults.timeouts.dispatch)?,
        };

        let stage_urls = StageUrls {
            detector: get("PATTERN_DETECTOR_URL").unwrap_or(defaults.stage_urls.detector),
            generator: get("SIGNAL_GENERATOR_URL").unwrap_or(defaults.stage_urls.generator),
            dispatcher: get("SIGNAL_DISPATCHER_URL").unwrap_or(defaults.stage_urls.dispatcher),
        };

        Ok(Self {
            detector,
            signals,
            log_dir: get("SIGNAL_LOG_DIR").map(PathBuf::from).unwrap_or(defaults.log_dir),
            webhook_url: get("WEBHOOK_URL"),
            webhook_timeout: millis("WEBHOOK_TIMEOUT_MS", defaults.webhook_timeout)?,
            timeouts,
            stage_urls,
            bind_address: get("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            port: get("PORT").map(|raw| parse_or("PORT", Some(raw), 0u16)).transpose()?,
        })
    }
}
