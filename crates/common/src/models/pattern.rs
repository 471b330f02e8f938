use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bullish => write!(f, "bullish"),
            Self::Bearish => write!(f, "bearish"),
            Self::Neutral => write!(f, "neutral"),
        }
    }
}

impl FromStr for Direction {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bullish" => Ok(Self::Bullish),
            "bearish" => Ok(Self::Bearish),
            "neutral" => Ok(Self::Neutral),
            other => Err(ValidationError::UnknownDirection(other.to_string())),
        }
    }
}

/// Which detection path produced a pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionMethod {
    Ai,
    Rule,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pattern {
    #[serde(rename = "type")]
    pub pattern_type: String,
    pub direction: Direction,
    pub strength: u8,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prediction: String,
    #[serde(alias = "detection_method")]
    pub method: DetectionMethod,
}

impl Pattern {
    pub const NO_PATTERN: &'static str = "None";
    pub const MAX_STRENGTH: u8 = 100;

    pub fn neutral(method: DetectionMethod) -> Self {
        Self {
            pattern_type: Self::NO_PATTERN.to_string(),
            direction: Direction::Neutral,
            strength: 0,
            description: "No significant pattern detected".to_string(),
            prediction: "Sideways movement likely".to_string(),
            method,
        }
    }

    pub fn is_neutral(&self) -> bool {
        self.direction == Direction::Neutral
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pattern_type.trim().is_empty() {
            return Err(ValidationError::EmptyPatternType);
        }
        if self.strength > Self::MAX_STRENGTH {
            return Err(ValidationError::StrengthOutOfRange(self.strength as f64));
        }
        Ok(())
    }
}
