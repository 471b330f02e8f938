//! Deterministic candlestick classification from OHLC geometry alone.
//!
//! Rules are evaluated in a fixed order and the first match wins:
//! Doji, then Engulfing (needs the previous candle), then the
//! hammer/shooting-star family. Nothing matching yields a neutral pattern.

use async_trait::async_trait;
use common::models::{Candle, DetectionMethod, Direction, Pattern};

use crate::detection::{DetectorKind, PatternDetector};

/// Body at most this share of the range makes a Doji.
pub const DOJI_BODY_RATIO: f64 = 0.1;
/// Dominant wick must be at least this many bodies long.
pub const WICK_BODY_MULTIPLE: f64 = 2.0;
/// Opposite wick may be at most this share of the body.
pub const SHORT_WICK_BODY_RATIO: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Formation {
    Doji,
    Engulfing,
    Hammer,
    HangingMan,
    InvertedHammer,
    ShootingStar,
}

impl Formation {
    fn name(self) -> &'static str {
        match self {
            Self::Doji => "Doji",
            Self::Engulfing => "Engulfing",
            Self::Hammer => "Hammer",
            Self::HangingMan => "Hanging Man",
            Self::InvertedHammer => "Inverted Hammer",
            Self::ShootingStar => "Shooting Star",
        }
    }

    fn narrative(self, direction: Direction) -> (&'static str, &'static str) {
        match (self, direction) {
            (Self::Doji, _) => (
                "Open and close almost equal; buyers and sellers are balanced",
                "Indecision, wait for confirmation",
            ),
            (Self::Engulfing, Direction::Bullish) => (
                "Bullish body fully engulfs the previous bearish body",
                "Potential upward reversal in the short term",
            ),
            (Self::Engulfing, _) => (
                "Bearish body fully engulfs the previous bullish body",
                "Potential downward reversal in the short term",
            ),
            (Self::Hammer, _) => (
                "Long lower wick rejected lower prices and closed up",
                "Potential bullish movement in the short term",
            ),
            (Self::HangingMan, _) => (
                "Long lower wick with a bearish close",
                "Potential bearish movement in the short term",
            ),
            (Self::InvertedHammer, _) => (
                "Long upper wick with a bullish close",
                "Potential bullish movement in the short term",
            ),
            (Self::ShootingStar, _) => (
                "Long upper wick rejected higher prices and closed down",
                "Potential bearish movement in the short term",
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedDetector;

impl RuleBasedDetector {
    pub fn new() -> Self {
        Self
    }

    /// Pure classification: identical input always yields an identical pattern.
    pub fn classify(&self, candle: &Candle, history: &[Candle]) -> Pattern {
        let matched = Self::doji(candle)
            .or_else(|| history.last().and_then(|prev| Self::engulfing(prev, candle)))
            .or_else(|| Self::wick_rejection(candle));

        match matched {
            Some((formation, direction, strength)) => {
                let (description, prediction) = formation.narrative(direction);
                Pattern {
                    pattern_type: formation.name().to_string(),
                    direction,
                    strength,
                    description: description.to_string(),
                    prediction: prediction.to_string(),
                    method: DetectionMethod::Rule,
                }
            }
            None => Pattern::neutral(DetectionMethod::Rule),
        }
    }

    fn doji(candle: &Candle) -> Option<(Formation, Direction, u8)> {
        let range = candle.range();
        if range <= 0.0 || candle.body() > DOJI_BODY_RATIO * range {
            return None;
        }
        let strength = to_strength(100.0 * (1.0 - candle.body() / range));
        Some((Formation::Doji, Direction::Neutral, strength))
    }

    fn engulfing(prev: &Candle, current: &Candle) -> Option<(Formation, Direction, u8)> {
        let direction = if current.is_bullish() && prev.is_bearish() {
            Direction::Bullish
        } else if current.is_bearish() && prev.is_bullish() {
            Direction::Bearish
        } else {
            return None;
        };

        let contains = current.body_bottom() < prev.body_bottom() && current.body_top() > prev.body_top();
        if !contains {
            return None;
        }

        let ratio = current.body() / prev.body();
        let strength = to_strength((50.0 + 20.0 * (ratio - 1.0)).clamp(50.0, 100.0));
        Some((Formation::Engulfing, direction, strength))
    }

    fn wick_rejection(candle: &Candle) -> Option<(Formation, Direction, u8)> {
        let body = candle.body();
        if body <= 0.0 {
            return None;
        }
        let (upper, lower) = (candle.upper_wick(), candle.lower_wick());
        let short = SHORT_WICK_BODY_RATIO * body;

        let (formation, wick) = if lower >= WICK_BODY_MULTIPLE * body && upper <= short {
            let formation = if candle.is_bullish() {
                Formation::Hammer
            } else {
                Formation::HangingMan
            };
            (formation, lower)
        } else if upper >= WICK_BODY_MULTIPLE * body && lower <= short {
            let formation = if candle.is_bullish() {
                Formation::InvertedHammer
            } else {
                Formation::ShootingStar
            };
            (formation, upper)
        } else {
            return None;
        };

        let direction = if candle.is_bullish() {
            Direction::Bullish
        } else {
            Direction::Bearish
        };
        let ratio = wick / body;
        let strength = to_strength((40.0 + 15.0 * (ratio - WICK_BODY_MULTIPLE)).clamp(40.0, 95.0));
        Some((formation, direction, strength))
    }
}

fn to_strength(value: f64) -> u8 {
    value.round().clamp(0.0, Pattern::MAX_STRENGTH as f64) as u8
}

#[async_trait]
impl PatternDetector for RuleBasedDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Rule
    }

    async fn detect(&self, candle: &Candle, history: &[Candle]) -> Pattern {
        self.classify(candle, history)
    }
}
