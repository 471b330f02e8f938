use std::fmt::Write;

use common::models::Candle;

const SYSTEM: &str = "You are an expert financial analyst specializing in candlestick patterns. Respond only with valid JSON.";

const ANSWER_SHAPE: &str = r#"Respond in the following JSON format only:
{
  "pattern": "pattern_name",
  "direction": "bullish|bearish|neutral",
  "strength": 75,
  "description": "What this pattern indicates",
  "prediction": "Possible short-term price movement"
}
If no recognizable pattern is present, answer with pattern "None", direction "neutral" and strength 0."#;

#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn classify(candle: &Candle, history: &[Candle]) -> Self {
        let mut user = String::from(
            "Analyze the following candlestick data and identify the single most significant candlestick pattern.\n",
        );
        describe(&mut user, candle, history);
        user.push_str("Keep description and prediction to one sentence each.\n\n");
        user.push_str(ANSWER_SHAPE);
        Self {
            system: SYSTEM.to_string(),
            user,
        }
    }

    pub fn explain(candle: &Candle, history: &[Candle]) -> Self {
        let mut user = String::from(
            "Analyze the following candlestick data and identify the single most significant candlestick pattern.\n",
        );
        describe(&mut user, candle, history);
        user.push_str(
            "In the description, explain the market psychology behind the formation and how the wicks and body support it. \
             In the prediction, describe the likely short-term path, what would confirm it and what would invalidate it.\n\n",
        );
        user.push_str(ANSWER_SHAPE);
        Self {
            system: SYSTEM.to_string(),
            user,
        }
    }
}

fn describe(out: &mut String, candle: &Candle, history: &[Candle]) {
    let range = candle.range();
    let body_percent = if range > 0.0 {
        candle.body() / range * 100.0
    } else {
        0.0
    };
    let colour = if candle.is_bullish() {
        "Bullish"
    } else if candle.is_bearish() {
        "Bearish"
    } else {
        "Flat"
    };

    let _ = writeln!(out, "\nCandlestick data for {} at {}:", candle.symbol, candle.timestamp.to_rfc3339());
    let _ = writeln!(out, "- Open: {}", candle.open);
    let _ = writeln!(out, "- High: {}", candle.high);
    let _ = writeln!(out, "- Low: {}", candle.low);
    let _ = writeln!(out, "- Close: {}", candle.close);
    let _ = writeln!(out, "- Volume: {}", candle.volume);
    let _ = writeln!(out, "\nAdditional metrics:");
    let _ = writeln!(out, "- Body size: {:.2}", candle.body());
    let _ = writeln!(out, "- Price range: {:.2}", range);
    let _ = writeln!(out, "- Direction: {}", colour);
    let _ = writeln!(out, "- Body percentage of range: {:.2}%", body_percent);

    if !history.is_empty() {
        let _ = writeln!(out, "\nPreceding candles, oldest first:");
        for prev in history {
            let _ = writeln!(
                out,
                "- {}: O={} H={} L={} C={} V={}",
                prev.timestamp.to_rfc3339(),
                prev.open,
                prev.high,
                prev.low,
                prev.close,
                prev.volume
            );
        }
    }
    out.push('\n');
}
