use common::models::{DetectionMethod, Direction, Pattern};
use serde::Deserialize;

use crate::errors::DetectionBackendError;
use crate::remote::RemoteResponse;

/// One pattern as the model describes it. Accepts both the requested
/// `direction` key and the older `type` spelling.
#[derive(Deserialize, Debug)]
pub struct AnswerPattern {
    #[serde(alias = "name", alias = "pattern_name")]
    pub pattern: String,
    #[serde(alias = "type")]
    pub direction: String,
    pub strength: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub prediction: String,
}

#[derive(Deserialize, Debug)]
#[serde(untagged)]
pub enum Answer {
    List { patterns: Vec<AnswerPattern> },
    Single(AnswerPattern),
}

impl RemoteResponse<Pattern> for AnswerPattern {
    fn to_domain(&self) -> Result<Pattern, DetectionBackendError> {
        let schema = |e: common::ValidationError| DetectionBackendError::Schema(e.to_string());

        let name = self.pattern.trim();
        if name.is_empty() {
            return Err(schema(common::ValidationError::EmptyPatternType));
        }
        let direction = self.direction.parse::<Direction>().map_err(schema)?;
        if !self.strength.is_finite() || !(0.0..=Pattern::MAX_STRENGTH as f64).contains(&self.strength) {
            return Err(schema(common::ValidationError::StrengthOutOfRange(self.strength)));
        }

        Ok(Pattern {
            pattern_type: name.to_string(),
            direction,
            strength: self.strength.round() as u8,
            description: self.description.trim().to_string(),
            prediction: self.prediction.trim().to_string(),
            method: DetectionMethod::Ai,
        })
    }
}

impl RemoteResponse<Pattern> for Answer {
    /// A list answer resolves to its strongest entry; an empty list is a
    /// valid "nothing here" answer.
    fn to_domain(&self) -> Result<Pattern, DetectionBackendError> {
        match self {
            Self::Single(pattern) => pattern.to_domain(),
            Self::List { patterns } => {
                let mut best: Option<Pattern> = None;
                for candidate in patterns {
                    let candidate = candidate.to_domain()?;
                    if best.as_ref().is_none_or(|b| candidate.strength > b.strength) {
                        best = Some(candidate);
                    }
                }
                Ok(best.unwrap_or_else(|| Pattern::neutral(DetectionMethod::Ai)))
            }
        }
    }
}

/// Slice from the first `{` to the last `}`; models like to wrap JSON in prose.
pub fn extract_json(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    (end > start).then(|| &reply[start..=end])
}

pub fn parse_pattern(reply: &str) -> Result<Pattern, DetectionBackendError> {
    let json = extract_json(reply).ok_or(DetectionBackendError::NoJson)?;
    let answer: Answer = serde_json::from_str(json)?;
    answer.to_domain()
}
