//! Extraction of numeric predictions from raw model responses.
//!
//! A response that yields no usable number becomes a sentinel rollout
//! rather than an error, so the evaluator still counts it.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::RolloutResult;

/// JSON fields checked, in order, when a response is a JSON object.
const JSON_FIELDS: [&str; 3] = ["prediction", "estimate", "answer"];

/// A rollout response that could not be turned into a number.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PredictionFailure {
    #[error("empty response")]
    Empty,

    #[error("no numeric value found")]
    NoNumber,

    #[error("non-finite value: {0}")]
    NonFinite(String),
}

fn labelled_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?i)(?:final\s+answer|prediction|estimate|answer)[\s*_]*[:=][\s*_]*(-?[\d,]*\.?\d+(?:[eE][-+]?\d+)?)",
        )
        .ok()
    })
    .as_ref()
}

/// A number, optionally signed. The sign only counts when the character
/// before it is not part of a number, so `150-160` reads as two values.
fn number_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?:^|[^\d.,])(-?(?:\d[\d,]*(?:\.\d+)?|\.\d+))").ok())
        .as_ref()
}

/// Extract the predicted value from a raw model response.
///
/// Tried in order: a JSON object with a numeric `prediction`, `estimate`
/// or `answer` field; a labelled value such as `Final answer: 42.5`; the
/// last number in the text. Thousands separators are ignored.
pub fn parse_prediction(text: &str) -> Result<f64, PredictionFailure> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PredictionFailure::Empty);
    }

    if let Some(value) = from_json(trimmed) {
        return finite(value);
    }

    if let Some(caps) = labelled_re().and_then(|re| re.captures_iter(trimmed).last()) {
        if let Some(value) = caps.get(1).and_then(|m| to_number(m.as_str())) {
            return finite(value);
        }
    }

    number_re()
        .and_then(|re| {
            re.captures_iter(trimmed)
                .filter_map(|caps| caps.get(1).and_then(|m| to_number(m.as_str())))
                .last()
        })
        .ok_or(PredictionFailure::NoNumber)
        .and_then(finite)
}

fn from_json(text: &str) -> Option<f64> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    let value: serde_json::Value = serde_json::from_str(&text[start..=end]).ok()?;
    let obj = value.as_object()?;
    JSON_FIELDS.iter().find_map(|field| match obj.get(*field)? {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => to_number(s.trim().trim_end_matches('%')),
        _ => None,
    })
}

fn to_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse::<f64>().ok()
}

fn finite(value: f64) -> Result<f64, PredictionFailure> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PredictionFailure::NonFinite(value.to_string()))
    }
}

impl RolloutResult {
    /// Build a rollout from a raw response, falling back to the sentinel.
    pub fn from_response(text: &str, latency_ms: u64) -> Self {
        match parse_prediction(text) {
            Ok(value) => Self::new(value, text, latency_ms),
            Err(failure) => Self::failure(failure, latency_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field() {
        let text = r#"Here is my answer: {"prediction": 171.5, "reasoning": "drought"}"#;
        assert_eq!(parse_prediction(text), Ok(171.5));
    }

    #[test]
    fn test_json_string_field_with_percent() {
        let text = r#"{"estimate": "12.5%"}"#;
        assert_eq!(parse_prediction(text), Ok(12.5));
    }

    #[test]
    fn test_labelled_value_wins_over_later_numbers() {
        let text = "Base is 180 bu/acre.\nFinal answer: 153.0\n(assuming 2 weeks of rain)";
        assert_eq!(parse_prediction(text), Ok(153.0));
    }

    #[test]
    fn test_markdown_bold_label() {
        let text = "**Estimate:** **1,250.75** dollars";
        assert_eq!(parse_prediction(text), Ok(1250.75));
    }

    #[test]
    fn test_last_number_fallback() {
        let text = "Starting from 52 and subtracting 8 gives 44";
        assert_eq!(parse_prediction(text), Ok(44.0));
    }

    #[test]
    fn test_negative_values() {
        assert_eq!(parse_prediction("prediction: -3.25"), Ok(-3.25));
        assert_eq!(parse_prediction("growth slows to -4.5 this year"), Ok(-4.5));
        assert_eq!(parse_prediction("(-12)"), Ok(-12.0));
    }

    #[test]
    fn test_range_hyphen_is_not_a_sign() {
        assert_eq!(
            parse_prediction("I expect a yield in the range 150-160 bushels"),
            Ok(160.0)
        );
        assert_eq!(parse_prediction("somewhere in 150–160"), Ok(160.0));
        assert_eq!(parse_prediction("between 1,200-1,350 units"), Ok(1350.0));
        assert_eq!(parse_prediction("roughly 4.5-6 percent"), Ok(6.0));
    }

    #[test]
    fn test_failures() {
        assert_eq!(parse_prediction("   "), Err(PredictionFailure::Empty));
        assert_eq!(
            parse_prediction("I cannot estimate this."),
            Err(PredictionFailure::NoNumber)
        );
    }

    #[test]
    fn test_from_response_sentinel() {
        let rollout = RolloutResult::from_response("no idea", 1200);
        assert!(rollout.failed);
        assert_eq!(rollout.prediction, 0.0);
        assert_eq!(rollout.latency_ms, 1200);
        assert!(rollout.reasoning.contains("no numeric value found"));

        let rollout = RolloutResult::from_response("Answer: 7", 30);
        assert!(!rollout.failed);
        assert_eq!(rollout.prediction, 7.0);
        assert_eq!(rollout.reasoning, "Answer: 7");
    }
}
