//! Domain configuration: anchors, deltas, distractors and the tolerance rule.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::{BenchError, Result};

/// Smallest tolerance ever handed out, so a zero ground truth under
/// percentage mode still has a strictly positive tolerance.
pub const MIN_TOLERANCE: f64 = 0.01;

/// How a delta combines with the running value.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DeltaKind {
    Additive,
    Multiplicative,
}

/// How the tolerance of a scenario is derived.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ToleranceMode {
    /// `toleranceValue` is an absolute band.
    #[default]
    Fixed,
    /// `toleranceValue` is a percentage of `|groundTruth|`.
    Percentage,
}

/// Named base rate for a scenario category.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Anchor {
    pub value: f64,
    #[serde(default)]
    pub description: String,
}

/// Named adjustment applied on top of an anchor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Delta {
    #[serde(rename = "type")]
    pub kind: DeltaKind,
    pub value: f64,
    #[serde(default)]
    pub description: String,
}

fn default_tolerance_value() -> f64 {
    1.0
}

/// Static description of a benchmark domain.
///
/// Anchors and deltas live in `BTreeMap`s so iteration order is stable; the
/// seeded generator depends on that for reproducibility.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DomainConfig {
    pub id: String,
    pub name: String,
    pub anchors: BTreeMap<String, Anchor>,
    #[serde(default)]
    pub deltas: BTreeMap<String, Delta>,
    #[serde(default)]
    pub distractors: Vec<String>,
    #[serde(default)]
    pub tolerance_mode: ToleranceMode,
    #[serde(default = "default_tolerance_value")]
    pub tolerance_value: f64,
}

impl DomainConfig {
    /// Start an empty domain with a fixed tolerance of 1.0.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            anchors: BTreeMap::new(),
            deltas: BTreeMap::new(),
            distractors: Vec::new(),
            tolerance_mode: ToleranceMode::Fixed,
            tolerance_value: default_tolerance_value(),
        }
    }

    /// Add an anchor.
    pub fn with_anchor(mut self, key: &str, value: f64, description: &str) -> Self {
        self.anchors.insert(
            key.to_string(),
            Anchor {
                value,
                description: description.to_string(),
            },
        );
        self
    }

    /// Add an additive delta.
    pub fn with_additive(mut self, key: &str, value: f64, description: &str) -> Self {
        self.deltas.insert(
            key.to_string(),
            Delta {
                kind: DeltaKind::Additive,
                value,
                description: description.to_string(),
            },
        );
        self
    }

    /// Add a multiplicative delta.
    pub fn with_multiplicative(mut self, key: &str, value: f64, description: &str) -> Self {
        self.deltas.insert(
            key.to_string(),
            Delta {
                kind: DeltaKind::Multiplicative,
                value,
                description: description.to_string(),
            },
        );
        self
    }

    /// Add a distractor sentence.
    pub fn with_distractor(mut self, text: &str) -> Self {
        self.distractors.push(text.to_string());
        self
    }

    /// Set the tolerance rule.
    pub fn with_tolerance(mut self, mode: ToleranceMode, value: f64) -> Self {
        self.tolerance_mode = mode;
        self.tolerance_value = value;
        self
    }

    /// Parse and validate a TOML domain file.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON domain file.
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural rules every loaded domain must satisfy.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(BenchError::InvalidDomainConfig(
                "domain id must not be empty".to_string(),
            ));
        }
        if self.anchors.is_empty() {
            return Err(BenchError::InvalidDomainConfig(format!(
                "domain '{}' defines no anchors",
                self.id
            )));
        }
        for (key, anchor) in &self.anchors {
            if !anchor.value.is_finite() {
                return Err(BenchError::InvalidDomainConfig(format!(
                    "anchor '{}' has a non-finite value",
                    key
                )));
            }
        }
        for (key, delta) in &self.deltas {
            if !delta.value.is_finite() {
                return Err(BenchError::InvalidDomainConfig(format!(
                    "delta '{}' has a non-finite value",
                    key
                )));
            }
            if delta.kind == DeltaKind::Multiplicative && delta.value <= 0.0 {
                return Err(BenchError::InvalidDomainConfig(format!(
                    "multiplicative delta '{}' must be positive, got {}",
                    key, delta.value
                )));
            }
        }
        if !self.tolerance_value.is_finite() || self.tolerance_value <= 0.0 {
            return Err(BenchError::InvalidDomainConfig(format!(
                "toleranceValue must be positive, got {}",
                self.tolerance_value
            )));
        }
        Ok(())
    }

    /// Look up an anchor, failing with a configuration error if unknown.
    pub fn anchor(&self, key: &str) -> Result<&Anchor> {
        self.anchors
            .get(key)
            .ok_or_else(|| BenchError::UnknownAnchor {
                domain: self.id.clone(),
                key: key.to_string(),
            })
    }

    /// Look up a delta, failing with a configuration error if unknown.
    pub fn delta(&self, key: &str) -> Result<&Delta> {
        self.deltas.get(key).ok_or_else(|| BenchError::UnknownDelta {
            domain: self.id.clone(),
            key: key.to_string(),
        })
    }

    /// Tolerance band for a scenario whose ground truth is `value`.
    pub fn tolerance_for(&self, value: f64) -> f64 {
        let raw = match self.tolerance_mode {
            ToleranceMode::Fixed => self.tolerance_value,
            ToleranceMode::Percentage => round2(value.abs() * self.tolerance_value / 100.0),
        };
        raw.max(MIN_TOLERANCE)
    }
}

/// Round half away from zero to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOML_DOMAIN: &str = r#"
id = "orchard"
name = "Orchard output"
toleranceMode = "percentage"
toleranceValue = 5.0
distractors = ["The farmer's dog is named Biscuit."]

[anchors.apples]
value = 20.0
description = "Apples per tree (crates)"

[deltas.frost]
type = "multiplicative"
value = 0.7
description = "Late spring frost"

[deltas.irrigation]
type = "additive"
value = 3.0
"#;

    #[test]
    fn test_from_toml_applies_defaults_once() {
        let config = DomainConfig::from_toml_str(TOML_DOMAIN).expect("parse");
        assert_eq!(config.id, "orchard");
        assert_eq!(config.tolerance_mode, ToleranceMode::Percentage);
        assert_eq!(config.deltas["frost"].kind, DeltaKind::Multiplicative);
        assert_eq!(config.deltas["irrigation"].description, "");
        assert_eq!(config.distractors.len(), 1);
    }

    #[test]
    fn test_from_json_defaults_tolerance() {
        let raw = r#"{"id":"x","name":"X","anchors":{"a":{"value":1.0}}}"#;
        let config = DomainConfig::from_json_str(raw).expect("parse");
        assert_eq!(config.tolerance_mode, ToleranceMode::Fixed);
        assert_eq!(config.tolerance_value, 1.0);
        assert!(config.deltas.is_empty());
        assert!(config.distractors.is_empty());
    }

    #[test]
    fn test_validate_rejects_missing_anchors() {
        let raw = r#"{"id":"x","name":"X","anchors":{}}"#;
        let err = DomainConfig::from_json_str(raw).unwrap_err();
        assert!(err.is_configuration_error());
    }

    #[test]
    fn test_validate_rejects_non_positive_tolerance() {
        let config = DomainConfig::new("x", "X")
            .with_anchor("a", 1.0, "a")
            .with_tolerance(ToleranceMode::Fixed, 0.0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_non_positive_multiplier() {
        let config = DomainConfig::new("x", "X")
            .with_anchor("a", 1.0, "a")
            .with_multiplicative("wipeout", 0.0, "total loss");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unknown_keys_are_configuration_errors() {
        let config = DomainConfig::new("x", "X").with_anchor("a", 1.0, "a");
        assert!(config.anchor("missing").unwrap_err().is_configuration_error());
        assert!(config.delta("missing").unwrap_err().is_configuration_error());
    }

    #[test]
    fn test_percentage_tolerance_scales_with_truth() {
        let config = DomainConfig::new("x", "X")
            .with_anchor("a", 1.0, "a")
            .with_tolerance(ToleranceMode::Percentage, 5.0);
        assert_eq!(config.tolerance_for(13.2), 0.66);
        assert_eq!(config.tolerance_for(-40.0), 2.0);
    }

    #[test]
    fn test_tolerance_never_zero() {
        let config = DomainConfig::new("x", "X")
            .with_anchor("a", 1.0, "a")
            .with_tolerance(ToleranceMode::Percentage, 5.0);
        assert_eq!(config.tolerance_for(0.0), MIN_TOLERANCE);
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(13.200000000000001), 13.2);
        assert_eq!(round2(2.346), 2.35);
        assert_eq!(round2(-1.005), -1.0);
    }
}
