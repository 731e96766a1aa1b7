//! Rollout and scenario result types.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One independent model invocation against a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RolloutResult {
    pub prediction: f64,
    pub reasoning: String,
    pub latency_ms: u64,
    /// Set when no numeric prediction could be extracted; `prediction` is
    /// then a sentinel zero that still counts in the statistics.
    #[serde(default)]
    pub failed: bool,
}

impl RolloutResult {
    /// A rollout that produced a numeric prediction.
    pub fn new(prediction: f64, reasoning: impl Into<String>, latency_ms: u64) -> Self {
        Self {
            prediction,
            reasoning: reasoning.into(),
            latency_ms,
            failed: false,
        }
    }

    /// Sentinel for a rollout that yielded no usable number.
    pub fn failure(reason: impl fmt::Display, latency_ms: u64) -> Self {
        Self {
            prediction: 0.0,
            reasoning: format!("prediction failure: {}", reason),
            latency_ms,
            failed: true,
        }
    }
}

/// Lifecycle state of a scenario result.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    #[default]
    Pending,
    Running,
    Completed,
    Failed,
}

impl ResultStatus {
    /// Completed and failed results never change again.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Ordinal difficulty bucket.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum DifficultyLevel {
    Trivial,
    Easy,
    Moderate,
    Hard,
    Expert,
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Trivial => "trivial",
            Self::Easy => "easy",
            Self::Moderate => "moderate",
            Self::Hard => "hard",
            Self::Expert => "expert",
        };
        f.write_str(label)
    }
}

/// Sub-scores behind a difficulty rating, each 0–100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyFactors {
    pub delta_complexity: f64,
    pub distractor_load: f64,
    pub interaction_effects: f64,
}

/// Composition-based difficulty of a scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DifficultyScore {
    pub score: f64,
    pub level: DifficultyLevel,
    pub factors: DifficultyFactors,
}

/// Dominant failure mode of a scenario result.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash,
)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPatternKind {
    Accurate,
    AnchorBias,
    DeltaBlindness,
    DistractorInfluence,
    SystematicOverestimate,
    SystematicUnderestimate,
    MagnitudeError,
}

impl ErrorPatternKind {
    pub const ALL: [ErrorPatternKind; 7] = [
        Self::Accurate,
        Self::AnchorBias,
        Self::DeltaBlindness,
        Self::DistractorInfluence,
        Self::SystematicOverestimate,
        Self::SystematicUnderestimate,
        Self::MagnitudeError,
    ];
}

impl fmt::Display for ErrorPatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Accurate => "accurate",
            Self::AnchorBias => "anchor_bias",
            Self::DeltaBlindness => "delta_blindness",
            Self::DistractorInfluence => "distractor_influence",
            Self::SystematicOverestimate => "systematic_overestimate",
            Self::SystematicUnderestimate => "systematic_underestimate",
            Self::MagnitudeError => "magnitude_error",
        };
        f.write_str(label)
    }
}

/// How badly a classified result missed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Minor,
    Moderate,
    Severe,
}

/// Classified failure mode with a human-readable explanation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorPattern {
    pub pattern: ErrorPatternKind,
    pub severity: Severity,
    pub details: String,
}

/// Aggregated outcome of all rollouts for one scenario.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub scenario_id: Uuid,
    pub status: ResultStatus,
    pub rollouts: Vec<RolloutResult>,
    pub mean_prediction: f64,
    pub std_deviation: f64,
    pub min_prediction: f64,
    pub max_prediction: f64,
    /// `meanPrediction - groundTruth.value`.
    pub error: f64,
    pub absolute_error: f64,
    pub within_tolerance: bool,
    /// Percentage of individual rollouts within tolerance.
    pub rollout_consistency: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<DifficultyScore>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_pattern: Option<ErrorPattern>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl ScenarioResult {
    /// Zero-valued result awaiting rollouts.
    pub fn pending(scenario_id: Uuid) -> Self {
        Self {
            scenario_id,
            status: ResultStatus::Pending,
            rollouts: Vec::new(),
            mean_prediction: 0.0,
            std_deviation: 0.0,
            min_prediction: 0.0,
            max_prediction: 0.0,
            error: 0.0,
            absolute_error: 0.0,
            within_tolerance: false,
            rollout_consistency: 0.0,
            difficulty: None,
            error_pattern: None,
            failure_reason: None,
        }
    }

    /// Result for a scenario whose rollout pipeline failed outright.
    pub fn failed(scenario_id: Uuid, reason: impl Into<String>) -> Self {
        Self {
            status: ResultStatus::Failed,
            failure_reason: Some(reason.into()),
            ..Self::pending(scenario_id)
        }
    }

    /// Number of sentinel rollouts.
    pub fn failed_rollouts(&self) -> usize {
        self.rollouts.iter().filter(|r| r.failed).count()
    }
}
