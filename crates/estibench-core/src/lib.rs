//! Estibench Core Library
//!
//! Scenario generation and evaluation engine for numeric-estimation
//! benchmarks. Scenarios combine a base-rate anchor with adjustment deltas
//! and irrelevant distractors; each has a deterministic ground truth and a
//! tolerance band. Model answers are scored for accuracy, twin-pair
//! directional sensitivity, difficulty and characteristic error patterns.

pub mod difficulty;
pub mod digest;
pub mod domain;
pub mod error_patterns;
pub mod evaluator;
pub mod gate;
pub mod generator;
pub mod ground_truth;
pub mod metrics;
pub mod obs;
pub mod prediction;
pub mod registry;
pub mod reporting;
pub mod run;
pub mod telemetry;

pub use domain::{
    diff_deltas, round2, Anchor, BenchError, Delta, DeltaChange, DeltaKind, DifficultyFactors,
    DifficultyLevel, DifficultyScore, DomainConfig, ErrorPattern, ErrorPatternKind, GroundTruth,
    Result, ResultStatus, RolloutResult, Scenario, ScenarioResult, Severity, ToleranceMode,
    TwinRole, MIN_TOLERANCE,
};

pub use difficulty::{calculate_difficulty, level_for, scenario_difficulty};
pub use digest::{canonical_json, compute_digest, scenario_set_digest};
pub use error_patterns::{
    analyze_error_patterns, classify_error_pattern, BiasDirection, ErrorPatternSummary,
};
pub use evaluator::{evaluate_rollouts, within_tolerance, PredictionStats};
pub use gate::{evaluate_gate, GateRule, GateRuleSet, GateThresholds, GateVerdict, Violation};
pub use generator::{generate_scenarios, generate_with_rng, twin_pairs, GenerationOptions, ScenarioRng};
pub use ground_truth::compute_ground_truth;
pub use metrics::{calculate_aggregate_metrics, direction_correct, AggregateMetrics};
pub use prediction::{parse_prediction, PredictionFailure};
pub use registry::DomainRegistry;
pub use reporting::{
    read_run_artifact, render_run_summary_md, write_gate_verdict, write_run_artifact,
    write_run_summary_md,
};
pub use run::{BenchmarkRun, RunStatus};

/// Crate version, for artifact provenance.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
