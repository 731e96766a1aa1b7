//! Domain models for the benchmark engine.
//!
//! Canonical definitions for the core entities:
//! - `DomainConfig`: anchors, deltas, distractors and tolerance rule
//! - `Scenario`: a generated test case with its ground truth
//! - `RolloutResult` / `ScenarioResult`: model answers and their aggregate

pub mod config;
pub mod error;
pub mod result;
pub mod scenario;

// Re-export main types and errors
pub use config::{round2, Anchor, Delta, DeltaKind, DomainConfig, ToleranceMode, MIN_TOLERANCE};
pub use error::{BenchError, Result};
pub use result::{
    DifficultyFactors, DifficultyLevel, DifficultyScore, ErrorPattern, ErrorPatternKind,
    ResultStatus, RolloutResult, ScenarioResult, Severity,
};
pub use scenario::{diff_deltas, DeltaChange, GroundTruth, Scenario, TwinRole};
