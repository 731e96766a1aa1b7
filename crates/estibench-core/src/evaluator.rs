//! Rollout evaluator.
//!
//! Folds K stochastic predictions for one scenario into a verdict. The
//! mean-based `within_tolerance` and the per-rollout `rollout_consistency`
//! are kept separate: averaging can hide wide per-trial spread.

use tracing::{debug, warn};

use crate::domain::{round2, ResultStatus, RolloutResult, Scenario, ScenarioResult};
use crate::obs;

/// Slack on the tolerance comparison so exact-boundary errors survive
/// floating-point noise.
pub const TOLERANCE_EPSILON: f64 = 1e-9;

/// Summary statistics over a set of predictions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionStats {
    pub mean: f64,
    /// Sample standard deviation (n − 1); 0 for a single value.
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
}

impl PredictionStats {
    /// `None` for an empty slice.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std_dev = if values.len() > 1 {
            let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
            (ss / (n - 1.0)).sqrt()
        } else {
            0.0
        };
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        Some(Self {
            mean,
            std_dev,
            min,
            max,
        })
    }
}

/// Whether an absolute error counts as a hit. Boundary-inclusive.
pub fn within_tolerance(absolute_error: f64, tolerance: f64) -> bool {
    absolute_error <= tolerance + TOLERANCE_EPSILON
}

/// Evaluate every rollout recorded for `scenario`.
///
/// Sentinel rollouts (`failed = true`) are kept in the statistics so that
/// unreliable output is penalised. An empty rollout list yields a pending,
/// zero-valued result.
pub fn evaluate_rollouts(scenario: &Scenario, rollouts: Vec<RolloutResult>) -> ScenarioResult {
    let predictions: Vec<f64> = rollouts.iter().map(|r| r.prediction).collect();
    let Some(stats) = PredictionStats::from_values(&predictions) else {
        debug!(scenario_id = %scenario.id, "no rollouts; result stays pending");
        return ScenarioResult::pending(scenario.id);
    };

    let truth = scenario.ground_truth.value;
    let tolerance = scenario.ground_truth.tolerance;
    let error = stats.mean - truth;
    let absolute_error = error.abs();

    let hits = predictions
        .iter()
        .filter(|p| within_tolerance((*p - truth).abs(), tolerance))
        .count();
    let rollout_consistency = round2(100.0 * hits as f64 / predictions.len() as f64);

    let failed = rollouts.iter().filter(|r| r.failed).count();
    if failed > 0 {
        warn!(
            event = "prediction.failed",
            scenario_id = %scenario.id,
            failed_rollouts = failed,
            total_rollouts = rollouts.len(),
        );
    }

    let result = ScenarioResult {
        scenario_id: scenario.id,
        status: ResultStatus::Completed,
        rollouts,
        mean_prediction: stats.mean,
        std_deviation: stats.std_dev,
        min_prediction: stats.min,
        max_prediction: stats.max,
        error,
        absolute_error,
        within_tolerance: within_tolerance(absolute_error, tolerance),
        rollout_consistency,
        difficulty: None,
        error_pattern: None,
        failure_reason: None,
    };
    obs::emit_scenario_evaluated(&result);
    result
}
