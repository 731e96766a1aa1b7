//! Run-level aggregate metrics.
//!
//! Hit rate is taken over every terminal result, with a failed scenario
//! counted as a miss. Only completed results feed the error statistics,
//! since failed results carry no prediction. Every metric is total: an
//! empty run yields zeros, never NaN.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{round2, ResultStatus, Scenario, ScenarioResult};
use crate::generator::twin_pairs;

/// Expected twin differences smaller than this count as "no difference".
pub const NO_DIFFERENCE_TRUTH_BAND: f64 = 0.01;
/// Predicted twin differences smaller than this count as "no difference".
pub const NO_DIFFERENCE_PREDICTION_BAND: f64 = 0.1;

/// Summary statistics for a benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregateMetrics {
    pub total_scenarios: usize,
    pub completed_scenarios: usize,
    pub failed_scenarios: usize,
    /// Percentage of terminal results whose mean is within tolerance.
    /// Failed scenarios count as misses.
    pub hit_rate: f64,
    /// Average signed error; the sign shows the bias direction.
    pub mean_error: f64,
    pub mean_absolute_error: f64,
    pub rmse: f64,
    pub avg_latency_ms: f64,
    pub total_rollouts: usize,
    pub failed_rollouts: usize,
    /// Percentage of twin pairs whose predicted difference has the right
    /// sign. `None` when no pair has both results completed.
    pub directional_accuracy: Option<f64>,
    pub twin_pairs_evaluated: usize,
}

/// Compute aggregate metrics over a run's results.
pub fn calculate_aggregate_metrics(
    scenarios: &[Scenario],
    results: &[ScenarioResult],
) -> AggregateMetrics {
    let completed: Vec<&ScenarioResult> = results
        .iter()
        .filter(|r| r.status == ResultStatus::Completed)
        .collect();
    let failed_scenarios = results
        .iter()
        .filter(|r| r.status == ResultStatus::Failed)
        .count();

    let n = completed.len();
    let terminal = n + failed_scenarios;
    let hits = completed.iter().filter(|r| r.within_tolerance).count();
    let hit_rate = if terminal == 0 {
        0.0
    } else {
        round2(100.0 * hits as f64 / terminal as f64)
    };
    let (mean_error, mean_absolute_error, rmse) = if n == 0 {
        (0.0, 0.0, 0.0)
    } else {
        let nf = n as f64;
        let err_sum: f64 = completed.iter().map(|r| r.error).sum();
        let abs_sum: f64 = completed.iter().map(|r| r.absolute_error).sum();
        let sq_sum: f64 = completed.iter().map(|r| r.error * r.error).sum();
        (
            round2(err_sum / nf),
            round2(abs_sum / nf),
            round2((sq_sum / nf).sqrt()),
        )
    };

    let total_rollouts: usize = completed.iter().map(|r| r.rollouts.len()).sum();
    let failed_rollouts: usize = completed.iter().map(|r| r.failed_rollouts()).sum();
    let avg_latency_ms = if total_rollouts == 0 {
        0.0
    } else {
        let latency: u64 = completed
            .iter()
            .flat_map(|r| r.rollouts.iter())
            .map(|r| r.latency_ms)
            .sum();
        round2(latency as f64 / total_rollouts as f64)
    };

    let (directional_accuracy, twin_pairs_evaluated) = directional_accuracy(scenarios, results);

    AggregateMetrics {
        total_scenarios: results.len(),
        completed_scenarios: n,
        failed_scenarios,
        hit_rate,
        mean_error,
        mean_absolute_error,
        rmse,
        avg_latency_ms,
        total_rollouts,
        failed_rollouts,
        directional_accuracy,
        twin_pairs_evaluated,
    }
}

/// Whether a twin pair's predicted difference matches the expected one.
///
/// Correct when the signs agree, or when both differences fall inside the
/// "no material difference" bands.
pub fn direction_correct(expected_diff: f64, actual_diff: f64) -> bool {
    let both_flat = expected_diff.abs() < NO_DIFFERENCE_TRUTH_BAND
        && actual_diff.abs() < NO_DIFFERENCE_PREDICTION_BAND;
    both_flat || sign(expected_diff) == sign(actual_diff)
}

fn sign(value: f64) -> i8 {
    if value > 0.0 {
        1
    } else if value < 0.0 {
        -1
    } else {
        0
    }
}

fn directional_accuracy(
    scenarios: &[Scenario],
    results: &[ScenarioResult],
) -> (Option<f64>, usize) {
    let by_id: HashMap<Uuid, &ScenarioResult> = results
        .iter()
        .filter(|r| r.status == ResultStatus::Completed)
        .map(|r| (r.scenario_id, r))
        .collect();

    let mut evaluated = 0usize;
    let mut correct = 0usize;
    for (original, twin) in twin_pairs(scenarios) {
        let (Some(a), Some(b)) = (by_id.get(&original.id), by_id.get(&twin.id)) else {
            continue;
        };
        let expected = original.ground_truth.value - twin.ground_truth.value;
        let actual = a.mean_prediction - b.mean_prediction;
        evaluated += 1;
        if direction_correct(expected, actual) {
            correct += 1;
        }
    }

    if evaluated == 0 {
        (None, 0)
    } else {
        (
            Some(round2(100.0 * correct as f64 / evaluated as f64)),
            evaluated,
        )
    }
}
