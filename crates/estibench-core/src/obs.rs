//! Structured observability hooks for benchmark lifecycle events.
//!
//! Every emitter logs a stable `event` field so log pipelines can filter
//! on it:
//! - `scenarios.generated` / `twin.created` from the generator
//! - `scenario.evaluated` from the evaluator
//! - `run.finalized` / `gate.evaluated` at run boundaries
//!
//! Per-item events go out at `debug!`; run boundaries at `info!`.

use tracing::{debug, info};
use uuid::Uuid;

use crate::domain::ScenarioResult;
use crate::metrics::AggregateMetrics;

/// RAII guard that enters a run-scoped tracing span for the duration of a run.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("5f1c...");
/// // every event below now carries run_id
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    /// Create and enter a span tagged with the run_id.
    pub fn enter(run_id: &str) -> Self {
        let span = tracing::info_span!("benchmark.run", run_id = %run_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: a generation pass finished.
pub fn emit_scenarios_generated(domain_id: &str, seed: u64, count: usize, twins: usize) {
    info!(
        event = "scenarios.generated",
        domain_id = %domain_id,
        seed = seed,
        base_scenarios = count,
        twins = twins,
    );
}

/// Emit event: a twin was derived from an original scenario.
pub fn emit_twin_created(original: &Uuid, twin: &Uuid, change: Option<&str>) {
    debug!(
        event = "twin.created",
        original_id = %original,
        twin_id = %twin,
        change = change.unwrap_or(""),
    );
}

/// Emit event: rollouts for one scenario were folded into a result.
pub fn emit_scenario_evaluated(result: &ScenarioResult) {
    debug!(
        event = "scenario.evaluated",
        scenario_id = %result.scenario_id,
        rollouts = result.rollouts.len(),
        mean_prediction = result.mean_prediction,
        absolute_error = result.absolute_error,
        within_tolerance = result.within_tolerance,
    );
}

/// Emit event: run metrics were computed.
pub fn emit_run_finalized(run_id: &str, metrics: &AggregateMetrics) {
    info!(
        event = "run.finalized",
        run_id = %run_id,
        completed = metrics.completed_scenarios,
        failed = metrics.failed_scenarios,
        hit_rate = metrics.hit_rate,
        rmse = metrics.rmse,
    );
}

/// Emit event: gate evaluation completed with hit rate and verdict.
pub fn emit_gate_evaluated(run_id: &str, hit_rate: f64, passed: bool) {
    info!(
        event = "gate.evaluated",
        run_id = %run_id,
        hit_rate = hit_rate,
        passed = passed,
    );
}
