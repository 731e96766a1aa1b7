//! Benchmark run lifecycle.
//!
//! A run owns a generated scenario set and one result per scenario, kept as
//! parallel lists. Results move from pending to a terminal state exactly
//! once; the run is finalized when every result is terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::difficulty::scenario_difficulty;
use crate::digest::scenario_set_digest;
use crate::domain::{BenchError, DomainConfig, Result, RolloutResult, Scenario, ScenarioResult};
use crate::error_patterns::{analyze_error_patterns, classify_error_pattern, ErrorPatternSummary};
use crate::evaluator::evaluate_rollouts;
use crate::generator::{generate_scenarios, GenerationOptions};
use crate::metrics::{calculate_aggregate_metrics, AggregateMetrics};
use crate::obs;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    #[default]
    Pending,
    Completed,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
        })
    }
}

/// A generated scenario set plus the results recorded against it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BenchmarkRun {
    pub id: Uuid,
    pub domain_id: String,
    pub options: GenerationOptions,
    pub status: RunStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Content digest of `scenarios`, ids excluded.
    pub scenario_digest: String,
    pub scenarios: Vec<Scenario>,
    /// `results[i]` belongs to `scenarios[i]`.
    pub results: Vec<ScenarioResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AggregateMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_patterns: Option<ErrorPatternSummary>,
}

impl BenchmarkRun {
    /// Start a run over an already generated scenario set.
    pub fn new(
        config: &DomainConfig,
        options: GenerationOptions,
        scenarios: Vec<Scenario>,
    ) -> Result<Self> {
        let results = scenarios
            .iter()
            .map(|s| ScenarioResult::pending(s.id))
            .collect();
        let scenario_digest = scenario_set_digest(&scenarios)?;
        Ok(Self {
            id: Uuid::new_v4(),
            domain_id: config.id.clone(),
            options,
            status: RunStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            scenario_digest,
            scenarios,
            results,
            metrics: None,
            error_patterns: None,
        })
    }

    /// Generate a scenario set and wrap it in a new run.
    pub fn generate(config: &DomainConfig, options: GenerationOptions) -> Result<Self> {
        let scenarios = generate_scenarios(config, &options)?;
        Self::new(config, options, scenarios)
    }

    fn position(&self, scenario_id: Uuid) -> Result<usize> {
        self.scenarios
            .iter()
            .position(|s| s.id == scenario_id)
            .ok_or(BenchError::ScenarioNotFound(scenario_id))
    }

    fn open_position(&self, scenario_id: Uuid) -> Result<usize> {
        let idx = self.position(scenario_id)?;
        if self.results[idx].status.is_terminal() {
            return Err(BenchError::ResultAlreadyTerminal(scenario_id));
        }
        Ok(idx)
    }

    fn check_domain(&self, config: &DomainConfig) -> Result<()> {
        if config.id != self.domain_id {
            return Err(BenchError::InvalidDomainConfig(format!(
                "run {} was generated from domain '{}', not '{}'",
                self.id, self.domain_id, config.id
            )));
        }
        Ok(())
    }

    pub fn scenario(&self, scenario_id: Uuid) -> Result<&Scenario> {
        Ok(&self.scenarios[self.position(scenario_id)?])
    }

    pub fn result(&self, scenario_id: Uuid) -> Result<&ScenarioResult> {
        Ok(&self.results[self.position(scenario_id)?])
    }

    /// Attach externally rendered narrative text to a scenario.
    pub fn attach_context(&mut self, scenario_id: Uuid, text: impl Into<String>) -> Result<()> {
        let idx = self.position(scenario_id)?;
        self.scenarios[idx].attach_context(text);
        Ok(())
    }

    /// Evaluate the rollouts for one scenario and store the result.
    ///
    /// A completed result also carries its difficulty and error pattern.
    /// An empty rollout list leaves the result pending.
    pub fn record_rollouts(
        &mut self,
        config: &DomainConfig,
        scenario_id: Uuid,
        rollouts: Vec<RolloutResult>,
    ) -> Result<&ScenarioResult> {
        self.check_domain(config)?;
        let idx = self.open_position(scenario_id)?;
        let scenario = &self.scenarios[idx];

        let mut result = evaluate_rollouts(scenario, rollouts);
        if result.status.is_terminal() {
            result.difficulty = Some(scenario_difficulty(config, scenario)?);
            result.error_pattern = classify_error_pattern(config, scenario, &result)?;
        }
        self.results[idx] = result;
        Ok(&self.results[idx])
    }

    /// Mark a scenario whose rollout pipeline failed outright.
    pub fn record_failure(&mut self, scenario_id: Uuid, reason: impl Into<String>) -> Result<()> {
        let idx = self.open_position(scenario_id)?;
        let reason = reason.into();
        debug!(scenario_id = %scenario_id, reason = %reason, "scenario failed");
        self.results[idx] = ScenarioResult::failed(scenario_id, reason);
        Ok(())
    }

    /// Number of results still waiting for rollouts.
    pub fn pending_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| !r.status.is_terminal())
            .count()
    }

    pub fn is_complete(&self) -> bool {
        self.pending_count() == 0
    }

    /// Compute run metrics once every result is terminal.
    ///
    /// Returns `Ok(None)` and leaves the run untouched while any result is
    /// still pending.
    pub fn finalize(&mut self, config: &DomainConfig) -> Result<Option<&AggregateMetrics>> {
        self.check_domain(config)?;
        if !self.is_complete() {
            debug!(
                run_id = %self.id,
                pending = self.pending_count(),
                "run not finalized; results pending"
            );
            return Ok(None);
        }

        let metrics = calculate_aggregate_metrics(&self.scenarios, &self.results);
        let patterns = analyze_error_patterns(config, &self.scenarios, &self.results)?;
        obs::emit_run_finalized(&self.id.to_string(), &metrics);

        self.status = RunStatus::Completed;
        self.completed_at = Some(Utc::now());
        self.error_patterns = Some(patterns);
        Ok(Some(&*self.metrics.insert(metrics)))
    }
}
