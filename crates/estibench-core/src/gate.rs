//! Quality gate over a finalized run.
//!
//! Evaluates [`AggregateMetrics`] and an [`ErrorPatternSummary`] against a
//! [`GateRuleSet`] to produce a [`GateVerdict`]: the pass/fail decision a CI
//! job uses to accept or reject a model. Rules whose metric is undefined for
//! the run (no twin pairs, no rmse limit) are skipped.

use serde::{Deserialize, Serialize};

use crate::error_patterns::ErrorPatternSummary;
use crate::metrics::AggregateMetrics;

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// A single rule that can fail a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GateRule {
    /// Hit rate must meet or exceed `GateThresholds::min_hit_rate`.
    MinHitRate,
    /// RMSE must not exceed `GateThresholds::max_rmse`, when set.
    MaxRmse,
    /// Twin directional accuracy must meet `GateThresholds::min_directional_accuracy`.
    MinDirectionalAccuracy,
    /// Systematic bias strength must not exceed `GateThresholds::max_bias_strength`.
    MaxBiasStrength,
}

/// Limits referenced by the gate rules. Percentages are 0–100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GateThresholds {
    pub min_hit_rate: f64,
    pub max_rmse: Option<f64>,
    pub min_directional_accuracy: f64,
    pub max_bias_strength: f64,
    /// Stop at the first violation.
    pub fail_fast: bool,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self {
            min_hit_rate: 50.0,
            max_rmse: None,
            min_directional_accuracy: 60.0,
            max_bias_strength: 75.0,
            fail_fast: false,
        }
    }
}

/// A set of gate rules plus the thresholds they reference.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateRuleSet {
    pub thresholds: GateThresholds,
    pub rules: Vec<GateRule>,
}

impl GateRuleSet {
    /// Every rule with default thresholds.
    pub fn standard() -> Self {
        Self {
            thresholds: GateThresholds::default(),
            rules: vec![
                GateRule::MinHitRate,
                GateRule::MaxRmse,
                GateRule::MinDirectionalAccuracy,
                GateRule::MaxBiasStrength,
            ],
        }
    }

    /// An empty rule set with default thresholds.
    pub fn empty() -> Self {
        Self {
            thresholds: GateThresholds::default(),
            rules: Vec::new(),
        }
    }

    pub fn with_rule(mut self, rule: GateRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_thresholds(mut self, thresholds: GateThresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Violation {
    pub rule: GateRule,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GateVerdict {
    /// Empty when passed.
    pub violations: Vec<Violation>,
    /// Rules not evaluated because their metric is undefined for the run.
    #[serde(default)]
    pub skipped: Vec<GateRule>,
}

impl GateVerdict {
    pub fn passed(&self) -> bool {
        self.violations.is_empty()
    }
}

enum Check {
    Pass,
    Skip,
    Fail(String),
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Evaluate run metrics against a [`GateRuleSet`].
pub fn evaluate_gate(
    rule_set: &GateRuleSet,
    metrics: &AggregateMetrics,
    patterns: &ErrorPatternSummary,
) -> GateVerdict {
    let mut verdict = GateVerdict {
        violations: Vec::new(),
        skipped: Vec::new(),
    };

    for rule in &rule_set.rules {
        match check_rule(rule, &rule_set.thresholds, metrics, patterns) {
            Check::Pass => {}
            Check::Skip => verdict.skipped.push(rule.clone()),
            Check::Fail(reason) => {
                verdict.violations.push(Violation {
                    rule: rule.clone(),
                    reason,
                });
                if rule_set.thresholds.fail_fast {
                    break;
                }
            }
        }
    }
    verdict
}

fn check_rule(
    rule: &GateRule,
    thresholds: &GateThresholds,
    metrics: &AggregateMetrics,
    patterns: &ErrorPatternSummary,
) -> Check {
    match rule {
        GateRule::MinHitRate => {
            if metrics.completed_scenarios == 0 {
                Check::Fail("no completed scenarios".to_string())
            } else if metrics.hit_rate < thresholds.min_hit_rate {
                Check::Fail(format!(
                    "hit rate {:.2}% < required {:.2}%",
                    metrics.hit_rate, thresholds.min_hit_rate
                ))
            } else {
                Check::Pass
            }
        }
        GateRule::MaxRmse => match thresholds.max_rmse {
            None => Check::Skip,
            Some(_) if metrics.completed_scenarios == 0 => Check::Skip,
            Some(max) if metrics.rmse > max => {
                Check::Fail(format!("rmse {:.2} > allowed {:.2}", metrics.rmse, max))
            }
            Some(_) => Check::Pass,
        },
        GateRule::MinDirectionalAccuracy => match metrics.directional_accuracy {
            None => Check::Skip,
            Some(acc) if acc < thresholds.min_directional_accuracy => Check::Fail(format!(
                "directional accuracy {:.2}% < required {:.2}% over {} twin pair(s)",
                acc, thresholds.min_directional_accuracy, metrics.twin_pairs_evaluated
            )),
            Some(_) => Check::Pass,
        },
        GateRule::MaxBiasStrength => {
            if patterns.analyzed == 0 {
                Check::Skip
            } else if patterns.bias_strength > thresholds.max_bias_strength {
                Check::Fail(format!(
                    "{} bias strength {:.2} > allowed {:.2} (mean error {:+.2})",
                    patterns.systematic_bias,
                    patterns.bias_strength,
                    thresholds.max_bias_strength,
                    patterns.mean_error
                ))
            } else {
                Check::Pass
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_patterns::BiasDirection;
    use std::collections::BTreeMap;

    fn metrics(hit_rate: f64, rmse: f64, directional: Option<f64>) -> AggregateMetrics {
        AggregateMetrics {
            total_scenarios: 10,
            completed_scenarios: 10,
            failed_scenarios: 0,
            hit_rate,
            mean_error: 0.0,
            mean_absolute_error: rmse,
            rmse,
            avg_latency_ms: 100.0,
            total_rollouts: 30,
            failed_rollouts: 0,
            directional_accuracy: directional,
            twin_pairs_evaluated: if directional.is_some() { 5 } else { 0 },
        }
    }

    fn patterns(bias_strength: f64) -> ErrorPatternSummary {
        ErrorPatternSummary {
            analyzed: 10,
            anchor_bias_rate: 0.0,
            delta_blindness_rate: 0.0,
            distractor_influence_rate: 0.0,
            pattern_counts: BTreeMap::new(),
            systematic_bias: BiasDirection::Overestimate,
            bias_strength,
            mean_error: 3.0,
            error_by_difficulty: BTreeMap::new(),
        }
    }

    #[test]
    fn test_standard_gate_passes_good_run() {
        let verdict = evaluate_gate(
            &GateRuleSet::standard(),
            &metrics(80.0, 1.2, Some(90.0)),
            &patterns(10.0),
        );
        assert!(verdict.passed());
        assert_eq!(verdict.skipped, vec![GateRule::MaxRmse]);
    }

    #[test]
    fn test_missing_twin_pairs_skip_directional_rule() {
        let verdict = evaluate_gate(
            &GateRuleSet::standard(),
            &metrics(80.0, 1.2, None),
            &patterns(10.0),
        );
        assert!(verdict.passed());
        assert!(verdict.skipped.contains(&GateRule::MinDirectionalAccuracy));
    }

    #[test]
    fn test_collects_all_violations() {
        let rules = GateRuleSet::standard().with_thresholds(GateThresholds {
            max_rmse: Some(2.0),
            ..GateThresholds::default()
        });
        let verdict = evaluate_gate(&rules, &metrics(40.0, 5.5, Some(50.0)), &patterns(90.0));
        assert!(!verdict.passed());
        assert_eq!(verdict.violations.len(), 4);
        assert_eq!(verdict.violations[0].reason, "hit rate 40.00% < required 50.00%");
        assert_eq!(verdict.violations[1].reason, "rmse 5.50 > allowed 2.00");
        assert!(verdict.violations[3].reason.starts_with("overestimate bias strength 90.00"));
    }

    #[test]
    fn test_fail_fast_stops_at_first_violation() {
        let rules = GateRuleSet::standard().with_thresholds(GateThresholds {
            fail_fast: true,
            ..GateThresholds::default()
        });
        let verdict = evaluate_gate(&rules, &metrics(10.0, 5.0, Some(0.0)), &patterns(99.0));
        assert_eq!(verdict.violations.len(), 1);
        assert_eq!(verdict.violations[0].rule, GateRule::MinHitRate);
    }

    #[test]
    fn test_empty_run_fails_hit_rate() {
        let mut empty = metrics(0.0, 0.0, None);
        empty.completed_scenarios = 0;
        let verdict = evaluate_gate(
            &GateRuleSet::empty().with_rule(GateRule::MinHitRate),
            &empty,
            &patterns(0.0),
        );
        assert_eq!(verdict.violations[0].reason, "no completed scenarios");
    }

    #[test]
    fn test_thresholds_from_partial_json() {
        let thresholds: GateThresholds =
            serde_json::from_str(r#"{"minHitRate": 70, "maxRmse": 3.5}"#).expect("parse");
        assert_eq!(thresholds.min_hit_rate, 70.0);
        assert_eq!(thresholds.max_rmse, Some(3.5));
        assert_eq!(thresholds.max_bias_strength, 75.0);
    }
}
