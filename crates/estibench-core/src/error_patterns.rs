//! Error pattern classification.
//!
//! Each completed result is labelled with its dominant failure mode by an
//! ordered rule table; the first matching rule wins:
//!
//! 1. `accurate`: mean within tolerance.
//! 2. `anchor_bias`: deltas applied, truth moved more than one tolerance
//!    away from the anchor, prediction stayed within one tolerance of it.
//! 3. `delta_blindness`: prediction moved from the anchor in the right
//!    direction but less than half as far as the truth did.
//! 4. `distractor_influence`: distractors present and error above two
//!    tolerances.
//! 5. `systematic_overestimate` / `systematic_underestimate`: every rollout
//!    missed on the same side as the mean.
//! 6. `magnitude_error`: everything else.
//!
//! Severity is the error measured in tolerances: up to 2 minor, up to 5
//! moderate, beyond that severe.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::difficulty::scenario_difficulty;
use crate::domain::{
    round2, DifficultyLevel, DomainConfig, ErrorPattern, ErrorPatternKind, Result, ResultStatus,
    Scenario, ScenarioResult, Severity,
};

const ANCHOR_BIAS_BAND: f64 = 1.0;
const DELTA_BLINDNESS_RATIO: f64 = 0.5;
const DISTRACTOR_ERROR_MULTIPLE: f64 = 2.0;
const MINOR_MAX_MULTIPLE: f64 = 2.0;
const MODERATE_MAX_MULTIPLE: f64 = 5.0;
const NEUTRAL_BIAS_MULTIPLE: f64 = 0.5;
const BIAS_STRENGTH_PER_TOLERANCE: f64 = 25.0;

/// Everything a rule may look at for one scenario/result pair.
struct PatternContext<'a> {
    scenario: &'a Scenario,
    result: &'a ScenarioResult,
    anchor_value: f64,
    truth: f64,
    tolerance: f64,
}

impl PatternContext<'_> {
    fn truth_shift(&self) -> f64 {
        self.truth - self.anchor_value
    }

    fn predicted_shift(&self) -> f64 {
        self.result.mean_prediction - self.anchor_value
    }
}

struct PatternRule {
    matches: fn(&PatternContext) -> bool,
    classify: fn(&PatternContext) -> ErrorPatternKind,
}

/// Evaluated top to bottom; the last rule always matches.
const RULES: [PatternRule; 6] = [
    PatternRule {
        matches: is_accurate,
        classify: |_| ErrorPatternKind::Accurate,
    },
    PatternRule {
        matches: is_anchor_bias,
        classify: |_| ErrorPatternKind::AnchorBias,
    },
    PatternRule {
        matches: is_delta_blindness,
        classify: |_| ErrorPatternKind::DeltaBlindness,
    },
    PatternRule {
        matches: is_distractor_influence,
        classify: |_| ErrorPatternKind::DistractorInfluence,
    },
    PatternRule {
        matches: is_systematic,
        classify: systematic_direction,
    },
    PatternRule {
        matches: |_| true,
        classify: |_| ErrorPatternKind::MagnitudeError,
    },
];

fn is_accurate(ctx: &PatternContext) -> bool {
    ctx.result.within_tolerance
}

fn is_anchor_bias(ctx: &PatternContext) -> bool {
    !ctx.scenario.deltas.is_empty()
        && ctx.truth_shift().abs() > ctx.tolerance
        && ctx.predicted_shift().abs() <= ANCHOR_BIAS_BAND * ctx.tolerance
}

fn is_delta_blindness(ctx: &PatternContext) -> bool {
    let truth_shift = ctx.truth_shift();
    let predicted_shift = ctx.predicted_shift();
    truth_shift.abs() > ctx.tolerance
        && predicted_shift.signum() == truth_shift.signum()
        && predicted_shift.abs() < DELTA_BLINDNESS_RATIO * truth_shift.abs()
}

fn is_distractor_influence(ctx: &PatternContext) -> bool {
    !ctx.scenario.distractors.is_empty()
        && ctx.result.absolute_error > DISTRACTOR_ERROR_MULTIPLE * ctx.tolerance
}

fn is_systematic(ctx: &PatternContext) -> bool {
    let side = ctx.result.error.signum();
    ctx.result.error != 0.0
        && ctx.result.rollouts.iter().all(|r| {
            let miss = r.prediction - ctx.truth;
            miss != 0.0 && miss.signum() == side
        })
}

fn systematic_direction(ctx: &PatternContext) -> ErrorPatternKind {
    if ctx.result.error > 0.0 {
        ErrorPatternKind::SystematicOverestimate
    } else {
        ErrorPatternKind::SystematicUnderestimate
    }
}

/// Severity of an absolute error measured against the tolerance.
pub fn severity_for(absolute_error: f64, tolerance: f64) -> Severity {
    let multiple = absolute_error / tolerance;
    if multiple <= MINOR_MAX_MULTIPLE {
        Severity::Minor
    } else if multiple <= MODERATE_MAX_MULTIPLE {
        Severity::Moderate
    } else {
        Severity::Severe
    }
}

/// Classify the dominant failure mode of a completed result.
///
/// Returns `Ok(None)` for results that are not completed.
pub fn classify_error_pattern(
    config: &DomainConfig,
    scenario: &Scenario,
    result: &ScenarioResult,
) -> Result<Option<ErrorPattern>> {
    if result.status != ResultStatus::Completed {
        return Ok(None);
    }
    let anchor_value = config.anchor(&scenario.anchor)?.value;
    let ctx = PatternContext {
        scenario,
        result,
        anchor_value,
        truth: scenario.ground_truth.value,
        tolerance: scenario.ground_truth.tolerance,
    };

    let kind = RULES
        .iter()
        .find(|rule| (rule.matches)(&ctx))
        .map(|rule| (rule.classify)(&ctx))
        .unwrap_or(ErrorPatternKind::MagnitudeError);

    let severity = if kind == ErrorPatternKind::Accurate {
        Severity::Minor
    } else {
        severity_for(result.absolute_error, ctx.tolerance)
    };

    Ok(Some(ErrorPattern {
        pattern: kind,
        severity,
        details: details(kind, &ctx),
    }))
}

fn details(kind: ErrorPatternKind, ctx: &PatternContext) -> String {
    let mean = ctx.result.mean_prediction;
    match kind {
        ErrorPatternKind::Accurate => format!(
            "mean {:.2} within ±{:.2} of truth {:.2}",
            mean, ctx.tolerance, ctx.truth
        ),
        ErrorPatternKind::AnchorBias => format!(
            "mean {:.2} stayed near anchor {:.2}; {} delta(s) should have moved it to {:.2}",
            mean,
            ctx.anchor_value,
            ctx.scenario.deltas.len(),
            ctx.truth
        ),
        ErrorPatternKind::DeltaBlindness => format!(
            "moved {:+.2} from anchor but truth moved {:+.2}; deltas under-weighted",
            ctx.predicted_shift(),
            ctx.truth_shift()
        ),
        ErrorPatternKind::DistractorInfluence => format!(
            "error {:.2} exceeds {:.0}x tolerance with {} distractor(s) present",
            ctx.result.absolute_error,
            DISTRACTOR_ERROR_MULTIPLE,
            ctx.scenario.distractors.len()
        ),
        ErrorPatternKind::SystematicOverestimate => format!(
            "all {} rollout(s) above truth {:.2}; mean error {:+.2}",
            ctx.result.rollouts.len(),
            ctx.truth,
            ctx.result.error
        ),
        ErrorPatternKind::SystematicUnderestimate => format!(
            "all {} rollout(s) below truth {:.2}; mean error {:+.2}",
            ctx.result.rollouts.len(),
            ctx.truth,
            ctx.result.error
        ),
        ErrorPatternKind::MagnitudeError => format!(
            "mean {:.2} vs truth {:.2}; error {:+.2} is {:.1}x tolerance",
            mean,
            ctx.truth,
            ctx.result.error,
            ctx.result.absolute_error / ctx.tolerance
        ),
    }
}

/// Direction of a run-level bias.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BiasDirection {
    Overestimate,
    Underestimate,
    Neutral,
}

impl fmt::Display for BiasDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Overestimate => "overestimate",
            Self::Underestimate => "underestimate",
            Self::Neutral => "neutral",
        })
    }
}

/// Run-level tabulation of error patterns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPatternSummary {
    /// Completed results included in the analysis.
    pub analyzed: usize,
    pub anchor_bias_rate: f64,
    pub delta_blindness_rate: f64,
    pub distractor_influence_rate: f64,
    pub pattern_counts: BTreeMap<ErrorPatternKind, usize>,
    pub systematic_bias: BiasDirection,
    /// 0–100, from `|meanError|` in units of the average tolerance.
    pub bias_strength: f64,
    pub mean_error: f64,
    /// Mean absolute error per difficulty level that occurs in the run.
    pub error_by_difficulty: BTreeMap<DifficultyLevel, f64>,
}

impl ErrorPatternSummary {
    fn empty() -> Self {
        Self {
            analyzed: 0,
            anchor_bias_rate: 0.0,
            delta_blindness_rate: 0.0,
            distractor_influence_rate: 0.0,
            pattern_counts: BTreeMap::new(),
            systematic_bias: BiasDirection::Neutral,
            bias_strength: 0.0,
            mean_error: 0.0,
            error_by_difficulty: BTreeMap::new(),
        }
    }

    /// Percentage of analyzed results labelled `kind`.
    pub fn rate(&self, kind: ErrorPatternKind) -> f64 {
        if self.analyzed == 0 {
            return 0.0;
        }
        let count = self.pattern_counts.get(&kind).copied().unwrap_or(0);
        round2(100.0 * count as f64 / self.analyzed as f64)
    }
}

/// Tabulate error patterns over the completed results of a run.
///
/// Uses the pattern and difficulty already attached to a result when
/// present; computes them otherwise. Results whose scenario is not in
/// `scenarios` are skipped.
pub fn analyze_error_patterns(
    config: &DomainConfig,
    scenarios: &[Scenario],
    results: &[ScenarioResult],
) -> Result<ErrorPatternSummary> {
    let by_id: HashMap<Uuid, &Scenario> = scenarios.iter().map(|s| (s.id, s)).collect();

    let mut summary = ErrorPatternSummary::empty();
    let mut error_sum = 0.0;
    let mut tolerance_sum = 0.0;
    let mut by_level: BTreeMap<DifficultyLevel, (f64, usize)> = BTreeMap::new();

    for result in results {
        if result.status != ResultStatus::Completed {
            continue;
        }
        let Some(scenario) = by_id.get(&result.scenario_id) else {
            continue;
        };

        let pattern = match &result.error_pattern {
            Some(p) => p.pattern,
            None => match classify_error_pattern(config, scenario, result)? {
                Some(p) => p.pattern,
                None => continue,
            },
        };
        let level = match &result.difficulty {
            Some(d) => d.level,
            None => scenario_difficulty(config, scenario)?.level,
        };

        summary.analyzed += 1;
        *summary.pattern_counts.entry(pattern).or_insert(0) += 1;
        error_sum += result.error;
        tolerance_sum += scenario.ground_truth.tolerance;
        let bucket = by_level.entry(level).or_insert((0.0, 0));
        bucket.0 += result.absolute_error;
        bucket.1 += 1;
    }

    if summary.analyzed == 0 {
        return Ok(summary);
    }

    let n = summary.analyzed as f64;
    let mean_error = error_sum / n;
    let avg_tolerance = tolerance_sum / n;
    let bias_multiple = mean_error.abs() / avg_tolerance;

    summary.anchor_bias_rate = summary.rate(ErrorPatternKind::AnchorBias);
    summary.delta_blindness_rate = summary.rate(ErrorPatternKind::DeltaBlindness);
    summary.distractor_influence_rate = summary.rate(ErrorPatternKind::DistractorInfluence);
    summary.mean_error = round2(mean_error);
    summary.systematic_bias = if bias_multiple <= NEUTRAL_BIAS_MULTIPLE {
        BiasDirection::Neutral
    } else if mean_error > 0.0 {
        BiasDirection::Overestimate
    } else {
        BiasDirection::Underestimate
    };
    summary.bias_strength = round2((BIAS_STRENGTH_PER_TOLERANCE * bias_multiple).min(100.0));
    summary.error_by_difficulty = by_level
        .into_iter()
        .map(|(level, (sum, count))| (level, round2(sum / count as f64)))
        .collect();

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GroundTruth, RolloutResult};
    use crate::evaluator::evaluate_rollouts;

    fn config() -> DomainConfig {
        DomainConfig::new("farm", "Farm")
            .with_anchor("corn", 100.0, "Corn")
            .with_additive("fert", 20.0, "Fertilizer")
            .with_multiplicative("drought", 0.5, "Drought")
    }

    fn scenario(deltas: &[&str], distractors: &[&str], truth: f64, tolerance: f64) -> Scenario {
        Scenario::new(
            "corn".to_string(),
            deltas.iter().map(|s| s.to_string()).collect(),
            distractors.iter().map(|s| s.to_string()).collect(),
            GroundTruth {
                value: truth,
                tolerance,
                calculation: vec![],
            },
        )
    }

    fn classify(s: &Scenario, predictions: &[f64]) -> ErrorPattern {
        let rollouts = predictions
            .iter()
            .map(|p| RolloutResult::new(*p, "", 10))
            .collect();
        let result = evaluate_rollouts(s, rollouts);
        classify_error_pattern(&config(), s, &result)
            .expect("classify")
            .expect("completed")
    }

    #[test]
    fn test_accurate_wins_first() {
        let s = scenario(&["fert"], &[], 120.0, 5.0);
        let p = classify(&s, &[118.0, 121.0]);
        assert_eq!(p.pattern, ErrorPatternKind::Accurate);
        assert_eq!(p.severity, Severity::Minor);
    }

    #[test]
    fn test_anchor_bias() {
        let s = scenario(&["drought"], &[], 50.0, 5.0);
        let p = classify(&s, &[99.0, 101.0]);
        assert_eq!(p.pattern, ErrorPatternKind::AnchorBias);
        assert_eq!(p.severity, Severity::Severe);
        assert!(p.details.contains("anchor"));
    }

    #[test]
    fn test_delta_blindness() {
        // Truth moved -50, prediction moved only -15.
        let s = scenario(&["drought"], &[], 50.0, 5.0);
        let p = classify(&s, &[85.0]);
        assert_eq!(p.pattern, ErrorPatternKind::DeltaBlindness);
    }

    #[test]
    fn test_distractor_influence() {
        // Overshoots in the right direction, so neither anchor rule fires.
        let s = scenario(&["drought"], &["The barn is red."], 50.0, 5.0);
        let p = classify(&s, &[30.0, 45.0]);
        assert_eq!(p.pattern, ErrorPatternKind::DistractorInfluence);
    }

    #[test]
    fn test_systematic_overestimate_and_underestimate() {
        let s = scenario(&["fert"], &[], 120.0, 5.0);
        let p = classify(&s, &[130.0, 135.0]);
        assert_eq!(p.pattern, ErrorPatternKind::SystematicOverestimate);
        assert_eq!(p.severity, Severity::Moderate);

        let s = scenario(&["drought"], &[], 50.0, 5.0);
        let p = classify(&s, &[20.0, 25.0]);
        assert_eq!(p.pattern, ErrorPatternKind::SystematicUnderestimate);
    }

    #[test]
    fn test_magnitude_error_is_catch_all() {
        // Rollouts straddle the truth, so the miss is not systematic.
        let s = scenario(&["fert"], &[], 120.0, 5.0);
        let p = classify(&s, &[110.0, 150.0]);
        assert_eq!(p.pattern, ErrorPatternKind::MagnitudeError);
    }

    #[test]
    fn test_pending_result_is_not_classified() {
        let s = scenario(&["fert"], &[], 120.0, 5.0);
        let pending = ScenarioResult::pending(s.id);
        assert!(classify_error_pattern(&config(), &s, &pending)
            .expect("classify")
            .is_none());
    }

    #[test]
    fn test_severity_bands() {
        assert_eq!(severity_for(10.0, 5.0), Severity::Minor);
        assert_eq!(severity_for(10.1, 5.0), Severity::Moderate);
        assert_eq!(severity_for(25.0, 5.0), Severity::Moderate);
        assert_eq!(severity_for(25.1, 5.0), Severity::Severe);
    }

    #[test]
    fn test_analyze_error_patterns_tabulates_rates_and_bias() {
        let config = config();
        let scenarios = vec![
            scenario(&["drought"], &[], 50.0, 5.0),
            scenario(&["fert"], &[], 120.0, 5.0),
            scenario(&["fert"], &[], 120.0, 5.0),
            scenario(&["drought"], &[], 50.0, 5.0),
        ];
        let predictions: [&[f64]; 4] = [&[100.0], &[121.0], &[140.0], &[85.0]];
        let results: Vec<ScenarioResult> = scenarios
            .iter()
            .zip(predictions)
            .map(|(s, p)| {
                evaluate_rollouts(s, p.iter().map(|v| RolloutResult::new(*v, "", 5)).collect())
            })
            .collect();

        let summary = analyze_error_patterns(&config, &scenarios, &results).expect("analyze");
        assert_eq!(summary.analyzed, 4);
        assert_eq!(summary.anchor_bias_rate, 25.0);
        assert_eq!(summary.delta_blindness_rate, 25.0);
        assert_eq!(summary.distractor_influence_rate, 0.0);
        // errors: +50, +1, +20, +35 -> mean 26.5
        assert_eq!(summary.mean_error, 26.5);
        assert_eq!(summary.systematic_bias, BiasDirection::Overestimate);
        assert_eq!(summary.bias_strength, 100.0);
        // one multiplicative delta scores 27.5 (easy), one additive 12.5 (trivial)
        assert_eq!(summary.error_by_difficulty.len(), 2);
        assert_eq!(
            summary.error_by_difficulty.get(&DifficultyLevel::Easy),
            Some(&42.5)
        );
        assert_eq!(
            summary.error_by_difficulty.get(&DifficultyLevel::Trivial),
            Some(&10.5)
        );
        assert!(!summary
            .error_by_difficulty
            .contains_key(&DifficultyLevel::Moderate));
    }

    #[test]
    fn test_analyze_empty_run_is_neutral() {
        let summary = analyze_error_patterns(&config(), &[], &[]).expect("analyze");
        assert_eq!(summary.analyzed, 0);
        assert_eq!(summary.systematic_bias, BiasDirection::Neutral);
        assert_eq!(summary.bias_strength, 0.0);
        assert_eq!(summary.anchor_bias_rate, 0.0);
    }

    #[test]
    fn test_summary_serializes_pattern_keys_as_strings() {
        let mut summary = ErrorPatternSummary::empty();
        summary.pattern_counts.insert(ErrorPatternKind::AnchorBias, 2);
        summary
            .error_by_difficulty
            .insert(DifficultyLevel::Moderate, 3.5);
        let raw = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(raw["patternCounts"]["anchor_bias"], 2);
        assert_eq!(raw["errorByDifficulty"]["moderate"], 3.5);
    }
}
