//! Composition-based difficulty scoring.
//!
//! Difficulty depends only on the anchor, the applied deltas and the
//! distractors, never on a model's answer or the generator seed.
//!
//! | factor               | formula                                                  |
//! |----------------------|----------------------------------------------------------|
//! | `delta_complexity`   | `25·n + 30·(multiplicative / n)`                         |
//! | `distractor_load`    | `35·distractors`                                         |
//! | `interaction_effects`| `m ≥ 2`: `50 + 25·(m − 2)` (+10 if additive present); `m = 1` with additive: 15 |
//!
//! Each factor is capped at 100. The composite is
//! `0.5·delta + 0.2·distractor + 0.3·interaction`, capped at 100, and
//! bucketed at 20/40/60/80.

use crate::domain::{
    round2, DeltaKind, DifficultyFactors, DifficultyLevel, DifficultyScore, DomainConfig, Result,
    Scenario,
};

const DELTA_WEIGHT: f64 = 0.5;
const DISTRACTOR_WEIGHT: f64 = 0.2;
const INTERACTION_WEIGHT: f64 = 0.3;

/// Lower bounds (inclusive) of each level above trivial.
const LEVEL_THRESHOLDS: [(f64, DifficultyLevel); 4] = [
    (80.0, DifficultyLevel::Expert),
    (60.0, DifficultyLevel::Hard),
    (40.0, DifficultyLevel::Moderate),
    (20.0, DifficultyLevel::Easy),
];

/// Score the difficulty of an (anchor, deltas, distractors) triple.
///
/// Fails with a configuration error on unknown keys.
pub fn calculate_difficulty(
    config: &DomainConfig,
    anchor: &str,
    deltas: &[String],
    distractors: &[String],
) -> Result<DifficultyScore> {
    config.anchor(anchor)?;

    let mut multiplicative = 0usize;
    let mut additive = 0usize;
    for key in deltas {
        match config.delta(key)?.kind {
            DeltaKind::Multiplicative => multiplicative += 1,
            DeltaKind::Additive => additive += 1,
        }
    }

    let factors = DifficultyFactors {
        delta_complexity: delta_complexity(deltas.len(), multiplicative),
        distractor_load: cap(35.0 * distractors.len() as f64),
        interaction_effects: interaction_effects(multiplicative, additive),
    };
    let score = round2(cap(
        DELTA_WEIGHT * factors.delta_complexity
            + DISTRACTOR_WEIGHT * factors.distractor_load
            + INTERACTION_WEIGHT * factors.interaction_effects,
    ));

    Ok(DifficultyScore {
        score,
        level: level_for(score),
        factors,
    })
}

/// Convenience wrapper over [`calculate_difficulty`] for a scenario.
pub fn scenario_difficulty(config: &DomainConfig, scenario: &Scenario) -> Result<DifficultyScore> {
    calculate_difficulty(
        config,
        &scenario.anchor,
        &scenario.deltas,
        &scenario.distractors,
    )
}

/// Map a composite score onto its ordinal level.
pub fn level_for(score: f64) -> DifficultyLevel {
    LEVEL_THRESHOLDS
        .iter()
        .find(|(min, _)| score >= *min)
        .map(|(_, level)| *level)
        .unwrap_or(DifficultyLevel::Trivial)
}

fn delta_complexity(count: usize, multiplicative: usize) -> f64 {
    if count == 0 {
        return 0.0;
    }
    let fraction = multiplicative as f64 / count as f64;
    round2(cap(25.0 * count as f64 + 30.0 * fraction))
}

fn interaction_effects(multiplicative: usize, additive: usize) -> f64 {
    if multiplicative >= 2 {
        let compounding = 50.0 + 25.0 * (multiplicative - 2) as f64;
        let mixing = if additive > 0 { 10.0 } else { 0.0 };
        cap(compounding + mixing)
    } else if multiplicative == 1 && additive > 0 {
        15.0
    } else {
        0.0
    }
}

fn cap(value: f64) -> f64 {
    value.min(100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    fn config() -> DomainConfig {
        DomainConfig::new("farm", "Farm")
            .with_anchor("corn", 180.0, "Corn")
            .with_additive("fert", 12.0, "Fertilizer")
            .with_additive("late", -8.0, "Late planting")
            .with_multiplicative("drought", 0.75, "Drought")
            .with_multiplicative("rain", 1.1, "Rain")
            .with_multiplicative("hail", 0.9, "Hail")
    }

    #[test]
    fn test_bare_anchor_is_trivial() {
        let score = calculate_difficulty(&config(), "corn", &[], &[]).expect("score");
        assert_eq!(score.score, 0.0);
        assert_eq!(score.level, DifficultyLevel::Trivial);
        assert_eq!(score.factors.delta_complexity, 0.0);
    }

    #[test]
    fn test_single_additive_delta() {
        let score = calculate_difficulty(&config(), "corn", &keys(&["fert"]), &[]).expect("score");
        assert_eq!(score.factors.delta_complexity, 25.0);
        assert_eq!(score.factors.interaction_effects, 0.0);
        assert_eq!(score.score, 12.5);
        assert_eq!(score.level, DifficultyLevel::Trivial);
    }

    #[test]
    fn test_compounding_multipliers_raise_interaction() {
        let score = calculate_difficulty(
            &config(),
            "corn",
            &keys(&["drought", "rain", "fert"]),
            &keys(&["noise"]),
        )
        .expect("score");
        assert_eq!(score.factors.delta_complexity, 95.0);
        assert_eq!(score.factors.distractor_load, 35.0);
        assert_eq!(score.factors.interaction_effects, 60.0);
        // 0.5*95 + 0.2*35 + 0.3*60
        assert_eq!(score.score, 72.5);
        assert_eq!(score.level, DifficultyLevel::Hard);
    }

    #[test]
    fn test_score_capped_at_100() {
        let score = calculate_difficulty(
            &config(),
            "corn",
            &keys(&["drought", "rain", "hail", "fert", "late"]),
            &keys(&["a", "b", "c", "d"]),
        )
        .expect("score");
        assert!(score.score <= 100.0);
        assert_eq!(score.factors.distractor_load, 100.0);
        assert_eq!(score.level, DifficultyLevel::Expert);
    }

    #[test]
    fn test_is_pure_and_order_independent_of_calls() {
        let deltas = keys(&["rain", "late"]);
        let first = calculate_difficulty(&config(), "corn", &deltas, &[]).expect("score");
        let _ = calculate_difficulty(&config(), "corn", &keys(&["hail"]), &keys(&["x"]));
        let second = calculate_difficulty(&config(), "corn", &deltas, &[]).expect("score");
        assert_eq!(first, second);
    }

    #[test]
    fn test_levels_are_monotonic() {
        let mut previous = level_for(0.0);
        for step in 0..=100 {
            let level = level_for(step as f64);
            assert!(level >= previous);
            previous = level;
        }
        assert_eq!(level_for(19.99), DifficultyLevel::Trivial);
        assert_eq!(level_for(20.0), DifficultyLevel::Easy);
        assert_eq!(level_for(59.99), DifficultyLevel::Moderate);
        assert_eq!(level_for(80.0), DifficultyLevel::Expert);
    }

    #[test]
    fn test_unknown_delta_is_configuration_error() {
        let err = calculate_difficulty(&config(), "corn", &keys(&["meteor"]), &[]).unwrap_err();
        assert!(err.is_configuration_error());
    }
}
