//! Seeded scenario and twin generator.
//!
//! All randomness flows through an explicit [`ScenarioRng`]; the same seed,
//! domain config and options always reproduce the same scenario set (ids
//! aside). Draws happen in a fixed order per base scenario:
//! anchor, delta count, delta shuffle, distractor coin, distractor count,
//! distractor shuffle, then for twins the delta index, swap coin and
//! replacement.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{BenchError, DomainConfig, Result, Scenario, TwinRole};
use crate::ground_truth::compute_ground_truth;
use crate::obs;

/// Probability that a twin swaps its varied delta instead of dropping it.
pub const TWIN_SWAP_PROBABILITY: f64 = 0.5;

/// Knobs for a generation pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    /// Number of base scenarios (twins come on top).
    pub count: usize,
    pub min_deltas: usize,
    pub max_deltas: usize,
    /// Chance (0–1) that a base scenario carries distractors.
    pub distractor_probability: f64,
    pub max_distractors: usize,
    pub generate_twins: bool,
    pub seed: u64,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            count: 10,
            min_deltas: 1,
            max_deltas: 3,
            distractor_probability: 0.3,
            max_distractors: 2,
            generate_twins: true,
            seed: 42,
        }
    }
}

impl GenerationOptions {
    /// Reject option sets that cannot be satisfied by any domain.
    pub fn validate(&self) -> Result<()> {
        if self.count == 0 {
            return Err(BenchError::InvalidOptions(
                "count must be at least 1".to_string(),
            ));
        }
        if self.min_deltas > self.max_deltas {
            return Err(BenchError::InvalidOptions(format!(
                "min_deltas ({}) > max_deltas ({})",
                self.min_deltas, self.max_deltas
            )));
        }
        if !(0.0..=1.0).contains(&self.distractor_probability) {
            return Err(BenchError::InvalidOptions(format!(
                "distractor_probability must be within [0, 1], got {}",
                self.distractor_probability
            )));
        }
        Ok(())
    }
}

/// Deterministic random source for one generation pass.
///
/// Never shared between concurrent generations; create one per call.
pub struct ScenarioRng {
    rng: ChaCha8Rng,
}

impl ScenarioRng {
    /// Create a source seeded with `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Uniform index in `0..len`. `len` must be non-zero.
    fn index(&mut self, len: usize) -> usize {
        self.rng.gen_range(0..len)
    }

    /// Uniform integer in `lo..=hi`.
    fn between(&mut self, lo: usize, hi: usize) -> usize {
        if lo >= hi {
            return lo;
        }
        self.rng.gen_range(lo..=hi)
    }

    /// True with probability `p`.
    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen::<f64>() < p
    }

    /// `n` distinct items, in draw order.
    fn distinct<T: Clone>(&mut self, items: &[T], n: usize) -> Vec<T> {
        let mut pool = items.to_vec();
        pool.shuffle(&mut self.rng);
        pool.truncate(n);
        pool
    }
}

/// Generate a scenario set seeded by `options.seed`.
///
/// Twins, when enabled, are emitted immediately after their originals.
pub fn generate_scenarios(
    config: &DomainConfig,
    options: &GenerationOptions,
) -> Result<Vec<Scenario>> {
    let mut rng = ScenarioRng::new(options.seed);
    generate_with_rng(config, options, &mut rng)
}

/// Generate a scenario set drawing from a caller-owned random source.
pub fn generate_with_rng(
    config: &DomainConfig,
    options: &GenerationOptions,
    rng: &mut ScenarioRng,
) -> Result<Vec<Scenario>> {
    options.validate()?;

    let anchor_keys: Vec<String> = config.anchors.keys().cloned().collect();
    let delta_keys: Vec<String> = config.deltas.keys().cloned().collect();
    if anchor_keys.is_empty() {
        return Err(BenchError::InvalidDomainConfig(format!(
            "domain '{}' defines no anchors",
            config.id
        )));
    }

    let max_deltas = options.max_deltas.min(delta_keys.len());
    let min_deltas = options.min_deltas.min(max_deltas);
    let max_distractors = options.max_distractors.min(config.distractors.len());

    let capacity = if options.generate_twins {
        options.count * 2
    } else {
        options.count
    };
    let mut scenarios = Vec::with_capacity(capacity);
    let mut twins = 0usize;

    for _ in 0..options.count {
        let anchor = anchor_keys[rng.index(anchor_keys.len())].clone();
        let n_deltas = rng.between(min_deltas, max_deltas);
        let deltas = rng.distinct(&delta_keys, n_deltas);

        let distractors = if rng.chance(options.distractor_probability) && max_distractors > 0 {
            let n = rng.between(1, max_distractors);
            rng.distinct(&config.distractors, n)
        } else {
            Vec::new()
        };

        let ground_truth = compute_ground_truth(config, &anchor, &deltas)?;
        let mut original = Scenario::new(anchor, deltas, distractors, ground_truth);
        debug!(
            scenario_id = %original.id,
            anchor = %original.anchor,
            deltas = ?original.deltas,
            truth = original.ground_truth.value,
            "scenario generated"
        );

        if options.generate_twins && !original.deltas.is_empty() {
            let mut twin = make_twin(config, &original, &delta_keys, rng)?;
            original.twin_id = Some(twin.id);
            original.twin_role = Some(TwinRole::Original);
            original.twin_delta_changed = twin.twin_delta_changed.clone();
            twin.twin_id = Some(original.id);
            obs::emit_twin_created(&original.id, &twin.id, twin.twin_delta_changed.as_deref());
            scenarios.push(original);
            scenarios.push(twin);
            twins += 1;
        } else {
            scenarios.push(original);
        }
    }

    obs::emit_scenarios_generated(&config.id, options.seed, options.count, twins);
    Ok(scenarios)
}

/// Build a twin that differs from `original` by exactly one delta.
fn make_twin(
    config: &DomainConfig,
    original: &Scenario,
    delta_keys: &[String],
    rng: &mut ScenarioRng,
) -> Result<Scenario> {
    let idx = rng.index(original.deltas.len());
    let varied = original.deltas[idx].clone();
    let unused: Vec<&String> = delta_keys
        .iter()
        .filter(|k| !original.deltas.contains(*k))
        .collect();
    let swap = rng.chance(TWIN_SWAP_PROBABILITY);

    let mut deltas = original.deltas.clone();
    let changed = if swap && !unused.is_empty() {
        let replacement = unused[rng.index(unused.len())].clone();
        let change = format!(
            "swapped: {} -> {}",
            describe(config, &varied),
            describe(config, &replacement)
        );
        deltas[idx] = replacement;
        change
    } else {
        deltas.remove(idx);
        format!("removed: {}", describe(config, &varied))
    };

    let ground_truth = compute_ground_truth(config, &original.anchor, &deltas)?;
    let mut twin = Scenario::new(
        original.anchor.clone(),
        deltas,
        original.distractors.clone(),
        ground_truth,
    );
    twin.twin_role = Some(TwinRole::Twin);
    twin.twin_delta_changed = Some(changed);
    Ok(twin)
}

fn describe(config: &DomainConfig, key: &str) -> String {
    match config.deltas.get(key) {
        Some(delta) if !delta.description.is_empty() => delta.description.clone(),
        _ => key.to_string(),
    }
}

/// Original/twin pairs in emission order.
pub fn twin_pairs(scenarios: &[Scenario]) -> Vec<(&Scenario, &Scenario)> {
    scenarios
        .iter()
        .filter(|s| s.twin_role == Some(TwinRole::Original))
        .filter_map(|original| {
            let twin_id = original.twin_id?;
            scenarios
                .iter()
                .find(|s| s.id == twin_id)
                .map(|twin| (original, twin))
        })
        .collect()
}
