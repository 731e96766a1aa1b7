use estibench_core::{
    calculate_difficulty, compute_ground_truth, diff_deltas, generate_scenarios,
    scenario_set_digest, twin_pairs, DeltaChange, DomainConfig, DomainRegistry,
    GenerationOptions, TwinRole,
};

fn options(seed: u64) -> GenerationOptions {
    GenerationOptions {
        count: 25,
        min_deltas: 1,
        max_deltas: 3,
        distractor_probability: 0.5,
        max_distractors: 2,
        generate_twins: true,
        seed,
    }
}

fn crop_yield() -> DomainConfig {
    DomainRegistry::with_builtins()
        .get("crop_yield")
        .expect("builtin")
        .clone()
}

// ---- Determinism ----

#[test]
fn same_seed_reproduces_the_scenario_set() {
    let config = crop_yield();
    let first = generate_scenarios(&config, &options(1234)).expect("first");
    let second = generate_scenarios(&config, &options(1234)).expect("second");

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(&second) {
        assert_eq!(a.anchor, b.anchor);
        assert_eq!(a.deltas, b.deltas);
        assert_eq!(a.distractors, b.distractors);
        assert_eq!(a.ground_truth, b.ground_truth);
        assert_eq!(a.twin_role, b.twin_role);
    }
    assert_eq!(
        scenario_set_digest(&first).expect("digest"),
        scenario_set_digest(&second).expect("digest")
    );
}

#[test]
fn different_seeds_diverge() {
    let config = crop_yield();
    let a = generate_scenarios(&config, &options(1)).expect("a");
    let b = generate_scenarios(&config, &options(2)).expect("b");
    assert_ne!(
        scenario_set_digest(&a).expect("digest"),
        scenario_set_digest(&b).expect("digest")
    );
}

// ---- Ground truth ----

#[test]
fn delta_order_changes_ground_truth() {
    let config = DomainConfig::new("toy", "Toy")
        .with_anchor("base", 10.0, "Base")
        .with_additive("plus_two", 2.0, "Plus two")
        .with_multiplicative("ten_pct", 1.1, "Ten percent");

    let add_first = compute_ground_truth(
        &config,
        "base",
        &["plus_two".to_string(), "ten_pct".to_string()],
    )
    .expect("truth");
    let mul_first = compute_ground_truth(
        &config,
        "base",
        &["ten_pct".to_string(), "plus_two".to_string()],
    )
    .expect("truth");

    assert_eq!(add_first.value, 13.2);
    assert_eq!(mul_first.value, 13.0);
}

#[test]
fn ground_truth_ignores_distractors() {
    let config = crop_yield();
    for scenario in generate_scenarios(&config, &options(99)).expect("generate") {
        let recomputed =
            compute_ground_truth(&config, &scenario.anchor, &scenario.deltas).expect("truth");
        assert_eq!(recomputed, scenario.ground_truth);
        assert!(scenario.ground_truth.tolerance > 0.0);
    }
}

// ---- Twin invariant ----

#[test]
fn every_twin_differs_by_exactly_one_delta() {
    let registry = DomainRegistry::with_builtins();
    for config in registry.iter() {
        for seed in 0..10 {
            let scenarios = generate_scenarios(config, &options(seed)).expect("generate");
            let pairs = twin_pairs(&scenarios);
            let paired = scenarios.iter().filter(|s| s.is_paired()).count();
            assert_eq!(paired, pairs.len() * 2);

            for (original, twin) in pairs {
                assert_eq!(original.twin_id, Some(twin.id));
                assert_eq!(twin.twin_id, Some(original.id));
                assert_eq!(original.twin_role, Some(TwinRole::Original));
                assert_eq!(twin.twin_role, Some(TwinRole::Twin));
                assert_eq!(original.anchor, twin.anchor);
                assert_eq!(original.distractors, twin.distractors);
                assert_eq!(original.twin_delta_changed, twin.twin_delta_changed);

                let change = diff_deltas(&original.deltas, &twin.deltas)
                    .expect("exactly one delta differs");
                let label = twin.twin_delta_changed.as_deref().expect("change recorded");
                match change {
                    DeltaChange::Removed { .. } => assert!(label.starts_with("removed: ")),
                    DeltaChange::Swapped { .. } => assert!(label.starts_with("swapped: ")),
                    DeltaChange::Added { .. } => panic!("generator never adds deltas"),
                }
            }
        }
    }
}

#[test]
fn scenarios_without_deltas_get_no_twin() {
    let config = crop_yield();
    let opts = GenerationOptions {
        min_deltas: 0,
        max_deltas: 0,
        ..options(5)
    };
    let scenarios = generate_scenarios(&config, &opts).expect("generate");
    assert_eq!(scenarios.len(), opts.count);
    assert!(scenarios.iter().all(|s| !s.is_paired() && s.deltas.is_empty()));
}

// ---- Difficulty purity ----

#[test]
fn difficulty_is_a_function_of_composition_only() {
    let config = crop_yield();
    let scenarios = generate_scenarios(&config, &options(77)).expect("generate");
    let first: Vec<_> = scenarios
        .iter()
        .map(|s| calculate_difficulty(&config, &s.anchor, &s.deltas, &s.distractors))
        .collect::<Result<_, _>>()
        .expect("difficulty");
    let second: Vec<_> = scenarios
        .iter()
        .rev()
        .map(|s| calculate_difficulty(&config, &s.anchor, &s.deltas, &s.distractors))
        .collect::<Result<Vec<_>, _>>()
        .expect("difficulty")
        .into_iter()
        .rev()
        .collect();
    assert_eq!(first, second);
}
