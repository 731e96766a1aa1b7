//! Estibench - numeric-estimation benchmark CLI
//!
//! The `estibench` command generates scenario sets and scores model
//! rollouts against them.
//!
//! ## Commands
//!
//! - `domains`: List the registered domains
//! - `generate`: Generate a pending benchmark run
//! - `score`: Record rollouts into a run and finalize it
//! - `gate`: Check a finalized run against quality thresholds
//! - `summary`: Print the markdown summary of a finalized run

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use uuid::Uuid;

use estibench_core::obs::{self, RunSpan};
use estibench_core::{
    evaluate_gate, read_run_artifact, render_run_summary_md, twin_pairs, write_gate_verdict,
    write_run_artifact, write_run_summary_md, BenchmarkRun, DomainRegistry, GateRuleSet,
    GateThresholds, GenerationOptions, RolloutResult,
};

const DEFAULT_ARTIFACTS_DIR: &str = ".estibench/runs";

#[derive(Parser)]
#[command(name = "estibench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Scenario generation and scoring for numeric-estimation benchmarks", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Directory of extra domain files (.toml or .json)
    #[arg(long, global = true, env = "ESTIBENCH_DOMAIN_DIR")]
    domain_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List registered domains
    Domains,

    /// Generate a pending benchmark run
    Generate {
        /// Domain id to generate from
        #[arg(short, long)]
        domain: String,

        /// Extra domain file to register before generating
        #[arg(long)]
        domain_file: Option<PathBuf>,

        /// Number of base scenarios (twins come on top)
        #[arg(short, long, default_value = "10")]
        count: usize,

        #[arg(long, default_value = "1")]
        min_deltas: usize,

        #[arg(long, default_value = "3")]
        max_deltas: usize,

        /// Chance (0-1) that a scenario carries distractors
        #[arg(long, default_value = "0.3")]
        distractor_probability: f64,

        #[arg(long, default_value = "2")]
        max_distractors: usize,

        /// Skip twin generation
        #[arg(long)]
        no_twins: bool,

        /// Generator seed (random if omitted)
        #[arg(long)]
        seed: Option<u64>,

        /// Output path for the run JSON
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Record rollouts into a run, finalize it and write its artifact
    Score {
        /// Run JSON written by `generate`
        #[arg(long)]
        run: PathBuf,

        /// Rollouts JSON: scenario id -> responses
        #[arg(long)]
        rollouts: PathBuf,

        /// Extra domain file to register before scoring
        #[arg(long)]
        domain_file: Option<PathBuf>,

        /// Root directory for run artifacts (default: .estibench/runs)
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },

    /// Check a finalized run against quality thresholds
    Gate {
        #[arg(long)]
        run_id: String,

        /// Root directory for run artifacts (default: .estibench/runs)
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,

        /// Thresholds JSON (camelCase keys); flags below override it
        #[arg(long)]
        thresholds: Option<PathBuf>,

        #[arg(long)]
        min_hit_rate: Option<f64>,

        #[arg(long)]
        max_rmse: Option<f64>,

        #[arg(long)]
        min_directional_accuracy: Option<f64>,

        #[arg(long)]
        max_bias_strength: Option<f64>,

        /// Stop at the first violation
        #[arg(long)]
        fail_fast: bool,
    },

    /// Print the markdown summary of a run
    Summary {
        #[arg(long)]
        run_id: String,

        /// Root directory for run artifacts (default: .estibench/runs)
        #[arg(long)]
        artifacts_dir: Option<PathBuf>,
    },
}

/// What the rollouts file holds for one scenario.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ScenarioRollouts {
    Rollouts(Vec<RolloutEntry>),
    /// The rollout pipeline failed outright for this scenario.
    Failure { error: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RolloutEntry {
    /// Raw model response; the prediction is parsed out of it.
    Raw(String),
    Timed {
        response: String,
        #[serde(default, rename = "latencyMs")]
        latency_ms: u64,
    },
    Parsed(RolloutResult),
}

impl RolloutEntry {
    fn into_rollout(self) -> RolloutResult {
        match self {
            Self::Raw(text) => RolloutResult::from_response(&text, 0),
            Self::Timed {
                response,
                latency_ms,
            } => RolloutResult::from_response(&response, latency_ms),
            Self::Parsed(rollout) => rollout,
        }
    }
}

#[derive(Debug, Default)]
struct GateOverrides {
    thresholds: Option<PathBuf>,
    min_hit_rate: Option<f64>,
    max_rmse: Option<f64>,
    min_directional_accuracy: Option<f64>,
    max_bias_strength: Option<f64>,
    fail_fast: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    estibench_core::telemetry::init_tracing(cli.json, level);

    let domain_dir = cli.domain_dir.as_deref();
    match cli.command {
        Commands::Domains => cmd_domains(domain_dir),
        Commands::Generate {
            domain,
            domain_file,
            count,
            min_deltas,
            max_deltas,
            distractor_probability,
            max_distractors,
            no_twins,
            seed,
            out,
        } => {
            let seed = seed.unwrap_or_else(|| {
                let drawn = rand::random::<u64>();
                info!(seed = drawn, "no seed given; drew one");
                drawn
            });
            let options = GenerationOptions {
                count,
                min_deltas,
                max_deltas,
                distractor_probability,
                max_distractors,
                generate_twins: !no_twins,
                seed,
            };
            cmd_generate(domain_dir, domain_file.as_deref(), &domain, options, &out).map(|_| ())
        }
        Commands::Score {
            run,
            rollouts,
            domain_file,
            artifacts_dir,
        } => cmd_score(
            domain_dir,
            domain_file.as_deref(),
            &run,
            &rollouts,
            &artifacts_root(artifacts_dir),
        )
        .map(|_| ()),
        Commands::Gate {
            run_id,
            artifacts_dir,
            thresholds,
            min_hit_rate,
            max_rmse,
            min_directional_accuracy,
            max_bias_strength,
            fail_fast,
        } => {
            let overrides = GateOverrides {
                thresholds,
                min_hit_rate,
                max_rmse,
                min_directional_accuracy,
                max_bias_strength,
                fail_fast,
            };
            cmd_gate(&run_id, &artifacts_root(artifacts_dir), &overrides)
        }
        Commands::Summary {
            run_id,
            artifacts_dir,
        } => cmd_summary(&run_id, &artifacts_root(artifacts_dir)),
    }
}

fn artifacts_root(dir: Option<PathBuf>) -> PathBuf {
    dir.unwrap_or_else(|| PathBuf::from(DEFAULT_ARTIFACTS_DIR))
}

fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read JSON file: {:?}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid JSON in {:?}", path))
}

fn write_json_file<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }
    let content = serde_json::to_string_pretty(value).context("Failed to serialize JSON")?;
    std::fs::write(path, content).with_context(|| format!("Failed to write {:?}", path))
}

/// Built-in domains plus any from `domain_dir` and `domain_file`.
fn build_registry(domain_dir: Option<&Path>, domain_file: Option<&Path>) -> Result<DomainRegistry> {
    let mut registry = DomainRegistry::with_builtins();
    if let Some(dir) = domain_dir {
        let ids = registry
            .load_dir(dir)
            .with_context(|| format!("Failed to load domains from {:?}", dir))?;
        info!(dir = ?dir, loaded = ids.len(), "loaded domain directory");
    }
    if let Some(path) = domain_file {
        let id = registry
            .load_file(path)
            .with_context(|| format!("Failed to load domain file {:?}", path))?;
        info!(domain_id = %id, path = ?path, "loaded domain file");
    }
    Ok(registry)
}

fn cmd_domains(domain_dir: Option<&Path>) -> Result<()> {
    let registry = build_registry(domain_dir, None)?;
    for config in registry.iter() {
        println!(
            "{:<20} {} ({} anchors, {} deltas, {} distractors)",
            config.id,
            config.name,
            config.anchors.len(),
            config.deltas.len(),
            config.distractors.len()
        );
    }
    Ok(())
}

fn cmd_generate(
    domain_dir: Option<&Path>,
    domain_file: Option<&Path>,
    domain: &str,
    options: GenerationOptions,
    out: &Path,
) -> Result<BenchmarkRun> {
    let registry = build_registry(domain_dir, domain_file)?;
    let config = registry.get(domain)?;
    let seed = options.seed;

    let run = BenchmarkRun::generate(config, options)
        .with_context(|| format!("Failed to generate scenarios for domain '{}'", domain))?;
    write_json_file(out, &run)?;

    println!(
        "Generated run {}: {} scenarios ({} twin pairs) from '{}' with seed {}",
        run.id,
        run.scenarios.len(),
        twin_pairs(&run.scenarios).len(),
        run.domain_id,
        seed
    );
    println!("Scenario digest: {}", run.scenario_digest);
    println!("Written to {:?}", out);
    Ok(run)
}

fn cmd_score(
    domain_dir: Option<&Path>,
    domain_file: Option<&Path>,
    run_path: &Path,
    rollouts_path: &Path,
    artifacts_dir: &Path,
) -> Result<BenchmarkRun> {
    let mut run: BenchmarkRun = read_json_file(run_path)?;
    let rollouts: BTreeMap<Uuid, ScenarioRollouts> = read_json_file(rollouts_path)?;
    let registry = build_registry(domain_dir, domain_file)?;
    let config = registry.get(&run.domain_id)?;

    let run_id = run.id.to_string();
    let _span = RunSpan::enter(&run_id);

    for (scenario_id, entry) in rollouts {
        match entry {
            ScenarioRollouts::Rollouts(entries) => {
                let rollouts = entries.into_iter().map(RolloutEntry::into_rollout).collect();
                run.record_rollouts(config, scenario_id, rollouts)
                    .with_context(|| format!("Failed to record rollouts for {}", scenario_id))?;
            }
            ScenarioRollouts::Failure { error } => {
                run.record_failure(scenario_id, error)
                    .with_context(|| format!("Failed to record failure for {}", scenario_id))?;
            }
        }
    }

    let finalized = run.finalize(config)?.is_some();
    write_json_file(run_path, &run)?;

    if !finalized {
        warn!(
            pending = run.pending_count(),
            "run not finalized; rerun score with the remaining rollouts"
        );
        println!(
            "Run {}: {} of {} results still pending; updated {:?}",
            run.id,
            run.pending_count(),
            run.results.len(),
            run_path
        );
        return Ok(run);
    }

    let artifact = write_run_artifact(&run, artifacts_dir)
        .with_context(|| format!("Failed to write run artifact under {:?}", artifacts_dir))?;
    write_run_summary_md(&run, artifacts_dir)
        .with_context(|| format!("Failed to write summary under {:?}", artifacts_dir))?;

    print!("{}", render_run_summary_md(&run));
    println!();
    println!("Artifact: {:?}", artifact);
    Ok(run)
}

fn resolve_thresholds(overrides: &GateOverrides) -> Result<GateThresholds> {
    let mut thresholds = match &overrides.thresholds {
        Some(path) => read_json_file::<GateThresholds>(path)?,
        None => GateThresholds::default(),
    };
    if let Some(v) = overrides.min_hit_rate {
        thresholds.min_hit_rate = v;
    }
    if let Some(v) = overrides.max_rmse {
        thresholds.max_rmse = Some(v);
    }
    if let Some(v) = overrides.min_directional_accuracy {
        thresholds.min_directional_accuracy = v;
    }
    if let Some(v) = overrides.max_bias_strength {
        thresholds.max_bias_strength = v;
    }
    if overrides.fail_fast {
        thresholds.fail_fast = true;
    }
    Ok(thresholds)
}

fn cmd_gate(run_id: &str, artifacts_dir: &Path, overrides: &GateOverrides) -> Result<()> {
    let run = read_run_artifact(run_id, artifacts_dir)
        .with_context(|| format!("Failed to read run artifact {}", run_id))?;
    let (Some(metrics), Some(patterns)) = (&run.metrics, &run.error_patterns) else {
        anyhow::bail!("Run {} has not been finalized", run_id);
    };

    let rule_set = GateRuleSet::standard().with_thresholds(resolve_thresholds(overrides)?);
    let verdict = evaluate_gate(&rule_set, metrics, patterns);
    obs::emit_gate_evaluated(run_id, metrics.hit_rate, verdict.passed());
    write_gate_verdict(run_id, &verdict, artifacts_dir)
        .with_context(|| format!("Failed to write gate verdict for {}", run_id))?;

    println!("Run {}: hit rate {:.2}%", run_id, metrics.hit_rate);
    println!("Gate: {}", if verdict.passed() { "PASSED" } else { "FAILED" });
    if !verdict.violations.is_empty() {
        println!("Violations:");
        for violation in &verdict.violations {
            println!("  - {}", violation.reason);
        }
    }
    if !verdict.skipped.is_empty() {
        println!("Skipped: {} rule(s) with undefined metrics", verdict.skipped.len());
    }

    if verdict.passed() {
        Ok(())
    } else {
        anyhow::bail!("Quality gate failed for run {}", run_id)
    }
}

fn cmd_summary(run_id: &str, artifacts_dir: &Path) -> Result<()> {
    let run = read_run_artifact(run_id, artifacts_dir)
        .with_context(|| format!("Failed to read run artifact {}", run_id))?;
    print!("{}", render_run_summary_md(&run));
    Ok(())
}
