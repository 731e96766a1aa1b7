//! Run artifacts and markdown summaries.
//!
//! A finalized run is persisted as `<dir>/<run_id>/run.json` next to a
//! `run.digest` holding the SHA-256 of the JSON bytes. Reading verifies the
//! digest before deserializing.

use std::path::{Path, PathBuf};

use crate::digest::sha256_hex;
use crate::domain::{BenchError, Result, TwinRole};
use crate::gate::GateVerdict;
use crate::run::BenchmarkRun;

const RUN_FILE: &str = "run.json";
const DIGEST_FILE: &str = "run.digest";
const SUMMARY_FILE: &str = "summary.md";
const GATE_FILE: &str = "gate.json";

/// Persist `<dir>/<run_id>/run.json` and `<dir>/<run_id>/run.digest`.
pub fn write_run_artifact(run: &BenchmarkRun, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(run.id.to_string());
    std::fs::create_dir_all(&run_dir)?;

    let path = run_dir.join(RUN_FILE);
    let json = serde_json::to_vec_pretty(run)?;
    std::fs::write(&path, &json)?;
    std::fs::write(run_dir.join(DIGEST_FILE), sha256_hex(&json).as_bytes())?;

    Ok(path)
}

/// Read `<dir>/<run_id>/run.json`, verifying its digest.
pub fn read_run_artifact(run_id: &str, dir: &Path) -> Result<BenchmarkRun> {
    let run_dir = dir.join(run_id);
    let json = std::fs::read(run_dir.join(RUN_FILE))?;
    let expected = std::fs::read_to_string(run_dir.join(DIGEST_FILE))?;
    let actual = sha256_hex(&json);
    if expected.trim() != actual {
        return Err(BenchError::DigestMismatch {
            expected: expected.trim().to_string(),
            actual,
        });
    }

    let run: BenchmarkRun = serde_json::from_slice(&json)?;
    if run.id.to_string() != run_id {
        return Err(BenchError::InvalidArtifact(format!(
            "artifact under '{}' holds run {}",
            run_id, run.id
        )));
    }
    Ok(run)
}

/// Write `<dir>/<run_id>/summary.md`.
pub fn write_run_summary_md(run: &BenchmarkRun, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(run.id.to_string());
    std::fs::create_dir_all(&run_dir)?;
    let path = run_dir.join(SUMMARY_FILE);
    std::fs::write(&path, render_run_summary_md(run))?;
    Ok(path)
}

/// Write `<dir>/<run_id>/gate.json`.
pub fn write_gate_verdict(run_id: &str, verdict: &GateVerdict, dir: &Path) -> Result<PathBuf> {
    let run_dir = dir.join(run_id);
    std::fs::create_dir_all(&run_dir)?;
    let path = run_dir.join(GATE_FILE);
    std::fs::write(&path, serde_json::to_vec_pretty(verdict)?)?;
    Ok(path)
}

/// Render the markdown summary of a run.
pub fn render_run_summary_md(run: &BenchmarkRun) -> String {
    let pairs = run
        .scenarios
        .iter()
        .filter(|s| s.twin_role == Some(TwinRole::Original))
        .count();

    let mut out = String::new();
    out.push_str(&format!("# Benchmark Run {}\n\n", run.id));
    out.push_str(&format!(
        "- domain: {}\n- status: {}\n- seed: {}\n- scenarios: {} ({} twin pairs)\n- scenario digest: `{}`\n\n",
        run.domain_id,
        run.status,
        run.options.seed,
        run.scenarios.len(),
        pairs,
        run.scenario_digest
    ));

    let Some(m) = &run.metrics else {
        out.push_str(&format!(
            "_Not finalized: {} of {} results pending._\n",
            run.pending_count(),
            run.results.len()
        ));
        return out;
    };

    out.push_str("## Metrics\n");
    out.push_str(&format!(
        "- completed: {} / {} ({} failed)\n- hit rate: {:.2}%\n- mean error: {:+.2}\n- mean absolute error: {:.2}\n- rmse: {:.2}\n",
        m.completed_scenarios,
        m.total_scenarios,
        m.failed_scenarios,
        m.hit_rate,
        m.mean_error,
        m.mean_absolute_error,
        m.rmse
    ));
    match m.directional_accuracy {
        Some(acc) => out.push_str(&format!(
            "- directional accuracy: {:.2}% over {} twin pair(s)\n",
            acc, m.twin_pairs_evaluated
        )),
        None => out.push_str("- directional accuracy: n/a\n"),
    }
    out.push_str(&format!(
        "- avg latency: {:.2} ms\n- rollouts: {} ({} unparseable)\n",
        m.avg_latency_ms, m.total_rollouts, m.failed_rollouts
    ));

    if let Some(p) = &run.error_patterns {
        out.push_str("\n## Error Patterns\n");
        out.push_str(&format!(
            "- systematic bias: {} (strength {:.2})\n- anchor bias: {:.2}%\n- delta blindness: {:.2}%\n- distractor influence: {:.2}%\n",
            p.systematic_bias,
            p.bias_strength,
            p.anchor_bias_rate,
            p.delta_blindness_rate,
            p.distractor_influence_rate
        ));

        let counts: Vec<_> = p.pattern_counts.iter().filter(|(_, n)| **n > 0).collect();
        if !counts.is_empty() {
            out.push_str("\n### Pattern Counts\n");
            for (kind, n) in counts {
                out.push_str(&format!("- {}: {}\n", kind, n));
            }
        }

        if !p.error_by_difficulty.is_empty() {
            out.push_str("\n### Error by Difficulty\n");
            for (level, err) in &p.error_by_difficulty {
                out.push_str(&format!("- {}: {:.2}\n", level, err));
            }
        }
    }
    out
}
