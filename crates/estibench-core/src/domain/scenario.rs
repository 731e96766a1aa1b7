//! Scenario definitions produced by the generator.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ground truth for a scenario plus the audit trail that produced it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GroundTruth {
    /// Final value, rounded to 2 decimals.
    pub value: f64,
    /// Maximum acceptable absolute deviation for a hit. Always > 0.
    pub tolerance: f64,
    /// One human-readable line per calculation step.
    pub calculation: Vec<String>,
}

/// Which side of a twin pair a scenario sits on.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TwinRole {
    Original,
    Twin,
}

/// A single generated test scenario.
///
/// Only `context_description` may change after generation, and only through
/// [`Scenario::attach_context`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: Uuid,
    pub anchor: String,
    /// Applied delta keys, in application order. No duplicates.
    pub deltas: Vec<String>,
    pub distractors: Vec<String>,
    /// Narrative text rendered by an external collaborator. Opaque here.
    #[serde(default)]
    pub context_description: String,
    pub ground_truth: GroundTruth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin_role: Option<TwinRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twin_delta_changed: Option<String>,
}

impl Scenario {
    /// Create an unpaired scenario with a fresh id.
    pub fn new(
        anchor: String,
        deltas: Vec<String>,
        distractors: Vec<String>,
        ground_truth: GroundTruth,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            anchor,
            deltas,
            distractors,
            context_description: String::new(),
            ground_truth,
            twin_id: None,
            twin_role: None,
            twin_delta_changed: None,
        }
    }

    /// Attach the externally rendered narrative text.
    pub fn attach_context(&mut self, text: impl Into<String>) {
        self.context_description = text.into();
    }

    /// Whether this scenario is one side of a twin pair.
    pub fn is_paired(&self) -> bool {
        self.twin_id.is_some()
    }
}

/// Single-delta difference between two ordered delta lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DeltaChange {
    Added { key: String },
    Removed { key: String },
    Swapped { from: String, to: String },
}

/// Classify how `twin` differs from `original`.
///
/// Returns `None` unless exactly one delta was added, removed, or swapped
/// in place and the remaining deltas keep their relative order.
pub fn diff_deltas(original: &[String], twin: &[String]) -> Option<DeltaChange> {
    use std::cmp::Ordering;

    match original.len().cmp(&twin.len()) {
        Ordering::Equal => {
            let mismatches: Vec<usize> = original
                .iter()
                .zip(twin)
                .enumerate()
                .filter(|(_, (a, b))| a != b)
                .map(|(i, _)| i)
                .collect();
            match mismatches.as_slice() {
                [i] if !original.contains(&twin[*i]) => Some(DeltaChange::Swapped {
                    from: original[*i].clone(),
                    to: twin[*i].clone(),
                }),
                _ => None,
            }
        }
        Ordering::Greater if original.len() == twin.len() + 1 => {
            single_removal(original, twin).map(|key| DeltaChange::Removed { key })
        }
        Ordering::Less if twin.len() == original.len() + 1 => {
            single_removal(twin, original).map(|key| DeltaChange::Added { key })
        }
        _ => None,
    }
}

/// If `shorter` is `longer` with one element removed, return that element.
fn single_removal(longer: &[String], shorter: &[String]) -> Option<String> {
    let pos = longer
        .iter()
        .zip(shorter)
        .position(|(a, b)| a != b)
        .unwrap_or(shorter.len());
    if longer[pos + 1..] == shorter[pos..] {
        Some(longer[pos].clone())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_diff_deltas_removed() {
        let change = diff_deltas(&keys(&["a", "b", "c"]), &keys(&["a", "c"]));
        assert_eq!(
            change,
            Some(DeltaChange::Removed {
                key: "b".to_string()
            })
        );
    }

    #[test]
    fn test_diff_deltas_removed_last() {
        let change = diff_deltas(&keys(&["a", "b"]), &keys(&["a"]));
        assert_eq!(
            change,
            Some(DeltaChange::Removed {
                key: "b".to_string()
            })
        );
    }

    #[test]
    fn test_diff_deltas_added() {
        let change = diff_deltas(&keys(&["a"]), &keys(&["x", "a"]));
        assert_eq!(
            change,
            Some(DeltaChange::Added {
                key: "x".to_string()
            })
        );
    }

    #[test]
    fn test_diff_deltas_swapped() {
        let change = diff_deltas(&keys(&["a", "b"]), &keys(&["a", "z"]));
        assert_eq!(
            change,
            Some(DeltaChange::Swapped {
                from: "b".to_string(),
                to: "z".to_string()
            })
        );
    }

    #[test]
    fn test_diff_deltas_rejects_multi_change() {
        assert_eq!(diff_deltas(&keys(&["a", "b"]), &keys(&["x", "y"])), None);
        assert_eq!(diff_deltas(&keys(&["a", "b", "c"]), &keys(&["a"])), None);
        assert_eq!(diff_deltas(&keys(&["a", "b"]), &keys(&["a", "b"])), None);
        assert_eq!(diff_deltas(&keys(&["a", "b"]), &keys(&["b", "a"])), None);
    }

    #[test]
    fn test_attach_context_only_touches_text() {
        let mut scenario = Scenario::new(
            "corn".to_string(),
            keys(&["drought"]),
            vec![],
            GroundTruth {
                value: 140.0,
                tolerance: 5.0,
                calculation: vec![],
            },
        );
        let before = scenario.clone();
        scenario.attach_context("A dry summer in Iowa...");
        assert_eq!(scenario.context_description, "A dry summer in Iowa...");
        assert_eq!(scenario.ground_truth, before.ground_truth);
        assert_eq!(scenario.deltas, before.deltas);
    }

    #[test]
    fn test_scenario_serializes_camel_case() {
        let scenario = Scenario::new(
            "corn".to_string(),
            vec![],
            vec![],
            GroundTruth {
                value: 1.0,
                tolerance: 0.5,
                calculation: vec![],
            },
        );
        let raw = serde_json::to_value(&scenario).expect("serialize");
        assert!(raw.get("groundTruth").is_some());
        assert!(raw.get("contextDescription").is_some());
        assert!(raw.get("twinId").is_none());
    }
}
