//! Ground truth calculator.
//!
//! Composes an anchor with an ordered delta chain. Additive and
//! multiplicative steps do not commute, so deltas are applied strictly in
//! the order given; twin comparisons rely on that.

use crate::domain::{round2, DeltaKind, DomainConfig, GroundTruth, Result};

/// Compute the ground truth for `anchor` followed by `deltas`, in order.
///
/// Fails with a configuration error if the anchor or any delta key is
/// not defined by `config`.
pub fn compute_ground_truth(
    config: &DomainConfig,
    anchor: &str,
    deltas: &[String],
) -> Result<GroundTruth> {
    let base = config.anchor(anchor)?;
    let mut value = base.value;
    let mut calculation = Vec::with_capacity(deltas.len() + 2);
    calculation.push(format!("{}: {}", label(&base.description, anchor), value));

    for key in deltas {
        let delta = config.delta(key)?;
        let name = label(&delta.description, key);
        match delta.kind {
            DeltaKind::Additive => {
                value += delta.value;
                calculation.push(format!("+ {} ({:+}) = {}", name, delta.value, fmt2(value)));
            }
            DeltaKind::Multiplicative => {
                value *= delta.value;
                calculation.push(format!("x {} (x{}) = {}", name, delta.value, fmt2(value)));
            }
        }
    }

    let value = round2(value);
    calculation.push(format!("= {}", value));

    Ok(GroundTruth {
        value,
        tolerance: config.tolerance_for(value),
        calculation,
    })
}

fn label<'a>(description: &'a str, key: &'a str) -> &'a str {
    if description.is_empty() {
        key
    } else {
        description
    }
}

fn fmt2(value: f64) -> String {
    round2(value).to_string()
}
