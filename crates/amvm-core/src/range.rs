// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Symmetric clipping bounds for weights and inputs.

use amvm_config::{InputMapping, WeightMapping};
use ndarray::ArrayViewD;

/// The `{min, max, percentile}` triple shared by weight and input mappings.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RangeConstraints {
    pub min: f64,
    pub max: f64,
    pub percentile: Option<f64>,
}

impl From<&WeightMapping> for RangeConstraints {
    fn from(value: &WeightMapping) -> Self {
        Self {
            min: value.min,
            max: value.max,
            percentile: value.percentile,
        }
    }
}

impl From<&InputMapping> for RangeConstraints {
    fn from(value: &InputMapping) -> Self {
        Self {
            min: value.min,
            max: value.max,
            percentile: value.percentile,
        }
    }
}

/// Computes a `(min, max)` bound for `values`.
///
/// With a percentile `p >= 1` the bound is `p * max|x|`; below 1 it is the
/// larger magnitude of the `100p`-th and `100(1-p)`-th percentiles, mirrored
/// around zero. Without a percentile the fixed `min`/`max` are returned. The
/// result never collapses to a single point.
pub fn estimate_range(values: ArrayViewD<'_, f64>, constraints: &RangeConstraints) -> (f64, f64) {
    let (mut lo, mut hi) = match constraints.percentile {
        None => (constraints.min, constraints.max),
        Some(p) if p >= 1.0 => {
            let abs_max = values.iter().fold(0.0f64, |acc, v| acc.max(v.abs()));
            let bound = abs_max * p;
            (-bound, bound)
        }
        Some(p) => {
            let mut sorted: Vec<f64> = values.iter().copied().collect();
            sorted.sort_by(f64::total_cmp);
            let upper = percentile(&sorted, 100.0 * p);
            let lower = percentile(&sorted, 100.0 - 100.0 * p);
            let bound = upper.abs().max(lower.abs());
            (-bound, bound)
        }
    };
    if lo == hi {
        lo -= f64::EPSILON;
        hi += f64::EPSILON;
    }
    (lo, hi)
}

/// Linearly interpolated percentile of pre-sorted data (NumPy's default).
///
/// `q` is in percent; empty input yields 0.
pub fn percentile(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (q.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let below = rank.floor() as usize;
            let above = (below + 1).min(n - 1);
            let frac = rank - below as f64;
            sorted[below] + (sorted[above] - sorted[below]) * frac
        }
    }
}
