// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Splitting an (encoded) matrix across a grid of bounded-size cores.
//!
//! Matrix columns drive the physical rows of an array, so `rows_max` bounds
//! the width of a column partition and `cols_max` bounds the height of a row
//! partition.

use crate::error::{config, Result};
use amvm_config::{AnalogParams, CoreParams, PartitionStrategy};
use std::ops::Range;

/// One partition along an axis: `[start, end)` owned by grid index `index`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PartitionBound {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl PartitionBound {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    pub fn bounds(&self) -> (usize, usize) {
        (self.start, self.end)
    }
}

/// Row and column partition bounds for one matrix and one configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionPlan {
    rows: Vec<PartitionBound>,
    cols: Vec<PartitionBound>,
}

impl PartitionPlan {
    pub fn new(nrow: usize, ncol: usize, core: &CoreParams) -> Self {
        let weights = &core.mapping.weights;
        let num_cores_row = axis_count(nrow, core.cols_max);
        let num_cores_col = axis_count(ncol, core.rows_max);
        let row_sizes = split_axis(
            nrow,
            num_cores_row,
            core.cols_max,
            &weights.row_partition_priority,
            weights.row_partition_strategy,
        );
        let col_sizes = split_axis(
            ncol,
            num_cores_col,
            core.rows_max,
            &weights.col_partition_priority,
            weights.col_partition_strategy,
        );
        Self {
            rows: to_bounds(&row_sizes),
            cols: to_bounds(&col_sizes),
        }
    }

    pub fn rows(&self) -> &[PartitionBound] {
        &self.rows
    }

    pub fn cols(&self) -> &[PartitionBound] {
        &self.cols
    }

    pub fn num_cores_row(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cores_col(&self) -> usize {
        self.cols.len()
    }

    pub fn num_cores(&self) -> usize {
        self.rows.len() * self.cols.len()
    }

    /// `(row bound, col bound)` for every cell in row-major grid order.
    pub fn cells(&self) -> impl Iterator<Item = (PartitionBound, PartitionBound)> + '_ {
        self.rows
            .iter()
            .flat_map(move |r| self.cols.iter().map(move |c| (*r, *c)))
    }
}

fn axis_count(dim: usize, max: usize) -> usize {
    if max == 0 || dim == 0 {
        1
    } else {
        (dim + max - 1) / max
    }
}

/// Sizes of `parts` partitions covering `dim`; every size is `<= max` (when
/// `max > 0`) and the last one absorbs the remainder.
fn split_axis(
    dim: usize,
    parts: usize,
    max: usize,
    priority: &[u32],
    strategy: PartitionStrategy,
) -> Vec<usize> {
    if dim % parts == 0 {
        return vec![dim / parts; parts];
    }
    // an uneven split implies parts > 1, which implies max > 0
    let prioritised = priority.iter().any(|&d| {
        let per = max as f64 / d as f64;
        d > 0 && per > 0.0 && (dim as f64 % per) == 0.0
    });
    let per_core = if prioritised || strategy == PartitionStrategy::Max {
        max
    } else {
        even_size(dim, parts, max)
    };
    let mut sizes = vec![per_core; parts];
    sizes[parts - 1] = dim - (parts - 1) * per_core;
    sizes
}

fn even_size(dim: usize, parts: usize, max: usize) -> usize {
    let fits = |per: usize| {
        let head = (parts - 1) * per;
        head < dim && dim - head <= max
    };
    let rounded = (dim as f64 / parts as f64).round() as usize;
    if fits(rounded) {
        rounded
    } else {
        (dim + parts - 1) / parts
    }
}

fn to_bounds(sizes: &[usize]) -> Vec<PartitionBound> {
    let mut start = 0;
    sizes
        .iter()
        .enumerate()
        .map(|(index, &size)| {
            let bound = PartitionBound {
                index,
                start,
                end: start + size,
            };
            start += size;
            bound
        })
        .collect()
}

/// Parameters for a whole matrix: one shared object, or one per grid cell.
#[derive(Clone, Debug)]
pub enum ParamSet {
    Shared(AnalogParams),
    PerCore(Vec<AnalogParams>),
}

impl ParamSet {
    /// Parameters that decide the matrix-level behaviour (the first entry).
    pub fn master(&self) -> Result<&AnalogParams> {
        match self {
            ParamSet::Shared(params) => Ok(params),
            ParamSet::PerCore(list) => list
                .first()
                .ok_or_else(|| config("an empty params list was provided")),
        }
    }

    /// Expands to exactly one parameter object per core, row-major.
    pub fn per_core(self, num_cores: usize) -> Result<Vec<AnalogParams>> {
        match self {
            ParamSet::Shared(params) => Ok(vec![params; num_cores]),
            ParamSet::PerCore(_) if num_cores == 1 => Err(config(
                "too many params objects provided for single-core layer",
            )),
            ParamSet::PerCore(list) if list.len() != num_cores => Err(config(format!(
                "number of params objects provided ({}) does not match number of cores ({num_cores})",
                list.len()
            ))),
            ParamSet::PerCore(list) => Ok(list),
        }
    }
}

impl From<AnalogParams> for ParamSet {
    fn from(value: AnalogParams) -> Self {
        ParamSet::Shared(value)
    }
}

impl From<&AnalogParams> for ParamSet {
    fn from(value: &AnalogParams) -> Self {
        ParamSet::Shared(value.clone())
    }
}

impl From<Vec<AnalogParams>> for ParamSet {
    fn from(value: Vec<AnalogParams>) -> Self {
        ParamSet::PerCore(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn core(rows_max: usize, cols_max: usize) -> CoreParams {
        CoreParams {
            rows_max,
            cols_max,
            ..CoreParams::default()
        }
    }

    fn sizes(bounds: &[PartitionBound]) -> Vec<usize> {
        bounds.iter().map(PartitionBound::len).collect()
    }

    fn assert_covers(bounds: &[PartitionBound], dim: usize, max: usize) {
        let mut cursor = 0;
        for (i, b) in bounds.iter().enumerate() {
            assert_eq!(b.index, i);
            assert_eq!(b.start, cursor, "gap or overlap at partition {i}");
            assert!(b.end > b.start || dim == 0);
            if max > 0 {
                assert!(b.len() <= max, "partition {i} of {} exceeds {max}", b.len());
            }
            cursor = b.end;
        }
        assert_eq!(cursor, dim);
    }

    #[test]
    fn single_core_when_unbounded() {
        let plan = PartitionPlan::new(300, 700, &core(0, 0));
        assert_eq!(plan.num_cores(), 1);
        assert_eq!(plan.rows()[0].range(), 0..300);
        assert_eq!(plan.cols()[0].range(), 0..700);
    }

    #[test]
    fn square_grid_splits_evenly() {
        let plan = PartitionPlan::new(4, 4, &core(2, 2));
        assert_eq!((plan.num_cores_row(), plan.num_cores_col()), (2, 2));
        assert_eq!(sizes(plan.rows()), vec![2, 2]);
        assert_eq!(sizes(plan.cols()), vec![2, 2]);
    }

    #[test]
    fn rows_max_bounds_columns_and_cols_max_bounds_rows() {
        let plan = PartitionPlan::new(10, 3, &core(2, 100));
        assert_eq!(plan.num_cores_row(), 1);
        assert_eq!(plan.num_cores_col(), 2);
        assert_eq!(sizes(plan.cols()), vec![2, 1]);
    }

    #[test]
    fn max_strategy_fills_then_remainder() {
        let plan = PartitionPlan::new(10, 10, &core(4, 4));
        assert_eq!(sizes(plan.rows()), vec![4, 4, 2]);
        assert_eq!(sizes(plan.cols()), vec![4, 4, 2]);
    }

    #[test]
    fn even_strategy_rounds() {
        let mut params = core(4, 4);
        params.mapping.weights.row_partition_strategy = PartitionStrategy::Even;
        params.mapping.weights.col_partition_strategy = PartitionStrategy::Even;
        let plan = PartitionPlan::new(10, 11, &params);
        assert_eq!(sizes(plan.rows()), vec![3, 3, 4]);
        assert_eq!(sizes(plan.cols()), vec![4, 4, 3]);
    }

    #[test]
    fn even_strategy_never_overflows_the_last_core() {
        let mut params = core(5, 5);
        params.mapping.weights.row_partition_strategy = PartitionStrategy::Even;
        // round(22 / 5) = 4 would leave 6 for the last core
        let plan = PartitionPlan::new(22, 5, &params);
        assert_covers(plan.rows(), 22, 5);
    }

    #[test]
    fn priority_divisor_forces_max_sized_partitions() {
        let mut params = core(8, 8);
        params.mapping.weights.row_partition_strategy = PartitionStrategy::Even;
        params.mapping.weights.row_partition_priority = vec![2];
        // 20 % (8 / 2) == 0 -> 8, 8, 4 instead of the even 7, 7, 6
        let plan = PartitionPlan::new(20, 8, &params);
        assert_eq!(sizes(plan.rows()), vec![8, 8, 4]);
        params.mapping.weights.row_partition_priority = vec![3];
        let plan = PartitionPlan::new(20, 8, &params);
        assert_eq!(sizes(plan.rows()), vec![7, 7, 6]);
    }

    #[test]
    fn coverage_holds_over_a_sweep() {
        for strategy in [PartitionStrategy::Max, PartitionStrategy::Even] {
            for max in 1..=9 {
                for dim in 1..=60 {
                    let mut params = core(max, max);
                    params.mapping.weights.row_partition_strategy = strategy;
                    params.mapping.weights.col_partition_strategy = strategy;
                    params.mapping.weights.col_partition_priority = vec![2, 4];
                    let plan = PartitionPlan::new(dim, dim + 3, &params);
                    assert_covers(plan.rows(), dim, max);
                    assert_covers(plan.cols(), dim + 3, max);
                }
            }
        }
    }

    #[test]
    fn per_core_params_must_match_core_count() {
        let one = AnalogParams::default();
        assert!(ParamSet::from(vec![one.clone(); 3]).per_core(4).is_err());
        assert!(ParamSet::from(vec![one.clone()]).per_core(1).is_err());
        assert_eq!(ParamSet::from(vec![one.clone(); 4]).per_core(4).unwrap().len(), 4);
        assert_eq!(ParamSet::from(one).per_core(6).unwrap().len(), 6);
        assert!(ParamSet::PerCore(Vec::new()).master().is_err());
    }
}
