// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Grid cells: one bounded-size physical array per partition.
//!
//! Every topology maps a signed weight block onto one or more non-negative
//! [`NumericCore`] arrays and recombines their products. The inputs handed to
//! a cell are already complex-encoded; batches are column-stacked `(cols, k)`
//! for MVM and row-stacked `(k, rows)` for VMM.

mod balanced;
mod bitsliced;
mod numeric;
mod offset;

pub use balanced::BalancedCell;
pub use bitsliced::BitslicedCell;
pub use numeric::NumericCore;
pub use offset::OffsetCell;

use crate::backend::Backend;
use crate::error::Result;
use crate::slice::ErrorMask;
use amvm_config::{CoreParams, CoreStyle};
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, CowArray, IxDyn};

/// Contract between the orchestrator and one physical array simulation.
pub trait CoreCell {
    /// `(rows, cols)` of the programmed block.
    fn shape(&self) -> (usize, usize);

    /// Bounds the block was last programmed against.
    fn weight_range(&self) -> (f64, f64);

    /// Programs `block` against explicit `weight_limits`. With an
    /// `error_mask` only the masked positions are rewritten.
    fn set_matrix(
        &mut self,
        block: ArrayView2<'_, f64>,
        weight_limits: (f64, f64),
        error_mask: Option<&ErrorMask>,
    ) -> Result<()>;

    /// The effective signed weights currently held by the cell.
    fn read_matrix(&self) -> Array2<f64>;

    fn run_xbar_mvm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>>;

    fn run_xbar_vmm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>>;
}

/// The closed set of cell topologies, chosen once from [`CoreStyle`].
#[derive(Clone, Debug)]
pub enum GridCell {
    Offset(OffsetCell),
    Balanced(BalancedCell),
    Bitsliced(BitslicedCell),
}

macro_rules! dispatch {
    ($cell:expr, $inner:ident => $body:expr) => {
        match $cell {
            GridCell::Offset($inner) => $body,
            GridCell::Balanced($inner) => $body,
            GridCell::Bitsliced($inner) => $body,
        }
    };
}

impl GridCell {
    pub fn new(core: &CoreParams, rows: usize, cols: usize, backend: Backend) -> Self {
        match core.style {
            CoreStyle::Offset => GridCell::Offset(OffsetCell::new(rows, cols, backend)),
            CoreStyle::Balanced => GridCell::Balanced(BalancedCell::new(rows, cols, backend)),
            CoreStyle::Bitsliced => GridCell::Bitsliced(BitslicedCell::new(
                rows,
                cols,
                core.bit_slices as usize,
                core.bits_per_slice,
                backend,
            )),
        }
    }

    pub fn style(&self) -> CoreStyle {
        match self {
            GridCell::Offset(_) => CoreStyle::Offset,
            GridCell::Balanced(_) => CoreStyle::Balanced,
            GridCell::Bitsliced(_) => CoreStyle::Bitsliced,
        }
    }
}

impl CoreCell for GridCell {
    fn shape(&self) -> (usize, usize) {
        dispatch!(self, cell => cell.shape())
    }

    fn weight_range(&self) -> (f64, f64) {
        dispatch!(self, cell => cell.weight_range())
    }

    fn set_matrix(
        &mut self,
        block: ArrayView2<'_, f64>,
        weight_limits: (f64, f64),
        error_mask: Option<&ErrorMask>,
    ) -> Result<()> {
        dispatch!(self, cell => cell.set_matrix(block, weight_limits, error_mask))
    }

    fn read_matrix(&self) -> Array2<f64> {
        dispatch!(self, cell => cell.read_matrix())
    }

    fn run_xbar_mvm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        dispatch!(self, cell => cell.run_xbar_mvm(input, input_range))
    }

    fn run_xbar_vmm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        dispatch!(self, cell => cell.run_xbar_vmm(input, input_range))
    }
}

/// Applies the optional input range once, before any inner array sees `x`.
pub(crate) fn clip_input<'a>(x: ArrayViewD<'a, f64>, range: Option<(f64, f64)>) -> CowArray<'a, f64, IxDyn> {
    match range {
        Some((lo, hi)) => CowArray::from(x.mapv(|v| v.max(lo).min(hi))),
        None => CowArray::from(x),
    }
}

/// Sum of the input over its contracted axis, shaped to broadcast against
/// the product (`(k)` → `(1, k)` for MVM batches, `(k, 1)` for VMM batches).
pub(crate) fn input_sums(x: ArrayViewD<'_, f64>, mvm: bool) -> ArrayD<f64> {
    match (x.ndim(), mvm) {
        (1, _) => ArrayD::from_elem(IxDyn(&[]), x.sum()),
        (_, true) => x.sum_axis(ndarray::Axis(0)).insert_axis(ndarray::Axis(0)),
        (_, false) => {
            let last = ndarray::Axis(x.ndim() - 1);
            x.sum_axis(last).insert_axis(last)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array2};

    fn cells() -> Vec<GridCell> {
        [CoreStyle::Offset, CoreStyle::Balanced, CoreStyle::Bitsliced]
            .into_iter()
            .map(|style| {
                let core = CoreParams {
                    style,
                    ..CoreParams::default()
                };
                GridCell::new(&core, 3, 2, Backend::default())
            })
            .collect()
    }

    fn assert_close(a: &ArrayD<f64>, b: &ArrayD<f64>) {
        assert_eq!(a.shape(), b.shape());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-12);
        }
    }

    #[test]
    fn every_topology_is_exact_without_errors() {
        let w = array![[0.5, -1.0], [0.0, 0.25], [-0.75, 1.0]];
        let x = array![2.0, -1.0].into_dyn();
        let xs = array![[2.0, 0.0, 1.0], [-1.0, 1.0, 1.0]].into_dyn();
        let v = array![1.0, 0.5, -2.0].into_dyn();
        let vs = array![[1.0, 0.5, -2.0], [0.0, 1.0, 0.0]].into_dyn();
        for mut cell in cells() {
            cell.set_matrix(w.view(), (-1.0, 1.0), None).unwrap();
            let read = cell.read_matrix().into_dyn();
            assert_close(&read, &w.clone().into_dyn());
            assert_close(&cell.run_xbar_mvm(x.view(), None).unwrap(), &w.dot(&array![2.0, -1.0]).into_dyn());
            assert_close(
                &cell.run_xbar_mvm(xs.view(), None).unwrap(),
                &w.dot(&array![[2.0, 0.0, 1.0], [-1.0, 1.0, 1.0]]).into_dyn(),
            );
            assert_close(&cell.run_xbar_vmm(v.view(), None).unwrap(), &array![1.0, 0.5, -2.0].dot(&w).into_dyn());
            assert_close(
                &cell.run_xbar_vmm(vs.view(), None).unwrap(),
                &array![[1.0, 0.5, -2.0], [0.0, 1.0, 0.0]].dot(&w).into_dyn(),
            );
        }
    }

    #[test]
    fn partial_updates_leave_other_weights_alone() {
        let w = Array2::from_elem((3, 2), 0.5);
        let mut update = w.clone();
        update[[2, 1]] = -0.25;
        let mask = ErrorMask::single(crate::slice::Span::single(2), crate::slice::Span::single(1));
        for mut cell in cells() {
            cell.set_matrix(w.view(), (-1.0, 1.0), None).unwrap();
            cell.set_matrix(update.view(), (-1.0, 1.0), Some(&mask)).unwrap();
            assert_close(&cell.read_matrix().into_dyn(), &update.clone().into_dyn());
        }
    }

    #[test]
    fn style_is_fixed_at_construction() {
        let styles: Vec<_> = cells().iter().map(GridCell::style).collect();
        assert_eq!(styles, vec![CoreStyle::Offset, CoreStyle::Balanced, CoreStyle::Bitsliced]);
    }
}
