// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use super::{clip_input, input_sums, CoreCell, NumericCore};
use crate::backend::Backend;
use crate::error::Result;
use crate::slice::ErrorMask;
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD};

/// One array holding conductances `(w - lo) / (hi - lo)`; the product is
/// rescaled and re-biased with `lo * sum(x)`.
#[derive(Clone, Debug)]
pub struct OffsetCell {
    array: NumericCore,
    range: (f64, f64),
}

impl OffsetCell {
    pub fn new(rows: usize, cols: usize, backend: Backend) -> Self {
        Self {
            array: NumericCore::new(rows, cols, backend),
            range: (-1.0, 1.0),
        }
    }

    fn span(&self) -> f64 {
        self.range.1 - self.range.0
    }
}

impl CoreCell for OffsetCell {
    fn shape(&self) -> (usize, usize) {
        self.array.shape()
    }

    fn weight_range(&self) -> (f64, f64) {
        self.range
    }

    fn set_matrix(
        &mut self,
        block: ArrayView2<'_, f64>,
        weight_limits: (f64, f64),
        error_mask: Option<&ErrorMask>,
    ) -> Result<()> {
        let (lo, hi) = weight_limits;
        let conductances = block.mapv(|w| (w - lo) / (hi - lo));
        self.array.set_matrix(conductances.view(), (0.0, 1.0), error_mask)?;
        self.range = weight_limits;
        Ok(())
    }

    fn read_matrix(&self) -> Array2<f64> {
        let (lo, span) = (self.range.0, self.span());
        self.array.matrix().mapv(|g| g * span + lo)
    }

    fn run_xbar_mvm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        let x = clip_input(input, input_range);
        let product = self.array.mvm(x.view())? * self.span();
        Ok(product + &(input_sums(x.view(), true) * self.range.0))
    }

    fn run_xbar_vmm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        let x = clip_input(input, input_range);
        let product = self.array.vmm(x.view())? * self.span();
        Ok(product + &(input_sums(x.view(), false) * self.range.0))
    }
}
