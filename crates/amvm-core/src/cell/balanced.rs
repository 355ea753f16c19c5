// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use super::{clip_input, CoreCell, NumericCore};
use crate::backend::Backend;
use crate::error::Result;
use crate::slice::ErrorMask;
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD};

/// Differential pair: positive and negative parts on separate arrays.
#[derive(Clone, Debug)]
pub struct BalancedCell {
    positive: NumericCore,
    negative: NumericCore,
    range: (f64, f64),
}

impl BalancedCell {
    pub fn new(rows: usize, cols: usize, backend: Backend) -> Self {
        Self {
            positive: NumericCore::new(rows, cols, backend),
            negative: NumericCore::new(rows, cols, backend),
            range: (-1.0, 1.0),
        }
    }
}

impl CoreCell for BalancedCell {
    fn shape(&self) -> (usize, usize) {
        self.positive.shape()
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
        let magnitude = weight_limits.0.abs().max(weight_limits.1.abs());
        let limits = (0.0, magnitude);
        self.positive
            .set_matrix(block.mapv(|w| w.max(0.0)).view(), limits, error_mask)?;
        self.negative
            .set_matrix(block.mapv(|w| (-w).max(0.0)).view(), limits, error_mask)?;
        self.range = weight_limits;
        Ok(())
    }

    fn read_matrix(&self) -> Array2<f64> {
        &self.positive.matrix() - &self.negative.matrix()
    }

    fn run_xbar_mvm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        let x = clip_input(input, input_range);
        Ok(self.positive.mvm(x.view())? - self.negative.mvm(x.view())?)
    }

    fn run_xbar_vmm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        let x = clip_input(input, input_range);
        Ok(self.positive.vmm(x.view())? - self.negative.vmm(x.view())?)
    }
}
