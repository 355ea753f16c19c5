// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use super::{clip_input, CoreCell};
use crate::backend::Backend;
use crate::error::{shape, AnalogError, Result};
use crate::slice::ErrorMask;
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Ix1, Ix2};

/// Error-free reference array: stores the programmed block verbatim.
#[derive(Clone, Debug)]
pub struct NumericCore {
    matrix: Array2<f64>,
    weight_range: (f64, f64),
    backend: Backend,
}

impl NumericCore {
    pub fn new(rows: usize, cols: usize, backend: Backend) -> Self {
        Self {
            matrix: Array2::zeros((rows, cols)),
            weight_range: (-1.0, 1.0),
            backend,
        }
    }

    pub fn matrix(&self) -> ArrayView2<'_, f64> {
        self.matrix.view()
    }

    /// Writes `block`, or only the masked positions of it for a partial update.
    pub(crate) fn program(&mut self, block: ArrayView2<'_, f64>, error_mask: Option<&ErrorMask>) -> Result<()> {
        if block.dim() != self.matrix.dim() {
            return Err(shape(format!(
                "cannot program a {:?} block into a {:?} array",
                block.dim(),
                self.matrix.dim()
            )));
        }
        match error_mask {
            None => self.matrix.assign(&block),
            Some(mask) => {
                let (rows, cols) = self.matrix.dim();
                let mut out_of_bounds = false;
                mask.for_each_position(|r, c| out_of_bounds |= r >= rows || c >= cols);
                if out_of_bounds {
                    return Err(shape("partial-update mask reaches outside the array"));
                }
                let matrix = &mut self.matrix;
                mask.for_each_position(|r, c| matrix[[r, c]] = block[[r, c]]);
            }
        }
        Ok(())
    }

    /// `M x` for `x` of shape `(cols)` or `(cols, k)`.
    pub(crate) fn mvm(&self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        match x.ndim() {
            1 => {
                let x = x.into_dimensionality::<Ix1>()?;
                Ok(self.backend.matvec(self.matrix.view(), x)?.into_dyn())
            }
            2 => {
                let x = x.into_dimensionality::<Ix2>()?;
                Ok(self.backend.matmul(self.matrix.view(), x)?.into_dyn())
            }
            ndim => Err(AnalogError::Rank { ndim }),
        }
    }

    /// `x M` for `x` of shape `(rows)` or `(k, rows)`.
    pub(crate) fn vmm(&self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        match x.ndim() {
            1 => {
                let x = x.into_dimensionality::<Ix1>()?;
                Ok(self.backend.vecmat(x, self.matrix.view())?.into_dyn())
            }
            2 => {
                let x = x.into_dimensionality::<Ix2>()?;
                Ok(self.backend.matmul(x, self.matrix.view())?.into_dyn())
            }
            ndim => Err(AnalogError::Rank { ndim }),
        }
    }
}

impl CoreCell for NumericCore {
    fn shape(&self) -> (usize, usize) {
        self.matrix.dim()
    }

    fn weight_range(&self) -> (f64, f64) {
        self.weight_range
    }

    fn set_matrix(
        &mut self,
        block: ArrayView2<'_, f64>,
        weight_limits: (f64, f64),
        error_mask: Option<&ErrorMask>,
    ) -> Result<()> {
        self.program(block, error_mask)?;
        self.weight_range = weight_limits;
        Ok(())
    }

    fn read_matrix(&self) -> Array2<f64> {
        self.matrix.clone()
    }

    fn run_xbar_mvm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        self.mvm(clip_input(input, input_range).view())
    }

    fn run_xbar_vmm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        self.vmm(clip_input(input, input_range).view())
    }
}
