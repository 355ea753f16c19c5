// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use super::{clip_input, CoreCell, NumericCore};
use crate::backend::Backend;
use crate::error::Result;
use crate::slice::ErrorMask;
use ndarray::{Array2, ArrayD, ArrayView2, ArrayViewD, Zip};

/// Signed weights split into base-`2^bits_per_slice` digits, one array per
/// digit and sign. Slice `i` carries significance `base^-(i + 1)` relative to
/// the weight scale; the last slice keeps whatever residual the earlier
/// digits did not represent.
#[derive(Clone, Debug)]
pub struct BitslicedCell {
    positive: Vec<NumericCore>,
    negative: Vec<NumericCore>,
    base: f64,
    scale: f64,
    range: (f64, f64),
}

impl BitslicedCell {
    pub fn new(rows: usize, cols: usize, slices: usize, bits_per_slice: u32, backend: Backend) -> Self {
        let slices = slices.max(1);
        Self {
            positive: (0..slices).map(|_| NumericCore::new(rows, cols, backend)).collect(),
            negative: (0..slices).map(|_| NumericCore::new(rows, cols, backend)).collect(),
            base: f64::from(2u32.pow(bits_per_slice.clamp(1, 16))),
            scale: 1.0,
            range: (-1.0, 1.0),
        }
    }

    pub fn slices(&self) -> usize {
        self.positive.len()
    }

    fn significance(&self, slice: usize) -> f64 {
        self.scale * self.base.powi(-(slice as i32 + 1))
    }

    /// Digit planes of `magnitude / scale`, most significant first.
    fn digits(&self, magnitude: &Array2<f64>) -> Vec<Array2<f64>> {
        let slices = self.slices();
        let top = self.base - 1.0;
        let mut residual = magnitude.mapv(|m| m / self.scale);
        let mut planes = Vec::with_capacity(slices);
        for i in 0..slices {
            let weight = self.base.powi(-(i as i32 + 1));
            let plane = if i + 1 == slices {
                residual.mapv(|r| r / weight)
            } else {
                residual.mapv(|r| (r / weight).floor().clamp(0.0, top))
            };
            Zip::from(&mut residual)
                .and(&plane)
                .for_each(|r, &d| *r -= d * weight);
            planes.push(plane);
        }
        planes
    }

    fn combine(
        &self,
        x: ArrayViewD<'_, f64>,
        run: impl Fn(&NumericCore, ArrayViewD<'_, f64>) -> Result<ArrayD<f64>>,
    ) -> Result<ArrayD<f64>> {
        let slice = |i: usize| -> Result<ArrayD<f64>> {
            Ok((run(&self.positive[i], x.view())? - run(&self.negative[i], x.view())?) * self.significance(i))
        };
        let mut total = slice(0)?;
        for i in 1..self.slices() {
            total = total + slice(i)?;
        }
        Ok(total)
    }
}

impl CoreCell for BitslicedCell {
    fn shape(&self) -> (usize, usize) {
        self.positive[0].shape()
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
        let scale = weight_limits.0.abs().max(weight_limits.1.abs());
        self.scale = if scale > 0.0 { scale } else { 1.0 };
        let positive = self.digits(&block.mapv(|w| w.max(0.0)));
        let negative = self.digits(&block.mapv(|w| (-w).max(0.0)));
        let limits = (0.0, self.base - 1.0);
        for (core, plane) in self.positive.iter_mut().zip(&positive) {
            core.set_matrix(plane.view(), limits, error_mask)?;
        }
        for (core, plane) in self.negative.iter_mut().zip(&negative) {
            core.set_matrix(plane.view(), limits, error_mask)?;
        }
        self.range = weight_limits;
        Ok(())
    }

    fn read_matrix(&self) -> Array2<f64> {
        let mut out = Array2::zeros(self.shape());
        for (i, (pos, neg)) in self.positive.iter().zip(&self.negative).enumerate() {
            let significance = self.significance(i);
            Zip::from(&mut out)
                .and(&pos.matrix())
                .and(&neg.matrix())
                .for_each(|o, &p, &n| *o += (p - n) * significance);
        }
        out
    }

    fn run_xbar_mvm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        let x = clip_input(input, input_range);
        self.combine(x.view(), |core, x| core.mvm(x))
    }

    fn run_xbar_vmm(&self, input: ArrayViewD<'_, f64>, input_range: Option<(f64, f64)>) -> Result<ArrayD<f64>> {
        let x = clip_input(input, input_range);
        self.combine(x.view(), |core, x| core.vmm(x))
    }
}
