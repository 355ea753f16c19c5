// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Real block encoding of complex matrices and operands.
//!
//! An `N x M` complex matrix `A = R + iI` is stored as the `2N x 2M` real
//! matrix `[[R, -I], [I, R]]`. Forward operands stack `[Re; Im]`, reverse
//! vectors stack `[Im; Re]`, and reverse batches stack `[Re, -Im]` along the
//! inner axis; the decoders below undo the matching layout on the output.

use crate::error::Result;
use crate::slice::ErrorMask;
use ndarray::{concatenate, s, Array2, ArrayD, ArrayView2, ArrayViewD, Axis};
use num_complex::Complex64;

pub fn encode_matrix(matrix: ArrayView2<'_, Complex64>) -> Array2<f64> {
    let (n, m) = matrix.dim();
    let re = matrix.mapv(|z| z.re);
    let im = matrix.mapv(|z| z.im);
    let mut out = Array2::zeros((2 * n, 2 * m));
    out.slice_mut(s![..n, ..m]).assign(&re);
    out.slice_mut(s![n.., ..m]).assign(&im);
    out.slice_mut(s![..n, m..]).assign(&im.mapv(|v| -v));
    out.slice_mut(s![n.., m..]).assign(&re);
    out
}

/// Reads back `top-left + i * bottom-left`.
pub fn decode_matrix(encoded: ArrayView2<'_, f64>) -> Array2<Complex64> {
    let (n, m) = (encoded.nrows() / 2, encoded.ncols() / 2);
    let re = encoded.slice(s![..n, ..m]);
    let im = encoded.slice(s![n.., ..m]);
    let mut out = Array2::zeros((n, m));
    ndarray::Zip::from(&mut out)
        .and(&re)
        .and(&im)
        .for_each(|z, &r, &i| *z = Complex64::new(r, i));
    out
}

/// `[Re; Im]` along axis 0 (vectors and column batches).
pub fn encode_forward(x: ArrayViewD<'_, Complex64>) -> Result<ArrayD<f64>> {
    let re = x.mapv(|z| z.re);
    let im = x.mapv(|z| z.im);
    Ok(concatenate(Axis(0), &[re.view(), im.view()])?)
}

pub fn decode_forward(y: ArrayViewD<'_, f64>) -> ArrayD<Complex64> {
    let half = y.shape()[0] / 2;
    let (re, im) = y.split_at(Axis(0), half);
    combine(re, im, 1.0)
}

/// `[Im; Re]` for a single reverse (vector-matrix) operand.
pub fn encode_reverse(x: ArrayViewD<'_, Complex64>) -> Result<ArrayD<f64>> {
    let re = x.mapv(|z| z.re);
    let im = x.mapv(|z| z.im);
    Ok(concatenate(Axis(0), &[im.view(), re.view()])?)
}

pub fn decode_reverse(y: ArrayViewD<'_, f64>) -> ArrayD<Complex64> {
    let half = y.shape()[0] / 2;
    let (im, re) = y.split_at(Axis(0), half);
    combine(re, im, 1.0)
}

/// `[Re, -Im]` along the last axis for row-stacked reverse batches.
pub fn encode_reverse_batch(x: ArrayViewD<'_, Complex64>) -> Result<ArrayD<f64>> {
    let axis = Axis(x.ndim().saturating_sub(1));
    let re = x.mapv(|z| z.re);
    let neg_im = x.mapv(|z| -z.im);
    Ok(concatenate(axis, &[re.view(), neg_im.view()])?)
}

/// `left - i * right` along the last axis.
pub fn decode_reverse_batch(y: ArrayViewD<'_, f64>) -> ArrayD<Complex64> {
    let axis = Axis(y.ndim().saturating_sub(1));
    let half = y.shape()[axis.index()] / 2;
    let (re, im) = y.split_at(axis, half);
    combine(re, im, -1.0)
}

fn combine(re: ArrayViewD<'_, f64>, im: ArrayViewD<'_, f64>, sign: f64) -> ArrayD<Complex64> {
    let mut out = ArrayD::zeros(re.raw_dim());
    ndarray::Zip::from(&mut out)
        .and(&re)
        .and(&im)
        .for_each(|z, &r, &i| *z = Complex64::new(r, sign * i));
    out
}

/// Expands a logical `n x m` partial-update mask to the four encoded quadrants.
pub fn encode_error_mask(mask: &ErrorMask, n: usize, m: usize) -> ErrorMask {
    let mut regions = Vec::with_capacity(mask.regions().len() * 4);
    for (rows, cols) in mask.regions() {
        regions.push((*rows, *cols));
        regions.push((rows.shifted(n), *cols));
        regions.push((*rows, cols.shifted(m)));
        regions.push((rows.shifted(n), cols.shifted(m)));
    }
    ErrorMask::from_regions(regions)
}
