// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use rayon::prelude::*;

const TN: usize = 16;

/// Column block of `rhs` transposed so each output column reads contiguously.
#[inline]
fn pack_b_block(rhs: &[f64], inner: usize, cols: usize, col_start: usize, width: usize) -> Vec<f64> {
    let mut packed = vec![0.0; width * inner];
    for k in 0..inner {
        let src = &rhs[k * cols + col_start..k * cols + col_start + width];
        for (j, value) in src.iter().enumerate() {
            packed[j * inner + k] = *value;
        }
    }
    packed
}

pub fn should_use(rows: usize, inner: usize, cols: usize) -> bool {
    rows * inner * cols >= 16 * 16 * 16 && inner >= 4
}

/// Row-major `dst = lhs * rhs`, parallel over output rows.
pub fn matmul_into(
    dst: &mut [f64],
    lhs: &[f64],
    rhs: &[f64],
    rows: usize,
    inner: usize,
    cols: usize,
) -> Result<(), String> {
    if dst.len() != rows * cols {
        return Err(format!(
            "destination length mismatch: expected {} elements, got {}",
            rows * cols,
            dst.len()
        ));
    }
    if lhs.len() != rows * inner {
        return Err(format!(
            "lhs length mismatch: expected {} elements, got {}",
            rows * inner,
            lhs.len()
        ));
    }
    if rhs.len() != inner * cols {
        return Err(format!(
            "rhs length mismatch: expected {} elements, got {}",
            inner * cols,
            rhs.len()
        ));
    }

    dst.fill(0.0);
    if rows == 0 || cols == 0 || inner == 0 {
        return Ok(());
    }

    let mut col_start = 0;
    while col_start < cols {
        let width = TN.min(cols - col_start);
        let packed = pack_b_block(rhs, inner, cols, col_start, width);
        dst.par_chunks_mut(cols)
            .zip(lhs.par_chunks(inner))
            .for_each(|(dst_row, lhs_row)| {
                for j in 0..width {
                    let column = &packed[j * inner..(j + 1) * inner];
                    dst_row[col_start + j] = lhs_row.iter().zip(column).map(|(a, b)| a * b).sum();
                }
            });
        col_start += width;
    }
    Ok(())
}

pub fn matmul(lhs: &[f64], rhs: &[f64], rows: usize, inner: usize, cols: usize) -> Result<Vec<f64>, String> {
    let mut dst = vec![0.0; rows * cols];
    matmul_into(&mut dst, lhs, rhs, rows, inner, cols)?;
    Ok(dst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn matches_naive_product_across_block_edges() {
        let (rows, inner, cols) = (5, 7, 37);
        let lhs: Vec<f64> = (0..rows * inner).map(|v| (v as f64 * 0.37).sin()).collect();
        let rhs: Vec<f64> = (0..inner * cols).map(|v| (v as f64 * 0.11).cos()).collect();
        let out = matmul(&lhs, &rhs, rows, inner, cols).unwrap();
        for i in 0..rows {
            for j in 0..cols {
                let expected: f64 = (0..inner).map(|k| lhs[i * inner + k] * rhs[k * cols + j]).sum();
                assert_abs_diff_eq!(out[i * cols + j], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn empty_inner_dimension_yields_zeros() {
        let out = matmul(&[], &[], 2, 0, 3).unwrap();
        assert_eq!(out, vec![0.0; 6]);
    }

    #[test]
    fn rejects_mismatched_buffers() {
        let mut dst = vec![0.0; 3];
        assert!(matmul_into(&mut dst, &[1.0; 4], &[1.0; 4], 2, 2, 2).is_err());
    }
}
