// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Dense f64 kernels behind the per-cell crossbar products.
//!
//! `Ndarray` uses ndarray's own `dot`; `CpuDense` is a rayon row-parallel
//! kernel; `Faer` defers to faer when the crate is built with the `faer`
//! feature and reports a backend error otherwise.

pub mod cpu_dense;
pub mod faer_dense;

use crate::error::{AnalogError, Result};
use amvm_config::BackendKind;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Backend {
    kind: BackendKind,
}

impl Backend {
    pub fn new(kind: BackendKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> BackendKind {
        self.kind
    }

    pub fn is_available(&self) -> bool {
        match self.kind {
            BackendKind::Ndarray | BackendKind::CpuDense => true,
            BackendKind::Faer => faer_dense::is_available(),
        }
    }

    pub fn matmul(&self, lhs: ArrayView2<'_, f64>, rhs: ArrayView2<'_, f64>) -> Result<Array2<f64>> {
        let (rows, inner) = lhs.dim();
        let (rhs_rows, cols) = rhs.dim();
        if inner != rhs_rows {
            return Err(AnalogError::Shape(format!(
                "matmul: inner dimensions differ ({rows}x{inner} by {rhs_rows}x{cols})"
            )));
        }
        match self.kind {
            BackendKind::Ndarray => Ok(lhs.dot(&rhs)),
            BackendKind::CpuDense if !cpu_dense::should_use(rows, inner, cols) => Ok(lhs.dot(&rhs)),
            BackendKind::CpuDense => {
                let (lhs, rhs) = (contiguous(lhs), contiguous(rhs));
                let out = cpu_dense::matmul(&lhs, &rhs, rows, inner, cols)
                    .map_err(|message| backend_error("cpu_dense", message))?;
                Ok(Array2::from_shape_vec((rows, cols), out)?)
            }
            BackendKind::Faer => {
                let (lhs, rhs) = (contiguous(lhs), contiguous(rhs));
                let out = faer_dense::matmul(&lhs, &rhs, rows, inner, cols)
                    .map_err(|message| backend_error("faer", message))?;
                Ok(Array2::from_shape_vec((rows, cols), out)?)
            }
        }
    }

    pub fn matvec(&self, lhs: ArrayView2<'_, f64>, x: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let column = x.insert_axis(ndarray::Axis(1));
        let out = self.matmul(lhs, column)?;
        Ok(out.index_axis_move(ndarray::Axis(1), 0))
    }

    pub fn vecmat(&self, x: ArrayView1<'_, f64>, rhs: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        let row = x.insert_axis(ndarray::Axis(0));
        let out = self.matmul(row, rhs)?;
        Ok(out.index_axis_move(ndarray::Axis(0), 0))
    }
}

impl From<BackendKind> for Backend {
    fn from(kind: BackendKind) -> Self {
        Self::new(kind)
    }
}

fn contiguous(view: ArrayView2<'_, f64>) -> Vec<f64> {
    view.iter().copied().collect()
}

fn backend_error(backend: &'static str, message: String) -> AnalogError {
    AnalogError::Backend { backend, message }
}
