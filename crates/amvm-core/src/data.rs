// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use crate::error::{dtype, shape, Result};
use crate::slice::Span;
use ndarray::{Array1, Array2, ArrayD, Axis, IxDyn};
use num_complex::Complex64;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DType {
    Real,
    Complex,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Real => f.write_str("float64"),
            DType::Complex => f.write_str("complex128"),
        }
    }
}

/// A real or complex dense array handed to (or returned by) an analog matrix.
#[derive(Clone, Debug, PartialEq)]
pub enum Data {
    Real(ArrayD<f64>),
    Complex(ArrayD<Complex64>),
}

macro_rules! map_data {
    ($data:expr, $a:ident => $body:expr) => {
        match $data {
            Data::Real($a) => Data::Real($body),
            Data::Complex($a) => Data::Complex($body),
        }
    };
}

impl Data {
    pub fn zeros(shape: &[usize], dtype: DType) -> Data {
        match dtype {
            DType::Real => Data::Real(ArrayD::zeros(IxDyn(shape))),
            DType::Complex => Data::Complex(ArrayD::zeros(IxDyn(shape))),
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Data::Real(a) => a.shape(),
            Data::Complex(a) => a.shape(),
        }
    }

    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    pub fn len(&self) -> usize {
        self.shape().iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> DType {
        match self {
            Data::Real(_) => DType::Real,
            Data::Complex(_) => DType::Complex,
        }
    }

    /// Borrow the real array, failing for complex data.
    pub fn as_real(&self) -> Result<&ArrayD<f64>> {
        match self {
            Data::Real(a) => Ok(a),
            Data::Complex(_) => Err(dtype(
                "complex-valued data given to a real-valued core; set core.complex_matrix = true",
            )),
        }
    }

    /// Complex copy of the data (real values gain a zero imaginary part).
    pub fn to_complex(&self) -> ArrayD<Complex64> {
        match self {
            Data::Real(a) => a.mapv(|v| Complex64::new(v, 0.0)),
            Data::Complex(a) => a.clone(),
        }
    }

    pub fn into_dtype(self, target: DType) -> Result<Data> {
        match (self, target) {
            (Data::Complex(_), DType::Real) => Err(dtype("cannot store complex values in a real matrix")),
            (data @ Data::Real(_), DType::Complex) => Ok(Data::Complex(data.to_complex())),
            (data, _) => Ok(data),
        }
    }

    /// Transpose (a no-op for 1-D data).
    pub fn reversed_axes(self) -> Data {
        map_data!(self, a => a.reversed_axes())
    }

    pub fn into_shape(self, shape: &[usize]) -> Result<Data> {
        Ok(match self {
            Data::Real(a) => Data::Real(a.as_standard_layout().into_owned().into_shape(IxDyn(shape))?),
            Data::Complex(a) => Data::Complex(a.as_standard_layout().into_owned().into_shape(IxDyn(shape))?),
        })
    }

    /// Row-major 1-D copy.
    pub fn flatten(&self) -> Data {
        map_data!(self, a => Array1::from_iter(a.iter().cloned()).into_dyn())
    }

    /// Sub-array `axis` index `i` (one rank lower).
    pub fn index_axis(&self, axis: usize, i: usize) -> Data {
        map_data!(self, a => a.index_axis(Axis(axis), i).to_owned())
    }

    /// Picks the positions of `span` along `axis`.
    pub fn select(&self, axis: usize, span: &Span) -> Data {
        let positions = span.positions();
        map_data!(self, a => a.select(Axis(axis), &positions))
    }

    pub fn select_region(&self, rows: &Span, cols: &Span) -> Data {
        self.select(0, rows).select(1, cols)
    }

    /// Places this array at the `span` positions of a zero array whose `axis`
    /// has length `full_len`.
    pub fn embed(&self, axis: usize, span: &Span, full_len: usize) -> Result<Data> {
        if self.shape().get(axis) != Some(&span.len) {
            return Err(shape(format!(
                "operand of shape {:?} does not fit a selection of {} along axis {axis}",
                self.shape(),
                span.len
            )));
        }
        let mut full_shape = self.shape().to_vec();
        full_shape[axis] = full_len;
        Ok(match self {
            Data::Real(a) => Data::Real(embed_axis(a, axis, span, &full_shape)),
            Data::Complex(a) => Data::Complex(embed_axis(a, axis, span, &full_shape)),
        })
    }

    /// Overwrites the `rows x cols` region with `value` (row-major fill, or a
    /// broadcast when `value` holds a single element).
    pub fn assign_region(&mut self, rows: &Span, cols: &Span, value: &Data) -> Result<()> {
        let count = rows.len * cols.len;
        if value.len() != count && value.len() != 1 {
            return Err(shape(format!(
                "could not broadcast input of shape {:?} into a region of shape ({}, {})",
                value.shape(),
                rows.len,
                cols.len
            )));
        }
        match self {
            Data::Real(target) => {
                let source = value.as_real()?;
                assign_into(target, rows, cols, source.iter().cloned());
            }
            Data::Complex(target) => {
                let source = value.to_complex();
                assign_into(target, rows, cols, source.iter().cloned());
            }
        }
        Ok(())
    }

    /// Stacks equally shaped arrays along a new `axis`.
    pub fn stack(axis: usize, parts: &[Data]) -> Result<Data> {
        let Some(first) = parts.first() else {
            return Err(shape("cannot stack an empty list of arrays"));
        };
        Ok(match first.dtype() {
            DType::Real => {
                let views = parts
                    .iter()
                    .map(|p| p.as_real().map(|a| a.view()))
                    .collect::<Result<Vec<_>>>()?;
                Data::Real(ndarray::stack(Axis(axis), &views)?)
            }
            DType::Complex => {
                let owned: Vec<ArrayD<Complex64>> = parts.iter().map(Data::to_complex).collect();
                let views: Vec<_> = owned.iter().map(|a| a.view()).collect();
                Data::Complex(ndarray::stack(Axis(axis), &views)?)
            }
        })
    }
}

fn embed_axis<T: ndarray::LinalgScalar>(
    source: &ArrayD<T>,
    axis: usize,
    span: &Span,
    full_shape: &[usize],
) -> ArrayD<T> {
    let mut full = ArrayD::<T>::zeros(IxDyn(full_shape));
    for (k, position) in span.iter().enumerate() {
        full.index_axis_mut(Axis(axis), position)
            .assign(&source.index_axis(Axis(axis), k));
    }
    full
}

fn assign_into<T: Clone>(
    target: &mut ArrayD<T>,
    rows: &Span,
    cols: &Span,
    mut values: impl Iterator<Item = T> + Clone,
) {
    let broadcast = values.clone().nth(1).is_none();
    let first = values.clone().next();
    for r in rows.iter() {
        for c in cols.iter() {
            let v = if broadcast { first.clone() } else { values.next() };
            if let Some(v) = v {
                target[[r, c].as_slice()] = v;
            }
        }
    }
}

impl From<ArrayD<f64>> for Data {
    fn from(value: ArrayD<f64>) -> Self {
        Data::Real(value)
    }
}

impl From<Array1<f64>> for Data {
    fn from(value: Array1<f64>) -> Self {
        Data::Real(value.into_dyn())
    }
}

impl From<Array2<f64>> for Data {
    fn from(value: Array2<f64>) -> Self {
        Data::Real(value.into_dyn())
    }
}

impl From<ArrayD<Complex64>> for Data {
    fn from(value: ArrayD<Complex64>) -> Self {
        Data::Complex(value)
    }
}

impl From<Array1<Complex64>> for Data {
    fn from(value: Array1<Complex64>) -> Self {
        Data::Complex(value.into_dyn())
    }
}

impl From<Array2<Complex64>> for Data {
    fn from(value: Array2<Complex64>) -> Self {
        Data::Complex(value.into_dyn())
    }
}

impl fmt::Display for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Data::Real(a) => write!(f, "{a}"),
            Data::Complex(a) => write!(f, "{a}"),
        }
    }
}
