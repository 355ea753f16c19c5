// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! The orchestrator: one logical matrix spread over a grid of analog cells.
//!
//! [`AnalogCore`] owns the encoded (real) representation of the logical
//! matrix only through its cells. Every multiply slices the encoded operand
//! per partition, runs the cell's crossbar primitive and sums partial
//! products into the partition's output range.

use crate::backend::Backend;
use crate::cell::{CoreCell, GridCell};
use crate::complex;
use crate::data::{DType, Data};
use crate::error::{config, dtype, shape, AnalogError, Result};
use crate::observability::emit_analog_op;
use crate::partition::{ParamSet, PartitionBound, PartitionPlan};
use crate::range::{estimate_range, RangeConstraints};
use crate::slice::ErrorMask;
use crate::view::AnalogMatrix;
use amvm_config::{AnalogParams, InputMapping};
use ndarray::{s, Array1, Array2, ArrayD, ArrayViewD, Axis, IxDyn, Ix2, Slice};
use std::fmt;
use tracing::{debug, trace, warn};

/// A logical (optionally complex) matrix simulated on partitioned analog cores.
#[derive(Clone, Debug)]
pub struct AnalogCore {
    params: AnalogParams,
    shape: (usize, usize),
    nrow: usize,
    ncol: usize,
    complex_valued: bool,
    plan: PartitionPlan,
    cells: Vec<GridCell>,
    weight_range: (f64, f64),
    backend: Backend,
}

impl AnalogCore {
    /// Builds the grid for `matrix` and programs it.
    ///
    /// `matrix` must be 2-D without unit dimensions. `params` is either one
    /// parameter object shared by every cell or one per cell (row-major).
    pub fn new(matrix: impl Into<Data>, params: impl Into<ParamSet>) -> Result<Self> {
        let matrix = matrix.into();
        let mut core = Self::build(matrix.shape(), params.into())?;
        core.set_matrix(&matrix)?;
        Ok(core)
    }

    /// Builds the grid for a `shape` matrix without programming it.
    pub fn empty(shape: (usize, usize), params: impl Into<ParamSet>) -> Result<Self> {
        Self::build(&[shape.0, shape.1], params.into())
    }

    fn build(dims: &[usize], params: ParamSet) -> Result<Self> {
        let &[rows, cols] = dims else {
            return Err(shape(format!("AnalogCore must be 2 dimensional, got shape {dims:?}")));
        };
        if rows == 1 || cols == 1 {
            return Err(shape(format!(
                "AnalogCore must be 2 dimensional, got a vector-like shape ({rows}, {cols})"
            )));
        }

        let master = params.master()?.clone();
        master.validate()?;
        let backend = Backend::new(master.simulation.backend);
        if !backend.is_available() {
            return Err(AnalogError::Backend {
                backend: "faer",
                message: "crate built without the `faer` feature".to_string(),
            });
        }

        let complex_valued = master.complex_valued();
        let (nrow, ncol) = if complex_valued {
            (2 * rows, 2 * cols)
        } else {
            (rows, cols)
        };
        let plan = PartitionPlan::new(nrow, ncol, &master.core);
        let per_core = params.per_core(plan.num_cores())?;
        let cells = plan
            .cells()
            .zip(&per_core)
            .map(|((r, c), cell_params)| GridCell::new(&cell_params.core, r.len(), c.len(), backend))
            .collect();

        debug!(
            rows,
            cols,
            complex = complex_valued,
            grid_rows = plan.num_cores_row(),
            grid_cols = plan.num_cores_col(),
            style = %master.core.style,
            "constructed analog core"
        );

        let weights = &master.core.mapping.weights;
        let weight_range = (weights.min, weights.max);
        Ok(Self {
            params: master,
            shape: (rows, cols),
            nrow,
            ncol,
            complex_valued,
            plan,
            cells,
            weight_range,
            backend,
        })
    }

    pub fn params(&self) -> &AnalogParams {
        &self.params
    }

    pub fn backend(&self) -> Backend {
        self.backend
    }

    pub fn is_complex(&self) -> bool {
        self.complex_valued
    }

    pub fn num_cores(&self) -> usize {
        self.cells.len()
    }

    /// `(num_cores_row, num_cores_col)`
    pub fn grid_shape(&self) -> (usize, usize) {
        (self.plan.num_cores_row(), self.plan.num_cores_col())
    }

    /// Row partitions over the encoded matrix.
    pub fn row_partition_bounds(&self) -> &[PartitionBound] {
        self.plan.rows()
    }

    /// Column partitions over the encoded matrix.
    pub fn col_partition_bounds(&self) -> &[PartitionBound] {
        self.plan.cols()
    }

    /// Weight bounds pinned by the last full programming.
    pub fn weight_range(&self) -> (f64, f64) {
        self.weight_range
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&GridCell> {
        if row >= self.plan.num_cores_row() || col >= self.plan.num_cores_col() {
            return None;
        }
        self.cells.get(row * self.plan.num_cores_col() + col)
    }

    fn cell_at(&self, row: &PartitionBound, col: &PartitionBound) -> &GridCell {
        &self.cells[row.index * self.plan.num_cores_col() + col.index]
    }

    /// Reassembles (and decodes) the matrix held by the cells.
    pub fn read_matrix(&self) -> Data {
        let mut encoded = Array2::zeros((self.nrow, self.ncol));
        for (row, col) in self.plan.cells() {
            encoded
                .slice_mut(s![row.range(), col.range()])
                .assign(&self.cell_at(&row, &col).read_matrix());
        }
        if self.complex_valued {
            Data::Complex(complex::decode_matrix(encoded.view()).into_dyn())
        } else {
            Data::Real(encoded.into_dyn())
        }
    }

    /// Forward operands: `x.shape[0]` must equal the logical column count.
    fn check_forward(&self, x: &Data) -> Result<()> {
        if x.shape().first() != Some(&self.shape.1) {
            return Err(shape(format!(
                "dimension mismatch, matrix: {:?}, multiplier: {:?}",
                self.shape,
                x.shape()
            )));
        }
        Ok(())
    }

    /// Reverse operands: the last axis must equal the logical row count.
    fn check_reverse(&self, x: &Data) -> Result<()> {
        if x.shape().last() != Some(&self.shape.0) {
            return Err(shape(format!(
                "dimension mismatch, multiplier: {:?}, matrix: {:?}",
                x.shape(),
                self.shape
            )));
        }
        Ok(())
    }

    /// [`AnalogMatrix::matvec`] without the dimension check, for callers that
    /// enforce their own size invariant.
    pub fn matvec_unchecked(&self, x: &Data) -> Result<Data> {
        let out = self.forward(x)?;
        emit_analog_op("analog.matvec", x.shape(), out.shape(), self.num_cores());
        Ok(out)
    }

    /// Packed multi-vector MVM for convolution-style replicated inputs.
    ///
    /// `x` holds `x_par * y_par` input vectors back to back; the result holds
    /// the matching output vectors back to back.
    pub fn mat_multivec(&self, x: &Data) -> Result<Data> {
        if self.complex_valued {
            return Err(AnalogError::Unsupported("packed multi-vector MVM on complex-valued cores"));
        }
        let copies = self.params.simulation.convolution.copies();
        if x.len() != copies * self.ncol {
            return Err(shape(format!(
                "packed vector of {} elements is incompatible with {copies} copies of {} inputs",
                x.len(),
                self.ncol
            )));
        }
        let packed = x
            .as_real()?
            .as_standard_layout()
            .into_owned()
            .into_shape((copies, self.ncol))?;
        let input_range = input_range(&self.params.core.mapping.inputs.mvm, packed.view().into_dyn());

        let mut out = Array2::<f64>::zeros((copies, self.nrow));
        for (row, col) in self.plan.cells() {
            let batch = packed.slice(s![.., col.range()]).reversed_axes().into_dyn();
            let partial = self
                .cell_at(&row, &col)
                .run_xbar_mvm(batch, input_range)?
                .into_dimensionality::<Ix2>()?;
            let mut target = out.slice_mut(s![.., row.range()]);
            target += &partial.t();
        }
        let out = Array1::from_iter(out.iter().copied());
        emit_analog_op("analog.mat_multivec", x.shape(), out.shape(), self.num_cores());
        Ok(Data::Real(out.into_dyn()))
    }

    /// Encoded forward pass: partial products accumulate along axis 0.
    fn forward_encoded(&self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        if x.shape().first() != Some(&self.ncol) {
            return Err(shape(format!(
                "encoded operand of shape {:?} does not match {} encoded columns",
                x.shape(),
                self.ncol
            )));
        }
        let input_range = input_range(&self.params.core.mapping.inputs.mvm, x.view());
        let mut out_shape = x.shape().to_vec();
        out_shape[0] = self.nrow;
        let mut out = ArrayD::zeros(IxDyn(&out_shape));
        for (row, col) in self.plan.cells() {
            let partial = self
                .cell_at(&row, &col)
                .run_xbar_mvm(x.slice_axis(Axis(0), Slice::from(col.range())), input_range)?;
            let mut target = out.slice_axis_mut(Axis(0), Slice::from(row.range()));
            target += &partial;
        }
        trace!(cells = self.cells.len(), shape = ?out.shape(), "forward pass");
        Ok(out)
    }

    /// Encoded reverse pass: partial products accumulate along the last axis.
    fn reverse_encoded(&self, x: ArrayViewD<'_, f64>) -> Result<ArrayD<f64>> {
        if x.shape().last() != Some(&self.nrow) {
            return Err(shape(format!(
                "encoded operand of shape {:?} does not match {} encoded rows",
                x.shape(),
                self.nrow
            )));
        }
        let input_range = input_range(&self.params.core.mapping.inputs.vmm, x.view());
        let axis = Axis(x.ndim() - 1);
        let mut out_shape = x.shape().to_vec();
        out_shape[axis.index()] = self.ncol;
        let mut out = ArrayD::zeros(IxDyn(&out_shape));
        for (row, col) in self.plan.cells() {
            let partial = self
                .cell_at(&row, &col)
                .run_xbar_vmm(x.slice_axis(axis, Slice::from(row.range())), input_range)?;
            let mut target = out.slice_axis_mut(axis, Slice::from(col.range()));
            target += &partial;
        }
        trace!(cells = self.cells.len(), shape = ?out.shape(), "reverse pass");
        Ok(out)
    }

    fn check_rank(x: &Data) -> Result<()> {
        match x.ndim() {
            1 | 2 => Ok(()),
            ndim => Err(AnalogError::Rank { ndim }),
        }
    }

    /// `A x` for `x` of shape `(cols)` or `(cols, k)`.
    fn forward(&self, x: &Data) -> Result<Data> {
        Self::check_rank(x)?;
        if !self.complex_valued {
            return Ok(Data::Real(self.forward_encoded(x.as_real()?.view())?));
        }
        let encoded = complex::encode_forward(x.to_complex().view())?;
        let out = self.forward_encoded(encoded.view())?;
        Ok(Data::Complex(complex::decode_forward(out.view())))
    }

    /// `x A` for `x` of shape `(rows)` or `(k, rows)`.
    fn reverse(&self, x: &Data) -> Result<Data> {
        Self::check_rank(x)?;
        if !self.complex_valued {
            return Ok(Data::Real(self.reverse_encoded(x.as_real()?.view())?));
        }
        let z = x.to_complex();
        if z.ndim() == 1 {
            let out = self.reverse_encoded(complex::encode_reverse(z.view())?.view())?;
            Ok(Data::Complex(complex::decode_reverse(out.view())))
        } else {
            let out = self.reverse_encoded(complex::encode_reverse_batch(z.view())?.view())?;
            Ok(Data::Complex(complex::decode_reverse_batch(out.view())))
        }
    }

    /// Encodes and validates a full logical matrix.
    fn encode(&self, matrix: &Data) -> Result<Array2<f64>> {
        if matrix.shape() != [self.shape.0, self.shape.1].as_slice() {
            return Err(shape(format!(
                "matrix shape {:?} must match AnalogCore shape {:?}",
                matrix.shape(),
                self.shape
            )));
        }
        if matrix.dtype() == DType::Complex && !self.complex_valued {
            return Err(dtype(
                "if setting complex-valued matrices, please set core.complex_matrix = true",
            ));
        }
        if self.complex_valued {
            let z = matrix.to_complex().into_dimensionality::<Ix2>()?;
            Ok(complex::encode_matrix(z.view()))
        } else {
            Ok(matrix.as_real()?.clone().into_dimensionality::<Ix2>()?)
        }
    }
}

/// Dynamic input bounds handed to every cell of one multiply.
fn input_range(mapping: &InputMapping, x: ArrayViewD<'_, f64>) -> Option<(f64, f64)> {
    if mapping.percentile.is_some() {
        Some(estimate_range(x, &RangeConstraints::from(mapping)))
    } else if mapping.clipping {
        Some((mapping.min, mapping.max))
    } else {
        None
    }
}

fn region_extrema(encoded: &Array2<f64>, mask: &ErrorMask) -> Option<(f64, f64)> {
    let mut extrema: Option<(f64, f64)> = None;
    mask.for_each_position(|r, c| {
        let v = encoded[[r, c]];
        extrema = Some(match extrema {
            Some((lo, hi)) => (lo.min(v), hi.max(v)),
            None => (v, v),
        });
    });
    extrema
}

impl AnalogMatrix for AnalogCore {
    fn shape(&self) -> Vec<usize> {
        vec![self.shape.0, self.shape.1]
    }

    fn dtype(&self) -> DType {
        if self.complex_valued {
            DType::Complex
        } else {
            DType::Real
        }
    }

    fn fast_matmul(&self) -> bool {
        self.params.simulation.fast_matmul
    }

    fn name(&self) -> &'static str {
        "AnalogCore"
    }

    fn get_matrix(&self) -> Result<Data> {
        Ok(self.read_matrix())
    }

    /// Programs the grid. Without `error_mask` the weight range is
    /// re-derived and every cell is rewritten; with one, only the masked
    /// (logical) positions change and values are held to the pinned range.
    fn set_matrix_masked(&mut self, matrix: &Data, error_mask: Option<&ErrorMask>) -> Result<()> {
        let mut encoded = self.encode(matrix)?;
        let error_mask = match error_mask {
            Some(mask) if !mask.fits(self.shape) => {
                return Err(config(format!(
                    "partial-update mask reaches outside a {:?} matrix",
                    self.shape
                )))
            }
            Some(mask) if self.complex_valued => {
                Some(complex::encode_error_mask(mask, self.shape.0, self.shape.1))
            }
            Some(mask) => Some(mask.clone()),
            None => None,
        };

        if let (Some(lo), Some(hi)) = (
            encoded.iter().copied().reduce(f64::min),
            encoded.iter().copied().reduce(f64::max),
        ) {
            debug!(min = lo, max = hi, "programming matrix");
        }

        let weights = &self.params.core.mapping.weights;
        match &error_mask {
            Some(mask) => {
                let (lo, hi) = self.weight_range;
                if let Some((region_min, region_max)) = region_extrema(&encoded, mask) {
                    if region_max > hi + f64::EPSILON || region_min < lo - f64::EPSILON {
                        warn!(
                            region_min,
                            region_max,
                            weight_min = lo,
                            weight_max = hi,
                            "partial matrix update contains values outside of the weight range; \
                             they will be clipped (widen mapping.weights to cover expected updates)"
                        );
                    }
                }
            }
            None => {
                self.weight_range = match weights.percentile {
                    Some(_) => estimate_range(encoded.view().into_dyn(), &RangeConstraints::from(weights)),
                    None => (weights.min, weights.max),
                };
            }
        }

        if weights.clipping {
            let (lo, hi) = self.weight_range;
            encoded.mapv_inplace(|w| w.max(lo).min(hi));
        }

        let limits = self.weight_range;
        let plan = &self.plan;
        let num_cols = plan.num_cores_col();
        for (row, col) in plan.cells() {
            let local = error_mask
                .as_ref()
                .map(|mask| mask.localize(row.bounds(), col.bounds()));
            if local.as_ref().is_some_and(ErrorMask::is_empty) {
                continue;
            }
            let block = encoded.slice(s![row.range(), col.range()]);
            self.cells[row.index * num_cols + col.index].set_matrix(block, limits, local.as_ref())?;
        }
        Ok(())
    }

    fn matvec(&self, x: &Data) -> Result<Data> {
        self.check_forward(x)?;
        self.matvec_unchecked(x)
    }

    fn matmat(&self, x: &Data) -> Result<Data> {
        if x.ndim() != 2 {
            return Err(shape(format!("matmat expects a 2-D operand, got shape {:?}", x.shape())));
        }
        self.check_forward(x)?;
        let out = self.forward(x)?;
        emit_analog_op("analog.matmat", x.shape(), out.shape(), self.num_cores());
        Ok(out)
    }

    fn vecmat(&self, x: &Data) -> Result<Data> {
        self.check_reverse(x)?;
        let out = self.reverse(x)?;
        emit_analog_op("analog.vecmat", x.shape(), out.shape(), self.num_cores());
        Ok(out)
    }

    fn rmatmat(&self, x: &Data) -> Result<Data> {
        if x.ndim() != 2 {
            return Err(shape(format!("rmatmat expects a 2-D operand, got shape {:?}", x.shape())));
        }
        self.check_reverse(x)?;
        let out = self.reverse(x)?;
        emit_analog_op("analog.rmatmat", x.shape(), out.shape(), self.num_cores());
        Ok(out)
    }
}

impl fmt::Display for AnalogCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnalogCore({})", self.read_matrix())
    }
}
