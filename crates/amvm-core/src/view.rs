// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! The matrix capability shared by [`AnalogCore`](crate::AnalogCore) and the
//! zero-copy views over it.
//!
//! Views borrow their parent mutably and rewrite every request in the
//! parent's coordinates; they never hold matrix data of their own.

use crate::data::{DType, Data};
use crate::error::{index, shape, AnalogError, Result};
use crate::slice::{ErrorMask, Index, Mask};

/// Matrix-like operations over an analog simulation.
pub trait AnalogMatrix {
    /// `[rows, cols]`, or `[len]` for a flattened view.
    fn shape(&self) -> Vec<usize>;

    fn dtype(&self) -> DType;

    /// Whether 2-D products run as one batch instead of per vector.
    fn fast_matmul(&self) -> bool;

    fn get_matrix(&self) -> Result<Data>;

    /// Programs `matrix`; `error_mask` restricts the write to a region given
    /// in this matrix's own coordinates.
    fn set_matrix_masked(&mut self, matrix: &Data, error_mask: Option<&ErrorMask>) -> Result<()>;

    /// `A x` for `x` of shape `(cols)` or `(cols, 1)`.
    fn matvec(&self, x: &Data) -> Result<Data>;

    /// `x A` for `x` of shape `(rows)` or `(1, rows)`.
    fn vecmat(&self, x: &Data) -> Result<Data>;

    /// `A X` for a `(cols, k)` operand.
    fn matmat(&self, x: &Data) -> Result<Data>;

    /// `X A` for a `(k, rows)` operand.
    fn rmatmat(&self, x: &Data) -> Result<Data>;

    fn name(&self) -> &'static str {
        "AnalogMatrix"
    }

    fn ndim(&self) -> usize {
        self.shape().len()
    }

    fn set_matrix(&mut self, matrix: &Data) -> Result<()> {
        self.set_matrix_masked(matrix, None)
    }

    /// `A @ x`, dispatched on the operand's rank.
    fn dot(&self, x: &Data) -> Result<Data> {
        match x.shape() {
            [_] | [_, 1] => self.matvec(x),
            [_, k] if self.fast_matmul() || *k == 0 => self.matmat(x),
            [_, k] => {
                let columns = (0..*k)
                    .map(|j| self.matvec(&x.index_axis(1, j)))
                    .collect::<Result<Vec<_>>>()?;
                Data::stack(1, &columns)
            }
            dims => Err(AnalogError::Rank { ndim: dims.len() }),
        }
    }

    /// `x @ A`, dispatched on the operand's rank.
    fn rdot(&self, x: &Data) -> Result<Data> {
        match x.shape() {
            [_] | [1, _] => self.vecmat(x),
            [k, _] if self.fast_matmul() || *k == 0 => self.rmatmat(x),
            [k, _] => {
                let rows = (0..*k)
                    .map(|i| self.vecmat(&x.index_axis(0, i)))
                    .collect::<Result<Vec<_>>>()?;
                Data::stack(0, &rows)
            }
            dims => Err(AnalogError::Rank { ndim: dims.len() }),
        }
    }

    fn transpose(&mut self) -> Transposed<&mut Self>
    where
        Self: Sized,
    {
        Transposed::new(self)
    }

    /// NumPy-style indexing. An index that selects the whole matrix in order
    /// returns the matrix itself; anything else returns a [`Masked`] view.
    fn get_item<I: Into<Index>>(&mut self, index: I) -> Result<Selection<&mut Self>>
    where
        Self: Sized,
    {
        let mask = Mask::new(&index.into(), matrix_dims(&*self)?)?;
        if mask.is_identity {
            Ok(Selection::Whole(self))
        } else {
            Ok(Selection::Masked(Masked::new(self, mask)))
        }
    }

    /// NumPy-style assignment: read-modify-write of the addressed region.
    fn set_item<I: Into<Index>>(&mut self, index: I, value: &Data) -> Result<()>
    where
        Self: Sized,
    {
        let mask = Mask::new(&index.into(), matrix_dims(&*self)?)?;
        let mut full = self.get_matrix()?;
        full.assign_region(&mask.rows, &mask.cols, value)?;
        let error_mask = (!mask.covers_all).then(|| ErrorMask::single(mask.rows, mask.cols));
        self.set_matrix_masked(&full, error_mask.as_ref())
    }

    /// `Name([...])` rendering of the current matrix.
    fn render(&self) -> Result<String> {
        Ok(format!("{}({})", self.name(), self.get_matrix()?))
    }
}

fn matrix_dims<M: AnalogMatrix + ?Sized>(matrix: &M) -> Result<(usize, usize)> {
    match matrix.shape()[..] {
        [rows, cols] => Ok((rows, cols)),
        ref dims => Err(index(format!(
            "cannot index a {}-D view; index the matrix it was taken from instead",
            dims.len()
        ))),
    }
}

impl<T: AnalogMatrix + ?Sized> AnalogMatrix for &mut T {
    fn shape(&self) -> Vec<usize> {
        (**self).shape()
    }

    fn dtype(&self) -> DType {
        (**self).dtype()
    }

    fn fast_matmul(&self) -> bool {
        (**self).fast_matmul()
    }

    fn get_matrix(&self) -> Result<Data> {
        (**self).get_matrix()
    }

    fn set_matrix_masked(&mut self, matrix: &Data, error_mask: Option<&ErrorMask>) -> Result<()> {
        (**self).set_matrix_masked(matrix, error_mask)
    }

    fn matvec(&self, x: &Data) -> Result<Data> {
        (**self).matvec(x)
    }

    fn vecmat(&self, x: &Data) -> Result<Data> {
        (**self).vecmat(x)
    }

    fn matmat(&self, x: &Data) -> Result<Data> {
        (**self).matmat(x)
    }

    fn rmatmat(&self, x: &Data) -> Result<Data> {
        (**self).rmatmat(x)
    }

    fn name(&self) -> &'static str {
        (**self).name()
    }
}

/// `A^T` over a parent `A`. Each multiply runs in the opposite orientation
/// on the parent; a 1-D parent is its own transpose.
#[derive(Debug)]
pub struct Transposed<P> {
    parent: P,
}

impl<P: AnalogMatrix> Transposed<P> {
    pub fn new(parent: P) -> Self {
        Self { parent }
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    /// Undo the transposition.
    pub fn into_inner(self) -> P {
        self.parent
    }

    fn is_vector(&self) -> bool {
        self.parent.ndim() == 1
    }
}

impl<P: AnalogMatrix> AnalogMatrix for Transposed<P> {
    fn shape(&self) -> Vec<usize> {
        let mut dims = self.parent.shape();
        dims.reverse();
        dims
    }

    fn dtype(&self) -> DType {
        self.parent.dtype()
    }

    fn fast_matmul(&self) -> bool {
        self.parent.fast_matmul()
    }

    fn name(&self) -> &'static str {
        "TransposedCore"
    }

    fn get_matrix(&self) -> Result<Data> {
        Ok(self.parent.get_matrix()?.reversed_axes())
    }

    fn set_matrix_masked(&mut self, matrix: &Data, error_mask: Option<&ErrorMask>) -> Result<()> {
        if self.is_vector() {
            return self.parent.set_matrix_masked(matrix, error_mask);
        }
        let swapped = error_mask.map(ErrorMask::transposed);
        self.parent
            .set_matrix_masked(&matrix.clone().reversed_axes(), swapped.as_ref())
    }

    fn matvec(&self, x: &Data) -> Result<Data> {
        if self.is_vector() {
            return self.parent.matvec(x);
        }
        self.parent.vecmat(&x.clone().reversed_axes())
            .map(Data::reversed_axes)
    }

    fn vecmat(&self, x: &Data) -> Result<Data> {
        if self.is_vector() {
            return self.parent.vecmat(x);
        }
        self.parent.matvec(&x.clone().reversed_axes())
            .map(Data::reversed_axes)
    }

    fn matmat(&self, x: &Data) -> Result<Data> {
        if self.is_vector() {
            return self.parent.matmat(x);
        }
        Ok(self.parent.rmatmat(&x.clone().reversed_axes())?.reversed_axes())
    }

    fn rmatmat(&self, x: &Data) -> Result<Data> {
        if self.is_vector() {
            return self.parent.rmatmat(x);
        }
        Ok(self.parent.matmat(&x.clone().reversed_axes())?.reversed_axes())
    }
}

/// A row/column sub-view of a parent matrix.
///
/// Reads slice the parent's matrix, writes are read-modify-writes on the
/// parent reported as partial updates, and multiplies zero-pad the operand
/// to the parent's size before selecting the masked part of the result.
#[derive(Debug)]
pub struct Masked<P> {
    parent: P,
    mask: Mask,
}

impl<P: AnalogMatrix> Masked<P> {
    pub fn new(parent: P, mask: Mask) -> Self {
        Self { parent, mask }
    }

    pub fn mask(&self) -> &Mask {
        &self.mask
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }

    pub fn into_inner(self) -> P {
        self.parent
    }

    fn parent_dims(&self) -> Result<(usize, usize)> {
        match self.parent.shape()[..] {
            [rows, cols] => Ok((rows, cols)),
            ref dims => Err(shape(format!("a masked view needs a 2-D parent, got {dims:?}"))),
        }
    }

    fn check_values(&self, matrix: &Data) -> Result<()> {
        let expected = self.shape();
        if matrix.shape() != expected.as_slice() {
            return Err(shape(format!(
                "could not broadcast input of shape {:?} into a view of shape {expected:?}",
                matrix.shape()
            )));
        }
        Ok(())
    }
}

impl<P: AnalogMatrix> AnalogMatrix for Masked<P> {
    fn shape(&self) -> Vec<usize> {
        let (rows, cols) = self.mask.shape();
        if self.mask.flatten {
            vec![rows * cols]
        } else {
            vec![rows, cols]
        }
    }

    fn dtype(&self) -> DType {
        self.parent.dtype()
    }

    fn fast_matmul(&self) -> bool {
        self.parent.fast_matmul()
    }

    fn name(&self) -> &'static str {
        "MaskedCore"
    }

    fn get_matrix(&self) -> Result<Data> {
        let region = self
            .parent
            .get_matrix()?
            .select_region(&self.mask.rows, &self.mask.cols);
        Ok(if self.mask.flatten { region.flatten() } else { region })
    }

    fn set_matrix_masked(&mut self, matrix: &Data, error_mask: Option<&ErrorMask>) -> Result<()> {
        self.check_values(matrix)?;
        let (rows, cols) = (self.mask.rows, self.mask.cols);
        let parent_mask = match error_mask {
            Some(local) if !self.mask.flatten => Some(local.compose(&rows, &cols)),
            _ if self.mask.covers_all => None,
            _ => Some(ErrorMask::single(rows, cols)),
        };
        let mut full = self.parent.get_matrix()?;
        full.assign_region(&rows, &cols, matrix)?;
        self.parent.set_matrix_masked(&full, parent_mask.as_ref())
    }

    fn matvec(&self, x: &Data) -> Result<Data> {
        let (_, parent_cols) = self.parent_dims()?;
        let padded = x.embed(0, &self.mask.cols, parent_cols)?;
        Ok(self.parent.matvec(&padded)?.select(0, &self.mask.rows))
    }

    fn matmat(&self, x: &Data) -> Result<Data> {
        let (_, parent_cols) = self.parent_dims()?;
        let padded = x.embed(0, &self.mask.cols, parent_cols)?;
        Ok(self.parent.matmat(&padded)?.select(0, &self.mask.rows))
    }

    fn vecmat(&self, x: &Data) -> Result<Data> {
        let (parent_rows, _) = self.parent_dims()?;
        let axis = x.ndim().saturating_sub(1);
        let padded = x.embed(axis, &self.mask.rows, parent_rows)?;
        Ok(self.parent.vecmat(&padded)?.select(axis, &self.mask.cols))
    }

    fn rmatmat(&self, x: &Data) -> Result<Data> {
        let (parent_rows, _) = self.parent_dims()?;
        let padded = x.embed(1, &self.mask.rows, parent_rows)?;
        Ok(self.parent.rmatmat(&padded)?.select(1, &self.mask.cols))
    }
}

/// Result of [`AnalogMatrix::get_item`]: the parent itself or a masked view.
#[derive(Debug)]
pub enum Selection<P> {
    Whole(P),
    Masked(Masked<P>),
}

impl<P> Selection<P> {
    pub fn is_whole(&self) -> bool {
        matches!(self, Selection::Whole(_))
    }
}

macro_rules! select {
    ($selection:expr, $inner:ident => $body:expr) => {
        match $selection {
            Selection::Whole($inner) => $body,
            Selection::Masked($inner) => $body,
        }
    };
}

impl<P: AnalogMatrix> AnalogMatrix for Selection<P> {
    fn shape(&self) -> Vec<usize> {
        select!(self, m => m.shape())
    }

    fn dtype(&self) -> DType {
        select!(self, m => m.dtype())
    }

    fn fast_matmul(&self) -> bool {
        select!(self, m => m.fast_matmul())
    }

    fn name(&self) -> &'static str {
        select!(self, m => m.name())
    }

    fn get_matrix(&self) -> Result<Data> {
        select!(self, m => m.get_matrix())
    }

    fn set_matrix_masked(&mut self, matrix: &Data, error_mask: Option<&ErrorMask>) -> Result<()> {
        select!(self, m => m.set_matrix_masked(matrix, error_mask))
    }

    fn matvec(&self, x: &Data) -> Result<Data> {
        select!(self, m => m.matvec(x))
    }

    fn vecmat(&self, x: &Data) -> Result<Data> {
        select!(self, m => m.vecmat(x))
    }

    fn matmat(&self, x: &Data) -> Result<Data> {
        select!(self, m => m.matmat(x))
    }

    fn rmatmat(&self, x: &Data) -> Result<Data> {
        select!(self, m => m.rmatmat(x))
    }
}
