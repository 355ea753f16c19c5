// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Index expressions for analog matrices.
//!
//! User-facing indices follow NumPy: an integer selects one position and drops
//! the axis, a [`SliceSpec`] behaves like a `start:stop:step` slice. Internally every
//! axis selection is normalised into a [`Span`], an explicit arithmetic
//! progression, so partition arithmetic never has to reinterpret a stop bound.

use crate::error::{index, Result};
use std::ops::{Range, RangeFrom, RangeFull, RangeTo};

/// A NumPy-style `start:stop:step` slice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SliceSpec {
    pub start: Option<isize>,
    pub stop: Option<isize>,
    pub step: isize,
}

impl SliceSpec {
    pub const fn new(start: Option<isize>, stop: Option<isize>, step: isize) -> Self {
        Self { start, stop, step }
    }

    /// `[:]`
    pub const fn full() -> Self {
        Self::new(None, None, 1)
    }

    /// `[::-1]`
    pub const fn reversed() -> Self {
        Self::new(None, None, -1)
    }

    pub const fn range(start: isize, stop: isize) -> Self {
        Self::new(Some(start), Some(stop), 1)
    }

    pub const fn with_step(mut self, step: isize) -> Self {
        self.step = step;
        self
    }

    /// Normalised `(start, stop, step)` triple, as `slice.indices(len)` computes it.
    ///
    /// For a negative step whose range reaches index 0 the returned stop is
    /// `-1`, which must not be fed back into a slice (it would read as
    /// `len - 1`). Use [`SliceSpec::canonical`] for that.
    pub fn indices(&self, len: usize) -> Result<(isize, isize, isize)> {
        let step = self.step;
        if step == 0 {
            return Err(index("slice step cannot be zero"));
        }
        let len = len as isize;
        let (lower, upper) = if step < 0 { (-1, len - 1) } else { (0, len) };
        let clamp = |v: isize| {
            if v < 0 {
                (v + len).max(lower)
            } else {
                v.min(upper)
            }
        };
        let start = self
            .start
            .map(clamp)
            .unwrap_or(if step < 0 { upper } else { lower });
        let stop = self
            .stop
            .map(clamp)
            .unwrap_or(if step < 0 { lower } else { upper });
        Ok((start, stop, step))
    }

    /// Bounds-normalised slice that is safe to re-apply.
    ///
    /// An open-ended negative-step slice keeps an unbounded stop so that index
    /// 0 stays included.
    pub fn canonical(&self, len: usize) -> Result<SliceSpec> {
        let (start, stop, step) = self.indices(len)?;
        let stop = if step < 0 && stop < 0 { None } else { Some(stop) };
        Ok(SliceSpec::new(Some(start), stop, step))
    }

    /// Resolves the slice against an axis of length `len`.
    pub fn normalize(&self, len: usize) -> Result<Span> {
        let canonical = self.canonical(len)?;
        let step = canonical.step;
        let start = canonical.start.unwrap_or(0);
        let count = match canonical.stop {
            Some(stop) if step > 0 => {
                if stop > start {
                    (stop - start + step - 1) / step
                } else {
                    0
                }
            }
            Some(stop) => {
                if start > stop {
                    (start - stop - step - 1) / -step
                } else {
                    0
                }
            }
            None => {
                if start >= 0 {
                    start / -step + 1
                } else {
                    0
                }
            }
        };
        if count == 0 {
            return Ok(Span::empty(step));
        }
        Ok(Span {
            start: start as usize,
            step,
            len: count as usize,
        })
    }
}

impl Default for SliceSpec {
    fn default() -> Self {
        Self::full()
    }
}

/// Positions `start, start + step, ...` (`len` of them) along one axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub step: isize,
    pub len: usize,
}

impl Span {
    pub const fn full(len: usize) -> Self {
        Self {
            start: 0,
            step: 1,
            len,
        }
    }

    pub const fn single(position: usize) -> Self {
        Self {
            start: position,
            step: 1,
            len: 1,
        }
    }

    pub const fn empty(step: isize) -> Self {
        Self {
            start: 0,
            step,
            len: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Axis position of the `k`-th selected element.
    pub fn get(&self, k: usize) -> usize {
        (self.start as isize + k as isize * self.step) as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> {
        let span = *self;
        (0..span.len).map(move |k| span.get(k))
    }

    pub fn positions(&self) -> Vec<usize> {
        self.iter().collect()
    }

    /// Every position of an axis of length `dim` is addressed (in any order).
    pub fn covers(&self, dim: usize) -> bool {
        self.len == dim
    }

    /// Selecting this span leaves an axis of length `dim` unchanged.
    pub fn is_identity(&self, dim: usize) -> bool {
        self.len == dim && (self.step > 0 || dim <= 1)
    }

    pub fn shifted(&self, offset: usize) -> Span {
        Span {
            start: self.start + offset,
            ..*self
        }
    }

    /// Span of a sub-selection expressed in this span's parent coordinates.
    pub fn compose(&self, inner: &Span) -> Span {
        if inner.is_empty() {
            return Span::empty(self.step * inner.step);
        }
        Span {
            start: self.get(inner.start),
            step: self.step * inner.step,
            len: inner.len,
        }
    }

    /// Restricts the span to `[lo, hi)` and re-bases it so `lo` becomes 0.
    pub fn localize(&self, lo: usize, hi: usize) -> Span {
        let mut first = None;
        let mut count = 0;
        for (k, position) in self.iter().enumerate() {
            if (lo..hi).contains(&position) {
                if first.is_none() {
                    first = Some(k);
                }
                count += 1;
            }
        }
        match first {
            Some(k) => Span {
                start: self.get(k) - lo,
                step: self.step,
                len: count,
            },
            None => Span::empty(self.step),
        }
    }
}

/// One axis of an index expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AxisIndex {
    Int(isize),
    Slice(SliceSpec),
}

impl AxisIndex {
    fn resolve(&self, dim: usize) -> Result<Span> {
        match *self {
            AxisIndex::Int(i) => {
                let position = if i < 0 { i + dim as isize } else { i };
                if position < 0 || position >= dim as isize {
                    return Err(index(format!(
                        "index {i} is out of bounds for axis with size {dim}"
                    )));
                }
                Ok(Span::single(position as usize))
            }
            AxisIndex::Slice(slice) => slice.normalize(dim),
        }
    }

    fn is_int(&self) -> bool {
        matches!(self, AxisIndex::Int(_))
    }
}

macro_rules! axis_from_int {
    ($($t:ty),*) => {$(
        impl From<$t> for AxisIndex {
            fn from(value: $t) -> Self {
                AxisIndex::Int(value as isize)
            }
        }

        impl From<Range<$t>> for AxisIndex {
            fn from(value: Range<$t>) -> Self {
                AxisIndex::Slice(SliceSpec::range(value.start as isize, value.end as isize))
            }
        }

        impl From<RangeFrom<$t>> for AxisIndex {
            fn from(value: RangeFrom<$t>) -> Self {
                AxisIndex::Slice(SliceSpec::new(Some(value.start as isize), None, 1))
            }
        }

        impl From<RangeTo<$t>> for AxisIndex {
            fn from(value: RangeTo<$t>) -> Self {
                AxisIndex::Slice(SliceSpec::new(None, Some(value.end as isize), 1))
            }
        }
    )*};
}

axis_from_int!(i32, i64, isize, usize);

impl From<SliceSpec> for AxisIndex {
    fn from(value: SliceSpec) -> Self {
        AxisIndex::Slice(value)
    }
}

impl From<RangeFull> for AxisIndex {
    fn from(_: RangeFull) -> Self {
        AxisIndex::Slice(SliceSpec::full())
    }
}

/// A one- or two-axis index expression (`m[i]`, `m[a:b]`, `m[i, a:b]`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Index {
    pub rows: AxisIndex,
    pub cols: Option<AxisIndex>,
}

impl Index {
    /// Builds an index from an arbitrary list of axes, rejecting bad arity.
    pub fn from_axes(axes: &[AxisIndex]) -> Result<Index> {
        match axes {
            [rows] => Ok(Index {
                rows: *rows,
                cols: None,
            }),
            [rows, cols] => Ok(Index {
                rows: *rows,
                cols: Some(*cols),
            }),
            _ => Err(index(format!(
                "index must be of length 1 or 2, got {}",
                axes.len()
            ))),
        }
    }
}

impl From<AxisIndex> for Index {
    fn from(rows: AxisIndex) -> Self {
        Index { rows, cols: None }
    }
}

macro_rules! index_from_single {
    ($($t:ty),*) => {$(
        impl From<$t> for Index {
            fn from(value: $t) -> Self {
                Index::from(AxisIndex::from(value))
            }
        }
    )*};
}

index_from_single!(
    i32, i64, isize, usize,
    Range<i32>, Range<i64>, Range<isize>, Range<usize>,
    RangeFrom<i32>, RangeFrom<i64>, RangeFrom<isize>, RangeFrom<usize>,
    RangeTo<i32>, RangeTo<i64>, RangeTo<isize>, RangeTo<usize>,
    RangeFull, SliceSpec
);

impl<A: Into<AxisIndex>, B: Into<AxisIndex>> From<(A, B)> for Index {
    fn from((rows, cols): (A, B)) -> Self {
        Index {
            rows: rows.into(),
            cols: Some(cols.into()),
        }
    }
}

/// A resolved two-axis selection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Mask {
    pub rows: Span,
    pub cols: Span,
    /// Every element is addressed, so a write through it is a full write.
    pub covers_all: bool,
    /// Selecting through the mask yields the unchanged matrix.
    pub is_identity: bool,
    /// An integer index dropped an axis.
    pub flatten: bool,
}

impl Mask {
    pub fn new(index: &Index, dims: (usize, usize)) -> Result<Mask> {
        let (nrows, ncols) = dims;
        let cols_index = index.cols.unwrap_or(AxisIndex::Slice(SliceSpec::full()));
        let flatten = index.rows.is_int() || cols_index.is_int();
        let rows = index.rows.resolve(nrows)?;
        let cols = cols_index.resolve(ncols)?;
        let covers_all = !flatten && rows.covers(nrows) && cols.covers(ncols);
        let is_identity = !flatten && rows.is_identity(nrows) && cols.is_identity(ncols);
        Ok(Mask {
            rows,
            cols,
            covers_all,
            is_identity,
            flatten,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len, self.cols.len)
    }
}

/// Partial-update regions of a matrix, as `(rows, cols)` span pairs in the
/// coordinates of whoever receives the mask.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorMask {
    regions: Vec<(Span, Span)>,
}

impl ErrorMask {
    pub fn single(rows: Span, cols: Span) -> Self {
        Self {
            regions: vec![(rows, cols)],
        }
    }

    pub fn from_regions(regions: Vec<(Span, Span)>) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &[(Span, Span)] {
        &self.regions
    }

    pub fn is_empty(&self) -> bool {
        self.regions.iter().all(|(r, c)| r.is_empty() || c.is_empty())
    }

    /// The same regions seen from a cell owning rows `[r0, r1)` and cols `[c0, c1)`.
    pub fn localize(&self, rows: (usize, usize), cols: (usize, usize)) -> ErrorMask {
        ErrorMask {
            regions: self
                .regions
                .iter()
                .map(|(r, c)| (r.localize(rows.0, rows.1), c.localize(cols.0, cols.1)))
                .collect(),
        }
    }

    /// The same regions with rows and columns exchanged.
    pub fn transposed(&self) -> ErrorMask {
        ErrorMask {
            regions: self.regions.iter().map(|(r, c)| (*c, *r)).collect(),
        }
    }

    /// Maps regions of a sub-view selected by `rows x cols` back to the
    /// coordinates of the matrix it was selected from.
    pub fn compose(&self, rows: &Span, cols: &Span) -> ErrorMask {
        ErrorMask {
            regions: self
                .regions
                .iter()
                .map(|(r, c)| (rows.compose(r), cols.compose(c)))
                .collect(),
        }
    }

    /// Every addressed position lies inside a `dims` matrix.
    pub fn fits(&self, dims: (usize, usize)) -> bool {
        let within = |span: &Span, dim: usize| {
            span.is_empty() || (span.get(0) < dim && span.get(span.len - 1) < dim)
        };
        self.regions
            .iter()
            .all(|(r, c)| within(r, dims.0) && within(c, dims.1))
    }

    /// Visits every addressed `(row, col)` position.
    pub fn for_each_position(&self, mut visit: impl FnMut(usize, usize)) {
        for (rows, cols) in &self.regions {
            for r in rows.iter() {
                for c in cols.iter() {
                    visit(r, c);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_keep_a_negative_stop_for_open_reverse_slices() {
        // [::-1] over 5 elements
        assert_eq!(SliceSpec::reversed().indices(5).unwrap(), (4, -1, -1));
    }

    #[test]
    fn canonical_open_negative_step_keeps_index_zero() {
        let canonical = SliceSpec::reversed().canonical(5).unwrap();
        assert_eq!(canonical, SliceSpec::new(Some(4), None, -1));
        let span = SliceSpec::reversed().normalize(5).unwrap();
        assert_eq!(span.positions(), vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn bounded_negative_step_keeps_its_stop() {
        // [4:1:-1] -> 4, 3, 2
        let span = SliceSpec::new(Some(4), Some(1), -1).normalize(6).unwrap();
        assert_eq!(span.positions(), vec![4, 3, 2]);
        // [3::-2] -> 3, 1
        let span = SliceSpec::new(Some(3), None, -2).normalize(6).unwrap();
        assert_eq!(span.positions(), vec![3, 1]);
        // [:-4:-1] on len 6 -> 5, 4, 3
        let span = SliceSpec::new(None, Some(-4), -1).normalize(6).unwrap();
        assert_eq!(span.positions(), vec![5, 4, 3]);
    }

    #[test]
    fn positive_slices_clamp_to_the_axis() {
        assert_eq!(SliceSpec::range(1, 100).normalize(4).unwrap().positions(), vec![1, 2, 3]);
        assert_eq!(SliceSpec::range(-3, -1).normalize(5).unwrap().positions(), vec![2, 3]);
        assert_eq!(SliceSpec::full().with_step(3).normalize(7).unwrap().positions(), vec![0, 3, 6]);
        assert!(SliceSpec::range(3, 1).normalize(5).unwrap().is_empty());
    }

    #[test]
    fn zero_step_is_an_index_error() {
        assert!(SliceSpec::full().with_step(0).normalize(3).is_err());
    }

    #[test]
    fn localize_handles_both_directions() {
        let forward = SliceSpec::range(1, 7).with_step(2).normalize(8).unwrap(); // 1,3,5
        assert_eq!(forward.localize(2, 6).positions(), vec![1, 3]);
        assert!(forward.localize(6, 8).is_empty());

        let backward = SliceSpec::reversed().normalize(8).unwrap(); // 7..=0
        let local = backward.localize(0, 4);
        assert_eq!(local.positions(), vec![3, 2, 1, 0]);
        let local = backward.localize(4, 8);
        assert_eq!(local.positions(), vec![3, 2, 1, 0]);
    }

    #[test]
    fn compose_maps_back_to_parent() {
        let outer = SliceSpec::full().with_step(-1).normalize(6).unwrap(); // 5..=0
        let inner = SliceSpec::range(1, 3).normalize(outer.len).unwrap(); // 4, 3
        assert_eq!(outer.compose(&inner).positions(), vec![4, 3]);
    }

    #[test]
    fn integer_indices_flatten_and_wrap() {
        let mask = Mask::new(&Index::from(-1), (3, 4)).unwrap();
        assert!(mask.flatten);
        assert_eq!(mask.rows.positions(), vec![2]);
        assert_eq!(mask.cols.positions(), vec![0, 1, 2, 3]);
        assert!(!mask.covers_all);
        assert!(Mask::new(&Index::from((0, 4)), (3, 4)).is_err());
    }

    #[test]
    fn reversed_full_axis_covers_but_is_not_identity() {
        let mask = Mask::new(&Index::from((SliceSpec::reversed(), ..)), (3, 4)).unwrap();
        assert!(mask.covers_all);
        assert!(!mask.is_identity);
        let mask = Mask::new(&Index::from(..), (3, 4)).unwrap();
        assert!(mask.is_identity);
    }

    #[test]
    fn error_masks_follow_views_back_to_the_parent() {
        let rows = SliceSpec::reversed().normalize(4).unwrap(); // 3..=0
        let cols = SliceSpec::range(1, 4).normalize(5).unwrap(); // 1, 2, 3
        let local = ErrorMask::single(Span::single(0), SliceSpec::range(1, 3).normalize(3).unwrap());
        let parent = local.compose(&rows, &cols);
        let mut hits = Vec::new();
        parent.for_each_position(|r, c| hits.push((r, c)));
        assert_eq!(hits, vec![(3, 2), (3, 3)]);
        assert!(parent.fits((4, 5)));
        assert!(parent.transposed().fits((4, 4)));
        assert!(!parent.transposed().fits((3, 4)));
    }

    #[test]
    fn arity_is_checked() {
        let axes = [AxisIndex::Int(0), AxisIndex::Int(1), AxisIndex::Int(2)];
        assert!(Index::from_axes(&axes).is_err());
        assert!(Index::from_axes(&[]).is_err());
        assert!(Index::from_axes(&axes[..2]).is_ok());
    }
}
