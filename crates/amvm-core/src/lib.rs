// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

//! Array-like analog in-memory matrix multiplication.
//!
//! An [`AnalogCore`] stores a real or complex matrix across a grid of
//! fixed-size crossbar cells and answers `matvec`, `vecmat`, `matmat` and
//! `rmatmat` by accumulating the per-cell partial products. [`Transposed`]
//! and [`Masked`] views forward reads, writes and multiplies to their parent
//! without copying its state.

pub mod analog_core;
pub mod backend;
pub mod cell;
pub mod complex;
pub mod data;
pub mod error;
pub mod observability;
pub mod partition;
pub mod range;
pub mod slice;
pub mod view;

pub use amvm_config;

pub use analog_core::AnalogCore;
pub use backend::Backend;
pub use data::{DType, Data};
pub use error::{AnalogError, Result};
pub use observability::{set_analog_op_observer, AnalogOpEvent, AnalogOpObserver};
pub use partition::{ParamSet, PartitionBound, PartitionPlan};
pub use range::{estimate_range, RangeConstraints};
pub use slice::{AxisIndex, ErrorMask, Index, Mask, SliceSpec, Span};
pub use view::{AnalogMatrix, Masked, Selection, Transposed};
