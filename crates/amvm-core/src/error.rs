// SPDX-License-Identifier: AGPL-3.0-or-later
// © 2025 Ryo ∴ SpiralArchitect (kishkavsesvit@icloud.com)
// Part of SpiralTorch — Licensed under AGPL-3.0-or-later.
// Unauthorized derivative works or closed redistribution prohibited under AGPL §13.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AnalogError>;

/// Errors surfaced by the analog core and its views.
///
/// Everything here is a caller error reported before any grid cell is
/// touched; out-of-range partial updates are not errors (they clip and warn).
#[derive(Debug, Error)]
pub enum AnalogError {
    #[error("shape error: {0}")]
    Shape(String),
    #[error("layout error: {0}")]
    Layout(#[from] ndarray::ShapeError),
    #[error("dtype error: {0}")]
    DType(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Params(#[from] amvm_config::ConfigError),
    #[error("index error: {0}")]
    Index(String),
    #[error("input must be 1D or 2D, got {ndim}D")]
    Rank { ndim: usize },
    #[error("{0} is not supported")]
    Unsupported(&'static str),
    #[error("backend {backend} failed: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },
}

pub fn shape(m: impl Into<String>) -> AnalogError {
    AnalogError::Shape(m.into())
}

pub fn dtype(m: impl Into<String>) -> AnalogError {
    AnalogError::DType(m.into())
}

pub fn config(m: impl Into<String>) -> AnalogError {
    AnalogError::Config(m.into())
}

pub fn index(m: impl Into<String>) -> AnalogError {
    AnalogError::Index(m.into())
}
