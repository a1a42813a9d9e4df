//! Numeric kernels shared by the survey QA crates.
//!
//! Everything here is pure: no I/O, no logging, no global state. The
//! domain-level routines in `qa-common` are built on top of these.
//!
//! - [`stats`]: medians, population standard deviations, percentiles and
//!   sigma-clipped statistics.
//! - [`linear_fit`]: first-order least squares.
//! - [`leastsq`]: Levenberg–Marquardt minimisation of residual vectors.

pub mod leastsq;
pub mod linear_fit;
pub mod stats;

use thiserror::Error;

pub use leastsq::{levenberg_marquardt, LeastSquaresConfig, LeastSquaresFit};
pub use linear_fit::{fit_line, LinearFit};

/// Errors raised by the fitting routines.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("length mismatch: x has {x_len} points, y has {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },
    #[error("insufficient data: expected at least {expected}, got {got}")]
    InsufficientData { expected: usize, got: usize },
    #[error("independent variable has zero variance")]
    ZeroVariance,
    #[error("residual function returned a non-finite value")]
    NonFiniteResidual,
}
