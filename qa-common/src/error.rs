//! Error taxonomy for the QA routines.

use qa_math::FitError;
use thiserror::Error;

/// Errors raised by the filtering, correction and characterisation routines
/// and by the table/config loaders that feed them.
#[derive(Error, Debug)]
pub enum QaError {
    #[error("shape mismatch: {what} has length {got}, expected {expected}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    #[error("insufficient standards: {0}")]
    InsufficientStandards(String),
    #[error("degenerate fit: airmass has zero variance")]
    DegenerateFit,
    #[error("airmass of frame {frame} is not finite")]
    NonFiniteAirmass { frame: usize },
    #[error("no shift values at or below the initial threshold {threshold}")]
    EmptySeedSet { threshold: f64 },
    #[error("no usable objects with median flux in ({min_flux}, {max_flux})")]
    EmptyFluxBin { min_flux: f64, max_flux: f64 },
    #[error("need at least {need} frames, got {got}")]
    TooFewFrames { need: usize, got: usize },
    #[error("image of {rows}x{cols} pixels is smaller than the required {need_rows}x{need_cols}")]
    ImageTooSmall {
        rows: usize,
        cols: usize,
        need_rows: usize,
        need_cols: usize,
    },
    #[error("column '{0}' not found")]
    KeyNotFound(String),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("worker pool: {0}")]
    Pool(String),
    #[error("fit failed: {0}")]
    Fit(#[from] FitError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QaError>;

/// Fail with [`QaError::ShapeMismatch`] unless `got == expected`.
pub(crate) fn check_len(what: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(QaError::ShapeMismatch {
            what,
            expected,
            got,
        });
    }
    Ok(())
}
