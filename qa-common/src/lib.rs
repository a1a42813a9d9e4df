//! Quality-assessment routines for survey photometry and reduction products.
//!
//! The light-curve pipeline runs as: [`filter`] picks the usable frames and
//! objects, [`extinction`] removes the airmass trend using bright standards,
//! and [`noise`] characterises how fractional RMS integrates down with
//! binning. [`table`] and [`io`] move columnar data in and out as CSV;
//! [`pool`] fans per-bin work out over rayon.

pub mod config;
pub mod error;
pub mod extinction;
pub mod filter;
pub mod io;
pub mod logging;
pub mod nights;
pub mod noise;
pub mod photometry;
pub mod pool;
pub mod reduction;
pub mod table;

pub use config::QaConfig;
pub use error::{QaError, Result};
pub use filter::{good_measurement_indices, MeasurementMasks};
pub use io::Target;
pub use logging::{init_logging, LogConfig};
pub use pool::{MapPool, QaPool};
pub use table::{ColumnTable, FluxTable, SortKey};
