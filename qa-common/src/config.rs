//! Configuration for the QA routines.
//!
//! Every threshold the routines use lives in one of these structs with a
//! default matching the values the survey pipeline has always run with.
//! A JSON file may override any subset of fields:
//!
//! ```json
//! { "filter": { "max_airmass": 1.8, "shift": { "nsigma": 4.0 } },
//!   "pool": { "serial": true } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};

/// Parameters of the single-pass shift outlier clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShiftClipConfig {
    /// Seed population is every shift at or below this value (pixels)
    pub initial_threshold: f64,
    /// Frames with shift above `median + nsigma * std` of the seed are rejected
    pub nsigma: f64,
}

impl Default for ShiftClipConfig {
    fn default() -> Self {
        Self {
            initial_threshold: 3.0,
            nsigma: 5.0,
        }
    }
}

/// Parameters of the bad-measurement filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Apertures closer than this to the detector edge are rejected (pixels)
    pub ccd_margin: f64,
    /// Frames with airmass above this are rejected
    pub max_airmass: f64,
    /// Side length of the square detector (pixels)
    pub detector_size: f64,
    pub shift: ShiftClipConfig,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            ccd_margin: 4.0,
            max_airmass: 2.0,
            detector_size: 2048.0,
            shift: ShiftClipConfig::default(),
        }
    }
}

/// Standard-star selection bounds for extinction removal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtinctionConfig {
    pub flux_min: Option<f64>,
    pub flux_max: Option<f64>,
}

/// Parameters of the binned noise characterisation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    /// Number of leading points (unbinned first) used in the noise-model fit
    pub fit_points: usize,
    /// Bin sizes are `ceil(10^x)` for x in `[log_bin_low, log_bin_high)`
    pub log_bin_low: f64,
    pub log_bin_high: f64,
    pub log_bin_step: f64,
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            fit_points: 15,
            log_bin_low: 0.2,
            log_bin_high: 4.0,
            log_bin_step: 0.1,
        }
    }
}

/// Worker pool selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Run every job on the calling thread
    pub serial: bool,
    /// Worker count; `None` lets rayon choose
    pub threads: Option<usize>,
}

/// Top-level configuration grouping every component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QaConfig {
    pub filter: FilterConfig,
    pub extinction: ExtinctionConfig,
    pub noise: NoiseConfig,
    pub pool: PoolConfig,
}

impl QaConfig {
    /// Load a configuration from a JSON file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: QaConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise return the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::load(p),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let filter = &self.filter;
        if filter.ccd_margin < 0.0 || 2.0 * filter.ccd_margin >= filter.detector_size {
            return Err(QaError::Config(format!(
                "ccd_margin {} does not fit a detector of side {}",
                filter.ccd_margin, filter.detector_size
            )));
        }
        if filter.shift.nsigma < 0.0 {
            return Err(QaError::Config("shift.nsigma must be non-negative".into()));
        }
        if let (Some(lo), Some(hi)) = (self.extinction.flux_min, self.extinction.flux_max) {
            if lo > hi {
                return Err(QaError::Config(format!(
                    "extinction flux_min {lo} exceeds flux_max {hi}"
                )));
            }
        }
        if self.noise.log_bin_step <= 0.0 {
            return Err(QaError::Config("noise.log_bin_step must be positive".into()));
        }
        if self.pool.threads == Some(0) {
            return Err(QaError::Config("pool.threads must be at least 1".into()));
        }
        Ok(())
    }
}
