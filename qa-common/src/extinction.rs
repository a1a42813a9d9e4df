//! First-order airmass extinction removal.
//!
//! The atmosphere dims every star by the same number of magnitudes per unit
//! airmass. The trend is measured on a set of standard stars and divided out
//! of the whole flux matrix:
//!
//! 1. select standards by their median flux,
//! 2. convert flux to instrumental magnitudes, masking non-positive and
//!    non-finite fluxes,
//! 3. normalise each standard by its own median magnitude and take the
//!    per-frame median across standards (the bulk standard light curve),
//! 4. fit `bulk = slope * airmass + intercept`,
//! 5. divide every flux by `10^(-slope * airmass / 2.5)`.
//!
//! The zero point of the fit is dropped: only the airmass-dependent part of
//! the trend is removed, so the correction is relative. Because step 3
//! works on magnitude differences, scaling the input by a constant scales
//! the output by the same constant.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use qa_math::{fit_line, stats, FitError, LinearFit};

use crate::error::{check_len, QaError, Result};

/// Summary of a correction, for logging and reports.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtinctionReport {
    /// Fitted trend of bulk standard magnitude against airmass
    pub fit: LinearFit,
    /// Number of objects selected as standards
    pub n_standards: usize,
    /// Number of frames with a defined bulk standard value
    pub n_fit_frames: usize,
    /// The airmass did not vary, so no trend could be measured
    pub degenerate: bool,
}

fn row_median(row: ArrayView1<'_, f64>) -> f64 {
    let values: Vec<f64> = row.iter().copied().collect();
    stats::median(&values).unwrap_or(f64::NAN)
}

/// Select standards by per-object median flux over frames.
///
/// Bounds are inclusive. With a single bound the cut is one-sided; with no
/// bounds every object is a standard. An object whose median is undefined
/// (any NaN flux, or no frames) fails every bounded cut.
pub fn compute_standards_index(
    flux: ArrayView2<'_, f64>,
    flux_min: Option<f64>,
    flux_max: Option<f64>,
) -> Array1<bool> {
    flux.rows()
        .into_iter()
        .map(|row| {
            if flux_min.is_none() && flux_max.is_none() {
                return true;
            }
            let med = row_median(row);
            flux_min.map_or(true, |lo| med >= lo) && flux_max.map_or(true, |hi| med <= hi)
        })
        .collect()
}

/// `-2.5 log10(flux)`, with `None` where the flux is non-finite or not positive.
pub fn instrumental_magnitudes(flux: ArrayView2<'_, f64>) -> Array2<Option<f64>> {
    flux.mapv(|f| (f.is_finite() && f > 0.0).then(|| -2.5 * f.log10()))
}

/// `10^((zp - mag) / 2.5)`.
pub fn mags_to_flux(mag: f64, zp: f64) -> f64 {
    10f64.powf((zp - mag) / 2.5)
}

/// Per-frame median of the median-normalised standard light curves.
///
/// Masked magnitudes are ignored by both medians. Frames where no standard
/// has a defined magnitude are NaN.
pub fn compute_bulk_standard_lightcurve(
    mags: &Array2<Option<f64>>,
    standards: &Array1<bool>,
) -> Result<Array1<f64>> {
    check_len("standards index", mags.nrows(), standards.len())?;

    let n_frames = mags.ncols();
    let mut per_frame: Vec<Vec<f64>> = vec![Vec::new(); n_frames];

    for (row, _) in mags
        .axis_iter(Axis(0))
        .zip(standards.iter())
        .filter(|(_, &is_standard)| is_standard)
    {
        let defined: Vec<f64> = row.iter().flatten().copied().collect();
        let Some(star_median) = stats::median(&defined) else {
            continue;
        };
        for (frame, mag) in row.iter().enumerate() {
            if let Some(m) = mag {
                per_frame[frame].push(m - star_median);
            }
        }
    }

    Ok(per_frame
        .iter()
        .map(|values| stats::median(values).unwrap_or(f64::NAN))
        .collect())
}

/// Fit the bulk standard light curve against airmass over finite frames.
///
/// # Errors
///
/// * `QaError::ShapeMismatch` - `airmass` and `bulk` differ in length
/// * `QaError::InsufficientStandards` - fewer than two finite bulk values
/// * `QaError::DegenerateFit` - airmass is constant over the finite frames
pub fn fit_airmass_trend(
    airmass: ArrayView1<'_, f64>,
    bulk: ArrayView1<'_, f64>,
) -> Result<LinearFit> {
    check_len("bulk standard", airmass.len(), bulk.len())?;

    let (x, y): (Vec<f64>, Vec<f64>) = airmass
        .iter()
        .zip(bulk.iter())
        .filter(|(a, b)| a.is_finite() && b.is_finite())
        .map(|(&a, &b)| (a, b))
        .unzip();

    if x.len() < 2 {
        return Err(QaError::InsufficientStandards(format!(
            "{} frame(s) with a defined bulk standard value, need at least 2",
            x.len()
        )));
    }

    fit_line(&x, &y).map_err(|e| match e {
        FitError::ZeroVariance => QaError::DegenerateFit,
        other => QaError::Fit(other),
    })
}

/// Flux-space correction factor `10^((0 - slope * airmass) / 2.5)` per frame.
pub fn extinction_correction(slope: f64, airmass: ArrayView1<'_, f64>) -> Array1<f64> {
    airmass.mapv(|a| mags_to_flux(slope * a, 0.0))
}

/// Remove the airmass trend, returning the corrected flux and a report.
///
/// Constant airmass leaves no measurable trend: the slope is taken as zero
/// and the flux comes back unchanged.
///
/// # Errors
///
/// * `QaError::ShapeMismatch` - `airmass` length differs from the frame count
/// * `QaError::NonFiniteAirmass` - some frame has a NaN or infinite airmass
/// * `QaError::InsufficientStandards` - no standards selected, or fewer than
///   two frames with a defined bulk standard value
/// * `QaError::DegenerateFit` - airmass varies, but not over the frames with
///   a defined bulk standard value
pub fn remove_extinction_with_report(
    flux: ArrayView2<'_, f64>,
    airmass: ArrayView1<'_, f64>,
    flux_min: Option<f64>,
    flux_max: Option<f64>,
) -> Result<(Array2<f64>, ExtinctionReport)> {
    check_len("airmass", flux.ncols(), airmass.len())?;
    if let Some(frame) = airmass.iter().position(|a| !a.is_finite()) {
        return Err(QaError::NonFiniteAirmass { frame });
    }

    let standards = compute_standards_index(flux, flux_min, flux_max);
    let n_standards = standards.iter().filter(|&&s| s).count();
    if n_standards == 0 {
        return Err(QaError::InsufficientStandards(format!(
            "no objects with median flux in [{}, {}]",
            flux_min.map_or("-inf".to_string(), |v| v.to_string()),
            flux_max.map_or("inf".to_string(), |v| v.to_string()),
        )));
    }

    let mags = instrumental_magnitudes(flux);
    let bulk = compute_bulk_standard_lightcurve(&mags, &standards)?;
    let n_fit_frames = bulk.iter().filter(|b| b.is_finite()).count();

    let (fit, degenerate) = match fit_airmass_trend(airmass, bulk.view()) {
        Ok(fit) => (fit, false),
        Err(QaError::DegenerateFit) if airmass.iter().all(|&a| a == airmass[0]) => {
            log::warn!("Airmass is constant; leaving flux uncorrected");
            (
                LinearFit {
                    slope: 0.0,
                    intercept: 0.0,
                },
                true,
            )
        }
        Err(e) => return Err(e),
    };

    log::debug!(
        "Extinction fit from {n_standards} standards over {n_fit_frames} frames: slope {:.5} mag/airmass",
        fit.slope
    );

    let correction = extinction_correction(fit.slope, airmass);
    let mut corrected = flux.to_owned();
    for mut row in corrected.rows_mut() {
        row /= &correction;
    }

    Ok((
        corrected,
        ExtinctionReport {
            fit,
            n_standards,
            n_fit_frames,
            degenerate,
        },
    ))
}

/// Remove the first-order airmass trend from an objects × frames flux matrix.
///
/// See [`remove_extinction_with_report`].
pub fn remove_extinction(
    flux: ArrayView2<'_, f64>,
    airmass: ArrayView1<'_, f64>,
    flux_min: Option<f64>,
    flux_max: Option<f64>,
) -> Result<Array2<f64>> {
    remove_extinction_with_report(flux, airmass, flux_min, flux_max).map(|(corrected, _)| corrected)
}
