//! Red-noise characterisation by binning light curves.
//!
//! For each flux bin, the fractional RMS of the objects in that bin is
//! measured on the raw light curves and again after median-binning them in
//! time by increasing factors `N`. Pure white noise falls as `N^-1/2`;
//! correlated (red) noise sets a floor. The median curve is fitted with
//!
//! `σ(N) = sqrt((white · N^-1/2)² + red²)`
//!
//! Every flux bin is an independent job, so bins are mapped over a
//! [`MapPool`] and the results re-sorted by lower edge afterwards.

use std::io::Write;

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use qa_math::{levenberg_marquardt, stats, LeastSquaresConfig};
use serde::Serialize;

use crate::config::NoiseConfig;
use crate::error::{check_len, QaError, Result};
use crate::pool::MapPool;

/// Conversion from fractional flux RMS to millimagnitudes.
pub const FRMS_MMAG: f64 = 1.0857 * 1000.0;

const MINUTES_PER_DAY: f64 = 24.0 * 60.0;

/// Half-open range of median flux `(min_flux, max_flux)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluxBin {
    pub min_flux: f64,
    pub max_flux: f64,
}

/// Nine logarithmic flux bins spanning 10² to 10⁵.
pub fn flux_bin_edges() -> Vec<FluxBin> {
    let width = 3.0 / 9.0;
    (0..9)
        .map(|k| {
            let log_left = 2.0 + k as f64 * width;
            FluxBin {
                min_flux: 10f64.powf(log_left),
                max_flux: 10f64.powf(log_left + width),
            }
        })
        .collect()
}

/// Temporal binning factors: unique `ceil(10^x)` over the configured
/// logarithmic grid, restricted to `N < n_frames / 3` in integer division.
pub fn bin_sizes(n_frames: usize, config: &NoiseConfig) -> Vec<usize> {
    let steps = ((config.log_bin_high - config.log_bin_low) / config.log_bin_step).ceil();
    let steps = if steps.is_finite() && steps > 0.0 { steps as usize } else { 0 };
    let limit = n_frames / 3;

    let mut sizes: Vec<usize> = (0..steps)
        .map(|k| 10f64.powf(config.log_bin_low + k as f64 * config.log_bin_step).ceil() as usize)
        .filter(|&n| n < limit)
        .collect();
    sizes.sort_unstable();
    sizes.dedup();
    sizes
}

/// Median-bin every light curve into `floor(M / n)` equal-width bins over
/// the frame index range. Empty bins are NaN.
pub fn bin_lightcurves(flux: ArrayView2<'_, f64>, n: usize) -> Array2<f64> {
    let n_frames = flux.ncols();
    let n_bins = if n == 0 { 0 } else { n_frames / n };
    if n_bins == 0 {
        return Array2::zeros((flux.nrows(), 0));
    }

    let span = n_frames.saturating_sub(1) as f64;
    let step = span / n_bins as f64;
    let edges: Vec<f64> = (0..=n_bins).map(|k| k as f64 * step).collect();
    // Left-closed bins, with the final edge folded into the last bin.
    let frame_bin: Vec<usize> = (0..n_frames)
        .map(|i| {
            let x = i as f64;
            edges
                .partition_point(|&e| e <= x)
                .saturating_sub(1)
                .min(n_bins - 1)
        })
        .collect();

    let mut binned = Array2::from_elem((flux.nrows(), n_bins), f64::NAN);
    let mut members: Vec<Vec<f64>> = vec![Vec::new(); n_bins];
    for (lc, mut out) in flux.axis_iter(Axis(0)).zip(binned.axis_iter_mut(Axis(0))) {
        members.iter_mut().for_each(Vec::clear);
        for (&value, &b) in lc.iter().zip(&frame_bin) {
            members[b].push(value);
        }
        for (slot, values) in out.iter_mut().zip(&members) {
            *slot = stats::median(values).unwrap_or(f64::NAN);
        }
    }
    binned
}

/// White plus red noise level after binning by `n`.
pub fn noise_model(white: f64, red: f64, n: f64) -> f64 {
    ((white * n.powf(-0.5)).powi(2) + red.powi(2)).sqrt()
}

/// Per-object median flux and fractional RMS in millimagnitudes.
fn frms_per_object(flux: ArrayView2<'_, f64>) -> (Array1<f64>, Array1<f64>) {
    let mut median_flux = Array1::zeros(flux.nrows());
    let mut frms = Array1::zeros(flux.nrows());
    for (i, row) in flux.axis_iter(Axis(0)).enumerate() {
        let values: Vec<f64> = row.iter().copied().collect();
        let med = stats::median(&values).unwrap_or(f64::NAN);
        let std = stats::std_dev(&values).unwrap_or(f64::NAN);
        median_flux[i] = med;
        frms[i] = (FRMS_MMAG * std / med).abs();
    }
    (median_flux, frms)
}

/// Noise curve and fitted white/red levels for one flux bin.
#[derive(Debug, Clone)]
pub struct NoiseResult {
    pub min_flux: f64,
    pub max_flux: f64,
    /// Median frame spacing in minutes
    pub cadence_minutes: f64,
    /// Number of objects in the bin
    pub n_objects: usize,
    /// Binning factors, starting with 1 (unbinned)
    pub bin_sizes: Vec<usize>,
    /// Binning factors expressed in minutes
    pub bin_minutes: Vec<f64>,
    /// Median fractional RMS (mmag) at each binning factor
    pub frms: Vec<f64>,
    pub frms_error: Vec<f64>,
    pub lower_quartile: Vec<f64>,
    pub upper_quartile: Vec<f64>,
    pub white_level: f64,
    pub red_level: f64,
    /// Pure white-noise expectation from the fitted white level
    pub white_curve: Vec<f64>,
    /// Full fitted model
    pub model_curve: Vec<f64>,
    pub converged: bool,
}

struct BinnedPoint {
    size: usize,
    frms: f64,
    error: f64,
    lower: f64,
    upper: f64,
}

fn summarise(rms: &[f64], size: usize, error: f64) -> BinnedPoint {
    BinnedPoint {
        size,
        frms: stats::median(rms).unwrap_or(f64::NAN),
        error,
        lower: stats::percentile(rms, 25.0).unwrap_or(f64::NAN),
        upper: stats::percentile(rms, 75.0).unwrap_or(f64::NAN),
    }
}

/// Measure the fractional RMS against binning factor for objects whose
/// median flux lies strictly inside `bin`, and fit the white/red model.
///
/// # Errors
///
/// * `QaError::ShapeMismatch` - `time` length differs from the frame count
/// * `QaError::TooFewFrames` - fewer than two frames
/// * `QaError::EmptyFluxBin` - no usable object in the flux bin
/// * `QaError::Fit` - too few binning factors to fit the model
pub fn characterise_noise(
    flux: ArrayView2<'_, f64>,
    time: ArrayView1<'_, f64>,
    bin: FluxBin,
    config: &NoiseConfig,
) -> Result<NoiseResult> {
    check_len("time", flux.ncols(), time.len())?;
    if time.len() < 2 {
        return Err(QaError::TooFewFrames {
            need: 2,
            got: time.len(),
        });
    }

    let spacing: Vec<f64> = time.windows(2).into_iter().map(|w| w[1] - w[0]).collect();
    let cadence_minutes = stats::median(&spacing).unwrap_or(f64::NAN) * MINUTES_PER_DAY;

    let in_bin = |f: f64| f > bin.min_flux && f < bin.max_flux;

    let (median_flux, frms) = frms_per_object(flux);
    let sane: Vec<usize> = (0..flux.nrows())
        .filter(|&i| frms[i] > 0.0 && median_flux[i] > 0.0 && in_bin(median_flux[i]))
        .collect();
    if sane.is_empty() {
        return Err(QaError::EmptyFluxBin {
            min_flux: bin.min_flux,
            max_flux: bin.max_flux,
        });
    }

    let flux_sane = flux.select(Axis(0), &sane);
    let rms_sane: Vec<f64> = sane.iter().map(|&i| frms[i]).collect();
    log::debug!(
        "Flux bin ({:.1}, {:.1}): {} objects, {} frames",
        bin.min_flux,
        bin.max_flux,
        sane.len(),
        flux.ncols()
    );

    let unbinned_error = stats::std_dev(&rms_sane).unwrap_or(f64::NAN)
        / (rms_sane.len() as f64 * 1000.0).sqrt();
    let mut points = vec![summarise(&rms_sane, 1, unbinned_error)];

    for n in bin_sizes(flux.ncols(), config) {
        let binned = bin_lightcurves(flux_sane.view(), n);
        let (binned_median, binned_frms) = frms_per_object(binned.view());
        let rms: Vec<f64> = binned_median
            .iter()
            .zip(binned_frms.iter())
            .filter(|(&m, _)| in_bin(m))
            .map(|(_, &r)| r)
            .collect();

        if rms.is_empty() {
            log::debug!("Bin size {n}: no objects left in flux range, skipping");
            continue;
        }
        let error = stats::std_dev(&rms).unwrap_or(f64::NAN) / (rms.len() as f64).sqrt();
        points.push(summarise(&rms, n, error));
    }

    let n_fit = config.fit_points.min(points.len());
    let fit_points = &points[..n_fit];
    let weighted = fit_points
        .iter()
        .all(|p| p.error.is_finite() && p.error > 0.0);
    if !weighted {
        log::debug!("Non-positive FRMS errors; fitting noise model unweighted");
    }

    let initial = [points[0].frms, points[points.len() - 1].frms];
    let fit = levenberg_marquardt(
        |p: &[f64]| {
            fit_points
                .iter()
                .map(|pt| {
                    let residual = noise_model(p[0], p[1], pt.size as f64) - pt.frms;
                    if weighted {
                        residual / pt.error
                    } else {
                        residual
                    }
                })
                .collect()
        },
        &initial,
        &LeastSquaresConfig::default(),
    )?;

    let white_level = fit.params[0].abs();
    let red_level = fit.params[1].abs();
    if !fit.converged {
        log::warn!(
            "Noise model fit for flux bin ({:.1}, {:.1}) did not converge",
            bin.min_flux,
            bin.max_flux
        );
    }

    let bin_sizes: Vec<usize> = points.iter().map(|p| p.size).collect();
    Ok(NoiseResult {
        min_flux: bin.min_flux,
        max_flux: bin.max_flux,
        cadence_minutes,
        n_objects: sane.len(),
        bin_minutes: bin_sizes
            .iter()
            .map(|&n| cadence_minutes * n as f64)
            .collect(),
        frms: points.iter().map(|p| p.frms).collect(),
        frms_error: points.iter().map(|p| p.error).collect(),
        lower_quartile: points.iter().map(|p| p.lower).collect(),
        upper_quartile: points.iter().map(|p| p.upper).collect(),
        white_level,
        red_level,
        white_curve: bin_sizes
            .iter()
            .map(|&n| noise_model(white_level, 0.0, n as f64))
            .collect(),
        model_curve: bin_sizes
            .iter()
            .map(|&n| noise_model(white_level, red_level, n as f64))
            .collect(),
        bin_sizes,
        converged: fit.converged,
    })
}

/// Characterise every flux bin on `pool`, returning results ordered by
/// lower edge regardless of completion order.
///
/// Flux bins with no usable objects are skipped with a warning; any other
/// failure aborts the run.
pub fn extract_noise_results<P: MapPool>(
    flux: ArrayView2<'_, f64>,
    time: ArrayView1<'_, f64>,
    bins: &[FluxBin],
    pool: &P,
    config: &NoiseConfig,
) -> Result<Vec<NoiseResult>> {
    log::info!("Characterising noise in {} flux bins", bins.len());
    let outcomes = pool.map(bins.to_vec(), |bin| {
        characterise_noise(flux, time, bin, config)
    });

    let mut results = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome {
            Ok(result) => results.push(result),
            Err(QaError::EmptyFluxBin { min_flux, max_flux }) => {
                log::warn!(
                    "Flux bin ({min_flux:.1}, {max_flux:.1}) has no usable objects, skipping"
                );
            }
            Err(e) => return Err(e),
        }
    }
    results.sort_by(|a, b| a.min_flux.total_cmp(&b.min_flux));
    Ok(results)
}

#[derive(Serialize)]
struct NoiseRow {
    bin_index: usize,
    left_edge: f64,
    right_edge: f64,
    bin_size: usize,
    bin_minutes: f64,
    frms: f64,
    frms_error: f64,
    expected_white: f64,
    model: f64,
}

/// Write one CSV row per (flux bin, binning factor).
pub fn write_noise_results<W: Write>(results: &[NoiseResult], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for (bin_index, result) in results.iter().enumerate() {
        for k in 0..result.bin_sizes.len() {
            csv_writer.serialize(NoiseRow {
                bin_index,
                left_edge: result.min_flux,
                right_edge: result.max_flux,
                bin_size: result.bin_sizes[k],
                bin_minutes: result.bin_minutes[k],
                frms: result.frms[k],
                frms_error: result.frms_error[k],
                expected_white: result.white_curve[k],
                model: result.model_curve[k],
            })?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}
