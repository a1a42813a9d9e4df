//! Photometric helpers shared by the light-curve QA tools.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use qa_math::stats;

use crate::error::{check_len, QaError, Result};

pub use crate::extinction::mags_to_flux;

/// Nine logarithmic brightness bins between `1e2 / 4` and `1e5 / 4`,
/// as `(left_edges, right_edges)`.
pub fn build_bins() -> (Vec<f64>, Vec<f64>) {
    let log_min = (1e2f64 / 4.0).log10();
    let log_max = (1e5f64 / 4.0).log10();
    let n_bins = 9;
    let width = (log_max - log_min) / n_bins as f64;

    (0..n_bins)
        .map(|k| {
            let log_left = log_min + k as f64 * width;
            (10f64.powf(log_left), 10f64.powf(log_left + width))
        })
        .unzip()
}

/// Divide each frame column by its exposure time.
pub fn normalise_by_exposure(
    flux: ArrayView2<'_, f64>,
    exposure: ArrayView1<'_, f64>,
) -> Result<Array2<f64>> {
    check_len("exposure", flux.ncols(), exposure.len())?;
    let mut out = flux.to_owned();
    for mut row in out.rows_mut() {
        row /= &exposure;
    }
    Ok(out)
}

/// Per-object fractional RMS, `std / median` over frames.
pub fn fractional_rms(flux: ArrayView2<'_, f64>) -> Array1<f64> {
    flux.axis_iter(Axis(0))
        .map(|row| {
            let values: Vec<f64> = row.iter().copied().collect();
            match (stats::std_dev(&values), stats::median(&values)) {
                (Some(std), Some(med)) => std / med,
                _ => f64::NAN,
            }
        })
        .collect()
}

/// Per-object median flux over frames.
pub fn median_flux(flux: ArrayView2<'_, f64>) -> Array1<f64> {
    flux.axis_iter(Axis(0))
        .map(|row| {
            let values: Vec<f64> = row.iter().copied().collect();
            stats::median(&values).unwrap_or(f64::NAN)
        })
        .collect()
}

/// Per-object inverse-variance weighted mean flux.
pub fn weighted_mean_flux(
    flux: ArrayView2<'_, f64>,
    fluxerr: ArrayView2<'_, f64>,
) -> Result<Array1<f64>> {
    if flux.dim() != fluxerr.dim() {
        return Err(QaError::ShapeMismatch {
            what: "fluxerr",
            expected: flux.len(),
            got: fluxerr.len(),
        });
    }

    Ok(flux
        .axis_iter(Axis(0))
        .zip(fluxerr.axis_iter(Axis(0)))
        .map(|(f, e)| {
            let values: Vec<f64> = f.iter().copied().collect();
            let weights: Vec<f64> = e.iter().map(|err| err.powi(-2)).collect();
            stats::weighted_mean(&values, &weights).unwrap_or(f64::NAN)
        })
        .collect())
}

/// Inverse-variance weighted light curve of the selected objects.
#[derive(Debug, Clone, PartialEq)]
pub struct BinnedLightcurve {
    pub flux: Array1<f64>,
    pub error: Array1<f64>,
}

/// Combine the selected objects frame by frame: weighted mean flux and its
/// error `sqrt(1 / Σ err⁻²)`.
pub fn binned_lightcurve(
    flux: ArrayView2<'_, f64>,
    fluxerr: ArrayView2<'_, f64>,
    selection: &Array1<bool>,
) -> Result<BinnedLightcurve> {
    if flux.dim() != fluxerr.dim() {
        return Err(QaError::ShapeMismatch {
            what: "fluxerr",
            expected: flux.len(),
            got: fluxerr.len(),
        });
    }
    check_len("selection", flux.nrows(), selection.len())?;

    let rows: Vec<usize> = selection
        .iter()
        .enumerate()
        .filter_map(|(i, &s)| s.then_some(i))
        .collect();
    let chosen = flux.select(Axis(0), &rows);
    let chosen_err = fluxerr.select(Axis(0), &rows);

    let mut lc = Array1::from_elem(flux.ncols(), f64::NAN);
    let mut err = Array1::from_elem(flux.ncols(), f64::NAN);
    for (j, (f, e)) in chosen
        .axis_iter(Axis(1))
        .zip(chosen_err.axis_iter(Axis(1)))
        .enumerate()
    {
        let values: Vec<f64> = f.iter().copied().collect();
        let weights: Vec<f64> = e.iter().map(|v| v.powi(-2)).collect();
        if let Some(mean) = stats::weighted_mean(&values, &weights) {
            lc[j] = mean;
            err[j] = (1.0 / weights.iter().sum::<f64>()).sqrt();
        }
    }

    Ok(BinnedLightcurve {
        flux: lc,
        error: err,
    })
}
