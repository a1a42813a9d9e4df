//! Descriptive statistics over `f64` slices.
//!
//! Conventions:
//!
//! - [`median`] and [`percentile`] propagate NaN: a single NaN input yields
//!   NaN.
//! - [`std_dev`] is the population standard deviation (`ddof = 0`).
//! - Empty input returns `None` rather than NaN so callers decide how an
//!   empty population should be reported.

/// Arithmetic mean, or `None` for empty input.
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Population standard deviation (`ddof = 0`), or `None` for empty input.
pub fn std_dev(values: &[f64]) -> Option<f64> {
    let mu = mean(values)?;
    let variance = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    Some(variance.sqrt())
}

fn sorted_copy(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Median of the values.
///
/// Returns `None` for empty input and `Some(NaN)` if any value is NaN.
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    if values.iter().any(|v| v.is_nan()) {
        return Some(f64::NAN);
    }

    let sorted = sorted_copy(values);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

/// Percentile `q` (0..=100) using linear interpolation between the closest
/// ranks.
pub fn percentile(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    if values.iter().any(|v| v.is_nan()) {
        return Some(f64::NAN);
    }

    let sorted = sorted_copy(values);
    let rank = (q.clamp(0.0, 100.0) / 100.0) * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let t = rank - lower as f64;
    Some(sorted[lower] + t * (sorted[upper] - sorted[lower]))
}

/// Lower and upper limits `median ∓ nsigma * std`.
///
/// A precomputed median may be supplied to avoid re-sorting large arrays.
pub fn compute_limits(
    values: &[f64],
    nsigma: f64,
    precomputed_median: Option<f64>,
) -> Option<(f64, f64)> {
    let med = match precomputed_median {
        Some(m) => m,
        None => median(values)?,
    };
    let std = std_dev(values)?;
    Some((med - nsigma * std, med + nsigma * std))
}

/// Mean of the values lying within `nsigma` standard deviations of the
/// median (bounds inclusive). One clipping pass only.
pub fn sigma_clipped_mean(values: &[f64], nsigma: f64) -> Option<f64> {
    let (lower, upper) = compute_limits(values, nsigma, None)?;
    let kept: Vec<f64> = values
        .iter()
        .copied()
        .filter(|&v| v >= lower && v <= upper)
        .collect();
    mean(&kept)
}

/// Weighted mean `Σ w·x / Σ w`.
///
/// Returns `None` when the lengths differ, the input is empty or the
/// weights sum to zero.
pub fn weighted_mean(values: &[f64], weights: &[f64]) -> Option<f64> {
    if values.len() != weights.len() || values.is_empty() {
        return None;
    }
    let weight_sum: f64 = weights.iter().sum();
    if weight_sum == 0.0 {
        return None;
    }
    let total: f64 = values.iter().zip(weights).map(|(v, w)| v * w).sum();
    Some(total / weight_sum)
}
