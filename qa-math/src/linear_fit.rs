//! First-order polynomial least squares.

use crate::FitError;

/// Straight line `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearFit {
    pub fn evaluate(&self, x: f64) -> f64 {
        self.slope * x + self.intercept
    }
}

/// Fit a degree-1 polynomial to `(x, y)` by ordinary least squares.
///
/// A constant `x` is reported as [`FitError::ZeroVariance`] rather than
/// returning a minimum-norm solution.
///
/// # Errors
///
/// * `FitError::LengthMismatch` - `x` and `y` differ in length
/// * `FitError::InsufficientData` - fewer than two points
/// * `FitError::ZeroVariance` - all `x` values are equal
pub fn fit_line(x: &[f64], y: &[f64]) -> Result<LinearFit, FitError> {
    if x.len() != y.len() {
        return Err(FitError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }
    if x.len() < 2 {
        return Err(FitError::InsufficientData {
            expected: 2,
            got: x.len(),
        });
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let (sxx, sxy) = x
        .iter()
        .zip(y)
        .fold((0.0, 0.0), |(sxx, sxy), (&xi, &yi)| {
            let dx = xi - mean_x;
            (sxx + dx * dx, sxy + dx * (yi - mean_y))
        });

    let scale: f64 = x.iter().map(|v| v * v).sum();
    if sxx <= f64::EPSILON * scale {
        return Err(FitError::ZeroVariance);
    }

    let slope = sxy / sxx;
    Ok(LinearFit {
        slope,
        intercept: mean_y - slope * mean_x,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line() {
        let x = [1.0, 1.5, 2.0, 2.5];
        let y: Vec<f64> = x.iter().map(|v| 0.2 * v - 1.0).collect();
        let fit = fit_line(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, 0.2, epsilon = 1e-12);
        assert_relative_eq!(fit.intercept, -1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.evaluate(3.0), -0.4, epsilon = 1e-12);
    }

    #[test]
    fn test_noisy_line_recovers_slope() {
        use rand::rngs::StdRng;
        use rand::SeedableRng;
        use rand_distr::{Distribution, Normal};

        let mut rng = StdRng::seed_from_u64(42);
        let noise = Normal::new(0.0, 0.001).unwrap();
        let x: Vec<f64> = (0..200).map(|i| 1.0 + i as f64 / 100.0).collect();
        let y: Vec<f64> = x
            .iter()
            .map(|v| 0.15 * v + 2.0 + noise.sample(&mut rng))
            .collect();

        let fit = fit_line(&x, &y).unwrap();
        assert_relative_eq!(fit.slope, 0.15, epsilon = 1e-3);
        assert_relative_eq!(fit.intercept, 2.0, epsilon = 2e-3);
    }

    #[test]
    fn test_constant_x_is_zero_variance() {
        assert_eq!(
            fit_line(&[1.2, 1.2, 1.2], &[1.0, 2.0, 3.0]),
            Err(FitError::ZeroVariance)
        );
    }

    #[test]
    fn test_insufficient_data() {
        assert_eq!(
            fit_line(&[1.0], &[1.0]),
            Err(FitError::InsufficientData {
                expected: 2,
                got: 1
            })
        );
    }

    #[test]
    fn test_length_mismatch() {
        assert!(matches!(
            fit_line(&[1.0, 2.0], &[1.0]),
            Err(FitError::LengthMismatch { x_len: 2, y_len: 1 })
        ));
    }
}
