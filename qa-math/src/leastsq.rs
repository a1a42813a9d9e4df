//! Levenberg–Marquardt minimisation of a residual vector.
//!
//! Minimises `½ Σ rᵢ(p)²` for a user-supplied residual function using a
//! forward-difference Jacobian and Marquardt's diagonal scaling. Intended
//! for the handful-of-parameters model fits the QA tools perform (noise
//! models, trend curves), not for large sparse problems.

use nalgebra::{DMatrix, DVector};

use crate::FitError;

/// Stopping criteria for [`levenberg_marquardt`].
#[derive(Debug, Clone)]
pub struct LeastSquaresConfig {
    /// Maximum number of accepted or rejected steps
    pub max_iterations: usize,
    /// Relative reduction in cost below which the fit is considered converged
    pub ftol: f64,
    /// Relative step size below which the fit is considered converged
    pub xtol: f64,
    /// Starting damping factor
    pub initial_lambda: f64,
}

impl Default for LeastSquaresConfig {
    fn default() -> Self {
        // sqrt of f64 machine epsilon
        Self {
            max_iterations: 600,
            ftol: 1.49012e-8,
            xtol: 1.49012e-8,
            initial_lambda: 1e-3,
        }
    }
}

/// Outcome of a least-squares minimisation.
#[derive(Debug, Clone)]
pub struct LeastSquaresFit {
    /// Best-fit parameters
    pub params: Vec<f64>,
    /// Final cost `½ Σ rᵢ²`
    pub cost: f64,
    /// Number of iterations performed
    pub iterations: usize,
    /// Whether a tolerance criterion was met before `max_iterations`
    pub converged: bool,
}

const MAX_LAMBDA: f64 = 1e16;

fn evaluate<F>(residuals: &F, params: &[f64]) -> Result<DVector<f64>, FitError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let r = DVector::from_vec(residuals(params));
    if r.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteResidual);
    }
    Ok(r)
}

fn jacobian<F>(
    residuals: &F,
    params: &[f64],
    r0: &DVector<f64>,
) -> Result<DMatrix<f64>, FitError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let m = r0.len();
    let n = params.len();
    let mut jac = DMatrix::zeros(m, n);
    let mut probe = params.to_vec();

    for j in 0..n {
        let h = f64::EPSILON.sqrt() * params[j].abs().max(1.0);
        probe[j] = params[j] + h;
        let r = evaluate(residuals, &probe)?;
        probe[j] = params[j];
        for i in 0..m {
            jac[(i, j)] = (r[i] - r0[i]) / h;
        }
    }

    Ok(jac)
}

/// Minimise the sum of squared residuals starting from `initial`.
///
/// # Errors
///
/// * `FitError::InsufficientData` - fewer residuals than parameters
/// * `FitError::NonFiniteResidual` - the residual function produced NaN/inf
///   at the starting point
pub fn levenberg_marquardt<F>(
    residuals: F,
    initial: &[f64],
    config: &LeastSquaresConfig,
) -> Result<LeastSquaresFit, FitError>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = initial.len();
    let mut params = initial.to_vec();
    let mut r = evaluate(&residuals, &params)?;
    if r.len() < n {
        return Err(FitError::InsufficientData {
            expected: n,
            got: r.len(),
        });
    }

    let mut cost = 0.5 * r.norm_squared();
    let mut lambda = config.initial_lambda;
    let mut converged = false;
    let mut iterations = 0;

    while iterations < config.max_iterations && !converged {
        iterations += 1;

        let jac = jacobian(&residuals, &params, &r)?;
        let jtj = jac.transpose() * &jac;
        let gradient = jac.transpose() * &r;

        if gradient.amax() == 0.0 {
            converged = true;
            break;
        }

        let mut damped = jtj.clone();
        for i in 0..n {
            damped[(i, i)] += lambda * jtj[(i, i)].max(1e-12);
        }

        let Some(step) = damped.cholesky().map(|c| c.solve(&(-&gradient))) else {
            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                break;
            }
            continue;
        };

        let candidate: Vec<f64> = params.iter().zip(step.iter()).map(|(p, s)| p + s).collect();
        let candidate_r = match evaluate(&residuals, &candidate) {
            Ok(r) => r,
            Err(_) => {
                lambda *= 10.0;
                if lambda > MAX_LAMBDA {
                    break;
                }
                continue;
            }
        };
        let candidate_cost = 0.5 * candidate_r.norm_squared();

        if candidate_cost <= cost {
            let param_norm = DVector::from_column_slice(&params).norm();
            let small_step = step.norm() <= config.xtol * (param_norm + config.xtol);
            let small_gain = (cost - candidate_cost) <= config.ftol * cost;

            params = candidate;
            r = candidate_r;
            cost = candidate_cost;
            lambda = (lambda / 10.0).max(1e-12);
            converged = small_step || small_gain;
        } else {
            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                // No downhill step exists at any damping: we are at a minimum.
                converged = true;
            }
        }
    }

    Ok(LeastSquaresFit {
        params,
        cost,
        iterations,
        converged,
    })
}
