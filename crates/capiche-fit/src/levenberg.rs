//! Levenberg-Marquardt nonlinear least squares.
//!
//! Fits `y ≈ f(x; p)` by damped Gauss-Newton steps on the normal equations
//! `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr`, with the damping `λ` raised after a step
//! that increases the residual and lowered after one that reduces it.

use nalgebra::{DMatrix, DVector};

use crate::error::Result;
use crate::linear::solve_dense;

/// Largest damping tried before the current point is accepted as a minimum.
const MAX_DAMPING: f64 = 1e16;

/// Stopping rules for a fit.
#[derive(Debug, Clone)]
pub struct FitCriteria {
    /// Maximum accepted steps.
    pub max_iterations: usize,
    /// Converged when the relative drop in the sum of squared residuals
    /// falls below this.
    pub ssr_tolerance: f64,
    /// Damping at the first step.
    pub initial_damping: f64,
}

impl Default for FitCriteria {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ssr_tolerance: 1e-12,
            initial_damping: 1e-3,
        }
    }
}

/// A parametric curve with an analytic gradient.
pub trait ModelFunction {
    fn parameter_count(&self) -> usize;

    /// Model value at `x`.
    fn value(&self, x: f64, params: &DVector<f64>) -> f64;

    /// Partial derivatives of the value with respect to each parameter.
    fn gradient(&self, x: f64, params: &DVector<f64>) -> DVector<f64>;
}

/// Result of a Levenberg-Marquardt run.
#[derive(Debug, Clone)]
pub struct LmResult {
    pub params: DVector<f64>,
    pub iterations: usize,
    pub converged: bool,
    /// Sum of squared residuals at `params`.
    pub ssr: f64,
}

impl LmResult {
    /// RMS residual divided by the largest |y|.
    pub fn normalized_rms(&self, ys: &[f64]) -> f64 {
        if ys.is_empty() {
            return 0.0;
        }
        let rms = (self.ssr / ys.len() as f64).sqrt();
        let scale = ys.iter().fold(0.0_f64, |m, y| m.max(y.abs()));
        if scale > 0.0 {
            rms / scale
        } else {
            rms
        }
    }
}

/// Fit `model` to the points `(xs[i], ys[i])` starting from `initial`.
///
/// A run that exhausts its iteration budget returns `converged: false`
/// with the best parameters found; a singular system at every damping
/// level ends the run at the current point.
pub fn solve_levenberg_marquardt(
    model: &dyn ModelFunction,
    xs: &[f64],
    ys: &[f64],
    initial: &DVector<f64>,
    criteria: &FitCriteria,
) -> Result<LmResult> {
    let n = xs.len().min(ys.len());
    let m = model.parameter_count();

    let mut params = initial.clone();
    let mut residuals = residual_vector(model, &xs[..n], &ys[..n], &params);
    let mut ssr = residuals.norm_squared();
    let mut damping = criteria.initial_damping;

    for iteration in 0..criteria.max_iterations {
        if ssr == 0.0 {
            return Ok(LmResult {
                params,
                iterations: iteration,
                converged: true,
                ssr,
            });
        }

        let mut jacobian = DMatrix::<f64>::zeros(n, m);
        for (i, &x) in xs[..n].iter().enumerate() {
            let g = model.gradient(x, &params);
            for k in 0..m {
                jacobian[(i, k)] = g[k];
            }
        }
        let jtj = jacobian.transpose() * &jacobian;
        let jtr = jacobian.transpose() * &residuals;

        // raise the damping until a step reduces the residual
        let accepted = loop {
            if damping > MAX_DAMPING {
                break None;
            }
            let mut a = jtj.clone();
            for k in 0..m {
                a[(k, k)] += damping * jtj[(k, k)].max(f64::EPSILON);
            }
            let step = match solve_dense(&a, &jtr) {
                Ok(step) => step,
                Err(_) => {
                    damping *= 10.0;
                    continue;
                }
            };

            let candidate = &params + step;
            let candidate_residuals = residual_vector(model, &xs[..n], &ys[..n], &candidate);
            let candidate_ssr = candidate_residuals.norm_squared();
            if candidate_ssr.is_finite() && candidate_ssr <= ssr {
                damping = (damping / 10.0).max(1e-12);
                break Some((candidate, candidate_residuals, candidate_ssr));
            }
            damping *= 10.0;
        };

        let Some((candidate, candidate_residuals, candidate_ssr)) = accepted else {
            // no damping level improves on the current point
            log::debug!("stalled at iteration {} with ssr {:.3e}", iteration, ssr);
            return Ok(LmResult {
                params,
                iterations: iteration,
                converged: true,
                ssr,
            });
        };

        let relative_change = (ssr - candidate_ssr) / ssr;
        params = candidate;
        residuals = candidate_residuals;
        ssr = candidate_ssr;

        if relative_change < criteria.ssr_tolerance {
            return Ok(LmResult {
                params,
                iterations: iteration + 1,
                converged: true,
                ssr,
            });
        }
    }

    Ok(LmResult {
        params,
        iterations: criteria.max_iterations,
        converged: false,
        ssr,
    })
}

fn residual_vector(model: &dyn ModelFunction, xs: &[f64], ys: &[f64], params: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        xs.len(),
        xs.iter().zip(ys).map(|(&x, &y)| y - model.value(x, params)),
    )
}
