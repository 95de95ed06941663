//! Robust (Huber weighted) least squares
use crate::constants::WEIGHTS_CONVERGENCE;
use log::trace;
use nalgebra::{DMatrix, DVector};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum RobustError {
    #[error("design matrix and observations dimensions do not match")]
    DimensionMismatch,
    #[error("not enough observations")]
    NotEnoughObservations,
    #[error("singular normal equations")]
    SingularNormalEquations,
}

/// Huber weight of a residual `e`, given the a-posteriori
/// standard deviation `sigma0`:
///
/// - 1 if |e| <= huber * sigma0
/// - (huber * sigma0 / |e|)^power otherwise
///
/// This function is continuous and monotone non increasing in |e|.
pub fn huber_weight(e: f64, sigma0: f64, huber: f64, power: f64) -> f64 {
    let threshold = huber * sigma0;
    let e = e.abs();
    if e <= threshold {
        1.0
    } else {
        (threshold / e).powf(power)
    }
}

/// [RobustSolution] of iteratively reweighted least squares.
#[derive(Debug, Clone)]
pub struct RobustSolution {
    /// Estimated parameters
    pub x: DVector<f64>,
    /// Residuals (observed minus adjusted)
    pub residuals: DVector<f64>,
    /// Final Huber weights
    pub weights: DVector<f64>,
    /// A-posteriori standard deviation of unit weight
    pub sigma0: f64,
    /// Number of iterations performed
    pub iterations: usize,
    /// True if weights stabilized before the iteration cap
    pub converged: bool,
}

impl RobustSolution {
    /// Returns indexes of observations whose residual still
    /// exceeds huber * sigma0 after convergence.
    pub fn outliers(&self, huber: f64) -> Vec<usize> {
        let threshold = huber * self.sigma0;
        self.residuals
            .iter()
            .enumerate()
            .filter_map(|(i, e)| if e.abs() > threshold { Some(i) } else { None })
            .collect()
    }
}

/// [RobustEstimator] solves l = A x + e with Huber weighting,
/// iterating until weights stabilize or the iteration cap is reached.
/// Each observation row is scaled by its weight: a downweighted residual
/// behaves as if its standard deviation was inflated by (|e| / (huber * sigma0))^power.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RobustEstimator {
    /// Residuals above huber * sigma0 are downweighted
    pub huber: f64,
    /// Downweighting exponent
    pub huber_power: f64,
    /// Iteration cap
    pub max_iterations: usize,
    /// Lower bound of sigma0, prevents noise free data
    /// from being entirely downweighted
    pub sigma_floor: f64,
}

impl RobustEstimator {
    /// Creates a new [RobustEstimator]
    pub fn new(huber: f64, huber_power: f64, max_iterations: usize, sigma_floor: f64) -> Self {
        Self {
            huber,
            huber_power,
            max_iterations: max_iterations.max(1),
            sigma_floor,
        }
    }

    /// Solves the robust least squares problem.
    /// ## Input
    /// - a: design matrix (may have zero columns, in which case
    /// only the noise level is estimated)
    /// - l: reduced observations
    pub fn solve(&self, a: &DMatrix<f64>, l: &DVector<f64>) -> Result<RobustSolution, RobustError> {
        let (n, m) = a.shape();
        if n != l.len() {
            return Err(RobustError::DimensionMismatch);
        }
        if n == 0 || n < m {
            return Err(RobustError::NotEnoughObservations);
        }

        let mut weights = DVector::from_element(n, 1.0_f64);
        let mut x = DVector::zeros(m);
        let mut residuals = l.clone();
        let mut sigma0 = self.sigma_floor;
        let mut converged = false;
        let mut iterations = 0;

        while iterations < self.max_iterations {
            iterations += 1;

            if m > 0 {
                let aw = DMatrix::from_fn(n, m, |i, j| a[(i, j)] * weights[i]);
                let lw = l.component_mul(&weights);

                let normal = aw.transpose() * &aw;
                let rhs = aw.transpose() * lw;

                x = normal
                    .cholesky()
                    .ok_or(RobustError::SingularNormalEquations)?
                    .solve(&rhs);

                if x.iter().any(|x| !x.is_finite()) {
                    return Err(RobustError::SingularNormalEquations);
                }

                residuals = l - a * &x;
            }

            let redundancy = n - m;
            sigma0 = if redundancy > 0 {
                let sum = residuals
                    .iter()
                    .zip(weights.iter())
                    .map(|(e, w)| (w * e).powi(2))
                    .sum::<f64>();
                (sum / redundancy as f64).sqrt()
            } else {
                0.0
            };
            sigma0 = sigma0.max(self.sigma_floor);

            let new_weights =
                residuals.map(|e| huber_weight(e, sigma0, self.huber, self.huber_power));

            let variation = (&new_weights - &weights).amax();
            weights = new_weights;

            if variation < WEIGHTS_CONVERGENCE {
                converged = true;
                break;
            }
        }

        trace!(
            "robust lsq: n={} m={} sigma0={:.3E} iter={} converged={}",
            n,
            m,
            sigma0,
            iterations,
            converged
        );

        Ok(RobustSolution {
            x,
            residuals,
            weights,
            sigma0,
            iterations,
            converged,
        })
    }
}
