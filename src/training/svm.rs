//! Epsilon support vector regression
//!
//! The dual is solved by coordinate descent with the bias folded into the
//! kernel (`K'(a, b) = K(a, b) + 1`), which removes the equality constraint
//! and leaves a box-constrained problem:
//!
//! `min ½ βᵀK'β - yᵀβ + ε‖β‖₁` subject to `-C ≤ βᵢ ≤ C`.
//!
//! Each coordinate step has a closed form (soft threshold, then clip).

use super::models::{check_prediction_input, check_training_input, Model};
use crate::error::{AutomlError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum number of samples for eager kernel matrix computation.
/// Beyond this, training will return an error to prevent OOM.
const MAX_KERNEL_MATRIX_SAMPLES: usize = 10_000;

/// Coefficients smaller than this are not kept as support vectors
const SUPPORT_THRESHOLD: f64 = 1e-12;

/// SVR configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMConfig {
    /// Regularization parameter (C)
    pub c: f64,
    /// RBF width; `None` picks γ = 1 / (n_features · Var(X))
    pub gamma: Option<f64>,
    /// Largest coefficient change in a sweep that counts as converged
    pub tol: f64,
    /// Maximum number of sweeps
    pub max_iter: usize,
    /// Epsilon for regression (SVR tube width)
    pub epsilon: f64,
}

impl Default for SVMConfig {
    fn default() -> Self {
        Self {
            c: 1.0,
            gamma: None,
            tol: 1e-3,
            max_iter: 1000,
            epsilon: 0.1,
        }
    }
}

/// Support Vector Regressor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SVMRegressor {
    config: SVMConfig,
    /// Resolved RBF width
    gamma: f64,
    support_vectors: Option<Array2<f64>>,
    /// Dual coefficients of the support vectors
    coefficients: Option<Array1<f64>>,
    n_iter: usize,
}

impl Default for SVMRegressor {
    fn default() -> Self {
        Self::new(SVMConfig::default())
    }
}

impl SVMRegressor {
    /// Create a new SVM regressor
    pub fn new(config: SVMConfig) -> Self {
        Self {
            config,
            gamma: 0.0,
            support_vectors: None,
            coefficients: None,
            n_iter: 0,
        }
    }

    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_input(x, y)?;
        let n = x.nrows();
        if n > MAX_KERNEL_MATRIX_SAMPLES {
            return Err(AutomlError::TrainingError(format!(
                "Dataset has {} samples, exceeding the maximum {} for the SVR kernel matrix",
                n, MAX_KERNEL_MATRIX_SAMPLES
            )));
        }
        let SVMConfig {
            c, tol, max_iter, epsilon, ..
        } = self.config.clone();
        if !(c > 0.0) || epsilon < 0.0 {
            return Err(AutomlError::InvalidParameter {
                name: "c/epsilon".to_string(),
                value: format!("{}/{}", c, epsilon),
                reason: "C must be positive and epsilon non-negative".to_string(),
            });
        }

        self.gamma = match self.config.gamma {
            Some(g) => g,
            None => {
                let var = x.var(0.0);
                if var > 0.0 {
                    1.0 / (x.ncols() as f64 * var)
                } else {
                    1.0
                }
            }
        };

        let kernel = self.compute_kernel_matrix(x);
        let mut beta = Array1::<f64>::zeros(n);
        // gradient of the smooth part: K'β - y
        let mut grad = -y.clone();

        let mut sweeps = 0;
        for _ in 0..max_iter {
            sweeps += 1;
            let mut max_change: f64 = 0.0;
            for i in 0..n {
                let k_ii = kernel[[i, i]];
                if k_ii <= 0.0 {
                    continue;
                }
                let old = beta[i];
                let z = old - grad[i] / k_ii;
                let shrink = epsilon / k_ii;
                let new = soft_threshold(z, shrink).clamp(-c, c);
                let delta = new - old;
                if delta != 0.0 {
                    beta[i] = new;
                    grad.scaled_add(delta, &kernel.column(i));
                    max_change = max_change.max(delta.abs());
                }
            }
            if max_change < tol {
                break;
            }
        }
        self.n_iter = sweeps;

        let support: Vec<usize> = (0..n).filter(|&i| beta[i].abs() > SUPPORT_THRESHOLD).collect();
        debug!(sweeps, support_vectors = support.len(), gamma = self.gamma, "SVR converged");

        self.support_vectors = Some(x.select(Axis(0), &support));
        self.coefficients = Some(beta.select(Axis(0), &support));
        Ok(())
    }

    fn compute_kernel_matrix(&self, x: &Array2<f64>) -> Array2<f64> {
        let n = x.nrows();
        let mut k = Array2::zeros((n, n));
        k.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(i, mut row)| {
                let xi = x.row(i);
                for (j, cell) in row.iter_mut().enumerate() {
                    *cell = self.kernel(xi, x.row(j)) + 1.0;
                }
            });
        k
    }

    fn kernel(&self, a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
        let norm_sq: f64 = a.iter().zip(b.iter()).map(|(p, q)| (p - q) * (p - q)).sum();
        (-self.gamma * norm_sq).exp()
    }

    /// Predict target values
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (Some(sv), Some(coef)) = (self.support_vectors.as_ref(), self.coefficients.as_ref()) else {
            return Err(AutomlError::ModelNotFitted);
        };
        check_prediction_input(x, sv.ncols())?;

        let predictions: Vec<f64> = (0..x.nrows())
            .into_par_iter()
            .map(|i| {
                let sample = x.row(i);
                sv.rows()
                    .into_iter()
                    .zip(coef.iter())
                    .map(|(s, &b)| b * (self.kernel(sample, s) + 1.0))
                    .sum()
            })
            .collect();

        Ok(Array1::from_vec(predictions))
    }

    /// Get number of support vectors
    pub fn n_support_vectors(&self) -> usize {
        self.support_vectors.as_ref().map(|sv| sv.nrows()).unwrap_or(0)
    }

    /// Sweeps used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

fn soft_threshold(z: f64, t: f64) -> f64 {
    if z > t {
        z - t
    } else if z < -t {
        z + t
    } else {
        0.0
    }
}

impl Model for SVMRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        SVMRegressor::fit(self, x, y)
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        SVMRegressor::predict(self, x)
    }

    fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((20, 1), |(i, _)| -1.0 + i as f64 * 0.1);
        let y = x.column(0).mapv(|v| 0.5 * v);
        (x, y)
    }

    #[test]
    fn test_kernel_matrix_is_symmetric_with_unit_bias() {
        let (x, _) = line();
        let mut svr = SVMRegressor::new(SVMConfig {
            gamma: Some(0.5),
            ..Default::default()
        });
        svr.gamma = 0.5;
        let k = svr.compute_kernel_matrix(&x);
        assert_eq!(k.dim(), (20, 20));
        for i in 0..20 {
            assert!((k[[i, i]] - 2.0).abs() < 1e-12);
            for j in 0..20 {
                assert_eq!(k[[i, j]], k[[j, i]]);
            }
        }
        let d = 0.1f64;
        assert!((k[[0, 1]] - ((-0.5 * d * d).exp() + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_svm_regressor_rbf_defaults() {
        let (x, y) = line();
        let mut svr = SVMRegressor::default();
        svr.fit(&x, &y).unwrap();

        let var = x.var(0.0);
        assert!((svr.gamma() - 1.0 / var).abs() < 1e-12);

        let predictions = svr.predict(&x).unwrap();
        let mse = (&predictions - &y).mapv(|v| v * v).mean().unwrap();
        assert!(mse < 0.05, "MSE too high: {}", mse);
    }

    #[test]
    fn test_wide_tube_gives_no_support_vectors() {
        let (x, y) = line();
        let mut svr = SVMRegressor::new(SVMConfig {
            epsilon: 10.0,
            ..Default::default()
        });
        svr.fit(&x, &y).unwrap();
        assert_eq!(svr.n_support_vectors(), 0);
        assert!(svr.predict(&x).unwrap().iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_soft_threshold() {
        assert_eq!(soft_threshold(2.0, 0.5), 1.5);
        assert_eq!(soft_threshold(-2.0, 0.5), -1.5);
        assert_eq!(soft_threshold(0.3, 0.5), 0.0);
    }
}
