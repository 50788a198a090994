//! Model scoring and winner selection

use super::config::{ModelKind, TargetTransform};
use super::engine::{EnsembleOutcome, ModelFailure};
use crate::error::{AutomlError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Test-split metrics for one model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceRecord {
    /// Mean squared error
    pub mse: f64,
    /// Coefficient of determination
    pub r2: f64,
    /// Mean absolute error
    pub mae: f64,
}

impl PerformanceRecord {
    /// Score predictions against the truth
    pub fn compute(y_true: &Array1<f64>, y_pred: &Array1<f64>) -> Result<Self> {
        if y_true.len() != y_pred.len() {
            return Err(AutomlError::ShapeError {
                expected: format!("{} predictions", y_true.len()),
                actual: format!("{} predictions", y_pred.len()),
            });
        }
        if y_true.is_empty() {
            return Err(AutomlError::DataError("cannot score an empty test set".to_string()));
        }

        let n = y_true.len() as f64;
        let errors = y_pred - y_true;
        let ss_res = errors.mapv(|e| e * e).sum();
        let mse = ss_res / n;
        let mae = errors.mapv(f64::abs).sum() / n;

        let y_mean = y_true.sum() / n;
        let ss_tot = y_true.mapv(|y| (y - y_mean).powi(2)).sum();
        // A constant target has no variance to explain
        let r2 = if ss_tot > 0.0 {
            1.0 - ss_res / ss_tot
        } else if ss_res == 0.0 {
            1.0
        } else {
            0.0
        };

        Ok(Self { mse, r2, mae })
    }
}

/// Records for every trained model, iterated in catalogue order
pub type Performance = BTreeMap<ModelKind, PerformanceRecord>;

/// Scores of the models that could be evaluated, and the ones that could not
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    pub performance: Performance,
    pub failures: Vec<ModelFailure>,
}

/// Scores an ensemble on the held-out split
#[derive(Debug, Clone, Copy, Default)]
pub struct ModelEvaluator {
    target_transform: TargetTransform,
}

impl ModelEvaluator {
    pub fn new(target_transform: TargetTransform) -> Self {
        Self { target_transform }
    }

    /// Score every trained model on `x_test`.
    ///
    /// `y_test` is in original target units; predictions are mapped back
    /// through the target transform before scoring. A model whose prediction
    /// fails is recorded in `failures` and left out of the scores.
    pub fn evaluate(
        &self,
        outcome: &EnsembleOutcome,
        x_test: &Array2<f64>,
        y_test: &Array1<f64>,
    ) -> Result<Evaluation> {
        if y_test.is_empty() {
            return Err(AutomlError::DataError("cannot score an empty test set".to_string()));
        }

        let mut evaluation = Evaluation::default();
        for (&kind, candidate) in &outcome.models {
            let scored = candidate.model.predict(x_test).and_then(|raw| {
                let y_pred = self.target_transform.inverse_array(&raw);
                PerformanceRecord::compute(y_test, &y_pred)
            });
            match scored {
                Ok(record) => {
                    info!(model = %kind, mse = record.mse, r2 = record.r2, mae = record.mae, "evaluated");
                    evaluation.performance.insert(kind, record);
                }
                Err(e) => {
                    warn!(model = %kind, error = %e, "model failed to predict on the test split");
                    evaluation.failures.push(ModelFailure {
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(evaluation)
    }

    /// Lowest MSE wins; on a tie the earlier catalogue entry is kept.
    /// NaN never wins.
    pub fn select_best(performance: &Performance) -> Result<ModelKind> {
        let mut best: Option<(ModelKind, f64)> = None;
        for (&kind, record) in performance {
            if record.mse.is_nan() {
                continue;
            }
            match best {
                Some((_, mse)) if record.mse >= mse => {}
                _ => best = Some((kind, record.mse)),
            }
        }
        best.map(|(kind, _)| kind).ok_or(AutomlError::NoTrainedModels)
    }
}
