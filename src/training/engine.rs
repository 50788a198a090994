//! Training engine implementation
//!
//! Fits every configured catalogue model on the same scaled training split.
//! Models run one after another in catalogue order; each may use rayon
//! internally. A model that fails is recorded and skipped, it never aborts
//! the others.

use super::config::{ModelKind, TrainingConfig};
use super::decision_tree::DecisionTreeRegressor;
use super::knn::{KNNConfig, KNNRegressor};
use super::linear_models::LinearRegression;
use super::models::Model;
use super::random_forest::RandomForestRegressor;
use super::svm::{SVMConfig, SVMRegressor};
use crate::error::{AutomlError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Enum to hold trained model variants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    LinearRegression(LinearRegression),
    DecisionTree(DecisionTreeRegressor),
    RandomForest(RandomForestRegressor),
    KNN(KNNRegressor),
    SVM(SVMRegressor),
}

impl TrainedModel {
    pub fn kind(&self) -> ModelKind {
        match self {
            TrainedModel::LinearRegression(_) => ModelKind::LinearRegression,
            TrainedModel::DecisionTree(_) => ModelKind::DecisionTree,
            TrainedModel::RandomForest(_) => ModelKind::RandomForest,
            TrainedModel::KNN(_) => ModelKind::KNN,
            TrainedModel::SVM(_) => ModelKind::SVM,
        }
    }

    fn as_model(&self) -> &dyn Model {
        match self {
            TrainedModel::LinearRegression(m) => m,
            TrainedModel::DecisionTree(m) => m,
            TrainedModel::RandomForest(m) => m,
            TrainedModel::KNN(m) => m,
            TrainedModel::SVM(m) => m,
        }
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.as_model().predict(x)
    }

    pub fn is_fitted(&self) -> bool {
        self.as_model().is_fitted()
    }
}

/// A model that could not be trained, and why
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelFailure {
    pub kind: ModelKind,
    pub reason: String,
}

/// A successfully fitted model
#[derive(Debug, Clone)]
pub struct FittedCandidate {
    pub model: TrainedModel,
    pub fit_secs: f64,
}

/// Everything one training run produced
#[derive(Debug, Clone, Default)]
pub struct EnsembleOutcome {
    pub models: BTreeMap<ModelKind, FittedCandidate>,
    pub failures: Vec<ModelFailure>,
}

impl EnsembleOutcome {
    pub fn model(&self, kind: ModelKind) -> Option<&TrainedModel> {
        self.models.get(&kind).map(|c| &c.model)
    }

    /// Trained kinds in catalogue order
    pub fn trained_kinds(&self) -> Vec<ModelKind> {
        self.models.keys().copied().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}

/// Cooperative cancellation flag, checked between models
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Main training engine
#[derive(Debug, Clone)]
pub struct TrainEngine {
    config: TrainingConfig,
    cancel: Option<CancelToken>,
}

impl TrainEngine {
    /// Create a new training engine
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            cancel: None,
        }
    }

    /// Observe `token` between models
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Fit every configured model on `x` / `y`.
    ///
    /// Returns `Cancelled` if the token fires; models not started before the
    /// time budget ran out are reported as failures.
    pub fn train_all(&self, x: &Array2<f64>, y: &Array1<f64>) -> Result<EnsembleOutcome> {
        let started = Instant::now();
        let mut outcome = EnsembleOutcome::default();

        for &kind in &self.config.models {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                info!(model = %kind, "training cancelled");
                return Err(AutomlError::Cancelled);
            }

            if let Some(budget) = self.config.time_budget_secs {
                let elapsed = started.elapsed().as_secs_f64();
                if elapsed >= budget {
                    warn!(model = %kind, elapsed, budget, "time budget exhausted, skipping");
                    outcome.failures.push(ModelFailure {
                        kind,
                        reason: format!("time budget of {}s exhausted", budget),
                    });
                    continue;
                }
            }

            let fit_start = Instant::now();
            match self.fit_one(kind, x, y) {
                Ok(model) => {
                    let fit_secs = fit_start.elapsed().as_secs_f64();
                    info!(model = %kind, fit_secs, "model fitted");
                    outcome.models.insert(kind, FittedCandidate { model, fit_secs });
                }
                Err(e) => {
                    warn!(model = %kind, error = %e, "model failed to train");
                    outcome.failures.push(ModelFailure {
                        kind,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(outcome)
    }

    /// Fit a single catalogue model with the configured hyperparameters
    pub fn fit_one(&self, kind: ModelKind, x: &Array2<f64>, y: &Array1<f64>) -> Result<TrainedModel> {
        let c = &self.config;
        let model = match kind {
            ModelKind::LinearRegression => {
                let mut m = LinearRegression::new();
                m.fit(x, y)?;
                TrainedModel::LinearRegression(m)
            }
            ModelKind::DecisionTree => {
                let mut m = DecisionTreeRegressor::new().with_max_depth(c.max_depth);
                m.fit(x, y)?;
                TrainedModel::DecisionTree(m)
            }
            ModelKind::RandomForest => {
                let mut m = RandomForestRegressor::new(c.n_estimators)
                    .with_max_depth(c.max_depth)
                    .with_random_state(c.random_state);
                m.fit(x, y)?;
                TrainedModel::RandomForest(m)
            }
            ModelKind::KNN => {
                let mut m = KNNRegressor::new(KNNConfig {
                    n_neighbors: c.n_neighbors,
                });
                m.fit(x, y)?;
                TrainedModel::KNN(m)
            }
            ModelKind::SVM => {
                let mut m = SVMRegressor::new(SVMConfig {
                    c: c.svm_c,
                    epsilon: c.svm_epsilon,
                    tol: c.svm_tol,
                    max_iter: c.svm_max_iter,
                    ..Default::default()
                });
                m.fit(x, y)?;
                TrainedModel::SVM(m)
            }
        };
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(n: usize) -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((n, 2), |(i, j)| ((i * 7 + j * 3) % 13) as f64 / 6.0 - 1.0);
        let y = x.column(0).mapv(|v| 2.0 * v) - x.column(1);
        (x, y)
    }

    #[test]
    fn test_train_all_fits_catalogue() {
        let (x, y) = data(40);
        let engine = TrainEngine::new(TrainingConfig::new().with_n_estimators(10));
        let outcome = engine.train_all(&x, &y).unwrap();

        assert_eq!(outcome.trained_kinds(), ModelKind::ALL.to_vec());
        assert!(outcome.failures.is_empty());
        for kind in ModelKind::ALL {
            let model = outcome.model(kind).unwrap();
            assert_eq!(model.kind(), kind);
            assert!(model.is_fitted());
            assert_eq!(model.predict(&x).unwrap().len(), 40);
        }
    }

    #[test]
    fn test_failure_is_isolated() {
        // 3 rows: KNN with k = 5 cannot fit, everything else can
        let (x, y) = data(3);
        let engine = TrainEngine::new(TrainingConfig::new().with_n_estimators(5));
        let outcome = engine.train_all(&x, &y).unwrap();

        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].kind, ModelKind::KNN);
        assert!(outcome.model(ModelKind::KNN).is_none());
        assert_eq!(outcome.models.len(), 4);
    }

    #[test]
    fn test_cancelled_before_start() {
        let (x, y) = data(20);
        let token = CancelToken::new();
        token.cancel();
        let engine = TrainEngine::new(TrainingConfig::default()).with_cancel_token(token);
        assert!(matches!(engine.train_all(&x, &y), Err(AutomlError::Cancelled)));
    }

    #[test]
    fn test_exhausted_budget_skips_models() {
        let (x, y) = data(20);
        let engine = TrainEngine::new(TrainingConfig::new().with_time_budget(1e-12));
        let outcome = engine.train_all(&x, &y).unwrap();

        // the first model may start before the clock ticks past the budget
        assert!(outcome.failures.len() >= 4);
        assert!(outcome.failures.iter().all(|f| f.reason.contains("budget")));
    }

    #[test]
    fn test_trained_model_serde() {
        let (x, y) = data(20);
        let engine = TrainEngine::new(TrainingConfig::default());
        let model = engine.fit_one(ModelKind::DecisionTree, &x, &y).unwrap();

        let bytes = bincode::serialize(&model).unwrap();
        let restored: TrainedModel = bincode::deserialize(&bytes).unwrap();
        assert_eq!(model.predict(&x).unwrap(), restored.predict(&x).unwrap());
    }
}
