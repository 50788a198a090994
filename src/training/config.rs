//! Training configuration and the model catalogue

use crate::error::{AutomlError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Candidate regressors, in catalogue order.
///
/// The derived `Ord` follows declaration order, so ordered maps keyed by
/// `ModelKind` iterate in catalogue order and ties resolve to the earlier kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ModelKind {
    LinearRegression,
    DecisionTree,
    RandomForest,
    KNN,
    SVM,
}

impl ModelKind {
    /// Full catalogue in order
    pub const ALL: [ModelKind; 5] = [
        ModelKind::LinearRegression,
        ModelKind::DecisionTree,
        ModelKind::RandomForest,
        ModelKind::KNN,
        ModelKind::SVM,
    ];

    /// Human-readable name used in reports
    pub fn display_name(&self) -> &'static str {
        match self {
            ModelKind::LinearRegression => "Linear Regression",
            ModelKind::DecisionTree => "Decision Tree Regressor",
            ModelKind::RandomForest => "Random Forest Regressor",
            ModelKind::KNN => "KNN Regressor",
            ModelKind::SVM => "SVM Regressor",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ModelKind {
    type Err = AutomlError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "linear" | "linear_regression" => Ok(ModelKind::LinearRegression),
            "tree" | "decision_tree" | "decision_tree_regressor" => Ok(ModelKind::DecisionTree),
            "forest" | "random_forest" | "random_forest_regressor" => Ok(ModelKind::RandomForest),
            "knn" | "knn_regressor" => Ok(ModelKind::KNN),
            "svm" | "svr" | "svm_regressor" => Ok(ModelKind::SVM),
            _ => Err(AutomlError::InvalidParameter {
                name: "model".to_string(),
                value: s.to_string(),
                reason: "unknown model kind".to_string(),
            }),
        }
    }
}

/// Representation of the target during training
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TargetTransform {
    /// Train on the raw target
    #[default]
    Identity,
    /// Train on `ln(1 + y)`, map predictions back with `exp(p) - 1`
    Log1p,
}

impl TargetTransform {
    /// Map target values into training space
    pub fn forward(&self, y: &Array1<f64>) -> Result<Array1<f64>> {
        match self {
            TargetTransform::Identity => Ok(y.clone()),
            TargetTransform::Log1p => {
                if let Some(bad) = y.iter().find(|&&v| v <= -1.0) {
                    return Err(AutomlError::DataError(format!(
                        "log1p target transform needs values above -1, found {}",
                        bad
                    )));
                }
                Ok(y.mapv(f64::ln_1p))
            }
        }
    }

    /// Map one prediction back to target units
    pub fn inverse(&self, v: f64) -> f64 {
        match self {
            TargetTransform::Identity => v,
            TargetTransform::Log1p => v.exp_m1(),
        }
    }

    pub fn inverse_array(&self, v: &Array1<f64>) -> Array1<f64> {
        match self {
            TargetTransform::Identity => v.clone(),
            TargetTransform::Log1p => v.mapv(f64::exp_m1),
        }
    }
}

/// Configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Held-out fraction, within [0.1, 0.5]
    pub test_size: f64,
    /// Seed for the split and every seeded model
    pub random_state: u64,
    pub target_transform: TargetTransform,
    /// Soft limit checked between models
    pub time_budget_secs: Option<f64>,
    /// Models to train, in catalogue order
    pub models: Vec<ModelKind>,

    // Model hyperparameters
    pub n_estimators: usize,
    pub max_depth: Option<usize>,
    pub n_neighbors: usize,
    pub svm_c: f64,
    pub svm_epsilon: f64,
    pub svm_tol: f64,
    pub svm_max_iter: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            target_transform: TargetTransform::Identity,
            time_budget_secs: None,
            models: ModelKind::ALL.to_vec(),
            n_estimators: 100,
            max_depth: None,
            n_neighbors: 5,
            svm_c: 1.0,
            svm_epsilon: 0.1,
            svm_tol: 1e-3,
            svm_max_iter: 1000,
        }
    }
}

impl TrainingConfig {
    pub const MIN_TEST_SIZE: f64 = 0.1;
    pub const MAX_TEST_SIZE: f64 = 0.5;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_test_size(mut self, test_size: f64) -> Self {
        self.test_size = test_size;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    pub fn with_target_transform(mut self, transform: TargetTransform) -> Self {
        self.target_transform = transform;
        self
    }

    pub fn with_time_budget(mut self, secs: f64) -> Self {
        self.time_budget_secs = Some(secs);
        self
    }

    /// Restrict the catalogue. Order is normalized to catalogue order.
    pub fn with_models(mut self, mut models: Vec<ModelKind>) -> Self {
        models.sort();
        models.dedup();
        self.models = models;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    /// Check every setting is usable
    pub fn validate(&self) -> Result<()> {
        validate_test_size(self.test_size)?;
        if self.models.is_empty() {
            return Err(AutomlError::ConfigError("no models selected".to_string()));
        }
        if self.n_estimators == 0 {
            return Err(AutomlError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.n_neighbors == 0 {
            return Err(AutomlError::InvalidParameter {
                name: "n_neighbors".to_string(),
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if !(self.svm_c > 0.0) || self.svm_epsilon < 0.0 || !(self.svm_tol > 0.0) {
            return Err(AutomlError::ConfigError(format!(
                "invalid SVR settings: C={}, epsilon={}, tol={}",
                self.svm_c, self.svm_epsilon, self.svm_tol
            )));
        }
        if let Some(budget) = self.time_budget_secs {
            if !(budget > 0.0) {
                return Err(AutomlError::InvalidParameter {
                    name: "time_budget_secs".to_string(),
                    value: budget.to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Split ratio must lie in [0.1, 0.5]
pub fn validate_test_size(test_size: f64) -> Result<()> {
    if !(TrainingConfig::MIN_TEST_SIZE..=TrainingConfig::MAX_TEST_SIZE).contains(&test_size) {
        return Err(AutomlError::InvalidParameter {
            name: "test_size".to_string(),
            value: test_size.to_string(),
            reason: format!(
                "must be between {} and {}",
                TrainingConfig::MIN_TEST_SIZE,
                TrainingConfig::MAX_TEST_SIZE
            ),
        });
    }
    Ok(())
}
