//! Model training module
//!
//! Provides the fixed regression catalogue and the machinery around it:
//! - Linear regression (OLS with intercept)
//! - CART regression tree
//! - Random Forest
//! - K-Nearest Neighbors
//! - Epsilon support vector regression
//! - The training engine with per-model failure isolation
//! - Test-split evaluation and winner selection

mod config;
mod engine;
mod evaluator;
mod models;
pub mod decision_tree;
pub mod knn;
pub mod linear_models;
pub mod random_forest;
pub mod svm;

pub use config::{validate_test_size, ModelKind, TargetTransform, TrainingConfig};
pub use decision_tree::{DecisionTreeRegressor, TreeNode};
pub use engine::{
    CancelToken, EnsembleOutcome, FittedCandidate, ModelFailure, TrainEngine, TrainedModel,
};
pub use evaluator::{Evaluation, ModelEvaluator, Performance, PerformanceRecord};
pub use knn::{KNNConfig, KNNRegressor};
pub use linear_models::LinearRegression;
pub use models::Model;
pub use random_forest::RandomForestRegressor;
pub use svm::{SVMConfig, SVMRegressor};
