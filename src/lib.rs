//! Tabular AutoML - regression model selection for tabular price data
//!
//! This crate takes a CSV table to a served prediction:
//! - Data conditioning, outlier masking, scaling, encoding
//! - A fixed catalogue of five regressors trained and compared on a seeded split
//! - Persistence of the winning model with its scaler and encoding
//! - Schema-checked inference against the persisted artifact
//!
//! # Modules
//!
//! ## Core ML Modules
//! - [`preprocessing`] - Conditioning, outliers, projection, scaling
//! - [`training`] - Regressors, training engine, evaluation
//! - [`inference`] - Prediction from the persisted artifact
//!
//! ## Infrastructure
//! - [`export`] - Artifact format and the model registry
//! - [`cache`] - Session-scoped memo of the last training run
//! - [`pipeline`] - The session orchestrating the whole flow
//!
//! ## Services
//! - [`cli`] - Command-line interface

// Core error handling
pub mod error;

// Core ML modules
pub mod preprocessing;
pub mod training;
pub mod inference;

// Infrastructure
pub mod export;
pub mod cache;
pub mod pipeline;

// Services
pub mod cli;

pub use error::{AutomlError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{AutomlError, Result};

    // Preprocessing
    pub use crate::preprocessing::{
        load_csv, ConditionedTable, ConditioningConfig, DataConditioner, OutlierDetector,
        RawTable, ScalerState, StandardScaler,
    };

    // Training
    pub use crate::training::{
        ModelEvaluator, ModelKind, PerformanceRecord, TargetTransform, TrainEngine, TrainingConfig,
    };

    // Inference
    pub use crate::inference::{FeatureValue, InferenceService};

    // Export
    pub use crate::export::{FileModelRegistry, InMemoryModelRegistry, ModelArtifact, ModelRegistry};

    // Pipeline
    pub use crate::pipeline::{PipelineConfig, Selection, Session, TrainingReport};
}
