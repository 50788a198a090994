//! Inference module
//!
//! Serves predictions from the persisted artifact:
//! - Schema-checked numeric and category-label inputs
//! - Batch prediction against a single artifact read
//! - Request counters

mod engine;

pub use engine::{FeatureValue, InferenceService, InferenceStats, Prediction};
