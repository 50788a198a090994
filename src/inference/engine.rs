//! Inference service implementation
//!
//! Every request reads the artifact from the registry, so a model saved by
//! another session is picked up on the next call without restarting. Inputs
//! are scaled with the persisted scaler and predictions are mapped back
//! through the persisted target transform. Nothing is ever refit here.

use crate::error::{AutomlError, Result};
use crate::export::{ArtifactMetadata, ModelArtifact, ModelRegistry};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// One inference input cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    /// Category label, encoded through the persisted encoding
    Category(String),
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Number(v)
    }
}

impl From<&str> for FeatureValue {
    fn from(v: &str) -> Self {
        FeatureValue::Category(v.to_string())
    }
}

impl FromStr for FeatureValue {
    type Err = std::convert::Infallible;

    /// Finite numbers (a trailing `%` is allowed) parse as `Number`, anything
    /// else, `nan` and `inf` included, is a label
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        let numeric = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
        Ok(match numeric.parse::<f64>() {
            Ok(v) if v.is_finite() => FeatureValue::Number(v),
            _ => FeatureValue::Category(trimmed.to_string()),
        })
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Number(v) => write!(f, "{}", v),
            FeatureValue::Category(s) => write!(f, "{}", s),
        }
    }
}

/// A prediction together with the metadata of the artifact that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prediction {
    pub value: f64,
    pub metadata: ArtifactMetadata,
}

/// Request counters snapshot
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct InferenceStats {
    pub total_predictions: u64,
    pub error_count: u64,
    pub avg_latency_ms: f64,
}

/// Serves predictions from whatever artifact the registry currently holds
pub struct InferenceService {
    registry: Arc<dyn ModelRegistry>,
    total: AtomicU64,
    errors: AtomicU64,
    latency_us: AtomicU64,
}

impl fmt::Debug for InferenceService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InferenceService")
            .field("location", &self.registry.location())
            .field("stats", &self.stats())
            .finish()
    }
}

impl InferenceService {
    pub fn new(registry: Arc<dyn ModelRegistry>) -> Self {
        Self {
            registry,
            total: AtomicU64::new(0),
            errors: AtomicU64::new(0),
            latency_us: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &Arc<dyn ModelRegistry> {
        &self.registry
    }

    /// Predict from numeric inputs keyed by feature name.
    ///
    /// The key set must equal the fitted feature names (any order).
    pub fn predict(&self, features: &HashMap<String, f64>) -> Result<f64> {
        self.track(|| {
            let artifact = self.registry.load()?;
            predict_with(&artifact, features)
        })
    }

    /// Predict from mixed numeric / category-label inputs
    pub fn predict_values(&self, features: &HashMap<String, FeatureValue>) -> Result<f64> {
        self.track(|| {
            let artifact = self.registry.load()?;
            let numeric = encode_values(&artifact, features)?;
            predict_with(&artifact, &numeric)
        })
    }

    /// Like [`predict_values`](Self::predict_values), but also returns the
    /// metadata of the artifact read for this request
    pub fn predict_detailed(&self, features: &HashMap<String, FeatureValue>) -> Result<Prediction> {
        self.track(|| {
            let artifact = self.registry.load()?;
            let numeric = encode_values(&artifact, features)?;
            let value = predict_with(&artifact, &numeric)?;
            Ok(Prediction {
                value,
                metadata: artifact.metadata,
            })
        })
    }

    /// Predict several rows against one read of the artifact
    pub fn predict_batch(&self, rows: &[HashMap<String, FeatureValue>]) -> Result<Vec<f64>> {
        self.track(|| {
            let artifact = self.registry.load()?;
            let n = artifact.feature_names().len();
            let mut x = Array2::zeros((rows.len(), n));
            for (i, row) in rows.iter().enumerate() {
                let numeric = encode_values(&artifact, row)?;
                let scaled = artifact.scaler.transform_row(&numeric)?;
                x.row_mut(i).assign(&scaled.row(0));
            }
            let raw = artifact.model.predict(&x)?;
            Ok(artifact.target_transform.inverse_array(&raw).to_vec())
        })
    }

    /// Metadata of the currently stored artifact
    pub fn artifact(&self) -> Result<ModelArtifact> {
        self.registry.load()
    }

    pub fn stats(&self) -> InferenceStats {
        let total = self.total.load(Ordering::Relaxed);
        let latency_us = self.latency_us.load(Ordering::Relaxed);
        InferenceStats {
            total_predictions: total,
            error_count: self.errors.load(Ordering::Relaxed),
            avg_latency_ms: if total > 0 {
                latency_us as f64 / total as f64 / 1000.0
            } else {
                0.0
            },
        }
    }

    fn track<T>(&self, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = f();
        self.total.fetch_add(1, Ordering::Relaxed);
        self.latency_us
            .fetch_add(start.elapsed().as_micros() as u64, Ordering::Relaxed);
        if result.is_err() {
            self.errors.fetch_add(1, Ordering::Relaxed);
        }
        result
    }
}

fn predict_with(artifact: &ModelArtifact, features: &HashMap<String, f64>) -> Result<f64> {
    let x = artifact.scaler.transform_row(features)?;
    let raw = artifact.model.predict(&x)?;
    let prediction = artifact.target_transform.inverse(raw[0]);
    debug!(model = %artifact.metadata.model_kind, prediction, "prediction served");
    Ok(prediction)
}

/// Turn labels into their persisted ids after checking the key set
fn encode_values(
    artifact: &ModelArtifact,
    features: &HashMap<String, FeatureValue>,
) -> Result<HashMap<String, f64>> {
    let expected: BTreeSet<&str> = artifact.feature_names().iter().map(|s| s.as_str()).collect();
    let actual: BTreeSet<&str> = features.keys().map(|s| s.as_str()).collect();
    if expected != actual {
        return Err(AutomlError::SchemaMismatch {
            expected: artifact.feature_names().to_vec(),
            actual: actual.into_iter().map(String::from).collect(),
        });
    }

    features
        .iter()
        .map(|(name, value)| {
            let v = match value {
                FeatureValue::Number(v) => *v,
                FeatureValue::Category(label) if artifact.encoding.contains(name) => {
                    artifact.encoding.encode(name, label)? as f64
                }
                FeatureValue::Category(label) => {
                    return Err(AutomlError::InvalidParameter {
                        name: name.clone(),
                        value: label.clone(),
                        reason: "feature is numeric".to_string(),
                    })
                }
            };
            Ok((name.clone(), v))
        })
        .collect()
}
