//! Persisted model bundle and its on-disk envelope
//!
//! An artifact carries everything inference needs: the fitted model, the
//! scaler it was trained behind, the categorical encoding of its inputs and
//! the target transform. It is written as a bincode payload wrapped in a
//! small envelope (magic, format version, xxh3 checksum) so that a truncated
//! or foreign file is reported as corrupt instead of deserializing garbage.

use crate::error::{AutomlError, Result};
use crate::preprocessing::{CategoryEncoding, ScalerState};
use crate::training::{ModelKind, PerformanceRecord, TargetTransform, TrainedModel};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xxhash_rust::xxh3::xxh3_64;

/// Descriptive information stored next to the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    pub model_kind: ModelKind,
    /// Human-readable model name
    pub model_name: String,
    /// Predictor names in fitted order
    pub feature_names: Vec<String>,
    pub target_name: String,
    pub trained_at: DateTime<Utc>,
    /// Test-split metrics the model was selected with
    pub performance: Option<PerformanceRecord>,
    /// Rows used for the final fit
    pub n_train_rows: usize,
    pub crate_version: String,
}

impl ArtifactMetadata {
    pub fn new(model_kind: ModelKind, target_name: impl Into<String>) -> Self {
        Self {
            model_kind,
            model_name: model_kind.display_name().to_string(),
            feature_names: Vec::new(),
            target_name: target_name.into(),
            trained_at: Utc::now(),
            performance: None,
            n_train_rows: 0,
            crate_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_names = features;
        self
    }

    pub fn with_performance(mut self, record: PerformanceRecord) -> Self {
        self.performance = Some(record);
        self
    }

    pub fn with_train_rows(mut self, n: usize) -> Self {
        self.n_train_rows = n;
        self
    }
}

/// The persisted (model, scaler, encoding) bundle
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub metadata: ArtifactMetadata,
    pub model: TrainedModel,
    pub scaler: ScalerState,
    /// Encoding of the categorical predictors only
    pub encoding: CategoryEncoding,
    pub target_transform: TargetTransform,
}

impl ModelArtifact {
    pub fn new(
        metadata: ArtifactMetadata,
        model: TrainedModel,
        scaler: ScalerState,
        encoding: CategoryEncoding,
        target_transform: TargetTransform,
    ) -> Result<Self> {
        if model.kind() != metadata.model_kind {
            return Err(AutomlError::DataError(format!(
                "metadata describes {} but the model is {}",
                metadata.model_kind,
                model.kind()
            )));
        }
        if scaler.feature_names() != metadata.feature_names.as_slice() {
            return Err(AutomlError::SchemaMismatch {
                expected: metadata.feature_names.clone(),
                actual: scaler.feature_names().to_vec(),
            });
        }
        if !model.is_fitted() {
            return Err(AutomlError::ModelNotFitted);
        }
        Ok(Self {
            metadata,
            model,
            scaler,
            encoding,
            target_transform,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        self.scaler.feature_names()
    }

    /// Serialize into the checksummed envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let payload = bincode::serialize(self)?;
        let envelope = Envelope::new(payload);
        Ok(bincode::serialize(&envelope)?)
    }

    /// Parse an envelope written by [`ModelArtifact::to_bytes`]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: Envelope = bincode::deserialize(bytes)
            .map_err(|e| AutomlError::CorruptArtifact(format!("unreadable envelope: {}", e)))?;
        envelope.verify()?;
        bincode::deserialize(&envelope.payload)
            .map_err(|e| AutomlError::CorruptArtifact(format!("unreadable payload: {}", e)))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    magic: [u8; 4],
    format_version: u32,
    checksum: u64,
    payload: Vec<u8>,
}

impl Envelope {
    const MAGIC: [u8; 4] = *b"TAML";
    const VERSION: u32 = 1;

    fn new(payload: Vec<u8>) -> Self {
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            checksum: xxh3_64(&payload),
            payload,
        }
    }

    fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(AutomlError::CorruptArtifact(format!(
                "bad magic {:?}",
                self.magic
            )));
        }
        if self.format_version != Self::VERSION {
            return Err(AutomlError::CorruptArtifact(format!(
                "unsupported format version {} (expected {})",
                self.format_version,
                Self::VERSION
            )));
        }
        if xxh3_64(&self.payload) != self.checksum {
            return Err(AutomlError::CorruptArtifact("checksum mismatch".to_string()));
        }
        Ok(())
    }
}
