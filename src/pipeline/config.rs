//! Pipeline configuration

use crate::error::{AutomlError, Result};
use crate::export::DEFAULT_ARTIFACT_PATH;
use crate::preprocessing::ConditioningConfig;
use crate::training::TrainingConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where the shared artifact slot lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub artifact_path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
        }
    }
}

/// Complete configuration of a session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub conditioning: ConditioningConfig,
    pub training: TrainingConfig,
    pub registry: RegistryConfig,
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conditioning(mut self, conditioning: ConditioningConfig) -> Self {
        self.conditioning = conditioning;
        self
    }

    pub fn with_training(mut self, training: TrainingConfig) -> Self {
        self.training = training;
        self
    }

    pub fn with_artifact_path(mut self, path: impl AsRef<Path>) -> Self {
        self.registry.artifact_path = path.as_ref().to_path_buf();
        self
    }

    /// Read a JSON config; missing fields take their defaults
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            AutomlError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| AutomlError::ConfigError(format!("invalid config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        let factor = self.conditioning.iqr_factor;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(AutomlError::ConfigError(format!(
                "iqr_factor must be positive, got {}",
                factor
            )));
        }
        if !self.conditioning.fill_value.is_finite() {
            return Err(AutomlError::ConfigError("fill_value must be finite".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::training::TargetTransform;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.registry.artifact_path, PathBuf::from("best_model.bin"));
        assert_eq!(config.training.test_size, 0.2);
        assert_eq!(config.conditioning.rating_column.as_deref(), Some("rate"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config = PipelineConfig::from_json(
            r#"{ "training": { "random_state": 7, "target_transform": "Log1p" } }"#,
        )
        .unwrap();
        assert_eq!(config.training.random_state, 7);
        assert_eq!(config.training.target_transform, TargetTransform::Log1p);
        assert_eq!(config.training.n_estimators, 100);
        assert_eq!(config.conditioning.percent_columns, vec!["sale".to_string()]);
    }

    #[test]
    fn test_json_round_trip() {
        let config = PipelineConfig::new().with_artifact_path("out/model.bin");
        let restored = PipelineConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(restored.registry.artifact_path, PathBuf::from("out/model.bin"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(PipelineConfig::from_json(r#"{ "training": { "test_size": 0.9 } }"#).is_err());
        assert!(PipelineConfig::from_json(r#"{ "conditioning": { "iqr_factor": -1 } }"#).is_err());
        assert!(matches!(
            PipelineConfig::from_json("not json"),
            Err(AutomlError::ConfigError(_))
        ));
    }
}
