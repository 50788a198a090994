//! Durable storage for the single best-model slot

use super::artifact::ModelArtifact;
use crate::error::{AutomlError, Result};
use parking_lot::Mutex;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Default file name of the shared artifact slot
pub const DEFAULT_ARTIFACT_PATH: &str = "best_model.bin";

/// One overwritable artifact slot.
///
/// There is no locking or versioning: concurrent writers race and the last
/// `save` wins. Each individual `save` must be atomic, so a concurrent `load`
/// sees either the previous artifact or the new one, never a partial write.
pub trait ModelRegistry: Send + Sync {
    /// Replace whatever is stored with `artifact`
    fn save(&self, artifact: &ModelArtifact) -> Result<()>;

    /// Read the stored artifact; `ArtifactNotFound` if nothing was saved yet
    fn load(&self) -> Result<ModelArtifact>;

    /// Where the slot lives, for messages
    fn location(&self) -> String;
}

/// Artifact slot backed by a single file
#[derive(Debug, Clone)]
pub struct FileModelRegistry {
    path: PathBuf,
}

impl Default for FileModelRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ARTIFACT_PATH)
    }
}

impl FileModelRegistry {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl ModelRegistry for FileModelRegistry {
    fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        let bytes = artifact.to_bytes()?;
        let dir = self.parent_dir();
        fs::create_dir_all(&dir)?;

        // Same directory as the target so the rename never crosses filesystems
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| AutomlError::IoError(e.error))?;

        info!(
            path = %self.path.display(),
            model = %artifact.metadata.model_kind,
            bytes = bytes.len(),
            "artifact saved"
        );
        Ok(())
    }

    fn load(&self) -> Result<ModelArtifact> {
        let bytes = match fs::read(&self.path) {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(AutomlError::ArtifactNotFound {
                    location: self.location(),
                })
            }
            Err(e) => return Err(e.into()),
        };
        let artifact = ModelArtifact::from_bytes(&bytes)?;
        debug!(path = %self.path.display(), model = %artifact.metadata.model_kind, "artifact loaded");
        Ok(artifact)
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}

/// Process-local slot, for embedding and tests
#[derive(Debug, Default)]
pub struct InMemoryModelRegistry {
    slot: Mutex<Option<ModelArtifact>>,
}

impl InMemoryModelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&self) {
        self.slot.lock().take();
    }
}

impl ModelRegistry for InMemoryModelRegistry {
    fn save(&self, artifact: &ModelArtifact) -> Result<()> {
        *self.slot.lock() = Some(artifact.clone());
        Ok(())
    }

    fn load(&self) -> Result<ModelArtifact> {
        self.slot
            .lock()
            .clone()
            .ok_or_else(|| AutomlError::ArtifactNotFound {
                location: self.location(),
            })
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
