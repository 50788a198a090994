//! Model persistence module
//!
//! Provides the persisted model bundle and the single artifact slot it is
//! stored in:
//! - Checksummed binary artifact (bincode payload, xxh3 checksum)
//! - File-backed registry with atomic replacement
//! - In-memory registry for embedding and tests

mod artifact;
mod registry;

pub use artifact::{ArtifactMetadata, ModelArtifact};
pub use registry::{
    FileModelRegistry, InMemoryModelRegistry, ModelRegistry, DEFAULT_ARTIFACT_PATH,
};
