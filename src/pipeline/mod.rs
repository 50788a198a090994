//! End-to-end pipeline module
//!
//! Ties conditioning, training, evaluation, persistence and inference
//! together behind a [`Session`].

mod config;
mod session;

pub use config::{PipelineConfig, RegistryConfig};
pub use session::{Selection, Session, TrainingReport};
