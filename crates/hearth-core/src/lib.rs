//! Hearth Core Library
//!
//! This crate provides the domain models, validation policies, error types and
//! configuration shared by every component of the Hearth media pipeline.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod policy;
pub mod storage_types;

// Re-export commonly used types
pub use config::PipelineConfig;
pub use error::{HearthError, HearthResult};
pub use models::{
    AssetMetadata, BatchProgress, DerivativeFailure, JobStatus, MediaAsset, MediaVariant,
    OutputFormat, ProcessingJob, ThumbnailKind, ValidationResult,
};
pub use policy::{PolicyRegistry, ValidationPolicy};
pub use storage_types::StorageBackend;
