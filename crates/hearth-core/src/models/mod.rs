//! Domain models for the media pipeline.

pub mod asset;
pub mod format;
pub mod job;
pub mod validation;
pub mod variant;

pub use asset::{AssetMetadata, MediaAsset};
pub use format::OutputFormat;
pub use job::{BatchProgress, DerivativeFailure, JobStatus, ProcessingJob};
pub use validation::ValidationResult;
pub use variant::{MediaVariant, ThumbnailKind};
