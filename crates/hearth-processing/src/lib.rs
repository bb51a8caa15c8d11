//! Hearth Processing Library
//!
//! The stages of the media pipeline: checksumming, metadata extraction, validation,
//! derivative generation, responsive sets, batch orchestration and upload preparation.

pub mod batch;
pub mod checksum;
pub mod codec;
pub mod compression;
pub mod derivatives;
pub mod metadata;
pub mod pipeline;
pub mod responsive;
pub mod upload;
pub mod validator;

// Re-export commonly used types
pub use batch::{BatchCoordinator, BatchFailure, BatchResult, BatchSummary};
pub use codec::{CodecError, ImageCodec, NativeCodec};
pub use derivatives::{DerivativeError, DerivativeGenerator, DerivativeSet, VariantSpec};
pub use metadata::MetadataExtractor;
pub use pipeline::MediaPipeline;
pub use responsive::{BreakpointTable, ResponsiveCandidate, ResponsiveSet, ResponsiveSetBuilder};
pub use upload::{
    StoredObject, UploadCoordinator, UploadDirectives, UploadError, UploadObject, UploadReceipt,
    UploadRequest,
};
pub use validator::Validator;
