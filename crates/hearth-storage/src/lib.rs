//! Hearth Storage Library
//!
//! The pipeline hands finished assets to a storage collaborator through the [`Storage`]
//! trait. A local filesystem backend is included; remote backends (CDN, object stores)
//! are supplied by the caller.
//!
//! # Storage key format
//!
//! Keys are namespaced by owner, context and media type:
//!
//! - **Original**: `{owner}/{context}/{media_type}/{job_id}.{ext}`
//! - **Variant**: `{owner}/{context}/{media_type}/{job_id}/{variant}.{ext}`
//!
//! Keys must not contain `..` or a leading `/`. Key generation is centralized in the
//! `keys` module so every backend sees the same layout.

pub mod factory;
pub mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use hearth_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use traits::{Storage, StorageError, StorageResult};
