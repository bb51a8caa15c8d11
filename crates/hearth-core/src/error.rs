//! Error types module
//!
//! Per-item problems (validation errors, variant failures, upload failures) are recorded
//! on the `ProcessingJob`. `HearthError` only covers loading the policy table, the one
//! shared input a caller has to handle directly.

use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum HearthError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to read policy file {}: {source}", path.display())]
    PolicyFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid policy table: {0}")]
    PolicyParse(#[from] serde_json::Error),
}

pub type HearthResult<T> = Result<T, HearthError>;
