use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::asset::{AssetMetadata, MediaAsset};
use super::validation::ValidationResult;
use super::variant::{MediaVariant, ThumbnailKind};

/// Terminal (or pending) state of one asset's processing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    /// Validated and, where the policy asks for it, derivatives generated
    Completed,
    /// Rejected by validation; the user has to fix the file
    Rejected { errors: Vec<String> },
    /// A stage could not run (empty buffer, undecodable source, worker crash)
    Failed { reason: String },
    TimedOut { after_ms: u64 },
    /// Skipped because the batch was cancelled before the item started
    Cancelled,
}

impl JobStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, JobStatus::Completed)
    }

    /// Whether resubmitting the same bytes can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            JobStatus::Failed { .. } | JobStatus::TimedOut { .. } | JobStatus::Cancelled
        )
    }

    /// Human readable reason for anything that is not a success.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            JobStatus::Pending | JobStatus::Completed => None,
            JobStatus::Rejected { errors } => Some(format!("rejected: {}", errors.join("; "))),
            JobStatus::Failed { reason } => Some(reason.clone()),
            JobStatus::TimedOut { after_ms } => Some(format!("timed out after {} ms", after_ms)),
            JobStatus::Cancelled => Some("cancelled before processing".to_string()),
        }
    }
}

/// A single variant that could not be produced. The rest of the set is unaffected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DerivativeFailure {
    pub kind: ThumbnailKind,
    pub reason: String,
}

/// Unit of work for one asset.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessingJob {
    pub id: Uuid,
    /// Position of the asset in the submitted batch
    pub index: usize,
    pub asset: Arc<MediaAsset>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<AssetMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    pub variants: Vec<MediaVariant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variant_failures: Vec<DerivativeFailure>,
    pub status: JobStatus,
    /// Batch index of an earlier item with the same checksum
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<usize>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ProcessingJob {
    pub fn new(index: usize, asset: Arc<MediaAsset>) -> Self {
        Self {
            id: Uuid::new_v4(),
            index,
            asset,
            metadata: None,
            validation: None,
            variants: Vec::new(),
            variant_failures: Vec::new(),
            status: JobStatus::Pending,
            duplicate_of: None,
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.finished_at = Some(Utc::now());
    }

    pub fn checksum(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.checksum.as_deref())
    }

    pub fn variant(&self, kind: ThumbnailKind) -> Option<&MediaVariant> {
        self.variants.iter().find(|v| v.name == kind)
    }

    /// Warnings from validation, for display next to a successful upload.
    pub fn warnings(&self) -> &[String] {
        self.validation
            .as_ref()
            .map(|v| v.warnings())
            .unwrap_or_default()
    }
}

/// Progress of a running batch. Only the batch coordinator writes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
    pub percentage: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_item: Option<String>,
}

impl BatchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            completed: 0,
            total,
            percentage: if total == 0 { 100.0 } else { 0.0 },
            current_item: None,
        }
    }

    /// Count one more finished item.
    pub fn advance(&mut self, item: impl Into<String>) {
        self.completed = (self.completed + 1).min(self.total);
        self.percentage = if self.total == 0 {
            100.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        };
        self.current_item = Some(item.into());
    }

    pub fn is_done(&self) -> bool {
        self.completed >= self.total
    }
}
