//! Upload request assembly and hand-off to the storage collaborator.

use bytes::Bytes;
use hearth_core::{JobStatus, PipelineConfig, PolicyRegistry, ProcessingJob};
use hearth_storage::{keys, Storage, StorageError};
use img_parts::jpeg::Jpeg;
use img_parts::png::Png;
use img_parts::webp::WebP;
use img_parts::ImageEXIF;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::checksum;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Job {job_id} is not uploadable: {reason}")]
    NotUploadable { job_id: Uuid, reason: String },

    #[error("Storage rejected {key}: {source}")]
    Storage {
        key: String,
        #[source]
        source: StorageError,
    },
}

impl UploadError {
    /// Storage failures can be retried with the same request; an unfinished job cannot.
    pub fn is_retryable(&self) -> bool {
        match self {
            UploadError::NotUploadable { .. } => false,
            UploadError::Storage { source, .. } => source.is_retryable(),
        }
    }
}

/// Handling the storage side must apply to the stored objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UploadDirectives {
    pub watermark: bool,
    pub encrypt: bool,
    pub requires_verification: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadObject {
    pub key: String,
    #[serde(skip)]
    pub data: Bytes,
    pub content_type: String,
    pub size_bytes: usize,
}

impl UploadObject {
    fn new(key: String, data: Bytes, content_type: impl Into<String>) -> Self {
        Self {
            key,
            size_bytes: data.len(),
            data,
            content_type: content_type.into(),
        }
    }
}

/// Everything the storage collaborator needs for one job.
#[derive(Debug, Clone, Serialize)]
pub struct UploadRequest {
    pub job_id: Uuid,
    pub namespace: String,
    pub original: UploadObject,
    pub variants: Vec<UploadObject>,
    pub directives: UploadDirectives,
    pub metadata: BTreeMap<String, String>,
}

impl UploadRequest {
    pub fn objects(&self) -> impl Iterator<Item = &UploadObject> {
        std::iter::once(&self.original).chain(self.variants.iter())
    }

    pub fn total_bytes(&self) -> usize {
        self.objects().map(|o| o.size_bytes).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredObject {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UploadReceipt {
    pub job_id: Uuid,
    pub original: StoredObject,
    pub variants: Vec<StoredObject>,
    pub directives: UploadDirectives,
}

#[derive(Debug, Clone)]
pub struct UploadCoordinator {
    policies: Arc<PolicyRegistry>,
    strip_exif: bool,
}

impl UploadCoordinator {
    pub fn new(policies: Arc<PolicyRegistry>) -> Self {
        Self {
            policies,
            strip_exif: true,
        }
    }

    pub fn from_config(policies: Arc<PolicyRegistry>, config: &PipelineConfig) -> Self {
        Self::new(policies).with_strip_exif(config.strip_exif)
    }

    pub fn with_strip_exif(mut self, strip_exif: bool) -> Self {
        self.strip_exif = strip_exif;
        self
    }

    /// Build the request for a completed job under `{owner}/{context}/{media_type}`.
    ///
    /// `media_type` must resolve to the same policy as the job's asset.
    pub fn prepare_upload(
        &self,
        job: &ProcessingJob,
        owner_id: &str,
        context_id: &str,
        media_type: &str,
    ) -> Result<UploadRequest, UploadError> {
        if job.status != JobStatus::Completed {
            let reason = job
                .status
                .failure_reason()
                .unwrap_or_else(|| "processing has not finished".to_string());
            return Err(UploadError::NotUploadable {
                job_id: job.id,
                reason,
            });
        }

        let asset = &job.asset;
        // Directives follow the policy the asset was validated under.
        let policy = self.policies.resolve(asset.media_type());
        if self.policies.resolve(media_type) != policy {
            return Err(UploadError::NotUploadable {
                job_id: job.id,
                reason: format!(
                    "media type {} does not match the validated type {}",
                    media_type,
                    asset.media_type()
                ),
            });
        }
        let namespace = keys::namespace(owner_id, context_id, media_type);
        let content_type = asset.normalized_content_type();

        let received_checksum = job
            .checksum()
            .map(str::to_string)
            .unwrap_or_else(|| checksum::digest(asset.data()));

        let original_data = if self.strip_exif && asset.is_image() {
            remove_exif(asset.data())
        } else {
            asset.data().clone()
        };

        let mut metadata = BTreeMap::new();
        metadata.insert("checksum".to_string(), received_checksum.clone());
        metadata.insert(
            "original_filename".to_string(),
            asset.original_filename().to_string(),
        );
        metadata.insert("content_type".to_string(), content_type.clone());
        metadata.insert("media_type".to_string(), media_type.to_string());
        if original_data != *asset.data() {
            metadata.insert("exif_stripped".to_string(), "true".to_string());
            metadata.insert(
                "stored_checksum".to_string(),
                checksum::digest(&original_data),
            );
        }
        if let Some(meta) = &job.metadata {
            if let Some((width, height)) = meta.dimensions() {
                metadata.insert("width".to_string(), width.to_string());
                metadata.insert("height".to_string(), height.to_string());
            }
            if let Some(pages) = meta.page_count {
                metadata.insert("page_count".to_string(), pages.to_string());
            }
        }

        let extension = extension_for(&content_type)
            .map(str::to_string)
            .or_else(|| asset.extension())
            .unwrap_or_else(|| "bin".to_string());
        let original = UploadObject::new(
            keys::original_key(&namespace, job.id, &extension),
            original_data,
            content_type,
        );

        let variants = job
            .variants
            .iter()
            .map(|variant| {
                UploadObject::new(
                    keys::variant_key(
                        &namespace,
                        job.id,
                        &variant.name.key_name(),
                        variant.format.extension(),
                    ),
                    variant.data.clone(),
                    variant.content_type(),
                )
            })
            .collect();

        Ok(UploadRequest {
            job_id: job.id,
            namespace,
            original,
            variants,
            directives: UploadDirectives {
                watermark: policy.watermark_enabled,
                encrypt: policy.encryption_enabled,
                requires_verification: policy.requires_verification,
            },
            metadata,
        })
    }

    /// Send the original and every variant. On failure, objects already written for this
    /// request are deleted before the error is returned.
    #[tracing::instrument(skip(self, request, storage), fields(job_id = %request.job_id))]
    pub async fn submit(
        &self,
        request: &UploadRequest,
        storage: &dyn Storage,
    ) -> Result<UploadReceipt, UploadError> {
        let mut stored: Vec<StoredObject> = Vec::with_capacity(request.variants.len() + 1);

        for object in request.objects() {
            match storage
                .upload_with_key(&object.key, object.data.clone(), &object.content_type)
                .await
            {
                Ok(url) => stored.push(StoredObject {
                    key: object.key.clone(),
                    url,
                }),
                Err(source) => {
                    tracing::warn!(
                        key = %object.key,
                        error = %source,
                        uploaded = stored.len(),
                        "Upload failed, removing objects already stored"
                    );
                    for done in &stored {
                        if let Err(e) = storage.delete(&done.key).await {
                            tracing::warn!(key = %done.key, error = %e, "Cleanup delete failed");
                        }
                    }
                    return Err(UploadError::Storage {
                        key: object.key.clone(),
                        source,
                    });
                }
            }
        }

        let mut stored = stored.into_iter();
        let Some(original) = stored.next() else {
            return Err(UploadError::NotUploadable {
                job_id: request.job_id,
                reason: "request has no objects".to_string(),
            });
        };

        tracing::info!(
            objects = request.variants.len() + 1,
            total_bytes = request.total_bytes(),
            backend = %storage.backend_type(),
            "Upload complete"
        );

        Ok(UploadReceipt {
            job_id: request.job_id,
            original,
            variants: stored.collect(),
            directives: request.directives,
        })
    }
}

fn extension_for(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "application/pdf" => Some("pdf"),
        "text/plain" => Some("txt"),
        _ => None,
    }
}

/// Drop the EXIF block from JPEG, PNG or WebP data. Other data, or data without EXIF, is
/// returned unchanged.
pub fn remove_exif(data: &Bytes) -> Bytes {
    if let Ok(mut jpeg) = Jpeg::from_bytes(data.clone()) {
        if jpeg.exif().is_none() {
            return data.clone();
        }
        jpeg.set_exif(None);
        return jpeg.encoder().bytes();
    }

    if let Ok(mut png) = Png::from_bytes(data.clone()) {
        if png.exif().is_none() {
            return data.clone();
        }
        png.set_exif(None);
        return png.encoder().bytes();
    }

    if let Ok(mut webp) = WebP::from_bytes(data.clone()) {
        if webp.exif().is_none() {
            return data.clone();
        }
        webp.set_exif(None);
        return webp.encoder().bytes();
    }

    data.clone()
}
