#[cfg(feature = "storage-local")]
use crate::LocalStorage;
use crate::{Storage, StorageBackend, StorageError, StorageResult};
use hearth_core::PipelineConfig;
use std::sync::Arc;

/// Create a storage backend based on configuration
///
/// Only the local backend can be built from configuration; an `external` backend is a
/// collaborator the embedding application passes in directly.
pub async fn create_storage(config: &PipelineConfig) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend {
        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("HEARTH_LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError(
                    "HEARTH_LOCAL_STORAGE_BASE_URL not configured".to_string(),
                )
            })?;

            let storage = LocalStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::External => Err(StorageError::ConfigError(
            "External storage must be provided by the caller".to_string(),
        )),
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_local_storage() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig {
            local_storage_path: Some(dir.path().display().to_string()),
            local_storage_base_url: Some("http://localhost/media".to_string()),
            ..Default::default()
        };
        let storage = create_storage(&config).await.unwrap();
        assert_eq!(storage.backend_type(), StorageBackend::Local);
    }

    #[tokio::test]
    async fn test_missing_path_is_config_error() {
        let config = PipelineConfig::default();
        let result = create_storage(&config).await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_external_cannot_be_built() {
        let config = PipelineConfig {
            storage_backend: StorageBackend::External,
            ..Default::default()
        };
        assert!(create_storage(&config).await.is_err());
    }
}
