//! Configuration module
//!
//! Pipeline settings are read from the environment (optionally through a `.env` file).
//! The policy table is the only tunable input that changes validation behaviour; it is
//! loaded once here and treated as immutable afterwards.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::constants::{DEFAULT_MAX_CONCURRENCY, DEFAULT_PDF_SCAN_WINDOW_BYTES};
use crate::policy::PolicyRegistry;
use crate::storage_types::StorageBackend;

/// Settings for the processing pipeline and its storage collaborator.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub environment: String,
    /// Maximum number of assets processed at the same time within one batch
    pub max_concurrency: usize,
    /// Per-item timeout; `None` lets items run as long as they need
    pub item_timeout: Option<Duration>,
    pub policy_file: Option<PathBuf>,
    pub pdf_scan_window_bytes: usize,
    /// Remove EXIF blocks from original images before they are uploaded
    pub strip_exif: bool,
    pub storage_backend: StorageBackend,
    pub local_storage_path: Option<String>,
    pub local_storage_base_url: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            max_concurrency: default_concurrency(),
            item_timeout: None,
            policy_file: None,
            pdf_scan_window_bytes: DEFAULT_PDF_SCAN_WINDOW_BYTES,
            strip_exif: true,
            storage_backend: StorageBackend::Local,
            local_storage_path: None,
            local_storage_base_url: None,
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(DEFAULT_MAX_CONCURRENCY)
}

impl PipelineConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup (the environment in production).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let environment = lookup("HEARTH_ENVIRONMENT")
            .or_else(|| lookup("APP_ENV"))
            .unwrap_or(defaults.environment);

        let max_concurrency = lookup("HEARTH_MAX_CONCURRENCY")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(defaults.max_concurrency);

        let item_timeout = lookup("HEARTH_ITEM_TIMEOUT_SECS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);

        let pdf_scan_window_bytes = lookup("HEARTH_PDF_SCAN_WINDOW_BYTES")
            .and_then(|s| s.trim().parse::<usize>().ok())
            .unwrap_or(defaults.pdf_scan_window_bytes);

        let strip_exif = lookup("HEARTH_STRIP_EXIF")
            .map(|s| s.trim().to_lowercase())
            .and_then(|s| s.parse::<bool>().ok())
            .unwrap_or(defaults.strip_exif);

        let storage_backend = match lookup("HEARTH_STORAGE_BACKEND") {
            Some(s) => s.parse()?,
            None => defaults.storage_backend,
        };

        let config = PipelineConfig {
            environment,
            max_concurrency,
            item_timeout,
            policy_file: lookup("HEARTH_POLICY_FILE").map(PathBuf::from),
            pdf_scan_window_bytes,
            strip_exif,
            storage_backend,
            local_storage_path: lookup("HEARTH_LOCAL_STORAGE_PATH"),
            local_storage_base_url: lookup("HEARTH_LOCAL_STORAGE_BASE_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.max_concurrency == 0 {
            return Err(anyhow::anyhow!("HEARTH_MAX_CONCURRENCY must be at least 1"));
        }

        if self.pdf_scan_window_bytes == 0 {
            return Err(anyhow::anyhow!(
                "HEARTH_PDF_SCAN_WINDOW_BYTES must be greater than zero"
            ));
        }

        if self.storage_backend == StorageBackend::Local
            && self.local_storage_path.is_some()
            && self.local_storage_base_url.is_none()
        {
            return Err(anyhow::anyhow!(
                "HEARTH_LOCAL_STORAGE_BASE_URL must be set when HEARTH_LOCAL_STORAGE_PATH is set"
            ));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        let env = self.environment.to_lowercase();
        env == "production" || env == "prod"
    }

    /// Load the policy table named by `policy_file`, or the built-in table.
    pub fn load_policies(&self) -> Result<Arc<PolicyRegistry>, anyhow::Error> {
        let registry = match &self.policy_file {
            Some(path) => PolicyRegistry::from_path(path)?,
            None => PolicyRegistry::builtin(),
        };
        Ok(Arc::new(registry))
    }
}
