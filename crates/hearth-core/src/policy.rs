//! Per-media-type validation policies.
//!
//! The registry is built once at startup (built-in table or a JSON file) and then only
//! read. Lookups are total: any tag without an entry resolves to the `other` policy.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::constants::{FALLBACK_MEDIA_TYPE, MIB};
use crate::error::{HearthError, HearthResult};

/// Rules governing acceptable formats, sizes and security handling for one media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationPolicy {
    /// Accepted MIME types, lowercase
    pub allowed_formats: BTreeSet<String>,
    pub max_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_height: Option<u32>,
    #[serde(default)]
    pub requires_verification: bool,
    #[serde(default)]
    pub encryption_enabled: bool,
    #[serde(default)]
    pub watermark_enabled: bool,
    /// Produce display variants for image assets of this type
    #[serde(default)]
    pub generate_derivatives: bool,
}

impl ValidationPolicy {
    pub fn new<I, S>(allowed_formats: I, max_size_bytes: u64) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            allowed_formats: allowed_formats
                .into_iter()
                .map(|f| f.as_ref().trim().to_lowercase())
                .collect(),
            max_size_bytes,
            min_width: None,
            min_height: None,
            max_width: None,
            max_height: None,
            requires_verification: false,
            encryption_enabled: false,
            watermark_enabled: false,
            generate_derivatives: false,
        }
    }

    pub fn with_min_dimensions(mut self, width: u32, height: u32) -> Self {
        self.min_width = Some(width);
        self.min_height = Some(height);
        self
    }

    pub fn with_max_dimensions(mut self, width: u32, height: u32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    pub fn with_security(mut self, verification: bool, encryption: bool, watermark: bool) -> Self {
        self.requires_verification = verification;
        self.encryption_enabled = encryption;
        self.watermark_enabled = watermark;
        self
    }

    pub fn with_derivatives(mut self, enabled: bool) -> Self {
        self.generate_derivatives = enabled;
        self
    }

    /// Add another accepted MIME type.
    pub fn allowing(mut self, format: &str) -> Self {
        self.allowed_formats.insert(format.trim().to_lowercase());
        self
    }

    pub fn allows(&self, content_type: &str) -> bool {
        self.allowed_formats.contains(content_type)
    }
}

const JPEG: &str = "image/jpeg";
const PNG: &str = "image/png";
const WEBP: &str = "image/webp";
const GIF: &str = "image/gif";
const PDF: &str = "application/pdf";
const TEXT: &str = "text/plain";

fn builtin_fallback() -> ValidationPolicy {
    ValidationPolicy::new([JPEG, PNG, WEBP, GIF, PDF, TEXT], 10 * MIB)
}

fn builtin_policies() -> BTreeMap<String, ValidationPolicy> {
    let table = [
        (
            "property_photo",
            ValidationPolicy::new([JPEG, PNG, WEBP], 10 * MIB)
                .with_min_dimensions(400, 300)
                .with_max_dimensions(8000, 8000)
                .with_security(false, false, true)
                .with_derivatives(true),
        ),
        (
            "floor_plan",
            ValidationPolicy::new([JPEG, PNG, WEBP, PDF], 20 * MIB)
                .with_min_dimensions(600, 400)
                .with_max_dimensions(10_000, 10_000)
                .with_security(false, false, true)
                .with_derivatives(true),
        ),
        (
            "virtual_tour",
            ValidationPolicy::new([JPEG, PNG, WEBP], 50 * MIB)
                .with_min_dimensions(2000, 1000)
                .with_max_dimensions(16_384, 8192)
                .with_derivatives(true),
        ),
        (
            "contract",
            ValidationPolicy::new([PDF], 25 * MIB).with_security(true, true, true),
        ),
        (
            "financial_statement",
            ValidationPolicy::new([PDF], 25 * MIB).with_security(true, true, false),
        ),
        (
            "id_document",
            ValidationPolicy::new([JPEG, PNG, PDF], 10 * MIB)
                .with_min_dimensions(600, 400)
                .with_security(true, true, false),
        ),
        (
            "inspection_report",
            ValidationPolicy::new([PDF, JPEG, PNG], 50 * MIB).with_security(true, false, false),
        ),
    ];

    table
        .into_iter()
        .map(|(tag, policy)| (tag.to_string(), policy))
        .collect()
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Static table from media-type tag to policy.
#[derive(Debug, Clone)]
pub struct PolicyRegistry {
    policies: BTreeMap<String, ValidationPolicy>,
    fallback: ValidationPolicy,
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PolicyRegistry {
    /// The built-in marketplace table.
    pub fn builtin() -> Self {
        Self {
            policies: builtin_policies(),
            fallback: builtin_fallback(),
        }
    }

    /// Build a registry from explicit entries. An `other` entry replaces the built-in fallback.
    pub fn from_policies(policies: impl IntoIterator<Item = (String, ValidationPolicy)>) -> Self {
        let mut table: BTreeMap<String, ValidationPolicy> = policies
            .into_iter()
            .map(|(tag, mut policy)| {
                policy.allowed_formats = policy
                    .allowed_formats
                    .iter()
                    .map(|f| f.trim().to_lowercase())
                    .collect();
                (normalize_tag(&tag), policy)
            })
            .collect();
        let fallback = table
            .remove(FALLBACK_MEDIA_TYPE)
            .unwrap_or_else(builtin_fallback);
        Self {
            policies: table,
            fallback,
        }
    }

    /// Parse a JSON object of `tag -> policy`.
    pub fn from_json(json: &str) -> HearthResult<Self> {
        let table: BTreeMap<String, ValidationPolicy> = serde_json::from_str(json)?;
        if table.is_empty() {
            return Err(HearthError::Config(
                "Policy table must contain at least one entry".to_string(),
            ));
        }
        Ok(Self::from_policies(table))
    }

    pub fn from_path(path: impl AsRef<Path>) -> HearthResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| HearthError::PolicyFile {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_json(&json)?;
        tracing::info!(
            path = %path.display(),
            policies = registry.policies.len() + 1,
            "Loaded policy table"
        );
        Ok(registry)
    }

    /// Policy for `tag`, or the `other` policy when the tag is unknown. Never fails.
    pub fn resolve(&self, tag: &str) -> &ValidationPolicy {
        let key = normalize_tag(tag);
        match self.policies.get(&key) {
            Some(policy) => policy,
            None => {
                if key != FALLBACK_MEDIA_TYPE {
                    tracing::debug!(media_type = %tag, "No policy for media type, using fallback");
                }
                &self.fallback
            }
        }
    }

    /// Whether `tag` has its own entry (as opposed to resolving to the fallback).
    pub fn contains(&self, tag: &str) -> bool {
        let key = normalize_tag(tag);
        key == FALLBACK_MEDIA_TYPE || self.policies.contains_key(&key)
    }

    /// All entries including the fallback, sorted by tag.
    pub fn entries(&self) -> BTreeMap<&str, &ValidationPolicy> {
        let mut entries: BTreeMap<&str, &ValidationPolicy> = self
            .policies
            .iter()
            .map(|(tag, policy)| (tag.as_str(), policy))
            .collect();
        entries.insert(FALLBACK_MEDIA_TYPE, &self.fallback);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_property_photo() {
        let registry = PolicyRegistry::builtin();
        let policy = registry.resolve("property_photo");
        assert_eq!(policy.max_size_bytes, 10 * MIB);
        assert!(policy.allows("image/jpeg"));
        assert!(!policy.allows("application/pdf"));
        assert!(policy.watermark_enabled);
        assert!(policy.generate_derivatives);
    }

    #[test]
    fn test_contract_requires_security_handling() {
        let registry = PolicyRegistry::builtin();
        let policy = registry.resolve("contract");
        assert!(policy.requires_verification);
        assert!(policy.encryption_enabled);
        assert_eq!(
            policy.allowed_formats,
            BTreeSet::from(["application/pdf".to_string()])
        );
    }

    #[test]
    fn test_unknown_tags_resolve_to_fallback() {
        let registry = PolicyRegistry::builtin();
        let other = registry.resolve("other").clone();
        for tag in ["", "unknown", "drone_footage", "💡", "property photo"] {
            assert_eq!(registry.resolve(tag), &other, "tag {:?}", tag);
        }
        assert!(!registry.contains("drone_footage"));
        assert!(registry.contains("other"));
    }

    #[test]
    fn test_tags_are_normalized() {
        let registry = PolicyRegistry::builtin();
        assert_eq!(
            registry.resolve("  Floor_Plan "),
            registry.resolve("floor_plan")
        );
    }

    #[test]
    fn test_from_json_without_other_keeps_builtin_fallback() {
        let json = r#"{
            "listing_photo": {
                "allowed_formats": ["IMAGE/JPEG"],
                "max_size_bytes": 1024,
                "min_width": 10,
                "watermark_enabled": true
            }
        }"#;
        let registry = PolicyRegistry::from_json(json).unwrap();
        let policy = registry.resolve("listing_photo");
        assert!(policy.allows("image/jpeg"));
        assert_eq!(policy.min_width, Some(10));
        assert_eq!(policy.min_height, None);
        assert!(!policy.encryption_enabled);

        assert_eq!(registry.resolve("nope"), &builtin_fallback());
        assert_eq!(registry.entries().len(), 2);
    }

    #[test]
    fn test_from_json_other_overrides_fallback() {
        let json = r#"{ "other": { "allowed_formats": ["text/plain"], "max_size_bytes": 5 } }"#;
        let registry = PolicyRegistry::from_json(json).unwrap();
        assert_eq!(registry.resolve("anything").max_size_bytes, 5);
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            PolicyRegistry::from_json("not json"),
            Err(HearthError::PolicyParse(_))
        ));
        assert!(matches!(
            PolicyRegistry::from_json("{}"),
            Err(HearthError::Config(_))
        ));
    }

    #[test]
    fn test_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("policies.json");
        std::fs::write(
            &path,
            r#"{ "contract": { "allowed_formats": ["application/pdf"], "max_size_bytes": 100 } }"#,
        )
        .unwrap();
        let registry = PolicyRegistry::from_path(&path).unwrap();
        assert_eq!(registry.resolve("contract").max_size_bytes, 100);

        assert!(matches!(
            PolicyRegistry::from_path(dir.path().join("missing.json")),
            Err(HearthError::PolicyFile { .. })
        ));
    }
}
