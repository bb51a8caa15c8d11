//! Policy checks for a single asset.
//!
//! Errors block the asset; warnings are returned alongside for display.

use hearth_core::constants::{DENYLISTED_EXTENSIONS, MAX_ASPECT_RATIO, MIN_ASPECT_RATIO};
use hearth_core::{AssetMetadata, MediaAsset, ValidationPolicy, ValidationResult};

/// Media file validator
///
/// Checks an asset and its extracted metadata against a policy. Rules that need
/// metadata (dimensions, aspect ratio) are skipped when extraction could not determine
/// the value, so a damaged header never produces a dimension error by itself.
pub struct Validator;

impl Validator {
    pub fn validate(
        asset: &MediaAsset,
        metadata: &AssetMetadata,
        policy: &ValidationPolicy,
    ) -> ValidationResult {
        let mut result = ValidationResult::new();

        if asset.is_empty() {
            result.error("File is empty");
        }

        Self::check_format(asset, policy, &mut result);
        Self::check_size(metadata.size_bytes, policy, &mut result);
        Self::check_filename(asset.original_filename(), &mut result);
        Self::check_dimensions(metadata, policy, &mut result);
        Self::check_aspect_ratio(metadata, &mut result);

        for note in &metadata.degradations {
            result.warning(format!("Metadata incomplete: {}", note));
        }

        result
    }

    fn check_format(asset: &MediaAsset, policy: &ValidationPolicy, result: &mut ValidationResult) {
        let content_type = asset.normalized_content_type();
        if policy.allows(&content_type) {
            return;
        }

        let shown = if content_type.is_empty() {
            "(none)"
        } else {
            content_type.as_str()
        };
        let allowed: Vec<&str> = policy.allowed_formats.iter().map(String::as_str).collect();
        result.error(format!(
            "Format {} is not allowed for {} (allowed: {})",
            shown,
            asset.media_type(),
            allowed.join(", ")
        ));
    }

    fn check_size(size: u64, policy: &ValidationPolicy, result: &mut ValidationResult) {
        if size > policy.max_size_bytes {
            result.error(format!(
                "File size {} exceeds the {} limit",
                format_size(size),
                format_size(policy.max_size_bytes)
            ));
        }
    }

    fn check_filename(filename: &str, result: &mut ValidationResult) {
        if let Some(ext) = denylisted_extension(filename) {
            result.error(format!(
                "Filename {} contains a blocked extension (.{})",
                filename, ext
            ));
        }
    }

    fn check_dimensions(
        metadata: &AssetMetadata,
        policy: &ValidationPolicy,
        result: &mut ValidationResult,
    ) {
        let Some((width, height)) = metadata.dimensions() else {
            return;
        };

        if let Some(min) = policy.min_width.filter(|min| width < *min) {
            result.error(format!(
                "Image width {}px is below the minimum of {}px",
                width, min
            ));
        }
        if let Some(min) = policy.min_height.filter(|min| height < *min) {
            result.error(format!(
                "Image height {}px is below the minimum of {}px",
                height, min
            ));
        }
        if let Some(max) = policy.max_width.filter(|max| width > *max) {
            result.warning(format!(
                "Image width {}px exceeds the recommended maximum of {}px",
                width, max
            ));
        }
        if let Some(max) = policy.max_height.filter(|max| height > *max) {
            result.warning(format!(
                "Image height {}px exceeds the recommended maximum of {}px",
                height, max
            ));
        }
    }

    fn check_aspect_ratio(metadata: &AssetMetadata, result: &mut ValidationResult) {
        if let Some(ratio) = metadata.aspect_ratio {
            if !(MIN_ASPECT_RATIO..=MAX_ASPECT_RATIO).contains(&ratio) {
                result.warning(format!(
                    "Unusual aspect ratio {:.2} (expected between {} and {})",
                    ratio, MIN_ASPECT_RATIO, MAX_ASPECT_RATIO
                ));
            }
        }
    }
}

/// First denylisted extension appearing as any dot-separated segment after the base name.
fn denylisted_extension(filename: &str) -> Option<String> {
    filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(filename)
        .split('.')
        .skip(1)
        .map(|segment| segment.trim().to_lowercase())
        .find(|segment| DENYLISTED_EXTENSIONS.contains(&segment.as_str()))
}

/// Human readable size in binary units labelled KB/MB, e.g. `10 MB` or `1.5 MB`.
pub fn format_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = 1024 * 1024;

    let (value, unit) = if bytes >= MIB {
        (bytes as f64 / MIB as f64, "MB")
    } else if bytes >= KIB {
        (bytes as f64 / KIB as f64, "KB")
    } else {
        return format!("{} bytes", bytes);
    };

    if value.fract() == 0.0 {
        format!("{:.0} {}", value, unit)
    } else {
        format!("{:.1} {}", value, unit)
    }
}
