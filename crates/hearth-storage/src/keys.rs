//! Shared key generation for storage backends.
//!
//! Key format: `{owner}/{context}/{media_type}` namespace, then `{job_id}.{ext}` for the
//! original and `{job_id}/{variant}.{ext}` for derivatives.

use std::fmt::Display;

/// Reduce a caller-supplied value to a safe key segment.
///
/// Only `[A-Za-z0-9._-]` survive; anything else becomes `_`. Runs of dots are collapsed so
/// the segment can never be `..`, and an empty result becomes `_`.
pub fn sanitize_segment(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.trim().chars() {
        let c = if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
            c
        } else {
            '_'
        };
        if c == '.' && out.ends_with('.') {
            continue;
        }
        out.push(c);
    }

    let out = out.trim_matches('.').to_string();
    if out.is_empty() {
        "_".to_string()
    } else {
        out
    }
}

/// `{owner}/{context}/{media_type}` with each segment sanitized.
pub fn namespace(owner_id: &str, context_id: &str, media_type: &str) -> String {
    format!(
        "{}/{}/{}",
        sanitize_segment(owner_id),
        sanitize_segment(context_id),
        sanitize_segment(media_type)
    )
}

pub fn original_key(namespace: &str, job_id: impl Display, extension: &str) -> String {
    format!("{}/{}.{}", namespace, job_id, sanitize_segment(extension))
}

pub fn variant_key(
    namespace: &str,
    job_id: impl Display,
    variant: &str,
    extension: &str,
) -> String {
    format!(
        "{}/{}/{}.{}",
        namespace,
        job_id,
        sanitize_segment(variant),
        sanitize_segment(extension)
    )
}

/// Reject keys that could escape a backend's root.
pub fn is_safe_key(key: &str) -> bool {
    !key.is_empty() && !key.contains("..") && !key.starts_with('/') && !key.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("agent-42"), "agent-42");
        assert_eq!(sanitize_segment("listing 7/a"), "listing_7_a");
        assert_eq!(sanitize_segment(".."), "_");
        assert_eq!(sanitize_segment("../../etc"), "_._etc");
        assert_eq!(sanitize_segment(""), "_");
        assert_eq!(sanitize_segment("maison-été"), "maison-_t_");
    }

    #[test]
    fn test_namespace_and_keys() {
        let ns = namespace("owner 1", "listing/9", "property_photo");
        assert_eq!(ns, "owner_1/listing_9/property_photo");
        assert_eq!(original_key(&ns, "abc", "jpg"), format!("{}/abc.jpg", ns));
        assert_eq!(
            variant_key(&ns, "abc", "thumbnail", "webp"),
            format!("{}/abc/thumbnail.webp", ns)
        );
        assert!(is_safe_key(&variant_key(&ns, "abc", "../x", "webp")));
    }

    #[test]
    fn test_is_safe_key() {
        assert!(is_safe_key("a/b/c.jpg"));
        assert!(!is_safe_key("../etc/passwd"));
        assert!(!is_safe_key("/etc/passwd"));
        assert!(!is_safe_key(""));
    }
}
