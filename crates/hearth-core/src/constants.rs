//! Shared constants for the media pipeline.

/// Tag of the catch-all policy every unknown media type resolves to.
pub const FALLBACK_MEDIA_TYPE: &str = "other";

pub const MIB: u64 = 1024 * 1024;

/// Aspect ratios outside this range are flagged as unusual crops.
pub const MIN_ASPECT_RATIO: f64 = 0.5;
pub const MAX_ASPECT_RATIO: f64 = 3.0;

/// Filename extensions rejected regardless of the declared content type.
pub const DENYLISTED_EXTENSIONS: &[&str] = &["exe", "bat", "cmd", "scr", "vbs", "js", "jar"];

/// Leading window of a document scanned for structural markers.
pub const DEFAULT_PDF_SCAN_WINDOW_BYTES: usize = 64 * 1024;

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;
