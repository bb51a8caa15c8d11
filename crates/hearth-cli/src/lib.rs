use anyhow::Context;
use hearth_core::MediaAsset;
use std::path::Path;

/// Truncate a string to max_len characters, appending "..." if truncated.
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Content type implied by a file's extension, `application/octet-stream` when unknown.
pub fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "avif" => "image/avif",
        "pdf" => "application/pdf",
        "txt" => "text/plain",
        _ => "application/octet-stream",
    }
}

/// Read a file into an asset tagged with `media_type`.
pub fn load_asset(
    path: &Path,
    media_type: &str,
    content_type: Option<&str>,
) -> anyhow::Result<MediaAsset> {
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("upload")
        .to_string();
    let content_type = content_type
        .map(str::to_string)
        .unwrap_or_else(|| guess_content_type(path).to_string());
    Ok(MediaAsset::new(data, media_type, filename, content_type))
}

/// Initialize tracing for the CLI.
///
/// `RUST_LOG` overrides the default `hearth=info` filter; `HEARTH_LOG_FORMAT=json` switches
/// to JSON lines. Logs go to stderr so stdout stays machine readable.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("hearth=info"));

    let json = std::env::var("HEARTH_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
