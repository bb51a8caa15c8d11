use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::format::OutputFormat;

/// Name of a derivative, used in storage keys and by the display layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThumbnailKind {
    Thumbnail,
    Card,
    Gallery,
    Hero,
    Placeholder,
    /// Responsive candidate keyed by its target width
    Responsive(u32),
    /// Full-size re-encode of the source
    Converted(OutputFormat),
}

impl ThumbnailKind {
    /// Stable name used in storage keys (`thumbnail`, `w800`, `converted-webp`).
    pub fn key_name(&self) -> String {
        match self {
            ThumbnailKind::Thumbnail => "thumbnail".to_string(),
            ThumbnailKind::Card => "card".to_string(),
            ThumbnailKind::Gallery => "gallery".to_string(),
            ThumbnailKind::Hero => "hero".to_string(),
            ThumbnailKind::Placeholder => "placeholder".to_string(),
            ThumbnailKind::Responsive(width) => format!("w{}", width),
            ThumbnailKind::Converted(format) => format!("converted-{}", format),
        }
    }
}

impl fmt::Display for ThumbnailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key_name())
    }
}

/// An encoded derivative of a source image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaVariant {
    pub name: ThumbnailKind,
    #[serde(skip)]
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    /// Set when the requested encoder was unavailable and JPEG was used instead.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_from: Option<OutputFormat>,
}

impl MediaVariant {
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn content_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// Inline `data:` URI, meant for the blur placeholder.
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.content_type(),
            STANDARD.encode(&self.data)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_names() {
        assert_eq!(ThumbnailKind::Thumbnail.key_name(), "thumbnail");
        assert_eq!(ThumbnailKind::Placeholder.key_name(), "placeholder");
        assert_eq!(ThumbnailKind::Responsive(800).key_name(), "w800");
        assert_eq!(
            ThumbnailKind::Converted(OutputFormat::Avif).key_name(),
            "converted-avif"
        );
    }

    #[test]
    fn test_data_uri() {
        let variant = MediaVariant {
            name: ThumbnailKind::Placeholder,
            data: Bytes::from_static(b"abc"),
            width: 40,
            height: 30,
            format: OutputFormat::Jpeg,
            fallback_from: Some(OutputFormat::WebP),
        };
        assert_eq!(variant.to_data_uri(), "data:image/jpeg;base64,YWJj");
    }
}
