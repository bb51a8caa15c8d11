use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A file as it entered the pipeline.
///
/// The byte buffer is reference counted, so cloning an asset never copies the payload.
/// There are no mutating methods: every stage reads the same value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    #[serde(skip)]
    data: Bytes,
    media_type: String,
    original_filename: String,
    content_type: String,
}

impl MediaAsset {
    pub fn new(
        data: impl Into<Bytes>,
        media_type: impl Into<String>,
        original_filename: impl Into<String>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            data: data.into(),
            media_type: media_type.into(),
            original_filename: original_filename.into(),
            content_type: content_type.into(),
        }
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn original_filename(&self) -> &str {
        &self.original_filename
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Declared MIME type, lowercased and without parameters (`image/jpeg; q=1` -> `image/jpeg`).
    pub fn normalized_content_type(&self) -> String {
        self.content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase()
    }

    pub fn is_image(&self) -> bool {
        self.normalized_content_type().starts_with("image/")
    }

    /// Last extension of the original filename, lowercased.
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.original_filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }
}

/// Structural metadata recovered from an asset's bytes.
///
/// Every field is optional: extraction is best-effort and reports what it could not
/// determine in `degradations` instead of failing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetMetadata {
    pub size_bytes: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exif_orientation: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encrypted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradations: Vec<String>,
}

impl AssetMetadata {
    pub fn with_size(size_bytes: u64) -> Self {
        Self {
            size_bytes,
            ..Default::default()
        }
    }

    /// Record pixel dimensions and derive the aspect ratio.
    pub fn set_dimensions(&mut self, width: u32, height: u32) {
        self.width = Some(width);
        self.height = Some(height);
        self.aspect_ratio = if height > 0 {
            Some(width as f64 / height as f64)
        } else {
            None
        };
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.width.zip(self.height)
    }

    pub fn degrade(&mut self, note: impl Into<String>) {
        self.degradations.push(note.into());
    }

    pub fn is_degraded(&self) -> bool {
        !self.degradations.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_content_type_strips_parameters() {
        let asset = MediaAsset::new(vec![1u8], "other", "a.txt", "Text/Plain; charset=UTF-8");
        assert_eq!(asset.normalized_content_type(), "text/plain");
        assert!(!asset.is_image());
    }

    #[test]
    fn test_extension_is_last_segment() {
        let asset = MediaAsset::new(vec![1u8], "contract", "invoice.pdf.EXE", "application/pdf");
        assert_eq!(asset.extension().as_deref(), Some("exe"));

        let asset = MediaAsset::new(vec![1u8], "contract", "README", "text/plain");
        assert_eq!(asset.extension(), None);
    }

    #[test]
    fn test_clone_shares_buffer() {
        let asset = MediaAsset::new(vec![7u8; 1024], "property_photo", "a.jpg", "image/jpeg");
        let copy = asset.clone();
        assert_eq!(asset.data().as_ptr(), copy.data().as_ptr());
    }

    #[test]
    fn test_set_dimensions_computes_aspect_ratio() {
        let mut meta = AssetMetadata::with_size(10);
        meta.set_dimensions(1920, 1080);
        let ratio = meta.aspect_ratio.unwrap();
        assert!((ratio - 1.7777).abs() < 0.001);
        assert_eq!(meta.dimensions(), Some((1920, 1080)));

        meta.set_dimensions(10, 0);
        assert_eq!(meta.aspect_ratio, None);
    }

    #[test]
    fn test_metadata_serialization_omits_missing_fields() {
        let mut meta = AssetMetadata::with_size(42);
        meta.set_dimensions(100, 50);
        let json = serde_json::to_string(&meta).unwrap();
        assert!(json.contains("\"width\":100"));
        assert!(!json.contains("author"));
        assert!(!json.contains("degradations"));
    }
}
