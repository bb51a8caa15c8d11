//! Display variants of a source image.
//!
//! The source is decoded once; every variant is resized, optionally blurred, and encoded
//! independently so one failing encoder only loses that variant.

use bytes::Bytes;
use hearth_core::{DerivativeFailure, MediaAsset, MediaVariant, OutputFormat, ThumbnailKind};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::sync::Arc;

use crate::codec::{apply_orientation, CodecError, ImageCodec, NativeCodec};
use crate::metadata::read_exif_orientation;

#[derive(Debug, thiserror::Error)]
pub enum DerivativeError {
    #[error("Source image is empty")]
    EmptySource,

    #[error(transparent)]
    Decode(#[from] CodecError),

    #[error("Invalid variant request: {0}")]
    InvalidSpec(String),

    #[error("Failed to produce {kind}: {reason}")]
    Encode { kind: ThumbnailKind, reason: String },
}

/// Bounds and encoding for one variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VariantSpec {
    pub kind: ThumbnailKind,
    pub max_width: u32,
    pub max_height: u32,
    pub quality: u8,
    pub format: OutputFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blur_sigma: Option<f32>,
}

impl VariantSpec {
    pub fn new(
        kind: ThumbnailKind,
        max_width: u32,
        max_height: u32,
        quality: u8,
        format: OutputFormat,
    ) -> Self {
        Self {
            kind,
            max_width,
            max_height,
            quality,
            format,
            blur_sigma: None,
        }
    }

    pub fn with_blur(mut self, sigma: f32) -> Self {
        self.blur_sigma = Some(sigma);
        self
    }

    /// Output size for a `src_width` x `src_height` source: fit inside the bounds keeping
    /// the aspect ratio, never upscaling, never below 1px.
    pub fn target_dimensions(&self, src_width: u32, src_height: u32) -> (u32, u32) {
        fit_within(src_width, src_height, self.max_width, self.max_height)
    }
}

/// The five named variants every listing image gets.
pub fn standard_specs() -> Vec<VariantSpec> {
    vec![
        VariantSpec::new(ThumbnailKind::Thumbnail, 150, 100, 80, OutputFormat::WebP),
        VariantSpec::new(ThumbnailKind::Card, 400, 300, 85, OutputFormat::WebP),
        VariantSpec::new(ThumbnailKind::Gallery, 800, 600, 90, OutputFormat::WebP),
        VariantSpec::new(ThumbnailKind::Hero, 1200, 800, 90, OutputFormat::WebP),
        VariantSpec::new(ThumbnailKind::Placeholder, 40, 30, 10, OutputFormat::WebP).with_blur(5.0),
    ]
}

pub fn fit_within(src_width: u32, src_height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if src_width == 0 || src_height == 0 {
        return (src_width.max(1), src_height.max(1));
    }
    let scale = (max_width as f64 / src_width as f64)
        .min(max_height as f64 / src_height as f64)
        .min(1.0);
    let width = ((src_width as f64 * scale).round() as u32).clamp(1, src_width);
    let height = ((src_height as f64 * scale).round() as u32).clamp(1, src_height);
    (width, height)
}

/// Variants that were produced plus the ones that were not.
#[derive(Debug, Clone, Serialize)]
pub struct DerivativeSet {
    pub variants: Vec<MediaVariant>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DerivativeFailure>,
    pub source_width: u32,
    pub source_height: u32,
}

impl DerivativeSet {
    pub fn get(&self, kind: ThumbnailKind) -> Option<&MediaVariant> {
        self.variants.iter().find(|v| v.name == kind)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

#[derive(Clone)]
pub struct DerivativeGenerator {
    codec: Arc<dyn ImageCodec>,
}

impl Default for DerivativeGenerator {
    fn default() -> Self {
        Self::new(Arc::new(NativeCodec))
    }
}

impl DerivativeGenerator {
    pub fn new(codec: Arc<dyn ImageCodec>) -> Self {
        Self { codec }
    }

    /// Decode `asset` upright (EXIF orientation applied).
    pub fn decode(&self, asset: &MediaAsset) -> Result<DynamicImage, DerivativeError> {
        if asset.is_empty() {
            return Err(DerivativeError::EmptySource);
        }
        let img = self.codec.decode(asset.data())?;
        Ok(match read_exif_orientation(asset.data()) {
            Some(orientation) => apply_orientation(img, orientation),
            None => img,
        })
    }

    pub fn generate(
        &self,
        asset: &MediaAsset,
        specs: &[VariantSpec],
    ) -> Result<DerivativeSet, DerivativeError> {
        let img = self.decode(asset)?;
        Ok(self.generate_from_image(&img, specs))
    }

    /// Produce every spec from an already decoded image. Never fails as a whole.
    pub fn generate_from_image(&self, img: &DynamicImage, specs: &[VariantSpec]) -> DerivativeSet {
        let (source_width, source_height) = img.dimensions();
        let mut set = DerivativeSet {
            variants: Vec::with_capacity(specs.len()),
            failures: Vec::new(),
            source_width,
            source_height,
        };

        for spec in specs {
            match self.render(img, spec) {
                Ok(variant) => set.variants.push(variant),
                Err(reason) => {
                    tracing::warn!(variant = %spec.kind, reason = %reason, "Variant generation failed");
                    set.failures.push(DerivativeFailure {
                        kind: spec.kind,
                        reason,
                    });
                }
            }
        }

        set
    }

    /// Re-encode the whole source at its own size.
    pub fn convert(
        &self,
        asset: &MediaAsset,
        format: OutputFormat,
        quality: u8,
    ) -> Result<MediaVariant, DerivativeError> {
        let img = self.decode(asset)?;
        let (width, height) = img.dimensions();
        let spec = VariantSpec::new(ThumbnailKind::Converted(format), width, height, quality, format);
        self.render(&img, &spec)
            .map_err(|reason| DerivativeError::Encode {
                kind: spec.kind,
                reason,
            })
    }

    fn render(&self, img: &DynamicImage, spec: &VariantSpec) -> Result<MediaVariant, String> {
        if spec.max_width == 0 || spec.max_height == 0 {
            return Err("variant bounds must be non-zero".to_string());
        }

        let (src_width, src_height) = img.dimensions();
        let (width, height) = spec.target_dimensions(src_width, src_height);

        let resized = if (width, height) == (src_width, src_height) {
            img.clone()
        } else {
            self.codec.resize(img, width, height)
        };
        let prepared = match spec.blur_sigma {
            Some(sigma) if sigma > 0.0 => self.codec.blur(&resized, sigma),
            _ => resized,
        };

        let (data, format, fallback_from) = self.encode_with_fallback(&prepared, spec)?;

        Ok(MediaVariant {
            name: spec.kind,
            data,
            width,
            height,
            format,
            fallback_from,
        })
    }

    fn encode_with_fallback(
        &self,
        img: &DynamicImage,
        spec: &VariantSpec,
    ) -> Result<(Bytes, OutputFormat, Option<OutputFormat>), String> {
        match self.codec.encode(img, spec.format, spec.quality) {
            Ok(data) => Ok((data, spec.format, None)),
            Err(err) if spec.format != OutputFormat::Jpeg => {
                tracing::warn!(
                    variant = %spec.kind,
                    requested = %spec.format,
                    error = %err,
                    "Encoder failed, falling back to JPEG"
                );
                self.codec
                    .encode(img, OutputFormat::Jpeg, spec.quality)
                    .map(|data| (data, OutputFormat::Jpeg, Some(spec.format)))
                    .map_err(|jpeg_err| format!("{}; JPEG fallback: {}", err, jpeg_err))
            }
            Err(err) => Err(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn jpeg_asset(width: u32, height: u32) -> MediaAsset {
        let img = DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }));
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Jpeg)
            .unwrap();
        MediaAsset::new(out, "property_photo", "photo.jpg", "image/jpeg")
    }

    /// Native decoding, but every non-JPEG encode fails.
    struct JpegOnlyCodec;

    impl ImageCodec for JpegOnlyCodec {
        fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError> {
            NativeCodec.decode(data)
        }

        fn encode(
            &self,
            img: &DynamicImage,
            format: OutputFormat,
            quality: u8,
        ) -> Result<Bytes, CodecError> {
            match format {
                OutputFormat::Jpeg => NativeCodec.encode(img, format, quality),
                other => Err(CodecError::EncoderUnavailable(other)),
            }
        }
    }

    /// Decodes but cannot encode anything.
    struct BrokenEncoderCodec;

    impl ImageCodec for BrokenEncoderCodec {
        fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError> {
            NativeCodec.decode(data)
        }

        fn encode(
            &self,
            _img: &DynamicImage,
            format: OutputFormat,
            _quality: u8,
        ) -> Result<Bytes, CodecError> {
            Err(CodecError::Encode {
                format,
                reason: "disk full".to_string(),
            })
        }
    }

    #[test]
    fn test_fit_within() {
        assert_eq!(fit_within(1920, 1080, 150, 100), (150, 84));
        assert_eq!(fit_within(1920, 1080, 400, 300), (400, 225));
        assert_eq!(fit_within(1080, 1920, 400, 300), (169, 300));
        // never upscales
        assert_eq!(fit_within(100, 50, 400, 300), (100, 50));
        // never collapses to zero
        assert_eq!(fit_within(10_000, 1, 100, 100), (100, 1));
    }

    #[test]
    fn test_standard_specs_are_ordered() {
        let specs = standard_specs();
        assert_eq!(specs.len(), 5);
        for pair in specs[..4].windows(2) {
            assert!(pair[0].max_width <= pair[1].max_width);
            assert!(pair[0].max_height <= pair[1].max_height);
        }
        assert_eq!(specs[4].kind, ThumbnailKind::Placeholder);
        assert_eq!(specs[4].blur_sigma, Some(5.0));
    }

    #[test]
    fn test_generate_standard_variants() {
        let generator = DerivativeGenerator::default();
        let set = generator
            .generate(&jpeg_asset(640, 480), &standard_specs())
            .unwrap();
        assert!(set.is_complete());
        assert_eq!(set.variants.len(), 5);
        assert_eq!((set.source_width, set.source_height), (640, 480));

        let card = set.get(ThumbnailKind::Card).unwrap();
        assert_eq!((card.width, card.height), (400, 300));
        // hero bounds exceed the source
        let hero = set.get(ThumbnailKind::Hero).unwrap();
        assert_eq!((hero.width, hero.height), (640, 480));
        assert!(!hero.data.is_empty());
    }

    #[test]
    fn test_fallback_to_jpeg_is_recorded() {
        let generator = DerivativeGenerator::new(Arc::new(JpegOnlyCodec));
        let set = generator
            .generate(&jpeg_asset(300, 200), &standard_specs())
            .unwrap();
        assert!(set.is_complete());
        for variant in &set.variants {
            assert_eq!(variant.format, OutputFormat::Jpeg);
            assert_eq!(variant.fallback_from, Some(OutputFormat::WebP));
            assert_eq!(&variant.data[..2], &[0xFF, 0xD8]);
        }
    }

    #[test]
    fn test_encode_failures_are_isolated() {
        let generator = DerivativeGenerator::new(Arc::new(BrokenEncoderCodec));
        let set = generator
            .generate(&jpeg_asset(300, 200), &standard_specs())
            .unwrap();
        assert!(set.variants.is_empty());
        assert_eq!(set.failures.len(), 5);
        assert!(set.failures[0].reason.contains("disk full"));
    }

    #[test]
    fn test_zero_bounds_fail_only_that_variant() {
        let specs = [
            VariantSpec::new(ThumbnailKind::Card, 0, 300, 80, OutputFormat::Jpeg),
            VariantSpec::new(ThumbnailKind::Thumbnail, 150, 100, 80, OutputFormat::Jpeg),
        ];
        let set = DerivativeGenerator::default()
            .generate(&jpeg_asset(300, 200), &specs)
            .unwrap();
        assert_eq!(set.variants.len(), 1);
        assert_eq!(set.failures[0].kind, ThumbnailKind::Card);
    }

    #[test]
    fn test_undecodable_source_fails_whole_set() {
        let asset = MediaAsset::new(b"not an image".to_vec(), "property_photo", "x.jpg", "image/jpeg");
        let result = DerivativeGenerator::default().generate(&asset, &standard_specs());
        assert!(matches!(result, Err(DerivativeError::Decode(_))));

        let empty = MediaAsset::new(Vec::new(), "property_photo", "x.jpg", "image/jpeg");
        let result = DerivativeGenerator::default().generate(&empty, &standard_specs());
        assert!(matches!(result, Err(DerivativeError::EmptySource)));
    }

    #[test]
    fn test_convert_keeps_source_size() {
        let variant = DerivativeGenerator::default()
            .convert(&jpeg_asset(120, 80), OutputFormat::Png, 90)
            .unwrap();
        assert_eq!((variant.width, variant.height), (120, 80));
        assert_eq!(variant.name, ThumbnailKind::Converted(OutputFormat::Png));
        assert_eq!(variant.content_type(), "image/png");
    }

    #[test]
    fn test_placeholder_data_uri() {
        let set = DerivativeGenerator::default()
            .generate(&jpeg_asset(400, 300), &standard_specs())
            .unwrap();
        let placeholder = set.get(ThumbnailKind::Placeholder).unwrap();
        assert_eq!((placeholder.width, placeholder.height), (40, 30));
        assert!(placeholder.to_data_uri().starts_with("data:image/"));
    }
}
