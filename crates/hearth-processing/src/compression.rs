use bytes::Bytes;
use hearth_core::OutputFormat;
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;

use crate::codec::CodecError;

/// Encoders behind [`crate::codec::NativeCodec`].
///
/// WebP, AVIF and mozjpeg are optional features. When one is compiled out the matching
/// `compress_*` call reports [`CodecError::EncoderUnavailable`] and the caller decides
/// whether to fall back.
pub struct ImageCompressor;

impl ImageCompressor {
    /// Encode `img` as `format` at `quality` (1-100, ignored for PNG).
    pub fn compress(
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Bytes, CodecError> {
        let quality = quality.clamp(1, 100);
        match format {
            OutputFormat::Jpeg => Self::compress_jpeg(img, quality),
            OutputFormat::Png => Self::compress_png(img),
            OutputFormat::WebP => Self::compress_webp(img, quality),
            OutputFormat::Avif => Self::compress_avif(img, quality),
        }
    }

    /// Whether `format` has an encoder compiled in.
    pub fn is_available(format: OutputFormat) -> bool {
        match format {
            OutputFormat::Jpeg | OutputFormat::Png => true,
            OutputFormat::WebP => cfg!(feature = "webp"),
            OutputFormat::Avif => cfg!(feature = "avif"),
        }
    }

    /// Compress to JPEG using mozjpeg
    #[cfg(feature = "mozjpeg")]
    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, CodecError> {
        let rgb_img = img.to_rgb8();
        let (width, height) = rgb_img.dimensions();
        let encode_error = |e: std::io::Error| CodecError::Encode {
            format: OutputFormat::Jpeg,
            reason: e.to_string(),
        };

        let mut comp = mozjpeg::Compress::new(mozjpeg::ColorSpace::JCS_RGB);
        comp.set_size(width as usize, height as usize);
        comp.set_quality(quality as f32);
        comp.set_progressive_mode();
        comp.set_optimize_coding(true);

        let mut comp = comp.start_compress(Vec::new()).map_err(encode_error)?;
        comp.write_scanlines(rgb_img.as_raw()).map_err(encode_error)?;
        let jpeg_data = comp.finish().map_err(encode_error)?;

        Ok(Bytes::from(jpeg_data))
    }

    #[cfg(not(feature = "mozjpeg"))]
    fn compress_jpeg(img: &DynamicImage, quality: u8) -> Result<Bytes, CodecError> {
        Self::compress_jpeg_baseline(img, quality)
    }

    /// Baseline JPEG through the `image` crate. Always available; this is the fallback encoder.
    pub fn compress_jpeg_baseline(img: &DynamicImage, quality: u8) -> Result<Bytes, CodecError> {
        let rgb_img = img.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        encoder
            .encode_image(&rgb_img)
            .map_err(|e| CodecError::Encode {
                format: OutputFormat::Jpeg,
                reason: e.to_string(),
            })?;

        Ok(Bytes::from(buffer))
    }

    /// Compress to PNG
    fn compress_png(img: &DynamicImage) -> Result<Bytes, CodecError> {
        let mut buffer = Vec::new();
        let mut cursor = Cursor::new(&mut buffer);

        img.write_to(&mut cursor, ImageFormat::Png)
            .map_err(|e| CodecError::Encode {
                format: OutputFormat::Png,
                reason: e.to_string(),
            })?;

        Ok(Bytes::from(buffer))
    }

    /// Compress to WebP
    #[cfg(feature = "webp")]
    fn compress_webp(img: &DynamicImage, quality: u8) -> Result<Bytes, CodecError> {
        let (width, height) = img.dimensions();

        // Convert to RGBA for WebP encoding
        let rgba_img = img.to_rgba8();

        let encoder = webp::Encoder::from_rgba(rgba_img.as_raw(), width, height);
        let webp_data = encoder.encode(quality as f32);

        Ok(Bytes::copy_from_slice(&webp_data))
    }

    #[cfg(not(feature = "webp"))]
    fn compress_webp(_img: &DynamicImage, _quality: u8) -> Result<Bytes, CodecError> {
        Err(CodecError::EncoderUnavailable(OutputFormat::WebP))
    }

    /// Compress to AVIF
    #[cfg(feature = "avif")]
    fn compress_avif(img: &DynamicImage, quality: u8) -> Result<Bytes, CodecError> {
        let (width, height) = img.dimensions();

        let rgb_img = img.to_rgb8();
        let rgb_data: Vec<rgb::RGB8> = rgb_img
            .as_raw()
            .chunks_exact(3)
            .map(|chunk| rgb::RGB8::new(chunk[0], chunk[1], chunk[2]))
            .collect();

        let img_buf = ravif::Img::new(rgb_data.as_slice(), width as usize, height as usize);

        let encoder = ravif::Encoder::new()
            .with_quality(quality as f32)
            .with_speed(6); // Balance between speed and compression

        let avif_data = encoder
            .encode_rgb(img_buf)
            .map_err(|e| CodecError::Encode {
                format: OutputFormat::Avif,
                reason: e.to_string(),
            })?;

        Ok(Bytes::from(avif_data.avif_file))
    }

    #[cfg(not(feature = "avif"))]
    fn compress_avif(_img: &DynamicImage, _quality: u8) -> Result<Bytes, CodecError> {
        Err(CodecError::EncoderUnavailable(OutputFormat::Avif))
    }
}
