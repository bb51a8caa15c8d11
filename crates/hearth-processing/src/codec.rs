//! Image codec abstraction.
//!
//! Derivative generation talks to images only through [`ImageCodec`], so encoders can be
//! swapped (or made to fail in tests) without touching the resize and fallback logic.

use bytes::Bytes;
use hearth_core::OutputFormat;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use std::io::Cursor;

use crate::compression::ImageCompressor;

#[derive(Debug, Clone, thiserror::Error)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("{0} encoder is not available in this build")]
    EncoderUnavailable(OutputFormat),

    #[error("Failed to encode {format}: {reason}")]
    Encode {
        format: OutputFormat,
        reason: String,
    },
}

pub trait ImageCodec: Send + Sync {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError>;

    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Bytes, CodecError>;

    /// Resize to exactly `width` x `height` with a Lanczos3 filter.
    fn resize(&self, img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        img.resize_exact(width, height, FilterType::Lanczos3)
    }

    /// Gaussian blur with the given standard deviation.
    fn blur(&self, img: &DynamicImage, sigma: f32) -> DynamicImage {
        let rgba = img.to_rgba8();
        DynamicImage::ImageRgba8(imageproc::filter::gaussian_blur_f32(&rgba, sigma))
    }
}

/// Codec backed by the `image` crate for decoding and the compiled-in encoders.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl ImageCodec for NativeCodec {
    fn decode(&self, data: &[u8]) -> Result<DynamicImage, CodecError> {
        let reader = ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .map_err(|e| CodecError::Decode(e.to_string()))?;
        if reader.format().is_none() {
            return Err(CodecError::Decode("unrecognized image format".to_string()));
        }
        reader
            .decode()
            .map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(
        &self,
        img: &DynamicImage,
        format: OutputFormat,
        quality: u8,
    ) -> Result<Bytes, CodecError> {
        ImageCompressor::compress(img, format, quality)
    }
}

/// Rotate/flip a decoded image so it displays upright for the given EXIF orientation (1-8).
pub fn apply_orientation(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
