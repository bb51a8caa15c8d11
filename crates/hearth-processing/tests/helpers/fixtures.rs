use hearth_core::MediaAsset;
use img_parts::jpeg::Jpeg;
use img_parts::ImageEXIF;
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use std::io::Cursor;

fn gradient(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    }))
}

fn encode(img: &DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Vec::new();
    img.write_to(&mut Cursor::new(&mut out), format)
        .expect("encode test image");
    out
}

pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Jpeg)
}

pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    encode(&gradient(width, height), ImageFormat::Png)
}

/// A valid PNG followed by zero padding up to `total_len` bytes.
pub fn create_padded_png(width: u32, height: u32, total_len: usize) -> Vec<u8> {
    let mut png = create_test_png(width, height);
    if png.len() < total_len {
        png.resize(total_len, 0);
    }
    png
}

pub fn jpeg_asset(name: &str, media_type: &str, width: u32, height: u32) -> MediaAsset {
    MediaAsset::new(create_test_jpeg(width, height), media_type, name, "image/jpeg")
}

/// Minimal big-endian EXIF payload: one IFD0 entry carrying `orientation`.
pub fn orientation_exif(orientation: u8) -> Vec<u8> {
    let mut tiff = b"MM\x00\x2A\x00\x00\x00\x08".to_vec();
    tiff.extend_from_slice(&[0x00, 0x01]);
    tiff.extend_from_slice(&[0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    tiff.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
    tiff.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    tiff
}

/// JPEG stored at `width` x `height` with an EXIF orientation tag.
pub fn create_exif_jpeg(width: u32, height: u32, orientation: u8) -> Vec<u8> {
    let mut jpeg =
        Jpeg::from_bytes(create_test_jpeg(width, height).into()).expect("parse test jpeg");
    jpeg.set_exif(Some(orientation_exif(orientation).into()));
    jpeg.encoder().bytes().to_vec()
}

pub fn exif_jpeg_asset(
    name: &str,
    media_type: &str,
    width: u32,
    height: u32,
    orientation: u8,
) -> MediaAsset {
    MediaAsset::new(
        create_exif_jpeg(width, height, orientation),
        media_type,
        name,
        "image/jpeg",
    )
}

/// Starts like a JPEG but cannot be decoded.
pub fn corrupt_jpeg_asset(name: &str) -> MediaAsset {
    let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0];
    data.extend_from_slice(b"this is not really a jpeg");
    MediaAsset::new(data, "property_photo", name, "image/jpeg")
}
