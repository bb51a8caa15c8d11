#[path = "helpers/mod.rs"]
mod helpers;

use hearth_core::constants::MIB;
use hearth_core::{JobStatus, MediaAsset, ThumbnailKind, ValidationPolicy};
use hearth_processing::derivatives::standard_specs;
use hearth_processing::{
    checksum, BreakpointTable, DerivativeGenerator, MetadataExtractor, ResponsiveSetBuilder,
    Validator,
};
use helpers::fixtures::{create_padded_png, create_test_jpeg, exif_jpeg_asset, jpeg_asset};
use helpers::{pipeline, registry};
use std::sync::Arc;

#[test]
fn test_digest_is_deterministic() {
    let data = create_test_jpeg(64, 48);
    assert_eq!(checksum::digest(&data), checksum::digest(&data));
    assert_eq!(checksum::digest(b""), checksum::digest(b""));
}

#[test]
fn test_unknown_media_types_resolve_to_other() {
    let registry = registry();
    let other = registry.resolve("other");
    for tag in ["pool_photo", "OTHER ", "", "contract2", "floor-plan"] {
        assert_eq!(registry.resolve(tag), other, "tag {:?}", tag);
    }
}

#[test]
fn test_round_trip_property_photo_1920x1080() {
    let asset = jpeg_asset("facade.jpg", "property_photo", 1920, 1080);
    let registry = registry();
    let policy = registry.resolve("property_photo");

    let metadata = MetadataExtractor::default().extract(asset.data(), asset.content_type());
    assert_eq!(metadata.dimensions(), Some((1920, 1080)));

    let validation = Validator::validate(&asset, &metadata, policy);
    assert!(validation.valid(), "{:?}", validation);

    let generator = DerivativeGenerator::default();
    let specs = standard_specs();
    let set = generator.generate(&asset, &specs).unwrap();
    assert!(set.is_complete());

    let names: Vec<ThumbnailKind> = set.variants.iter().map(|v| v.name).collect();
    assert_eq!(
        names,
        vec![
            ThumbnailKind::Thumbnail,
            ThumbnailKind::Card,
            ThumbnailKind::Gallery,
            ThumbnailKind::Hero,
            ThumbnailKind::Placeholder,
        ]
    );
    for (variant, spec) in set.variants.iter().zip(&specs) {
        assert!(variant.width <= spec.max_width, "{}", variant.name);
        assert!(variant.height <= spec.max_height, "{}", variant.name);
        assert!(!variant.data.is_empty());
    }

    let responsive = ResponsiveSetBuilder::new(generator)
        .build_src_set(&asset, 800, &BreakpointTable::default())
        .unwrap();
    assert!(!responsive.sizes_attr.is_empty());
    assert_eq!(responsive.widths(), vec![400, 800, 1200, 1600]);
}

#[test]
fn test_variants_preserve_aspect_within_bounds() {
    let generator = DerivativeGenerator::default();
    let specs = standard_specs();

    for (width, height) in [(1920, 1080), (1080, 1920), (4000, 1000), (500, 500), (100, 80), (16, 9)] {
        let asset = jpeg_asset("room.jpg", "property_photo", width, height);
        let set = generator.generate(&asset, &specs).unwrap();
        let source_ratio = width as f64 / height as f64;

        for (variant, spec) in set.variants.iter().zip(&specs) {
            assert!(variant.width <= spec.max_width);
            assert!(variant.height <= spec.max_height);
            assert!(variant.width <= width && variant.height <= height);

            // one pixel of rounding on either axis
            let low = (variant.width as f64 - 1.0).max(0.5) / (variant.height as f64 + 1.0);
            let high = (variant.width as f64 + 1.0) / (variant.height as f64 - 1.0).max(0.5);
            assert!(
                low <= source_ratio && source_ratio <= high,
                "{}x{} -> {} {}x{}",
                width,
                height,
                variant.name,
                variant.width,
                variant.height
            );
        }
    }
}

#[test]
fn test_adding_formats_never_invalidates() {
    let formats = [
        "image/jpeg",
        "image/png",
        "image/webp",
        "application/pdf",
        "text/plain",
    ];
    let assets: Vec<MediaAsset> = formats
        .iter()
        .map(|ct| MediaAsset::new(vec![1u8; 32], "listing", "file.bin", *ct))
        .collect();

    let mut policy = ValidationPolicy::new(Vec::<String>::new(), MIB);
    let mut previous: Vec<bool> = vec![false; assets.len()];

    for format in formats {
        policy = policy.allowing(format);
        for (i, asset) in assets.iter().enumerate() {
            let metadata = MetadataExtractor::default().extract(asset.data(), asset.content_type());
            let valid = Validator::validate(asset, &metadata, &policy).valid();
            assert!(valid || !previous[i], "{} became invalid", asset.content_type());
            previous[i] = valid;
        }
    }
    assert!(previous.iter().all(|v| *v));
}

#[test]
fn test_oversized_png_is_rejected_once() {
    let data = create_padded_png(1000, 800, 15 * MIB as usize);
    let asset = Arc::new(MediaAsset::new(data, "property_photo", "big.png", "image/png"));

    let job = pipeline().process(0, asset);
    let validation = job.validation.as_ref().unwrap();
    assert!(!validation.valid());
    assert_eq!(validation.errors().len(), 1);
    assert!(validation.errors()[0].contains("10 MB"));
    assert!(job.variants.is_empty());
    assert!(matches!(job.status, JobStatus::Rejected { .. }));
}

#[test]
fn test_min_width_policy() {
    let asset = jpeg_asset("small.jpg", "property_photo", 300, 200);
    let metadata = MetadataExtractor::default().extract(asset.data(), asset.content_type());

    let strict = ValidationPolicy::new(["image/jpeg"], 10 * MIB).with_min_dimensions(400, 100);
    let result = Validator::validate(&asset, &metadata, &strict);
    assert!(!result.valid());
    assert!(result.errors().iter().any(|e| e.contains("width")));

    let relaxed = ValidationPolicy::new(["image/jpeg"], 10 * MIB);
    let result = Validator::validate(&asset, &metadata, &relaxed);
    assert!(result.valid());
    assert!(result.errors().is_empty());
}

#[test]
fn test_denylisted_filename_rejected_for_any_mime() {
    let registry = registry();
    for (content_type, media_type) in [
        ("application/pdf", "contract"),
        ("image/jpeg", "property_photo"),
        ("text/plain", "other"),
    ] {
        let asset = MediaAsset::new(b"%PDF-1.4".to_vec(), media_type, "invoice.pdf.exe", content_type);
        let metadata = MetadataExtractor::default().extract(asset.data(), asset.content_type());
        let result = Validator::validate(&asset, &metadata, registry.resolve(media_type));
        assert!(!result.valid(), "{}", content_type);
        assert!(result.errors().iter().any(|e| e.contains(".exe")));
    }
}

#[test]
fn test_rotated_photo_is_processed_upright() {
    // Stored landscape, displayed portrait.
    let asset = exif_jpeg_asset("portrait.jpg", "property_photo", 800, 600, 6);

    let set = DerivativeGenerator::default()
        .generate(&asset, &standard_specs())
        .unwrap();
    assert!(set.is_complete());
    assert_eq!((set.source_width, set.source_height), (600, 800));
    let gallery = set.get(ThumbnailKind::Gallery).unwrap();
    assert_eq!((gallery.width, gallery.height), (450, 600));
    let hero = set.get(ThumbnailKind::Hero).unwrap();
    assert_eq!((hero.width, hero.height), (600, 800));

    let metadata = MetadataExtractor::default().extract(asset.data(), "image/jpeg");
    assert_eq!(metadata.dimensions(), Some((600, 800)));
    let wide_only = ValidationPolicy::new(["image/jpeg"], 10 * MIB).with_min_dimensions(700, 100);
    let result = Validator::validate(&asset, &metadata, &wide_only);
    assert!(!result.valid());
    assert!(result.errors()[0].contains("width"), "{:?}", result.errors());
}
