//! Responsive image sets (`srcset` candidates plus a `sizes` attribute).

use bytes::Bytes;
use hearth_core::{DerivativeFailure, MediaAsset, MediaVariant, OutputFormat, ThumbnailKind};
use image::{DynamicImage, GenericImageView};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::derivatives::{DerivativeError, DerivativeGenerator, VariantSpec};

/// Multipliers applied to the base width to get candidate widths.
pub const DENSITIES: [f64; 4] = [0.5, 1.0, 1.5, 2.0];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Breakpoint {
    pub max_viewport_px: u32,
    /// Slot size at or below this viewport width, e.g. `50vw` or `400px`
    pub slot: String,
}

/// Viewport breakpoints for the `sizes` attribute, kept sorted by viewport width.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakpointTable {
    entries: Vec<Breakpoint>,
    fallback: String,
}

impl Default for BreakpointTable {
    fn default() -> Self {
        Self::new([(640, "100vw"), (1024, "50vw")], "33vw")
    }
}

impl BreakpointTable {
    pub fn new<I, S>(entries: I, fallback: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (u32, S)>,
        S: Into<String>,
    {
        let mut entries: Vec<Breakpoint> = entries
            .into_iter()
            .map(|(max_viewport_px, slot)| Breakpoint {
                max_viewport_px,
                slot: slot.into(),
            })
            .collect();
        entries.sort_by_key(|e| e.max_viewport_px);
        entries.dedup_by_key(|e| e.max_viewport_px);

        Self {
            entries,
            fallback: fallback.into(),
        }
    }

    pub fn entries(&self) -> &[Breakpoint] {
        &self.entries
    }

    /// `(max-width: 640px) 100vw, (max-width: 1024px) 50vw, 33vw`
    pub fn sizes_attr(&self) -> String {
        let mut parts: Vec<String> = self
            .entries
            .iter()
            .map(|e| format!("(max-width: {}px) {}", e.max_viewport_px, e.slot))
            .collect();
        let fallback = self.fallback.trim();
        if !fallback.is_empty() {
            parts.push(fallback.to_string());
        }
        parts.join(", ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsiveCandidate {
    pub width: u32,
    pub height: u32,
    #[serde(skip)]
    pub data: Bytes,
    pub format: OutputFormat,
}

impl From<MediaVariant> for ResponsiveCandidate {
    fn from(variant: MediaVariant) -> Self {
        Self {
            width: variant.width,
            height: variant.height,
            data: variant.data,
            format: variant.format,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponsiveSet {
    /// Ascending by width, no duplicate widths
    pub candidates: Vec<ResponsiveCandidate>,
    pub sizes_attr: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<DerivativeFailure>,
}

impl ResponsiveSet {
    /// Render a `srcset` value, asking `url_for` for each candidate's URL.
    pub fn srcset<F>(&self, url_for: F) -> String
    where
        F: Fn(&ResponsiveCandidate) -> String,
    {
        self.candidates
            .iter()
            .map(|c| format!("{} {}w", url_for(c), c.width))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn widths(&self) -> Vec<u32> {
        self.candidates.iter().map(|c| c.width).collect()
    }

    pub fn largest(&self) -> Option<&ResponsiveCandidate> {
        self.candidates.last()
    }
}

#[derive(Clone)]
pub struct ResponsiveSetBuilder {
    generator: DerivativeGenerator,
    format: OutputFormat,
    quality: u8,
}

impl Default for ResponsiveSetBuilder {
    fn default() -> Self {
        Self::new(DerivativeGenerator::default())
    }
}

impl ResponsiveSetBuilder {
    pub fn new(generator: DerivativeGenerator) -> Self {
        Self {
            generator,
            format: OutputFormat::WebP,
            quality: 85,
        }
    }

    pub fn with_output(mut self, format: OutputFormat, quality: u8) -> Self {
        self.format = format;
        self.quality = quality;
        self
    }

    pub fn build_src_set(
        &self,
        asset: &MediaAsset,
        base_width: u32,
        breakpoints: &BreakpointTable,
    ) -> Result<ResponsiveSet, DerivativeError> {
        let img = self.generator.decode(asset)?;
        self.build_from_image(&img, base_width, breakpoints)
    }

    pub fn build_from_image(
        &self,
        img: &DynamicImage,
        base_width: u32,
        breakpoints: &BreakpointTable,
    ) -> Result<ResponsiveSet, DerivativeError> {
        if base_width == 0 {
            return Err(DerivativeError::InvalidSpec(
                "base width must be greater than zero".to_string(),
            ));
        }

        let (src_width, _) = img.dimensions();
        let specs: Vec<VariantSpec> = candidate_widths(base_width, src_width)
            .into_iter()
            .map(|width| {
                VariantSpec::new(
                    ThumbnailKind::Responsive(width),
                    width,
                    u32::MAX,
                    self.quality,
                    self.format,
                )
            })
            .collect();

        let set = self.generator.generate_from_image(img, &specs);
        if set.variants.is_empty() {
            let reason = set
                .failures
                .first()
                .map(|f| f.reason.clone())
                .unwrap_or_else(|| "no candidates produced".to_string());
            return Err(DerivativeError::Encode {
                kind: ThumbnailKind::Responsive(base_width),
                reason,
            });
        }

        Ok(ResponsiveSet {
            candidates: set.variants.into_iter().map(Into::into).collect(),
            sizes_attr: breakpoints.sizes_attr(),
            failures: set.failures,
        })
    }
}

/// `DENSITIES x base_width`, capped at the source width, deduplicated, ascending.
pub fn candidate_widths(base_width: u32, src_width: u32) -> Vec<u32> {
    let cap = src_width.max(1);
    DENSITIES
        .iter()
        .map(|m| ((base_width as f64 * m).round() as u32).clamp(1, cap))
        .collect::<BTreeSet<u32>>()
        .into_iter()
        .collect()
}
