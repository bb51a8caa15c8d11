//! Best-effort structural metadata.
//!
//! Extraction never fails. Anything that cannot be determined is left as `None` and, when
//! it indicates a damaged or mislabelled file, noted in `AssetMetadata::degradations`.

use hearth_core::constants::DEFAULT_PDF_SCAN_WINDOW_BYTES;
use hearth_core::{AssetMetadata, PipelineConfig};
use image::ImageReader;
use regex::bytes::Regex;
use std::io::Cursor;
use std::sync::LazyLock;

const PDF_MAGIC: &[u8] = b"%PDF";
const PDF_MIME: &str = "application/pdf";

static ENCRYPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Encrypt\b").expect("valid regex"));
static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)/Count\s+(\d+)").expect("valid regex"));
static TITLE_RE: LazyLock<Regex> = LazyLock::new(|| info_string_regex("Title"));
static AUTHOR_RE: LazyLock<Regex> = LazyLock::new(|| info_string_regex("Author"));
static SUBJECT_RE: LazyLock<Regex> = LazyLock::new(|| info_string_regex("Subject"));

/// `/Key (literal string)` with backslash escapes allowed inside the parentheses. Matches raw
/// bytes so UTF-16 strings are captured too.
fn info_string_regex(key: &str) -> Regex {
    Regex::new(&format!(r"(?s-u)/{}\s*\(((?:[^()\\]|\\.)*)\)", key)).expect("valid regex")
}

#[derive(Debug, Clone)]
pub struct MetadataExtractor {
    pdf_scan_window: usize,
}

impl Default for MetadataExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_PDF_SCAN_WINDOW_BYTES)
    }
}

impl MetadataExtractor {
    pub fn new(pdf_scan_window: usize) -> Self {
        Self {
            pdf_scan_window: pdf_scan_window.max(1),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.pdf_scan_window_bytes)
    }

    pub fn extract(&self, data: &[u8], declared_mime: &str) -> AssetMetadata {
        let mut meta = AssetMetadata::with_size(data.len() as u64);
        let mime = declared_mime
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        if data.is_empty() {
            degrade(&mut meta, "buffer is empty, nothing to inspect");
            return meta;
        }

        if data.starts_with(PDF_MAGIC) || mime == PDF_MIME {
            self.scan_pdf(data, &mut meta);
        } else if mime.starts_with("image/") || image::guess_format(data).is_ok() {
            probe_image(data, &mut meta);
        }

        meta
    }

    fn scan_pdf(&self, data: &[u8], meta: &mut AssetMetadata) {
        meta.format = Some("pdf".to_string());
        if !data.starts_with(PDF_MAGIC) {
            degrade(meta, "declared as PDF but the %PDF header is missing");
        }

        let window = &data[..data.len().min(self.pdf_scan_window)];
        if window.len() < data.len() {
            tracing::debug!(
                scanned_bytes = window.len(),
                total_bytes = data.len(),
                "PDF larger than scan window, markers past it are ignored"
            );
        }

        meta.encrypted = Some(ENCRYPT_RE.is_match(window));
        meta.page_count = COUNT_RE
            .captures_iter(window)
            .filter_map(|caps| {
                std::str::from_utf8(&caps[1])
                    .ok()
                    .and_then(|s| s.parse::<u32>().ok())
            })
            .max();
        meta.title = capture_string(&TITLE_RE, window);
        meta.author = capture_string(&AUTHOR_RE, window);
        meta.subject = capture_string(&SUBJECT_RE, window);
    }
}

fn probe_image(data: &[u8], meta: &mut AssetMetadata) {
    let reader = match ImageReader::new(Cursor::new(data)).with_guessed_format() {
        Ok(reader) => reader,
        Err(e) => {
            degrade(meta, format!("could not read image header: {}", e));
            return;
        }
    };

    let Some(format) = reader.format() else {
        degrade(meta, "unrecognized image format");
        return;
    };
    meta.format = Some(format!("{:?}", format).to_lowercase());

    meta.exif_orientation = read_exif_orientation(data);

    // Orientations 5-8 are stored rotated a quarter turn; report the upright size.
    let quarter_turn = matches!(meta.exif_orientation, Some(5..=8));
    match reader.into_dimensions() {
        Ok((width, height)) if quarter_turn => meta.set_dimensions(height, width),
        Ok((width, height)) => meta.set_dimensions(width, height),
        Err(e) => degrade(meta, format!("could not read image dimensions: {}", e)),
    }
}

/// EXIF orientation (1-8) if the container carries one.
pub fn read_exif_orientation(data: &[u8]) -> Option<u8> {
    let exif = exif::Reader::new()
        .read_from_container(&mut Cursor::new(data))
        .ok()?;
    let field = exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)?;
    let value = field.value.get_uint(0)?;
    u8::try_from(value).ok().filter(|v| (1..=8).contains(v))
}

fn capture_string(re: &Regex, window: &[u8]) -> Option<String> {
    let caps = re.captures(window)?;
    let text = decode_pdf_string(&caps[1]);
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Decode a PDF literal string body: resolve simple escapes, honour a UTF-16BE BOM.
fn decode_pdf_string(raw: &[u8]) -> String {
    let mut bytes = Vec::with_capacity(raw.len());
    let mut iter = raw.iter().copied();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match iter.next() {
            Some(b'n') => bytes.push(b'\n'),
            Some(b'r') => bytes.push(b'\r'),
            Some(b't') => bytes.push(b'\t'),
            Some(other) => bytes.push(other),
            None => {}
        }
    }

    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }

    String::from_utf8_lossy(&bytes).into_owned()
}

fn degrade(meta: &mut AssetMetadata, note: impl Into<String>) {
    let note = note.into();
    tracing::warn!(degradation = %note, "Metadata extraction degraded");
    meta.degrade(note);
}
