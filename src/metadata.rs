//! Optional per-file metadata: EXIF tags for images, author/title for
//! documents.
//!
//! Each provider implements [`MetadataExtractor`] for one [`MetadataFamily`]
//! and a set of file extensions. [`Extractors`] picks the provider for a file
//! and [`FileMetadataCache`] memoizes results for the duration of one
//! operation, so a file is read at most once per family no matter how many
//! rules ask about it.

use crate::error::ExtractError;
use crate::events::EventSink;
use chrono::NaiveDateTime;
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Largest XML part read out of an Office document.
const MAX_XML_PART: u64 = 16 * 1024 * 1024;

/// Which kind of metadata a condition needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataFamily {
    Image,
    Pdf,
    Docx,
}

/// Metadata field names shared by all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetaKey {
    CameraModel,
    LensModel,
    Artist,
    FNumber,
    DateTimeOriginal,
    DateTime,
    ImageDescription,
    Author,
    Title,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MetaValue {
    Text(String),
    Number(f64),
    Timestamp(NaiveDateTime),
}

/// Key/value metadata for one file. Empty when nothing could be read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    values: BTreeMap<MetaKey, MetaValue>,
}

impl Metadata {
    pub fn insert(&mut self, key: MetaKey, value: MetaValue) {
        self.values.insert(key, value);
    }

    /// Inserts a text value unless it is blank.
    pub fn insert_text(&mut self, key: MetaKey, text: &str) {
        let text = text.trim();
        if !text.is_empty() {
            self.values.insert(key, MetaValue::Text(text.to_string()));
        }
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, key: MetaKey) -> Option<&MetaValue> {
        self.values.get(&key)
    }

    pub fn text(&self, key: MetaKey) -> Option<&str> {
        match self.values.get(&key) {
            Some(MetaValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn number(&self, key: MetaKey) -> Option<f64> {
        match self.values.get(&key) {
            Some(MetaValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn timestamp(&self, key: MetaKey) -> Option<NaiveDateTime> {
        match self.values.get(&key) {
            Some(MetaValue::Timestamp(ts)) => Some(*ts),
            _ => None,
        }
    }
}

/// A capability that derives metadata from files with certain extensions.
pub trait MetadataExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn family(&self) -> MetadataFamily;

    /// Whether this provider handles a lowercase extension without the dot.
    fn supports(&self, extension: &str) -> bool;

    fn extract(&self, path: &Path) -> Result<Metadata, ExtractError>;
}

/// EXIF tags from JPEG, TIFF, HEIF, PNG, WebP and TIFF-based raw files.
pub struct ImageExtractor;

impl ImageExtractor {
    const EXTENSIONS: &'static [&'static str] = &[
        "jpg", "jpeg", "tif", "tiff", "png", "webp", "heic", "heif", "nef", "cr2", "arw", "orf",
        "sr2", "dng",
    ];
}

impl MetadataExtractor for ImageExtractor {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn family(&self) -> MetadataFamily {
        MetadataFamily::Image
    }

    fn supports(&self, extension: &str) -> bool {
        Self::EXTENSIONS.contains(&extension)
    }

    fn extract(&self, path: &Path) -> Result<Metadata, ExtractError> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let exif = exif::Reader::new().read_from_container(&mut reader)?;

        let mut metadata = Metadata::default();
        let text_tags = [
            (exif::Tag::Model, MetaKey::CameraModel),
            (exif::Tag::LensModel, MetaKey::LensModel),
            (exif::Tag::Artist, MetaKey::Artist),
            (exif::Tag::ImageDescription, MetaKey::ImageDescription),
        ];
        for (tag, key) in text_tags {
            if let Some(text) = exif
                .get_field(tag, exif::In::PRIMARY)
                .and_then(|field| ascii_value(&field.value))
            {
                metadata.insert_text(key, &text);
            }
        }

        let date_tags = [
            (exif::Tag::DateTimeOriginal, MetaKey::DateTimeOriginal),
            (exif::Tag::DateTime, MetaKey::DateTime),
        ];
        for (tag, key) in date_tags {
            if let Some(timestamp) = exif
                .get_field(tag, exif::In::PRIMARY)
                .and_then(|field| ascii_value(&field.value))
                .and_then(|text| parse_exif_datetime(&text))
            {
                metadata.insert(key, MetaValue::Timestamp(timestamp));
            }
        }

        if let Some(field) = exif.get_field(exif::Tag::FNumber, exif::In::PRIMARY)
            && let exif::Value::Rational(ref values) = field.value
            && let Some(ratio) = values.first()
            && ratio.denom != 0
        {
            metadata.insert(MetaKey::FNumber, MetaValue::Number(ratio.to_f64()));
        }

        Ok(metadata)
    }
}

fn ascii_value(value: &exif::Value) -> Option<String> {
    match value {
        exif::Value::Ascii(parts) => parts.first().map(|bytes| {
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .trim()
                .to_string()
        }),
        _ => None,
    }
}

/// Parses the EXIF `YYYY:MM:DD HH:MM:SS` timestamp format.
pub fn parse_exif_datetime(text: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(text.trim(), "%Y:%m:%d %H:%M:%S").ok()
}

/// Author and title from the PDF document information dictionary.
pub struct PdfExtractor;

impl MetadataExtractor for PdfExtractor {
    fn name(&self) -> &'static str {
        "pdf-info"
    }

    fn family(&self) -> MetadataFamily {
        MetadataFamily::Pdf
    }

    fn supports(&self, extension: &str) -> bool {
        extension == "pdf"
    }

    fn extract(&self, path: &Path) -> Result<Metadata, ExtractError> {
        let document = lopdf::Document::load(path)?;
        if document.is_encrypted() {
            return Err(ExtractError::Encrypted);
        }

        let mut metadata = Metadata::default();
        let info = match document.trailer.get(b"Info") {
            Ok(lopdf::Object::Reference(id)) => document.get_object(*id)?.as_dict()?,
            Ok(lopdf::Object::Dictionary(dict)) => dict,
            _ => return Ok(metadata),
        };

        for (name, key) in [(&b"Author"[..], MetaKey::Author), (&b"Title"[..], MetaKey::Title)] {
            if let Ok(bytes) = info.get(name).and_then(|object| object.as_str()) {
                metadata.insert_text(key, &decode_pdf_text(bytes));
            }
        }
        Ok(metadata)
    }
}

/// Decodes a PDF text string: UTF-16BE with a byte-order mark, otherwise
/// treated as single-byte text.
pub fn decode_pdf_text(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Author and title from a Word document's `docProps/core.xml`.
pub struct DocxExtractor;

static CREATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<dc:creator[^>]*>(.*?)</dc:creator>").unwrap());
static TITLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<dc:title[^>]*>(.*?)</dc:title>").unwrap());

impl MetadataExtractor for DocxExtractor {
    fn name(&self) -> &'static str {
        "docx-core"
    }

    fn family(&self) -> MetadataFamily {
        MetadataFamily::Docx
    }

    fn supports(&self, extension: &str) -> bool {
        extension == "docx"
    }

    fn extract(&self, path: &Path) -> Result<Metadata, ExtractError> {
        let core = read_zip_part(path, "docProps/core.xml")?;

        let mut metadata = Metadata::default();
        for (re, key) in [(&*CREATOR_RE, MetaKey::Author), (&*TITLE_RE, MetaKey::Title)] {
            if let Some(capture) = re.captures(&core).and_then(|c| c.get(1)) {
                metadata.insert_text(key, &xml_unescape(capture.as_str()));
            }
        }
        Ok(metadata)
    }
}

/// Reads one XML part out of an Office (zip) container.
pub(crate) fn read_zip_part(path: &Path, part: &str) -> Result<String, ExtractError> {
    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let entry = archive.by_name(part)?;
    let mut xml = String::new();
    entry.take(MAX_XML_PART).read_to_string(&mut xml)?;
    Ok(xml)
}

/// Replaces the five predefined XML entities.
pub(crate) fn xml_unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// The set of metadata providers available to the engine.
pub struct Extractors {
    providers: Vec<Box<dyn MetadataExtractor>>,
}

impl Extractors {
    pub fn new(providers: Vec<Box<dyn MetadataExtractor>>) -> Self {
        Self { providers }
    }

    /// Image, PDF and Word providers.
    pub fn standard() -> Self {
        Self::new(vec![
            Box::new(ImageExtractor),
            Box::new(PdfExtractor),
            Box::new(DocxExtractor),
        ])
    }

    /// Runs the first provider of `family` that supports the file's extension.
    ///
    /// Returns an empty [`Metadata`] when no provider applies.
    pub fn extract(&self, family: MetadataFamily, path: &Path) -> Result<Metadata, ExtractError> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match self
            .providers
            .iter()
            .find(|provider| provider.family() == family && provider.supports(&extension))
        {
            Some(provider) => {
                tracing::debug!("{} reading {}", provider.name(), path.display());
                provider.extract(path)
            }
            None => Ok(Metadata::default()),
        }
    }
}

impl Default for Extractors {
    fn default() -> Self {
        Self::standard()
    }
}

/// Per-operation memo of extracted metadata, keyed by path and family.
///
/// Created at the start of a top-level operation and dropped at its end;
/// never shared between operations.
#[derive(Debug, Default)]
pub struct FileMetadataCache {
    entries: HashMap<PathBuf, HashMap<MetadataFamily, Metadata>>,
}

impl FileMetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns cached metadata, extracting it on first use.
    ///
    /// Extraction failures are logged and cached as empty metadata.
    pub fn get_or_extract(
        &mut self,
        path: &Path,
        family: MetadataFamily,
        extractors: &Extractors,
        sink: &EventSink,
    ) -> &Metadata {
        self.entries
            .entry(path.to_path_buf())
            .or_default()
            .entry(family)
            .or_insert_with(|| match extractors.extract(family, path) {
                Ok(metadata) => metadata,
                Err(ExtractError::Exif(exif::Error::NotFound(_))) => Metadata::default(),
                Err(e) => {
                    sink.warn(format!(
                        "  - WARN: Could not read metadata from {}: {}",
                        display_name(path),
                        e
                    ));
                    Metadata::default()
                }
            })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// File name for log lines, falling back to the full path.
pub(crate) fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
