//! Body text readers used by `content` conditions.
//!
//! Only a bounded prefix of each document is read: the first MiB of plain
//! text, the first pages of small unencrypted PDFs, the first paragraphs of
//! Word documents.

use crate::error::ExtractError;
use crate::metadata::{read_zip_part, xml_unescape};
use regex::Regex;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::LazyLock;

/// Bytes of a plain-text file searched by a content condition.
pub const MAX_TEXT_BYTES: u64 = 1024 * 1024;

/// PDFs at or above this size are not searched.
pub const MAX_PDF_BYTES: u64 = 5 * 1024 * 1024;

const PDF_PAGES: usize = 2;
const DOCX_PARAGRAPHS: usize = 10;

const TEXT_EXTENSIONS: &[&str] = &["txt", "md", "csv", "log"];

static PARAGRAPH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:p(?:\s[^>]*)?>(.*?)</w:p>").unwrap());
static TEXT_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<w:t(?:\s[^>]*)?>(.*?)</w:t>").unwrap());

/// Returns `true` if [`read_body`] knows how to read this file.
pub fn is_searchable(path: &Path) -> bool {
    let extension = lowercase_extension(path);
    TEXT_EXTENSIONS.contains(&extension.as_str()) || extension == "pdf" || extension == "docx"
}

/// Reads the searchable prefix of a document.
///
/// Returns `Ok(None)` for file types that have no body reader.
pub fn read_body(path: &Path) -> Result<Option<String>, ExtractError> {
    let extension = lowercase_extension(path);
    match extension.as_str() {
        ext if TEXT_EXTENSIONS.contains(&ext) => read_plain_text(path).map(Some),
        "pdf" => read_pdf_text(path),
        "docx" => read_docx_text(path).map(Some),
        _ => Ok(None),
    }
}

fn read_plain_text(path: &Path) -> Result<String, ExtractError> {
    let mut bytes = Vec::new();
    File::open(path)?.take(MAX_TEXT_BYTES).read_to_end(&mut bytes)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Oversized documents are not searched and yield no body.
fn read_pdf_text(path: &Path) -> Result<Option<String>, ExtractError> {
    let size = path.metadata()?.len();
    if size >= MAX_PDF_BYTES {
        tracing::debug!("Skipping content of {} ({} bytes)", path.display(), size);
        return Ok(None);
    }

    let document = lopdf::Document::load(path)?;
    if document.is_encrypted() {
        return Err(ExtractError::Encrypted);
    }

    let pages: Vec<u32> = document.get_pages().keys().take(PDF_PAGES).copied().collect();
    if pages.is_empty() {
        return Ok(Some(String::new()));
    }
    Ok(Some(document.extract_text(&pages)?))
}

fn read_docx_text(path: &Path) -> Result<String, ExtractError> {
    let xml = read_zip_part(path, "word/document.xml")?;

    let paragraphs: Vec<String> = PARAGRAPH_RE
        .captures_iter(&xml)
        .take(DOCX_PARAGRAPHS)
        .filter_map(|paragraph| paragraph.get(1))
        .map(|body| {
            TEXT_RUN_RE
                .captures_iter(body.as_str())
                .filter_map(|run| run.get(1))
                .map(|text| xml_unescape(text.as_str()))
                .collect::<String>()
        })
        .collect();
    Ok(paragraphs.join("\n"))
}

fn lowercase_extension(path: &Path) -> String {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}
