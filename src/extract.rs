//! Text extraction for uploaded documents (PDF, DOCX, plain text, Markdown).
//!
//! Returns the decoded text together with the byte offset at which each page
//! starts, which is what the chunker needs to attribute chunks to pages.
//! The PDF parser can panic on malformed input, so the engine runs
//! extraction on a blocking worker and reports a panic as a decoding failure.

use std::io::Read;

use docqa_core::chunk::decode_text;
use docqa_core::models::MediaType;
use quick_xml::events::Event;
use thiserror::Error;

/// Maximum decompressed bytes to read from a single ZIP entry (zip-bomb protection).
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

/// Separator between PDF pages in the extracted text.
const PDF_PAGE_SEPARATOR: &str = "\n\n";

/// Page separator in plain text and Markdown uploads.
pub const FORM_FEED: char = '\x0c';

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported media type: {0}")]
    Unsupported(String),
    /// Nothing in the content could be read as text.
    #[error("content is not text: {0}")]
    NotText(String),
    #[error("text decoding failed: {0}")]
    Text(String),
    #[error("PDF extraction failed: {0}")]
    Pdf(String),
    #[error("DOCX extraction failed: {0}")]
    Ooxml(String),
}

impl From<ExtractError> for docqa_core::Error {
    fn from(err: ExtractError) -> Self {
        match err {
            ExtractError::Unsupported(_) | ExtractError::NotText(_) => {
                docqa_core::Error::UnsupportedFormat(err.to_string())
            }
            ExtractError::Text(_) | ExtractError::Pdf(_) | ExtractError::Ooxml(_) => {
                docqa_core::Error::DecodingFailed(err.to_string())
            }
        }
    }
}

/// Decoded document text with page boundaries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    /// Byte offset of each page start; the first is always `0`.
    pub page_starts: Vec<usize>,
}

impl ExtractedText {
    fn single_page(text: String) -> Self {
        Self {
            text,
            page_starts: vec![0],
        }
    }

    pub fn page_count(&self) -> u32 {
        self.page_starts.len().max(1) as u32
    }
}

pub fn extract(bytes: &[u8], media_type: MediaType) -> Result<ExtractedText, ExtractError> {
    match media_type {
        MediaType::Pdf => extract_pdf(bytes),
        MediaType::Docx => extract_docx(bytes),
        MediaType::PlainText | MediaType::Markdown => extract_plain(bytes),
        MediaType::Doc => Err(ExtractError::Unsupported(
            "legacy Word (.doc) documents cannot be read; save as .docx".to_string(),
        )),
    }
}

fn extract_plain(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let text = decode_text(bytes).map_err(|e| match e {
        docqa_core::Error::UnsupportedFormat(msg) => ExtractError::NotText(msg),
        other => ExtractError::Text(other.to_string()),
    })?;
    let mut page_starts = vec![0];
    page_starts.extend(text.match_indices(FORM_FEED).map(|(i, _)| i + 1));
    // A trailing form feed does not open a page.
    if page_starts.len() > 1 && page_starts.last() == Some(&text.len()) {
        page_starts.pop();
    }
    Ok(ExtractedText {
        text: text.to_string(),
        page_starts,
    })
}

fn extract_pdf(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| ExtractError::Pdf(e.to_string()))?;
    if pages.is_empty() {
        return Ok(ExtractedText::single_page(String::new()));
    }
    let mut text = String::new();
    let mut page_starts = Vec::with_capacity(pages.len());
    for (i, page) in pages.iter().enumerate() {
        if i > 0 {
            text.push_str(PDF_PAGE_SEPARATOR);
        }
        page_starts.push(text.len());
        text.push_str(page.trim_end());
    }
    Ok(ExtractedText { text, page_starts })
}

fn read_zip_entry_bounded(
    archive: &mut zip::ZipArchive<std::io::Cursor<&[u8]>>,
    name: &str,
    max_bytes: u64,
) -> Result<Vec<u8>, ExtractError> {
    let entry = archive
        .by_name(name)
        .map_err(|e| ExtractError::Ooxml(format!("{}: {}", name, e)))?;
    let mut out = Vec::new();
    entry
        .take(max_bytes)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    if out.len() as u64 >= max_bytes {
        return Err(ExtractError::Ooxml(format!(
            "ZIP entry {} exceeds size limit ({} bytes)",
            name, max_bytes
        )));
    }
    Ok(out)
}

fn extract_docx(bytes: &[u8]) -> Result<ExtractedText, ExtractError> {
    let mut archive = zip::ZipArchive::new(std::io::Cursor::new(bytes))
        .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
    let doc_xml = read_zip_entry_bounded(&mut archive, "word/document.xml", MAX_XML_ENTRY_BYTES)?;
    extract_wordprocessing_text(&doc_xml)
}

/// Collect `w:t` runs. Paragraph ends become blank lines and explicit page
/// breaks (`<w:br w:type="page"/>`) open a new page.
fn extract_wordprocessing_text(xml: &[u8]) -> Result<ExtractedText, ExtractError> {
    let mut text = String::new();
    let mut page_starts = vec![0];
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_t = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                if e.local_name().as_ref() == b"t" {
                    in_t = true;
                }
            }
            Ok(Event::Text(te)) if in_t => {
                let run = te
                    .unescape()
                    .map_err(|e| ExtractError::Ooxml(e.to_string()))?;
                text.push_str(&run);
            }
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"br" if is_page_break(&e) => {
                    if page_starts.last() != Some(&text.len()) {
                        page_starts.push(text.len());
                    }
                }
                b"br" => text.push('\n'),
                b"tab" => text.push('\t'),
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_t = false,
                b"p" => text.push_str("\n\n"),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::Ooxml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }
    if page_starts.len() > 1 && page_starts.last() == Some(&text.len()) {
        page_starts.pop();
    }
    Ok(ExtractedText { text, page_starts })
}

fn is_page_break(e: &quick_xml::events::BytesStart<'_>) -> bool {
    e.attributes().any(|a| {
        a.as_ref()
            .map(|a| a.key.local_name().as_ref() == b"type" && a.value.as_ref() == b"page")
            .unwrap_or(false)
    })
}
