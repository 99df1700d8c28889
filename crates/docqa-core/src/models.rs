//! Core data models used throughout docqa.
//!
//! These types represent the documents, chunks, and chat messages that flow
//! through the ingestion and question-answering pipeline.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOC: &str = "application/msword";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";

/// Media types the upload surface accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Pdf,
    /// Legacy binary Word. Accepted for upload, never decodable.
    Doc,
    Docx,
    PlainText,
    Markdown,
}

impl MediaType {
    pub fn from_mime(mime: &str) -> Option<Self> {
        // Strip parameters such as "; charset=utf-8".
        let essence = mime.split(';').next().unwrap_or("").trim();
        match essence.to_ascii_lowercase().as_str() {
            MIME_PDF => Some(Self::Pdf),
            MIME_DOC => Some(Self::Doc),
            MIME_DOCX => Some(Self::Docx),
            MIME_TEXT => Some(Self::PlainText),
            MIME_MARKDOWN | "text/x-markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    pub fn from_extension(filename: &str) -> Option<Self> {
        let ext = filename.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "pdf" => Some(Self::Pdf),
            "doc" => Some(Self::Doc),
            "docx" => Some(Self::Docx),
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Resolve the declared MIME type, falling back to the filename
    /// extension when the browser sent nothing useful.
    pub fn resolve(mime: &str, filename: &str) -> Option<Self> {
        let generic = mime.trim().is_empty()
            || mime.trim().eq_ignore_ascii_case("application/octet-stream");
        if generic {
            Self::from_extension(filename)
        } else {
            Self::from_mime(mime)
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            Self::Pdf => MIME_PDF,
            Self::Doc => MIME_DOC,
            Self::Docx => MIME_DOCX,
            Self::PlainText => MIME_TEXT,
            Self::Markdown => MIME_MARKDOWN,
        }
    }

    /// Short label shown in the library (`PDF`, `DOCX`, ...).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pdf => "PDF",
            Self::Doc => "DOC",
            Self::Docx => "DOCX",
            Self::PlainText => "TXT",
            Self::Markdown => "MD",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// Processing state of a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentState {
    Pending,
    Ready,
    Failed,
}

/// An uploaded document. Only `state` and `page_count` change after
/// creation, both once ingestion finishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub title: String,
    pub filename: String,
    pub media_type: MediaType,
    pub page_count: u32,
    pub byte_size: u64,
    pub ingested_at: DateTime<Utc>,
    pub state: DocumentState,
}

impl Document {
    /// Create a `pending` document with a fresh id.
    pub fn new(filename: &str, media_type: MediaType, byte_size: u64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            title: title_from_filename(filename),
            filename: filename.to_string(),
            media_type,
            page_count: 0,
            byte_size,
            ingested_at: Utc::now(),
            state: DocumentState::Pending,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state == DocumentState::Ready
    }
}

/// Title shown in the library: the filename up to its first dot.
pub fn title_from_filename(filename: &str) -> String {
    let base = filename.rsplit(['/', '\\']).next().unwrap_or(filename);
    match base.split('.').next() {
        Some(stem) if !stem.trim().is_empty() => stem.to_string(),
        _ => base.to_string(),
    }
}

/// A passage of a document's text. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    pub document_id: String,
    /// 1-based page number.
    pub page: u32,
    /// 0-based position within the page.
    pub ordinal: u32,
    /// Byte offset of the first byte in the decoded document text.
    pub start: usize,
    /// Byte offset one past the last byte.
    pub end: usize,
    pub text: String,
    /// SHA-256 of `text`, hex encoded.
    pub hash: String,
}

impl Chunk {
    /// Number of bytes shared with `other` when both sit on the same page.
    pub fn overlap_with(&self, other: &Chunk) -> usize {
        if self.document_id != other.document_id || self.page != other.page {
            return 0;
        }
        let lo = self.start.max(other.start);
        let hi = self.end.min(other.end);
        hi.saturating_sub(lo)
    }
}

/// A source reference attached to an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub page: u32,
    /// Chunks on this page whose text was used.
    pub chunk_ids: Vec<String>,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Page {}", self.page)
    }
}

/// One question/answer exchange about a document. Never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub document_id: String,
    pub question: String,
    pub answer: String,
    pub citations: Vec<Citation>,
    pub created_at: DateTime<Utc>,
}
