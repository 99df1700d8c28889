//! Error type shared by every docqa component.
//!
//! Insufficient evidence is not an error: an empty retrieval surfaces as
//! [`Answer::insufficient_evidence`](crate::answer::Answer).

use thiserror::Error;

/// Result alias using the crate [`enum@Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Content or media type cannot be turned into text at all.
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Upload exceeds the configured byte cap. Rejected before chunking.
    #[error("upload of {size} bytes exceeds limit of {limit} bytes")]
    SizeLimitExceeded { size: u64, limit: u64 },

    /// Content was only partially decodable; the document is marked failed.
    #[error("decoding failed: {0}")]
    DecodingFailed(String),

    #[error("document not found: {0}")]
    DocumentNotFound(String),

    /// A chunk handed to the index does not belong to the target namespace.
    #[error("chunk {chunk_id} belongs to document {found}, expected {expected}")]
    InvalidChunk {
        chunk_id: String,
        expected: String,
        found: String,
    },

    /// An operation exceeded its time budget; callers may retry.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

impl Error {
    pub fn not_found(id: impl Into<String>) -> Self {
        Error::DocumentNotFound(id.into())
    }

    /// Whether the caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
