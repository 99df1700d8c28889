//! Chunk index abstraction.
//!
//! The [`Index`] trait defines the operations the retrieval pipeline needs,
//! enabling pluggable backends. Each document occupies its own namespace;
//! a search only crosses namespaces when explicitly scoped to
//! [`Scope::All`].
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must make [`Index::add`] atomic: readers see either none or all of a
//! document's chunks.

pub mod memory;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::models::Chunk;

pub use memory::InMemoryIndex;

/// Which namespaces a search covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    Document(String),
    All,
}

impl Scope {
    pub fn document(id: impl Into<String>) -> Self {
        Scope::Document(id.into())
    }
}

/// A search hit. Scores are in `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f64,
}

/// Abstract chunk index.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`add`](Index::add) | Atomically publish all chunks of a document |
/// | [`remove`](Index::remove) | Drop a document's namespace (idempotent) |
/// | [`search`](Index::search) | Ranked, deterministic relevance search |
/// | [`chunks`](Index::chunks) | All chunks of a document in page order |
/// | [`contains`](Index::contains) | Whether a namespace exists |
#[async_trait]
pub trait Index: Send + Sync {
    /// Publish `chunks` as the namespace of `document_id`, replacing any
    /// previous one. Fails without side effects if a chunk belongs to a
    /// different document.
    async fn add(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<()>;

    /// Drop the namespace. Returns whether one existed; never fails.
    async fn remove(&self, document_id: &str) -> bool;

    /// Up to `k` chunks with a positive score, best first. Ties are broken by
    /// page, then ordinal, then document id.
    async fn search(&self, scope: &Scope, query: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    /// All chunks of a document ordered by `(page, ordinal)`.
    async fn chunks(&self, document_id: &str) -> Vec<Chunk>;

    async fn contains(&self, document_id: &str) -> bool;
}
