//! In-memory [`Index`] implementation.
//!
//! Each document namespace is an immutable [`Namespace`] behind an `Arc`.
//! Writers build a namespace completely before swapping it into the map
//! under a short write lock; readers clone the `Arc`s under a read lock and
//! score without holding it. A search therefore always sees a consistent
//! snapshot, and a concurrent removal only affects searches that start
//! after it.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::Chunk;
use crate::scoring::{query_terms, ChunkFeatures, CorpusStats, Scoring};

use super::{Index, Scope, ScoredChunk};

struct IndexedChunk {
    chunk: Chunk,
    features: ChunkFeatures,
}

/// Frozen chunk set of one document.
struct Namespace {
    chunks: Vec<IndexedChunk>,
    stats: CorpusStats,
}

impl Namespace {
    fn build(mut chunks: Vec<Chunk>) -> Self {
        chunks.sort_by_key(|c| (c.page, c.ordinal));
        let chunks: Vec<IndexedChunk> = chunks
            .into_iter()
            .map(|chunk| IndexedChunk {
                features: ChunkFeatures::from_text(&chunk.text),
                chunk,
            })
            .collect();
        let stats = CorpusStats::from_features(chunks.iter().map(|c| &c.features));
        Self { chunks, stats }
    }
}

/// In-memory index with a fixed scoring strategy.
pub struct InMemoryIndex {
    scoring: Scoring,
    namespaces: RwLock<HashMap<String, Arc<Namespace>>>,
}

impl InMemoryIndex {
    pub fn new(scoring: Scoring) -> Self {
        Self {
            scoring,
            namespaces: RwLock::new(HashMap::new()),
        }
    }

    pub fn scoring(&self) -> Scoring {
        self.scoring
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.namespaces.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self, scope: &Scope) -> Vec<Arc<Namespace>> {
        let namespaces = self.namespaces.read();
        match scope {
            Scope::Document(id) => namespaces.get(id).cloned().into_iter().collect(),
            Scope::All => namespaces.values().cloned().collect(),
        }
    }
}

impl Default for InMemoryIndex {
    fn default() -> Self {
        Self::new(Scoring::default())
    }
}

/// Best score first, then earliest page, ordinal, and document.
fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then(a.chunk.page.cmp(&b.chunk.page))
        .then(a.chunk.ordinal.cmp(&b.chunk.ordinal))
        .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
}

#[async_trait]
impl Index for InMemoryIndex {
    async fn add(&self, document_id: &str, chunks: Vec<Chunk>) -> Result<()> {
        if let Some(bad) = chunks.iter().find(|c| c.document_id != document_id) {
            return Err(Error::InvalidChunk {
                chunk_id: bad.id.clone(),
                expected: document_id.to_string(),
                found: bad.document_id.clone(),
            });
        }
        let count = chunks.len();
        let namespace = Arc::new(Namespace::build(chunks));
        self.namespaces
            .write()
            .insert(document_id.to_string(), namespace);
        debug!(document_id, chunks = count, "namespace published");
        Ok(())
    }

    async fn remove(&self, document_id: &str) -> bool {
        let removed = self.namespaces.write().remove(document_id).is_some();
        if removed {
            debug!(document_id, "namespace removed");
        }
        removed
    }

    async fn search(&self, scope: &Scope, query: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        let terms = query_terms(query);
        if terms.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let snapshot = self.snapshot(scope);
        if snapshot.is_empty() {
            return Ok(Vec::new());
        }

        let mut stats = CorpusStats::default();
        for ns in &snapshot {
            stats.merge(&ns.stats);
        }

        let mut hits: Vec<ScoredChunk> = snapshot
            .iter()
            .flat_map(|ns| ns.chunks.iter())
            .filter_map(|ic| {
                let score = self.scoring.score(&terms, &ic.features, &stats);
                (score > 0.0).then(|| ScoredChunk {
                    chunk: ic.chunk.clone(),
                    score,
                })
            })
            .collect();

        hits.sort_by(rank_order);
        let matched = hits.len();
        hits.truncate(k);

        debug!(
            scoring = self.scoring.name(),
            terms = terms.len(),
            candidates = stats.chunk_count,
            matched,
            returned = hits.len(),
            "index search"
        );
        Ok(hits)
    }

    async fn chunks(&self, document_id: &str) -> Vec<Chunk> {
        self.snapshot(&Scope::document(document_id))
            .iter()
            .flat_map(|ns| ns.chunks.iter().map(|ic| ic.chunk.clone()))
            .collect()
    }

    async fn contains(&self, document_id: &str) -> bool {
        self.namespaces.read().contains_key(document_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::{chunk_text, ChunkParams};

    fn pages(doc: &str, pages: &[&str]) -> Vec<Chunk> {
        let mut text = String::new();
        let mut starts = Vec::new();
        for p in pages {
            starts.push(text.len());
            text.push_str(p);
            text.push('\x0c');
        }
        chunk_text(doc, &text, &starts, &ChunkParams::default())
    }

    async fn sample_index(scoring: Scoring) -> InMemoryIndex {
        let index = InMemoryIndex::new(scoring);
        index
            .add(
                "report",
                pages(
                    "report",
                    &[
                        "Revenue increased by 18% to $450 million in fiscal 2023.",
                        "Operating expenses were reduced by 5% through optimization.",
                        "The board approved a dividend of $1.25 per share.",
                    ],
                ),
            )
            .await
            .unwrap();
        index
            .add(
                "specs",
                pages(
                    "specs",
                    &["The XPS-5000 has a 5nm processor with 12 cores and a dividend of none."],
                ),
            )
            .await
            .unwrap();
        index
    }

    #[tokio::test]
    async fn test_search_is_scoped_to_document() {
        let index = sample_index(Scoring::default()).await;
        let hits = index
            .search(&Scope::document("report"), "dividend", 10)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|h| h.chunk.document_id == "report"));

        let all = index.search(&Scope::All, "dividend", 10).await.unwrap();
        assert!(all.iter().any(|h| h.chunk.document_id == "specs"));
    }

    #[tokio::test]
    async fn test_page_specific_term_ranks_that_page_first() {
        for scoring in [
            Scoring::TermOverlap,
            Scoring::default(),
            Scoring::HashedCosine { dims: 1024 },
        ] {
            let index = sample_index(scoring).await;
            let hits = index
                .search(&Scope::document("report"), "operating expenses", 3)
                .await
                .unwrap();
            assert_eq!(hits[0].chunk.page, 2, "{}", scoring.name());
        }
    }

    #[tokio::test]
    async fn test_search_is_deterministic() {
        let index = sample_index(Scoring::default()).await;
        let a = index.search(&Scope::All, "revenue dividend share", 10).await.unwrap();
        let b = index.search(&Scope::All, "revenue dividend share", 10).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_ties_break_by_page_then_ordinal() {
        let index = InMemoryIndex::new(Scoring::TermOverlap);
        index
            .add("doc", pages("doc", &["alpha one.", "alpha two.", "alpha three."]))
            .await
            .unwrap();
        let hits = index.search(&Scope::document("doc"), "alpha", 10).await.unwrap();
        let order: Vec<u32> = hits.iter().map(|h| h.chunk.page).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_namespace_and_unknown_document() {
        let index = InMemoryIndex::default();
        index.add("empty", Vec::new()).await.unwrap();
        assert!(index.contains("empty").await);
        assert!(index
            .search(&Scope::document("empty"), "anything", 3)
            .await
            .unwrap()
            .is_empty());
        assert!(index
            .search(&Scope::document("missing"), "anything", 3)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let index = sample_index(Scoring::default()).await;
        assert!(index.remove("report").await);
        assert!(!index.remove("report").await);
        assert!(index
            .search(&Scope::document("report"), "revenue", 3)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(index.len(), 1);
    }

    #[tokio::test]
    async fn test_add_rejects_foreign_chunks_atomically() {
        let index = InMemoryIndex::default();
        let mut chunks = pages("doc", &["first page.", "second page."]);
        chunks[1].document_id = "other".to_string();
        let err = index.add("doc", chunks).await.unwrap_err();
        assert!(matches!(err, Error::InvalidChunk { .. }));
        assert!(!index.contains("doc").await);
        assert!(index.chunks("doc").await.is_empty());
    }

    #[tokio::test]
    async fn test_chunks_returned_in_page_order() {
        let index = InMemoryIndex::default();
        let mut chunks = pages("doc", &["one.", "two.", "three."]);
        chunks.reverse();
        index.add("doc", chunks).await.unwrap();
        let pages: Vec<u32> = index.chunks("doc").await.iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_snapshot_survives_removal() {
        let index = sample_index(Scoring::default()).await;
        let snapshot = index.snapshot(&Scope::document("report"));
        index.remove("report").await;
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].chunks.len(), 3);
    }

    #[tokio::test]
    async fn test_blank_query_and_zero_k() {
        let index = sample_index(Scoring::default()).await;
        assert!(index.search(&Scope::All, "   ", 5).await.unwrap().is_empty());
        assert!(index.search(&Scope::All, "the of", 5).await.unwrap().is_empty());
        assert!(index.search(&Scope::All, "revenue", 0).await.unwrap().is_empty());
    }
}
