//! Question-time retrieval over an [`Index`].
//!
//! The retriever operates entirely through the [`Index`] trait, with no
//! configuration dependencies; the caller supplies [`RetrievalParams`].
//!
//! # Algorithm
//!
//! 1. Fetch `k × candidate_multiplier` candidates from the document's
//!    namespace (headroom for deduplication).
//! 2. Drop candidates scoring below `min_score`.
//! 3. Walk the remaining candidates best-first and drop near-duplicates of
//!    an already kept chunk (same content hash, or same page with byte
//!    ranges overlapping by at least `dedup_overlap` of the shorter chunk).
//! 4. Truncate to `k`.
//!
//! An empty result means insufficient evidence. It is not an error.

use tracing::debug;

use crate::error::Result;
use crate::index::{Index, Scope, ScoredChunk};
use crate::models::Chunk;

/// Retrieval tuning parameters, decoupled from application config.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievalParams {
    /// Maximum chunks to return.
    pub k: usize,
    /// Absolute score floor in `[0.0, 1.0]`.
    pub min_score: f64,
    /// Candidates fetched per returned chunk.
    pub candidate_multiplier: usize,
    /// Fraction of the shorter chunk that must overlap to count as duplicate.
    pub dedup_overlap: f64,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            k: 3,
            min_score: 0.1,
            candidate_multiplier: 4,
            dedup_overlap: 0.5,
        }
    }
}

/// Retrieve the most relevant, distinct chunks of one document.
pub async fn retrieve<I: Index + ?Sized>(
    index: &I,
    document_id: &str,
    question: &str,
    params: &RetrievalParams,
) -> Result<Vec<ScoredChunk>> {
    if params.k == 0 || question.trim().is_empty() {
        return Ok(Vec::new());
    }

    let fetch = params.k.saturating_mul(params.candidate_multiplier.max(1));
    let candidates = index
        .search(&Scope::document(document_id), question, fetch)
        .await?;
    let fetched = candidates.len();

    let mut kept: Vec<ScoredChunk> = Vec::with_capacity(params.k);
    let mut below_threshold = 0usize;
    let mut duplicates = 0usize;
    for cand in candidates {
        if cand.score < params.min_score {
            below_threshold += 1;
            continue;
        }
        if kept
            .iter()
            .any(|k| is_near_duplicate(&k.chunk, &cand.chunk, params.dedup_overlap))
        {
            duplicates += 1;
            continue;
        }
        kept.push(cand);
        if kept.len() == params.k {
            break;
        }
    }

    debug!(
        document_id,
        fetched,
        below_threshold,
        duplicates,
        kept = kept.len(),
        "retrieval"
    );
    Ok(kept)
}

/// Whether two chunks carry essentially the same text.
pub fn is_near_duplicate(a: &Chunk, b: &Chunk, min_overlap: f64) -> bool {
    if a.hash == b.hash {
        return true;
    }
    let shared = a.overlap_with(b);
    if shared == 0 {
        return false;
    }
    let shorter = (a.end - a.start).min(b.end - b.start).max(1);
    shared as f64 >= min_overlap * shorter as f64
}
