//! Tokenization and relevance scoring strategies.
//!
//! Every strategy is a pure function of the query terms, the chunk's
//! precomputed [`ChunkFeatures`], and the [`CorpusStats`] of the searched
//! scope, so identical index state and query always yield identical scores.
//! All scores are in `[0.0, 1.0]` and do not shrink just because a term is
//! common in the scope, which lets the retriever apply one absolute
//! threshold regardless of strategy.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::embedding::{cosine_similarity, FeatureHasher};

/// Words too common to carry relevance.
const STOPWORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "been", "but", "by", "can", "did", "do",
    "does", "for", "from", "had", "has", "have", "how", "i", "if", "in", "into", "is", "it",
    "its", "me", "my", "no", "not", "of", "on", "or", "our", "so", "than", "that", "the",
    "their", "them", "then", "there", "these", "they", "this", "those", "to", "was", "we",
    "were", "what", "when", "where", "which", "who", "whom", "why", "will", "with", "would",
    "you", "your",
];

/// Lowercase alphanumeric terms of `text`, stopwords removed.
///
/// Single letters are dropped; single digits are kept since figures matter
/// in questions about reports and specs.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(|w| w.to_lowercase())
        .filter(|w| {
            let mut chars = w.chars();
            let single = chars.next().is_some() && chars.next().is_none();
            !(single && !w.chars().all(|c| c.is_numeric()))
        })
        .filter(|w| !STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Distinct query terms in first-seen order.
pub fn query_terms(query: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for term in tokenize(query) {
        if !seen.contains(&term) {
            seen.push(term);
        }
    }
    seen
}

/// Per-chunk statistics computed once at index time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFeatures {
    pub term_freqs: HashMap<String, u32>,
    /// Number of terms after tokenization.
    pub length: u32,
}

impl ChunkFeatures {
    pub fn from_text(text: &str) -> Self {
        let mut term_freqs = HashMap::new();
        let mut length = 0u32;
        for term in tokenize(text) {
            *term_freqs.entry(term).or_insert(0) += 1;
            length += 1;
        }
        Self { term_freqs, length }
    }

    pub fn tf(&self, term: &str) -> u32 {
        self.term_freqs.get(term).copied().unwrap_or(0)
    }
}

/// Collection statistics over the chunks of a search scope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CorpusStats {
    pub chunk_count: usize,
    pub total_length: u64,
    /// Number of chunks containing each term.
    pub doc_freq: HashMap<String, usize>,
}

impl CorpusStats {
    pub fn from_features<'a>(features: impl IntoIterator<Item = &'a ChunkFeatures>) -> Self {
        let mut stats = Self::default();
        for f in features {
            stats.chunk_count += 1;
            stats.total_length += u64::from(f.length);
            for term in f.term_freqs.keys() {
                *stats.doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
        }
        stats
    }

    /// Fold another scope's statistics into this one.
    pub fn merge(&mut self, other: &CorpusStats) {
        self.chunk_count += other.chunk_count;
        self.total_length += other.total_length;
        for (term, df) in &other.doc_freq {
            *self.doc_freq.entry(term.clone()).or_insert(0) += df;
        }
    }

    pub fn avg_length(&self) -> f64 {
        if self.chunk_count == 0 {
            0.0
        } else {
            self.total_length as f64 / self.chunk_count as f64
        }
    }

    pub fn df(&self, term: &str) -> usize {
        self.doc_freq.get(term).copied().unwrap_or(0)
    }
}

/// Relevance scoring strategy used by the index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum Scoring {
    /// Fraction of distinct query terms present in the chunk.
    TermOverlap,
    /// Okapi BM25 divided by the best score the query could reach in the
    /// scope, so a term present in every chunk still scores well.
    Bm25 { k1: f64, b: f64 },
    /// Cosine similarity of feature-hashed term-frequency vectors.
    HashedCosine { dims: usize },
}

impl Default for Scoring {
    fn default() -> Self {
        Scoring::Bm25 { k1: 1.2, b: 0.75 }
    }
}

impl Scoring {
    pub fn name(&self) -> &'static str {
        match self {
            Scoring::TermOverlap => "term_overlap",
            Scoring::Bm25 { .. } => "bm25",
            Scoring::HashedCosine { .. } => "hashed_cosine",
        }
    }

    /// Score one chunk. `terms` must be distinct (see [`query_terms`]).
    pub fn score(&self, terms: &[String], chunk: &ChunkFeatures, stats: &CorpusStats) -> f64 {
        if terms.is_empty() || chunk.length == 0 {
            return 0.0;
        }
        match *self {
            Scoring::TermOverlap => {
                let matched = terms.iter().filter(|t| chunk.tf(t) > 0).count();
                matched as f64 / terms.len() as f64
            }
            Scoring::Bm25 { k1, b } => bm25(terms, chunk, stats, k1, b),
            Scoring::HashedCosine { dims } => {
                let hasher = FeatureHasher::new(dims);
                let q = hasher.embed_terms(terms);
                let c = hasher.embed(&chunk.term_freqs);
                f64::from(cosine_similarity(&q, &c)).clamp(0.0, 1.0)
            }
        }
    }
}

/// BM25 with idf `ln(1 + N / df)`, normalized by the ideal score.
///
/// The ideal is `sum(idf * (k1 + 1))` over the query terms that occur
/// somewhere in the scope; terms the scope never contains cannot be matched
/// and do not count against a chunk. The result is in `[0, 1)` and ranks
/// chunks exactly like the unnormalized sum.
fn bm25(terms: &[String], chunk: &ChunkFeatures, stats: &CorpusStats, k1: f64, b: f64) -> f64 {
    let n = stats.chunk_count as f64;
    let avgdl = stats.avg_length().max(1.0);
    let dl = f64::from(chunk.length);

    let mut sum = 0.0;
    let mut ideal = 0.0;
    for term in terms {
        let df = stats.df(term);
        if df == 0 {
            continue;
        }
        let idf = (1.0 + n / df as f64).ln();
        ideal += idf * (k1 + 1.0);

        let tf = f64::from(chunk.tf(term));
        if tf > 0.0 {
            sum += idf * (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * dl / avgdl));
        }
    }
    if ideal > 0.0 {
        sum / ideal
    } else {
        0.0
    }
}
