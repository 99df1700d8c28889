//! Grounded answer composition.
//!
//! [`ExtractiveAnswerer`] builds answers only from sentences copied out of
//! the retrieved chunks, so it cannot introduce claims the document does not
//! make. Other strategies (e.g. an LLM constrained to the same chunks) plug
//! in behind the [`Answerer`] trait.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::index::ScoredChunk;
use crate::models::Citation;
use crate::scoring::{query_terms, tokenize};

/// Fixed reply when retrieval found nothing relevant.
pub const INSUFFICIENT_EVIDENCE_ANSWER: &str =
    "I cannot answer this question from this document.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    /// One per distinct page used, ascending.
    pub citations: Vec<Citation>,
    pub insufficient_evidence: bool,
}

impl Answer {
    pub fn insufficient() -> Self {
        Self {
            text: INSUFFICIENT_EVIDENCE_ANSWER.to_string(),
            citations: Vec::new(),
            insufficient_evidence: true,
        }
    }
}

pub trait Answerer: Send + Sync {
    /// Compose an answer from `retrieved`, best chunk first.
    fn answer(&self, question: &str, retrieved: &[ScoredChunk]) -> Answer;
}

/// Picks the sentences that best match the question.
#[derive(Debug, Clone)]
pub struct ExtractiveAnswerer {
    max_sentences: usize,
}

impl ExtractiveAnswerer {
    pub fn new(max_sentences: usize) -> Self {
        Self {
            max_sentences: max_sentences.max(1),
        }
    }
}

impl Default for ExtractiveAnswerer {
    fn default() -> Self {
        Self::new(3)
    }
}

struct Candidate<'a> {
    text: &'a str,
    page: u32,
    /// Absolute byte offset in the document text.
    offset: usize,
    chunk_id: &'a str,
    rank: usize,
    matched: usize,
}

impl Answerer for ExtractiveAnswerer {
    fn answer(&self, question: &str, retrieved: &[ScoredChunk]) -> Answer {
        if retrieved.is_empty() {
            return Answer::insufficient();
        }
        let terms = query_terms(question);

        let mut candidates: Vec<Candidate<'_>> = Vec::new();
        for (rank, hit) in retrieved.iter().enumerate() {
            let chunk = &hit.chunk;
            for (off, sentence) in chunk.text.split_sentence_bound_indices() {
                let trimmed = sentence.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let lead = sentence.len() - sentence.trim_start().len();
                let words: HashSet<String> = tokenize(trimmed).into_iter().collect();
                let matched = terms.iter().filter(|t| words.contains(*t)).count();
                candidates.push(Candidate {
                    text: trimmed,
                    page: chunk.page,
                    offset: chunk.start + off + lead,
                    chunk_id: &chunk.id,
                    rank,
                    matched,
                });
            }
        }

        // Most matched terms first, then the better-ranked chunk, then
        // reading order.
        let mut ranked: Vec<&Candidate<'_>> =
            candidates.iter().filter(|c| c.matched > 0).collect();
        ranked.sort_by(|a, b| {
            b.matched
                .cmp(&a.matched)
                .then(a.rank.cmp(&b.rank))
                .then(a.page.cmp(&b.page))
                .then(a.offset.cmp(&b.offset))
        });
        if ranked.is_empty() {
            // Relevant by score but no sentence shares a term: quote the
            // opening of the best chunk.
            if let Some(first) = candidates.iter().find(|c| c.rank == 0) {
                ranked.push(first);
            }
        }

        let mut selected: Vec<&Candidate<'_>> = Vec::new();
        for cand in ranked {
            if selected
                .iter()
                .any(|s| s.text == cand.text || (s.page == cand.page && s.offset == cand.offset))
            {
                continue;
            }
            selected.push(cand);
            if selected.len() == self.max_sentences {
                break;
            }
        }
        if selected.is_empty() {
            return Answer::insufficient();
        }
        selected.sort_by_key(|c| (c.page, c.offset));

        let text = selected
            .iter()
            .map(|c| c.text)
            .collect::<Vec<_>>()
            .join(" ");

        let mut pages: BTreeMap<u32, Vec<String>> = BTreeMap::new();
        for c in &selected {
            let ids = pages.entry(c.page).or_default();
            if !ids.iter().any(|id| id == c.chunk_id) {
                ids.push(c.chunk_id.to_string());
            }
        }
        let citations = pages
            .into_iter()
            .map(|(page, chunk_ids)| Citation { page, chunk_ids })
            .collect();

        Answer {
            text,
            citations,
            insufficient_evidence: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Chunk;

    fn hit(id: &str, page: u32, start: usize, text: &str, score: f64) -> ScoredChunk {
        ScoredChunk {
            chunk: Chunk {
                id: id.to_string(),
                document_id: "doc".to_string(),
                page,
                ordinal: 0,
                start,
                end: start + text.len(),
                text: text.to_string(),
                hash: id.to_string(),
            },
            score,
        }
    }

    #[test]
    fn test_empty_retrieval_is_insufficient_evidence() {
        let answer = ExtractiveAnswerer::default().answer("anything?", &[]);
        assert!(answer.insufficient_evidence);
        assert_eq!(answer.text, INSUFFICIENT_EVIDENCE_ANSWER);
        assert!(answer.citations.is_empty());
    }

    #[test]
    fn test_answer_is_copied_from_chunks() {
        let hits = vec![
            hit(
                "c3",
                3,
                400,
                "The board approved a dividend of $1.25 per share. Payment follows in March.",
                0.8,
            ),
            hit("c1", 1, 0, "Revenue reached $450 million. Growth was 18%.", 0.4),
        ];
        let answer =
            ExtractiveAnswerer::default().answer("What dividend did the board approve?", &hits);
        assert!(!answer.insufficient_evidence);
        assert!(answer
            .text
            .contains("The board approved a dividend of $1.25 per share."));
        assert!(!answer.text.contains("Revenue"));
        let all_text: String = hits.iter().map(|h| h.chunk.text.clone()).collect();
        for sentence in answer.text.split(". ") {
            assert!(all_text.contains(sentence.trim_end_matches('.')));
        }
    }

    #[test]
    fn test_one_citation_per_page_ascending() {
        let hits = vec![
            hit("c5", 5, 900, "Cores run at 4.8GHz. The processor has 12 cores.", 0.9),
            hit("c2", 2, 100, "The processor is built on 5nm.", 0.7),
            hit("c5b", 5, 950, "The processor has 12 cores. Cooling is passive.", 0.6),
        ];
        let answer = ExtractiveAnswerer::new(5).answer("processor cores", &hits);
        let pages: Vec<u32> = answer.citations.iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![2, 5]);
        // The repeated sentence from the overlapping chunk appears once.
        assert_eq!(answer.text.matches("The processor has 12 cores.").count(), 1);
    }

    #[test]
    fn test_sentences_in_reading_order() {
        let hits = vec![
            hit("b", 2, 50, "Expenses fell by 5%.", 0.9),
            hit("a", 1, 0, "Expenses were reviewed.", 0.5),
        ];
        let answer = ExtractiveAnswerer::default().answer("expenses", &hits);
        assert_eq!(answer.text, "Expenses were reviewed. Expenses fell by 5%.");
    }

    #[test]
    fn test_falls_back_to_best_chunk_opening() {
        let hits = vec![hit("c", 1, 0, "Superposition enables parallelism. More detail.", 0.3)];
        let answer = ExtractiveAnswerer::default().answer("zzz unrelated", &hits);
        assert!(!answer.insufficient_evidence);
        assert_eq!(answer.text, "Superposition enables parallelism.");
        assert_eq!(answer.citations.len(), 1);
        assert_eq!(answer.citations[0].chunk_ids, vec!["c".to_string()]);
    }

    #[test]
    fn test_respects_max_sentences() {
        let text = "Alpha one. Alpha two. Alpha three. Alpha four.";
        let hits = vec![hit("c", 1, 0, text, 0.5)];
        let answer = ExtractiveAnswerer::new(2).answer("alpha", &hits);
        assert_eq!(answer.text, "Alpha one. Alpha two.");
    }
}
