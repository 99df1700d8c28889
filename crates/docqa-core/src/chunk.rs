//! Sentence-boundary text chunker with page tracking.
//!
//! Splits decoded document text into [`Chunk`]s that never cross a page and
//! never exceed [`ChunkParams::max_chars`] bytes. Consecutive chunks on the
//! same page share trailing sentences for context continuity.
//!
//! # Algorithm
//!
//! 1. Normalize the page start offsets (sorted, deduplicated, clamped to the
//!    text, snapped to char boundaries, always starting at `0`).
//! 2. Split each page at Unicode sentence boundaries. A sentence longer than
//!    `max_chars` is hard-split at the last whitespace before the limit.
//! 3. Pack sentences greedily into a chunk until the next one would exceed
//!    `max_chars`.
//! 4. Start the next chunk with the trailing sentences of the previous one,
//!    covering at least `overlap_chars` bytes when the budget allows.
//! 5. Skip whitespace-only passages, so no chunk is ever empty.
//!
//! Chunk text is always an exact slice of the input, so concatenating the
//! chunks in `(page, ordinal)` order and dropping the overlapped prefixes
//! reproduces the text (see [`reassemble`]).
//!
//! # Example
//!
//! ```rust
//! use docqa_core::chunk::{chunk_text, ChunkParams};
//!
//! let text = "First page.\x0cSecond page.";
//! let chunks = chunk_text("doc-123", text, &[12], &ChunkParams::default());
//! assert_eq!(chunks.len(), 2);
//! assert_eq!(chunks[1].page, 2);
//! ```

use sha2::{Digest, Sha256};
use unicode_segmentation::UnicodeSegmentation;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::Chunk;

/// Chunk size limits, in bytes of UTF-8 text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkParams {
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            max_chars: 800,
            overlap_chars: 120,
        }
    }
}

/// Decode raw bytes as UTF-8.
///
/// Bytes with no decodable prefix are [`Error::UnsupportedFormat`]; a valid
/// prefix followed by garbage is [`Error::DecodingFailed`].
pub fn decode_text(raw: &[u8]) -> Result<&str> {
    match std::str::from_utf8(raw) {
        Ok(text) => Ok(text),
        Err(e) if e.valid_up_to() == 0 => Err(Error::UnsupportedFormat(
            "content is not UTF-8 text".to_string(),
        )),
        Err(e) => Err(Error::DecodingFailed(format!(
            "invalid UTF-8 after byte {}",
            e.valid_up_to()
        ))),
    }
}

/// Decode `raw` and chunk it. See [`chunk_text`].
pub fn chunk_bytes(
    document_id: &str,
    raw: &[u8],
    page_starts: &[usize],
    params: &ChunkParams,
) -> Result<Vec<Chunk>> {
    let text = decode_text(raw)?;
    Ok(chunk_text(document_id, text, page_starts, params))
}

/// Split `text` into chunks.
///
/// `page_starts` holds the byte offset at which each page begins; an empty
/// slice means the whole text is page 1. Output is ordered by page, then
/// ordinal, and is identical across calls with the same input.
pub fn chunk_text(
    document_id: &str,
    text: &str,
    page_starts: &[usize],
    params: &ChunkParams,
) -> Vec<Chunk> {
    let max_chars = params.max_chars.max(1);
    let overlap = params.overlap_chars.min(max_chars - 1);
    let starts = normalize_page_starts(text, page_starts);

    let mut chunks = Vec::new();
    for (idx, &page_start) in starts.iter().enumerate() {
        let page_end = starts.get(idx + 1).copied().unwrap_or(text.len());
        let page_text = &text[page_start..page_end];
        let page = (idx + 1) as u32;

        let segs = segments(page_text, max_chars);
        let mut ordinal = 0u32;
        let mut i = 0usize;
        while i < segs.len() {
            let start = segs[i].0;
            let mut j = i + 1;
            while j < segs.len() && segs[j].1 - start <= max_chars {
                j += 1;
            }
            let end = segs[j - 1].1;

            let piece = &page_text[start..end];
            if !piece.trim().is_empty() {
                chunks.push(make_chunk(
                    document_id,
                    page,
                    ordinal,
                    page_start + start,
                    page_start + end,
                    piece,
                ));
                ordinal += 1;
            }

            if j >= segs.len() {
                break;
            }

            // Walk back over trailing sentences until the overlap target is
            // met, but always advance past segment `i`.
            let mut k = j;
            while k - 1 > i && end - segs[k].0 < overlap {
                k -= 1;
            }
            while k < j && segs[j].1 - segs[k].0 > max_chars {
                k += 1;
            }
            i = k;
        }
    }

    chunks
}

/// Rebuild the covered text from chunks, dropping overlapped prefixes.
pub fn reassemble(chunks: &[Chunk]) -> String {
    let mut ordered: Vec<&Chunk> = chunks.iter().collect();
    ordered.sort_by_key(|c| (c.page, c.ordinal));

    let mut out = String::new();
    let mut cursor = 0usize;
    for c in ordered {
        let skip = cursor.saturating_sub(c.start).min(c.text.len());
        out.push_str(&c.text[skip..]);
        cursor = cursor.max(c.end);
    }
    out
}

/// Sorted, deduplicated page starts within `text`, always beginning at 0.
pub fn normalize_page_starts(text: &str, page_starts: &[usize]) -> Vec<usize> {
    let mut starts: Vec<usize> = page_starts
        .iter()
        .map(|&s| snap_to_char_boundary(text, s))
        .filter(|&s| s < text.len())
        .collect();
    starts.push(0);
    starts.sort_unstable();
    starts.dedup();
    starts
}

/// Contiguous byte ranges of `page` at sentence boundaries, none longer
/// than `max_chars` unless a single character is.
fn segments(page: &str, max_chars: usize) -> Vec<(usize, usize)> {
    let mut segs = Vec::new();
    for (offset, sentence) in page.split_sentence_bound_indices() {
        let end = offset + sentence.len();
        let mut s = offset;
        while end - s > max_chars {
            let limit = snap_to_char_boundary(page, s + max_chars);
            let cut = page[s..limit]
                .char_indices()
                .rev()
                .find(|(_, c)| c.is_whitespace())
                .map(|(pos, c)| s + pos + c.len_utf8())
                .filter(|&cut| cut > s)
                .unwrap_or(limit);
            let cut = if cut == s {
                // max_chars is narrower than the next character.
                page[s..]
                    .char_indices()
                    .nth(1)
                    .map(|(i, _)| s + i)
                    .unwrap_or(end)
            } else {
                cut
            };
            segs.push((s, cut));
            s = cut;
        }
        if end > s {
            segs.push((s, end));
        }
    }
    segs
}

/// Snap a byte index back to the nearest valid UTF-8 char boundary.
fn snap_to_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut i = index;
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

/// Create a single [`Chunk`] with a deterministic id and SHA-256 hash.
fn make_chunk(
    document_id: &str,
    page: u32,
    ordinal: u32,
    start: usize,
    end: usize,
    text: &str,
) -> Chunk {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let hash = format!("{:x}", hasher.finalize());

    let name = format!("{}:{}:{}", document_id, page, ordinal);
    Chunk {
        id: Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string(),
        document_id: document_id.to_string(),
        page,
        ordinal,
        start,
        end,
        text: text.to_string(),
        hash,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(max_chars: usize, overlap_chars: usize) -> ChunkParams {
        ChunkParams {
            max_chars,
            overlap_chars,
        }
    }

    fn sample_text(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {} talks about topic {}. ", i, i % 7))
            .collect()
    }

    #[test]
    fn test_small_text_single_chunk() {
        let chunks = chunk_text("doc1", "Hello, world!", &[], &ChunkParams::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].page, 1);
        assert_eq!(chunks[0].ordinal, 0);
        assert_eq!(chunks[0].text, "Hello, world!");
        assert_eq!((chunks[0].start, chunks[0].end), (0, 13));
    }

    #[test]
    fn test_empty_and_blank_text_produce_no_chunks() {
        assert!(chunk_text("doc1", "", &[], &ChunkParams::default()).is_empty());
        assert!(chunk_text("doc1", "  \n\n\t ", &[], &ChunkParams::default()).is_empty());
    }

    #[test]
    fn test_respects_max_chars() {
        let text = sample_text(60);
        let chunks = chunk_text("doc1", &text, &[], &params(200, 40));
        assert!(chunks.len() > 1);
        for c in &chunks {
            assert!(c.text.len() <= 200, "chunk too long: {}", c.text.len());
            assert!(!c.text.trim().is_empty());
        }
    }

    #[test]
    fn test_consecutive_chunks_overlap() {
        let text = sample_text(60);
        let chunks = chunk_text("doc1", &text, &[], &params(200, 40));
        for pair in chunks.windows(2) {
            let shared = pair[0].overlap_with(&pair[1]);
            assert!(shared >= 40, "overlap of {} bytes is below target", shared);
            assert!(pair[1].start > pair[0].start, "chunker made no progress");
        }
    }

    #[test]
    fn test_zero_overlap_is_contiguous() {
        let text = sample_text(40);
        let chunks = chunk_text("doc1", &text, &[], &params(150, 0));
        for pair in chunks.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn test_round_trip_reassembly() {
        let pages = [sample_text(30), sample_text(5), sample_text(45)];
        let mut text = String::new();
        let mut starts = Vec::new();
        for p in &pages {
            starts.push(text.len());
            text.push_str(p);
            text.push('\x0c');
        }
        let chunks = chunk_text("doc1", &text, &starts, &params(180, 50));
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn test_chunks_never_cross_pages() {
        let text = "Alpha page one text. More alpha.\x0cBeta page two text.\x0cGamma page three.";
        let starts = [0, 33, 53];
        let chunks = chunk_text("doc1", text, &starts, &params(800, 100));
        let pages: Vec<u32> = chunks.iter().map(|c| c.page).collect();
        assert_eq!(pages, vec![1, 2, 3]);
        assert!(chunks[1].text.starts_with("Beta"));
        for c in &chunks {
            assert_eq!(&text[c.start..c.end], c.text);
        }
    }

    #[test]
    fn test_ordinals_restart_per_page() {
        let p1 = sample_text(20);
        let p2 = sample_text(20);
        let text = format!("{}{}", p1, p2);
        let chunks = chunk_text("doc1", &text, &[p1.len()], &params(150, 30));
        let mut last: Option<(u32, u32)> = None;
        for c in &chunks {
            match last {
                Some((page, ord)) if page == c.page => assert_eq!(c.ordinal, ord + 1),
                _ => assert_eq!(c.ordinal, 0),
            }
            last = Some((c.page, c.ordinal));
        }
        assert!(chunks.iter().any(|c| c.page == 2));
    }

    #[test]
    fn test_long_sentence_is_hard_split() {
        let text = "word ".repeat(100);
        let chunks = chunk_text("doc1", &text, &[], &params(64, 0));
        assert!(chunks.len() >= 7);
        for c in &chunks {
            assert!(c.text.len() <= 64);
        }
        assert_eq!(reassemble(&chunks), text);
    }

    #[test]
    fn test_multibyte_utf8_chars() {
        let text = "┌──────────────────┐\n│ Hello world      │\n└──────────────────┘";
        let chunks = chunk_text("doc1", text, &[], &params(12, 3));
        assert!(!chunks.is_empty());
        for c in &chunks {
            assert!(!c.text.is_empty());
            assert_eq!(&text[c.start..c.end], c.text);
        }
    }

    #[test]
    fn test_page_starts_are_normalized() {
        let text = "héllo world";
        // Unsorted, duplicated, past the end, and inside a multibyte char.
        let starts = normalize_page_starts(text, &[6, 2, 6, 99]);
        assert_eq!(starts, vec![0, 1, 6]);
    }

    #[test]
    fn test_deterministic() {
        let text = sample_text(50);
        let c1 = chunk_text("doc1", &text, &[], &params(160, 40));
        let c2 = chunk_text("doc1", &text, &[], &params(160, 40));
        assert_eq!(c1, c2);
    }

    #[test]
    fn test_chunk_bytes_decoding_errors() {
        let p = ChunkParams::default();
        let err = chunk_bytes("doc1", &[0xff, 0xfe, 0x00], &[], &p).unwrap_err();
        assert!(matches!(err, Error::UnsupportedFormat(_)));

        let err = chunk_bytes("doc1", b"valid prefix \xff\xff", &[], &p).unwrap_err();
        assert!(matches!(err, Error::DecodingFailed(_)));

        let ok = chunk_bytes("doc1", b"Plain text.", &[], &p).unwrap();
        assert_eq!(ok.len(), 1);
    }
}
