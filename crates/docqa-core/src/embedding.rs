//! Feature-hashed term vectors and vector similarity.
//!
//! [`FeatureHasher`] projects a bag of terms into a fixed-size vector using a
//! stable FNV-1a hash, giving the index a deterministic vector-space scoring
//! mode without any model download.

use std::collections::HashMap;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Hashes terms into `dims` buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureHasher {
    dims: usize,
}

impl FeatureHasher {
    pub fn new(dims: usize) -> Self {
        Self { dims: dims.max(1) }
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    /// Build a vector from term frequencies.
    pub fn embed(&self, term_freqs: &HashMap<String, u32>) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for (term, &tf) in term_freqs {
            v[self.bucket(term)] += tf as f32;
        }
        v
    }

    /// Build a vector from a list of terms, each counted once per occurrence.
    pub fn embed_terms<S: AsRef<str>>(&self, terms: &[S]) -> Vec<f32> {
        let mut v = vec![0.0f32; self.dims];
        for term in terms {
            v[self.bucket(term.as_ref())] += 1.0;
        }
        v
    }

    fn bucket(&self, term: &str) -> usize {
        (fnv1a(term.as_bytes()) % self.dims as u64) as usize
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for b in bytes {
        hash ^= u64::from(*b);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Compute cosine similarity between two vectors.
///
/// Returns a value in `[-1.0, 1.0]`:
/// - `1.0` = identical direction
/// - `0.0` = orthogonal (unrelated)
/// - `-1.0` = opposite direction
///
/// Returns `0.0` for empty vectors or vectors of different lengths.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hasher_is_stable() {
        let h = FeatureHasher::new(64);
        let a = h.embed_terms(&["revenue", "growth"]);
        let b = h.embed_terms(&["revenue", "growth"]);
        assert_eq!(a, b);
        assert_eq!(a.iter().sum::<f32>(), 2.0);
        // FNV-1a of the empty input is the offset basis.
        assert_eq!(fnv1a(b""), FNV_OFFSET);
    }

    #[test]
    fn test_embed_matches_embed_terms() {
        let h = FeatureHasher::new(32);
        let mut tf = HashMap::new();
        tf.insert("dividend".to_string(), 2);
        tf.insert("share".to_string(), 1);
        assert_eq!(h.embed(&tf), h.embed_terms(&["dividend", "share", "dividend"]));
    }

    #[test]
    fn test_zero_dims_clamped() {
        assert_eq!(FeatureHasher::new(0).dims(), 1);
    }

    #[test]
    fn test_cosine_identical() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_orthogonal() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim.abs() < 1e-6);
    }

    #[test]
    fn test_cosine_empty_or_mismatched() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0]), 0.0);
    }
}
