//! Deterministic feature-hashing embedder.
//!
//! Maps lower-cased word unigrams, word bigrams and boundary-marked
//! character trigrams into a fixed-size vector with signed hashing, then
//! L2-normalises. No model files, no randomness: the same text always embeds
//! to the same vector, which keeps MAP@25 evaluation reproducible.

use super::traits::{l2_norm, Embedder};
use crate::error::EmbeddingError;
use xxhash_rust::xxh64::xxh64;

const UNIGRAM_WEIGHT: f32 = 1.0;
const BIGRAM_WEIGHT: f32 = 0.5;
const TRIGRAM_WEIGHT: f32 = 0.25;

/// Feature-hashing text embedder.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dim: usize,
}

impl HashingEmbedder {
    /// Creates an embedder producing `dim`-dimensional vectors.
    ///
    /// # Errors
    ///
    /// Returns `EmbeddingError::InvalidConfig` if `dim` is zero.
    pub fn new(dim: usize) -> Result<Self, EmbeddingError> {
        if dim == 0 {
            return Err(EmbeddingError::InvalidConfig(
                "embedding dimension must be positive".to_string(),
            ));
        }
        Ok(Self { dim })
    }

    fn add_feature(&self, v: &mut [f32], kind: u8, feature: &str, weight: f32) {
        let h = feature_hash(kind, feature);
        let idx = (h % self.dim as u64) as usize;
        let sign = if h >> 63 == 0 { 1.0 } else { -1.0 };
        v[idx] += sign * weight;
    }
}

impl Embedder for HashingEmbedder {
    fn embedding_dim(&self) -> usize {
        self.dim
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut v = vec![0.0f32; self.dim];
        let words = tokenize(text);

        for word in &words {
            self.add_feature(&mut v, b'u', word, UNIGRAM_WEIGHT);

            let marked: Vec<char> = std::iter::once('^')
                .chain(word.chars())
                .chain(std::iter::once('$'))
                .collect();
            for window in marked.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut v, b't', &trigram, TRIGRAM_WEIGHT);
            }
        }
        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            self.add_feature(&mut v, b'b', &bigram, BIGRAM_WEIGHT);
        }

        let norm = l2_norm(&v);
        if norm > 0.0 {
            for x in &mut v {
                *x /= norm;
            }
        }
        Ok(v)
    }
}

/// Lower-cases and splits on anything that is not alphanumeric.
/// Apostrophes are dropped so "doesn't" and "doesnt" share a token.
fn tokenize(text: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    for c in text.chars() {
        if c.is_alphanumeric() {
            current.extend(c.to_lowercase());
        } else if c == '\'' || c == '\u{2019}' {
            continue;
        } else if !current.is_empty() {
            words.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// xxHash64 of the feature, seeded by its kind so a word and a trigram with
/// the same spelling land in different buckets.
fn feature_hash(kind: u8, feature: &str) -> u64 {
    xxh64(feature.as_bytes(), kind as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cosine(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum::<f32>() / (l2_norm(a) * l2_norm(b))
    }

    #[test]
    fn test_embedding_is_unit_length() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let v = embedder.embed("Confuses area and perimeter").unwrap();

        assert_eq!(v.len(), 64);
        assert!((l2_norm(&v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_deterministic() {
        let a = HashingEmbedder::new(128).unwrap();
        let b = HashingEmbedder::new(128).unwrap();

        assert_eq!(
            a.embed("doesn't know triangle's shape").unwrap(),
            b.embed("doesn't know triangle's shape").unwrap()
        );
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let embedder = HashingEmbedder::new(32).unwrap();

        for text in ["", "   ", "?!,."] {
            let v = embedder.embed(text).unwrap();
            assert_eq!(l2_norm(&v), 0.0, "{text:?} should embed to zero");
        }
    }

    #[test]
    fn test_related_texts_are_closer() {
        let embedder = HashingEmbedder::new(512).unwrap();
        let query = embedder.embed("mixes up area with perimeter").unwrap();
        let related = embedder.embed("Confuses area and perimeter").unwrap();
        let unrelated = embedder
            .embed("Believes there are 100 degrees in a full turn")
            .unwrap();

        assert!(cosine(&query, &related) > cosine(&query, &unrelated));
    }

    #[test]
    fn test_case_and_apostrophes_ignored() {
        let embedder = HashingEmbedder::new(256).unwrap();
        let a = embedder.embed("Doesn't know").unwrap();
        let b = embedder.embed("doesnt KNOW").unwrap();

        assert_eq!(a, b);
    }

    #[test]
    fn test_feature_hash_is_stable_and_kind_seeded() {
        assert_eq!(feature_hash(b'u', "area"), 1_303_473_689_079_169_539);
        assert_ne!(feature_hash(b'u', "area"), feature_hash(b't', "area"));
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert!(matches!(
            HashingEmbedder::new(0),
            Err(EmbeddingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_batch_matches_single() {
        let embedder = HashingEmbedder::new(64).unwrap();
        let batch = embedder.embed_batch(&["one two", "three"]).unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0], embedder.embed("one two").unwrap());
        assert_eq!(batch[1], embedder.embed("three").unwrap());
    }
}
