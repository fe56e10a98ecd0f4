//! Traits for embedding operations.

use crate::error::EmbeddingError;

/// Trait for text embedding models.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: the index is shared read-only
/// across evaluation workers and queries are embedded concurrently.
///
/// # Examples
///
/// ```ignore
/// let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(512));
/// let embedding = embedder.embed("confuses area and perimeter")?;
/// assert_eq!(embedding.len(), embedder.embedding_dim());
/// ```
pub trait Embedder: Send + Sync {
    /// Returns the embedding dimension (vector size).
    fn embedding_dim(&self) -> usize;

    /// Embeds a single text.
    ///
    /// Text with no usable content may embed to the zero vector; callers
    /// treat that as "no match" rather than an error.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embeds a batch of texts. The default implementation embeds one at a time.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Euclidean norm of a vector.
#[inline]
pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}
