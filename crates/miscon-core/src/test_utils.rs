//! Test utilities for miscon-core.
//!
//! Only compiled when running tests.

use crate::config::RetrievalConfig;
use crate::embedding::{Embedder, HashingEmbedder};
use crate::error::EmbeddingError;
use crate::search::HybridIndex;
use crate::taxonomy::{Misconception, Taxonomy};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Wraps an embedder and counts every `embed` call.
pub struct CountingEmbedder {
    inner: HashingEmbedder,
    calls: AtomicUsize,
}

impl CountingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            inner: HashingEmbedder::new(dim).expect("valid dimension"),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.calls.store(0, Ordering::SeqCst);
    }
}

impl Embedder for CountingEmbedder {
    fn embedding_dim(&self) -> usize {
        self.inner.embedding_dim()
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.embed(text)
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embedding_dim(&self) -> usize {
        8
    }

    fn embed(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::InferenceFailed("backend unavailable".into()))
    }
}

/// Small geometry/number taxonomy, ids 100..=109.
pub fn sample_taxonomy() -> Arc<Taxonomy> {
    let texts = [
        "Does not know that angles in a triangle sum to 180 degrees",
        "Uses dividing fractions method for multiplying fractions",
        "Believes there are 100 degrees in a full turn",
        "Confuses area and perimeter",
        "Thinks the perimeter of a rectangle is length times width",
        "Does not understand place value after the decimal point",
        "Believes a negative times a negative is negative",
        "Confuses the radius and the diameter of a circle",
        "Adds the numerators and denominators when adding fractions",
        "Does not recognise an isosceles triangle",
    ];
    let rows = texts
        .iter()
        .enumerate()
        .map(|(i, t)| Misconception::new(100 + i as u32, *t))
        .collect();
    Arc::new(Taxonomy::from_rows(rows).expect("unique ids"))
}

/// Index over [`sample_taxonomy`] using the given embedder.
pub fn sample_index(embedder: Arc<dyn Embedder>) -> Arc<HybridIndex> {
    let config = RetrievalConfig {
        embedding_dim: embedder.embedding_dim(),
        ..Default::default()
    };
    Arc::new(HybridIndex::build(sample_taxonomy(), embedder, config).expect("index builds"))
}
