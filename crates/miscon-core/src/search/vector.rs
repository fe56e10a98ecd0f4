//! Exact embedding re-ranker.
//!
//! Holds one precomputed embedding per taxonomy row and ranks rows by their
//! distance to a query embedding. The scan is brute force: the taxonomy is a
//! few thousand rows, and an exact scan keeps results reproducible where an
//! approximate graph index would not be.

use super::types::{sort_ascending, RowScore};
use crate::config::DistanceMetric;
use crate::embedding::l2_norm;
use crate::error::{validate_dimension, RetrievalError};

/// Second stage of hybrid retrieval, also used alone for pure vector search.
pub struct EmbeddingReRanker {
    vectors: Vec<Vec<f32>>,
    /// Precomputed row norms for cosine distance
    norms: Vec<f32>,
    dimension: usize,
    metric: DistanceMetric,
}

impl EmbeddingReRanker {
    /// Creates a re-ranker over row embeddings, indexed by taxonomy row.
    ///
    /// # Errors
    ///
    /// Returns `RetrievalError::DimensionMismatch` if any row has a
    /// different length than `dimension`.
    pub fn new(
        vectors: Vec<Vec<f32>>,
        dimension: usize,
        metric: DistanceMetric,
    ) -> Result<Self, RetrievalError> {
        for v in &vectors {
            validate_dimension(dimension, v.len())?;
        }
        let norms = vectors.iter().map(|v| l2_norm(v)).collect();
        Ok(Self {
            vectors,
            norms,
            dimension,
            metric,
        })
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// Ranks every row. See [`rerank`](Self::rerank).
    pub fn rank_all(&self, query: &[f32], k: usize) -> Result<Vec<RowScore>, RetrievalError> {
        let rows: Vec<usize> = (0..self.len()).collect();
        self.rerank(query, &rows, k)
    }

    /// Ranks the given candidate rows by ascending distance to `query`.
    ///
    /// Returns at most `k` entries, ties broken by row. Out-of-range rows are
    /// ignored. A zero or non-finite query vector yields an empty result.
    pub fn rerank(
        &self,
        query: &[f32],
        rows: &[usize],
        k: usize,
    ) -> Result<Vec<RowScore>, RetrievalError> {
        validate_dimension(self.dimension, query.len())?;

        let query_norm = l2_norm(query);
        if k == 0 || query_norm == 0.0 || !query_norm.is_finite() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<RowScore> = rows
            .iter()
            .filter(|&&row| row < self.vectors.len())
            .map(|&row| (row, self.distance(query, query_norm, row)))
            .collect();
        sort_ascending(&mut scored);
        scored.truncate(k);
        Ok(scored)
    }

    fn distance(&self, query: &[f32], query_norm: f32, row: usize) -> f32 {
        let v = &self.vectors[row];
        match self.metric {
            DistanceMetric::Cosine => {
                let row_norm = self.norms[row];
                if row_norm == 0.0 {
                    return 1.0;
                }
                let dot: f32 = query.iter().zip(v).map(|(a, b)| a * b).sum();
                (1.0 - dot / (query_norm * row_norm)).clamp(0.0, 2.0)
            }
            DistanceMetric::L2 => query
                .iter()
                .zip(v)
                .map(|(a, b)| (a - b) * (a - b))
                .sum::<f32>()
                .sqrt(),
        }
    }
}
