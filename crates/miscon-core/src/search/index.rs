//! Hybrid retrieval index over the taxonomy.

use super::fusion::reciprocal_rank_fusion;
use super::keyword::LexicalPreFilter;
use super::types::{RankedMisconception, RowScore};
use super::vector::EmbeddingReRanker;
use crate::config::{check_pre_filter, RetrievalConfig, RetrievalMode, RRF_K};
use crate::embedding::Embedder;
use crate::error::{validate_dimension, RetrievalError};
use crate::taxonomy::{MisconceptionId, Taxonomy};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Immutable retrieval index: BM25 pre-filter plus embedding re-ranker.
///
/// Built once, single-threaded, before evaluation starts. All query methods
/// take `&self`, so the index can be shared across workers in an `Arc`.
pub struct HybridIndex {
    taxonomy: Arc<Taxonomy>,
    embedder: Arc<dyn Embedder>,
    lexical: LexicalPreFilter,
    reranker: EmbeddingReRanker,
    config: RetrievalConfig,
}

impl HybridIndex {
    /// Builds both stages over the full taxonomy.
    ///
    /// Every misconception text is embedded exactly once here.
    ///
    /// # Errors
    ///
    /// - `RetrievalError::Config` if `config` is invalid
    /// - `RetrievalError::Embedding` if a taxonomy text cannot be embedded
    /// - `RetrievalError::DimensionMismatch` if the embedder returns vectors of
    ///   the wrong size
    #[instrument(skip_all, fields(rows = taxonomy.len(), mode = config.mode.name()))]
    pub fn build(
        taxonomy: Arc<Taxonomy>,
        embedder: Arc<dyn Embedder>,
        config: RetrievalConfig,
    ) -> Result<Self, RetrievalError> {
        config.validate()?;

        let start = Instant::now();
        let lexical = LexicalPreFilter::new(&taxonomy);
        let lexical_ms = start.elapsed().as_secs_f64() * 1000.0;

        let start = Instant::now();
        let texts: Vec<&str> = taxonomy.iter().map(|m| m.text.as_str()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        let reranker =
            EmbeddingReRanker::new(vectors, embedder.embedding_dim(), config.distance)?;
        let embed_ms = start.elapsed().as_secs_f64() * 1000.0;

        info!(
            "Built index over {} misconceptions (bm25 {:.1}ms, embeddings {:.1}ms, dim {})",
            taxonomy.len(),
            lexical_ms,
            embed_ms,
            reranker.dimension()
        );

        Ok(Self {
            taxonomy,
            embedder,
            lexical,
            reranker,
            config,
        })
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn len(&self) -> usize {
        self.taxonomy.len()
    }

    pub fn is_empty(&self) -> bool {
        self.taxonomy.is_empty()
    }

    fn embed_query(&self, query: &str) -> Result<Vec<f32>, RetrievalError> {
        let vector = self.embedder.embed(query)?;
        validate_dimension(self.reranker.dimension(), vector.len())?;
        Ok(vector)
    }

    /// Pure embedding search over the whole taxonomy.
    ///
    /// Returns at most `k` `(row, distance)` pairs by ascending distance.
    /// A query that embeds to the zero vector returns nothing.
    pub fn vector_search(&self, query: &str, k: usize) -> Result<Vec<RowScore>, RetrievalError> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let query_vec = self.embed_query(query)?;
        self.reranker.rank_all(&query_vec, k)
    }

    /// Two-stage search: BM25 keeps `pre_filter_k` rows, embeddings re-rank
    /// them, and the `top_k` closest are returned by ascending distance.
    ///
    /// When the taxonomy has fewer than `pre_filter_k` rows every row is
    /// re-ranked.
    ///
    /// # Errors
    ///
    /// `RetrievalError::Config` if `pre_filter_k < top_k`.
    pub fn hybrid_search(
        &self,
        query: &str,
        top_k: usize,
        pre_filter_k: usize,
    ) -> Result<Vec<RankedMisconception>, RetrievalError> {
        check_pre_filter(top_k, pre_filter_k)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let candidates = self.lexical.candidates(query, pre_filter_k);
        let query_vec = self.embed_query(query)?;
        let ranked = self.reranker.rerank(&query_vec, &candidates, top_k)?;
        debug!(
            "hybrid_search: {} candidates -> {} results",
            candidates.len(),
            ranked.len()
        );

        Ok(ranked
            .into_iter()
            .filter_map(|(row, distance)| {
                self.taxonomy.row(row).map(|m| RankedMisconception {
                    misconception: m.clone(),
                    distance,
                })
            })
            .collect())
    }

    /// Reciprocal rank fusion of the lexical and vector rankings.
    ///
    /// Each ranking is cut at `pre_filter_k` before fusion. Returns at most
    /// `top_k` `(row, rrf_score)` pairs, best first.
    pub fn fused_search(
        &self,
        query: &str,
        top_k: usize,
        pre_filter_k: usize,
    ) -> Result<Vec<RowScore>, RetrievalError> {
        check_pre_filter(top_k, pre_filter_k)?;
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let lexical_rows: Vec<usize> = self
            .lexical
            .search(query, pre_filter_k)
            .into_iter()
            .map(|(row, _)| row)
            .collect();
        let vector_rows: Vec<usize> = self
            .vector_search(query, pre_filter_k)?
            .into_iter()
            .map(|(row, _)| row)
            .collect();

        let mut fused = reciprocal_rank_fusion(&[&lexical_rows[..], &vector_rows[..]], RRF_K);
        fused.truncate(top_k);
        Ok(fused)
    }

    /// Ordered candidate ids for `query` under `mode`, at most `k`.
    ///
    /// Hybrid and fused modes widen the pre-filter to `k` when the configured
    /// `pre_filter_k` is smaller.
    pub fn ranked_ids(
        &self,
        query: &str,
        mode: RetrievalMode,
        k: usize,
    ) -> Result<Vec<MisconceptionId>, RetrievalError> {
        let pre_filter_k = self.config.pre_filter_k.max(k);
        let rows: Vec<usize> = match mode {
            RetrievalMode::Vector => self
                .vector_search(query, k)?
                .into_iter()
                .map(|(row, _)| row)
                .collect(),
            RetrievalMode::Hybrid => {
                return Ok(self
                    .hybrid_search(query, k, pre_filter_k)?
                    .into_iter()
                    .map(|hit| hit.id())
                    .collect())
            }
            RetrievalMode::Fused => self
                .fused_search(query, k, pre_filter_k)?
                .into_iter()
                .map(|(row, _)| row)
                .collect(),
        };
        Ok(rows
            .into_iter()
            .filter_map(|row| self.taxonomy.id_at(row))
            .collect())
    }

    /// [`ranked_ids`](Self::ranked_ids) with the configured mode and `top_k`.
    pub fn search(&self, query: &str) -> Result<Vec<MisconceptionId>, RetrievalError> {
        self.ranked_ids(query, self.config.mode, self.config.top_k)
    }
}
