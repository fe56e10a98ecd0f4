//! BM25 lexical pre-filter.
//!
//! Wraps the [`bm25`](https://crates.io/crates/bm25) crate. Each taxonomy row
//! is indexed as one document keyed by its row index, using English
//! tokenization, stop-word removal and stemming.
//!
//! BM25 only scores rows sharing at least one term with the query. The
//! pre-filter pads its candidate set with the remaining rows in taxonomy
//! order so the embedding stage always sees `min(pre_filter_k, len)` rows.

use super::types::{sort_descending, RowScore};
use crate::taxonomy::Taxonomy;
use bm25::{Document, Language, SearchEngine, SearchEngineBuilder};
use tracing::instrument;

/// First stage of hybrid retrieval.
pub struct LexicalPreFilter {
    search_engine: SearchEngine<u64>,
    /// Row count (the bm25 engine does not expose it)
    len: usize,
}

impl LexicalPreFilter {
    /// Indexes every misconception text of the taxonomy.
    #[instrument(skip_all, fields(rows = taxonomy.len()))]
    pub fn new(taxonomy: &Taxonomy) -> Self {
        let documents: Vec<Document<u64>> = taxonomy
            .iter()
            .enumerate()
            .map(|(row, m)| Document {
                id: row as u64,
                contents: m.text.clone(),
            })
            .collect();
        let search_engine =
            SearchEngineBuilder::<u64>::with_documents(Language::English, documents).build();

        Self {
            search_engine,
            len: taxonomy.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows matching at least one query term, best first, at most `k`.
    ///
    /// Equal BM25 scores are ordered by row so results are reproducible.
    pub fn search(&self, query: &str, k: usize) -> Vec<RowScore> {
        if k == 0 || self.is_empty() {
            return Vec::new();
        }
        // Ask for every match: the engine's own tie order is unspecified,
        // so truncation happens after our deterministic sort.
        let mut scored: Vec<RowScore> = self
            .search_engine
            .search(query, self.len)
            .into_iter()
            .map(|result| (result.document.id as usize, result.score))
            .collect();
        sort_descending(&mut scored);
        scored.truncate(k);
        scored
    }

    /// Candidate rows for the re-rank stage.
    ///
    /// Returns exactly `min(k, len)` distinct rows: the lexical matches in
    /// rank order, then unmatched rows in taxonomy order.
    pub fn candidates(&self, query: &str, k: usize) -> Vec<usize> {
        let k = k.min(self.len);
        let mut rows: Vec<usize> = self.search(query, k).into_iter().map(|(r, _)| r).collect();
        if rows.len() < k {
            let mut taken = vec![false; self.len];
            for &row in &rows {
                taken[row] = true;
            }
            rows.extend((0..self.len).filter(|&row| !taken[row]).take(k - rows.len()));
        }
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::taxonomy::Misconception;

    fn taxonomy() -> Taxonomy {
        Taxonomy::from_rows(vec![
            Misconception::new(10, "Confuses area and perimeter"),
            Misconception::new(11, "Believes there are 100 degrees in a full turn"),
            Misconception::new(12, "Thinks the perimeter is found by multiplying sides"),
            Misconception::new(13, "Does not know that a triangle has three sides"),
        ])
        .unwrap()
    }

    #[test]
    fn test_search_ranks_matching_rows() {
        let filter = LexicalPreFilter::new(&taxonomy());
        let results = filter.search("perimeter", 10);

        let rows: Vec<usize> = results.iter().map(|(r, _)| *r).collect();
        assert_eq!(rows.len(), 2);
        assert!(rows.contains(&0));
        assert!(rows.contains(&2));
        assert!(results.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[test]
    fn test_search_respects_k() {
        let filter = LexicalPreFilter::new(&taxonomy());
        assert_eq!(filter.search("perimeter", 1).len(), 1);
        assert!(filter.search("perimeter", 0).is_empty());
    }

    #[test]
    fn test_no_match_returns_empty() {
        let filter = LexicalPreFilter::new(&taxonomy());
        assert!(filter.search("photosynthesis", 10).is_empty());
        assert!(filter.search("", 10).is_empty());
    }

    #[test]
    fn test_candidates_pad_in_row_order() {
        let filter = LexicalPreFilter::new(&taxonomy());
        let candidates = filter.candidates("degrees", 3);

        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0], 1);
        assert_eq!(&candidates[1..], &[0, 2]);
    }

    #[test]
    fn test_candidates_cover_small_taxonomy() {
        let filter = LexicalPreFilter::new(&taxonomy());
        let mut candidates = filter.candidates("anything at all", 50);
        candidates.sort();

        assert_eq!(candidates, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_taxonomy() {
        let filter = LexicalPreFilter::new(&Taxonomy::default());
        assert!(filter.is_empty());
        assert!(filter.candidates("perimeter", 5).is_empty());
    }
}
