//! Retrieval over the misconception taxonomy.
//!
//! Free-text predictions are mapped to ranked taxonomy candidates by
//! composing two independent stages:
//!
//! - [`LexicalPreFilter`]: BM25 over every misconception text, keeps the top
//!   `pre_filter_k` rows
//! - [`EmbeddingReRanker`]: exact distance scan of the query embedding
//!   against precomputed taxonomy embeddings
//!
//! [`HybridIndex`] owns both stages and exposes the three retrieval modes
//! (pure vector, two-stage hybrid, reciprocal rank fusion).
//!
//! # Determinism
//!
//! Nothing here is approximate or randomised. Both stages break score ties
//! by taxonomy row order, so a fixed taxonomy and query always produce the
//! same ranking.
//!
//! # Thread Safety
//!
//! Every index structure is immutable after [`HybridIndex::build`]; queries
//! take `&self` and allocate their own buffers, so a single index can be
//! shared across evaluation workers behind an `Arc`.

mod fusion;
mod index;
mod keyword;
mod types;
mod vector;

pub use fusion::reciprocal_rank_fusion;
pub use index::HybridIndex;
pub use keyword::LexicalPreFilter;
pub use types::{sort_ascending, RankedMisconception, RowScore};
pub use vector::EmbeddingReRanker;
