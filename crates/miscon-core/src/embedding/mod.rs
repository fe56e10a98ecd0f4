//! Text embedding backends.
//!
//! The retrieval index only depends on the [`Embedder`] trait, so the
//! backend can be swapped without touching search code.
//!
//! ## Implementations
//!
//! - [`HashingEmbedder`] - deterministic feature hashing, no model files
//! - `JinaBertEmbedder` - JinaBERT via Candle (feature `jina`)

mod hashing;
#[cfg(feature = "jina")]
mod jina;
mod traits;

pub use hashing::HashingEmbedder;
#[cfg(feature = "jina")]
pub use jina::{JinaBertConfig, JinaBertEmbedder};
pub use traits::{l2_norm, Embedder};
