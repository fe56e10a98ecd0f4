//! # Miscon Core
//!
//! Retrieval and ranking evaluation for student-misconception explanations.
//!
//! A generation pipeline (external to this crate) turns a multiple-choice
//! question into a free-text explanation of the misconception behind one
//! answer. This crate scores that explanation: it retrieves the closest
//! entries of a fixed misconception taxonomy and measures where the gold
//! misconception lands in the ranking (MAP@25).
//!
//! ## Modules
//!
//! - [`taxonomy`] - Misconception catalogue loaded from CSV
//! - [`embedding`] - Text embedding trait and backends
//! - [`search`] - Hybrid retrieval (BM25 pre-filter + embedding re-rank + RRF)
//! - [`evaluation`] - MAP@k and significance statistics
//! - [`dataset`] - Question files to per-answer evaluation examples
//! - [`metric`] - Total scoring functions for the evaluation harness
//! - [`harness`] - Parallel evaluation runner
//! - [`config`] - Evaluation protocol constants and configuration
//! - [`error`] - Error types

pub mod config;
pub mod dataset;
pub mod embedding;
pub mod error;
pub mod evaluation;
pub mod harness;
pub mod metric;
pub mod search;
pub mod taxonomy;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::{EvalConfig, RetrievalConfig, RetrievalMode};
pub use dataset::{build_examples, load_predictions, load_questions, EvaluationExample};
pub use error::{ConfigError, EvaluationError, LoadError, RetrievalError, ShapeError};
pub use harness::{EvaluationReport, Evaluator};
pub use metric::{Metric, Prediction, RetrievalMetric};
pub use search::HybridIndex;
pub use taxonomy::{Misconception, MisconceptionId, Taxonomy};
