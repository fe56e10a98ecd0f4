//! Metric adapters: the scoring functions handed to the evaluation harness.
//!
//! A metric maps `(gold example, prediction)` to a score in `[0, 1]` and is
//! total: it never returns an error. Failures are computed as typed
//! `Result`s internally (`try_score`) and converted to a fallback score, with
//! a `warn!` log, only at the [`Metric::score`] boundary.

mod judge;
mod retrieval;

pub use judge::{parse_judge_score, Judge, JudgeMetric};
pub use retrieval::RetrievalMetric;

use crate::config::FAILURE_SENTINEL;
use crate::dataset::EvaluationExample;
use serde::{Deserialize, Serialize};

/// Output of the generation pipeline for one example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prediction {
    pub text: String,
}

impl Prediction {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// The prediction recorded when generation produced nothing usable.
    pub fn failed() -> Self {
        Self::new(FAILURE_SENTINEL)
    }

    /// Whether this prediction is the given failure sentinel.
    pub fn is_failure(&self, sentinel: &str) -> bool {
        self.text.trim() == sentinel.trim()
    }
}

impl From<String> for Prediction {
    fn from(text: String) -> Self {
        Self::new(text)
    }
}

impl From<&str> for Prediction {
    fn from(text: &str) -> Self {
        Self::new(text)
    }
}

/// A total scoring function.
pub trait Metric: Send + Sync {
    /// Short name for reports.
    fn name(&self) -> &'static str;

    /// Scores a prediction against its gold example. Always in `[0, 1]`.
    fn score(&self, gold: &EvaluationExample, prediction: &Prediction) -> f64;
}
