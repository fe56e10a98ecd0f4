use super::{Metric, Prediction};
use crate::config::{EvalConfig, RetrievalMode, MAP_CUTOFF};
use crate::dataset::EvaluationExample;
use crate::error::RetrievalError;
use crate::evaluation::average_precision_at_k;
use crate::search::HybridIndex;
use std::sync::Arc;
use tracing::{debug, warn};

/// MAP@25 of the candidates retrieved for a prediction.
///
/// The prediction text is used as a retrieval query against the taxonomy and
/// the gold id is looked up in the ranked result. An example without a gold
/// id scores `0.0`; the missing-gold policy belongs to the
/// [`Evaluator`](crate::harness::Evaluator), which never passes such
/// examples here.
pub struct RetrievalMetric {
    index: Arc<HybridIndex>,
    mode: RetrievalMode,
    k: usize,
    sentinel: String,
}

impl RetrievalMetric {
    pub fn new(index: Arc<HybridIndex>, config: &EvalConfig) -> Self {
        Self {
            index,
            mode: config.retrieval.mode,
            k: MAP_CUTOFF,
            sentinel: config.failure_sentinel.clone(),
        }
    }

    /// Overrides the retrieval mode.
    pub fn with_mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    /// Scores without the failure-to-zero conversion.
    ///
    /// Sentinel predictions and unlabelled examples score `0.0` without
    /// touching the index.
    pub fn try_score(
        &self,
        gold: &EvaluationExample,
        prediction: &Prediction,
    ) -> Result<f64, RetrievalError> {
        if prediction.is_failure(&self.sentinel) {
            debug!("{}: generation failed, scoring 0", gold.key());
            return Ok(0.0);
        }
        let Some(gold_id) = gold.gold_misconception_id else {
            return Ok(0.0);
        };

        let ranked = self.index.ranked_ids(&prediction.text, self.mode, self.k)?;
        Ok(average_precision_at_k(&ranked, gold_id, self.k))
    }
}

impl Metric for RetrievalMetric {
    fn name(&self) -> &'static str {
        match self.mode {
            RetrievalMode::Vector => "map@25 (vector)",
            RetrievalMode::Hybrid => "map@25 (hybrid)",
            RetrievalMode::Fused => "map@25 (fused)",
        }
    }

    fn score(&self, gold: &EvaluationExample, prediction: &Prediction) -> f64 {
        match self.try_score(gold, prediction) {
            Ok(score) => score,
            Err(e) => {
                warn!("{}: retrieval failed, scoring 0: {}", gold.key(), e);
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FAILURE_SENTINEL;
    use crate::embedding::Embedder;
    use crate::taxonomy::MisconceptionId;
    use crate::test_utils::{sample_index, CountingEmbedder};

    fn example(gold: Option<u32>) -> EvaluationExample {
        EvaluationExample {
            question_id: 1,
            answer: 'B',
            question: "The question is: ...".to_string(),
            gold_misconception_id: gold.map(MisconceptionId::new),
            gold_text: None,
        }
    }

    fn counting_metric(config: &EvalConfig) -> (Arc<CountingEmbedder>, RetrievalMetric) {
        let embedder = Arc::new(CountingEmbedder::new(256));
        let index = sample_index(embedder.clone() as Arc<dyn Embedder>);
        embedder.reset();
        (embedder, RetrievalMetric::new(index, config))
    }

    #[test]
    fn test_sentinel_scores_zero_without_retrieval() {
        let (embedder, metric) = counting_metric(&EvalConfig::default());

        let score = metric.score(&example(Some(103)), &Prediction::new(FAILURE_SENTINEL));

        assert_eq!(score, 0.0);
        assert_eq!(embedder.calls(), 0);
    }

    #[test]
    fn test_exact_text_scores_one() {
        for &mode in RetrievalMode::all() {
            let (embedder, metric) = counting_metric(&EvalConfig::default());
            let metric = metric.with_mode(mode);
            let score = metric.score(
                &example(Some(103)),
                &Prediction::new("Confuses area and perimeter"),
            );

            assert_eq!(score, 1.0, "mode {}", mode.name());
            assert!(embedder.calls() >= 1);
        }
    }

    #[test]
    fn test_gold_not_retrieved_scores_zero() {
        let (_, metric) = counting_metric(&EvalConfig::default());
        let score = metric.score(&example(Some(424242)), &Prediction::new("triangle angles"));
        assert_eq!(score, 0.0);
    }

    #[test]
    fn test_never_panics_on_odd_input() {
        let (_, metric) = counting_metric(&EvalConfig::default());

        let long = "x".repeat(10_000);
        for text in ["", "   ", "\u{0}", "🙂🙂🙂", long.as_str()] {
            let score = metric.score(&example(Some(100)), &Prediction::new(text));
            assert!((0.0..=1.0).contains(&score));
        }
    }

    #[test]
    fn test_unlabelled_scores_zero_without_retrieval() {
        let (embedder, metric) = counting_metric(&EvalConfig::default());
        let score = metric.score(&example(None), &Prediction::new("anything"));

        assert_eq!(score, 0.0);
        assert_eq!(embedder.calls(), 0);
    }

    #[test]
    fn test_embedding_failure_maps_to_zero() {
        use crate::test_utils::FailingEmbedder;

        // The index builds with a working embedder; queries then fail.
        struct FailsAfterBuild {
            inner: CountingEmbedder,
        }
        impl Embedder for FailsAfterBuild {
            fn embedding_dim(&self) -> usize {
                self.inner.embedding_dim()
            }
            fn embed(&self, text: &str) -> Result<Vec<f32>, crate::error::EmbeddingError> {
                if self.inner.calls() >= 10 {
                    return FailingEmbedder.embed(text);
                }
                self.inner.embed(text)
            }
        }

        let index = sample_index(Arc::new(FailsAfterBuild {
            inner: CountingEmbedder::new(64),
        }));
        let metric = RetrievalMetric::new(index, &EvalConfig::default());
        let gold = example(Some(103));
        let prediction = Prediction::new("Confuses area and perimeter");

        assert!(matches!(
            metric.try_score(&gold, &prediction),
            Err(RetrievalError::Embedding(_))
        ));
        assert_eq!(metric.score(&gold, &prediction), 0.0);
    }
}
