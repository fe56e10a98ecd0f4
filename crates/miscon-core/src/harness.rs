//! Parallel evaluation runner.
//!
//! Scores a set of [`EvaluationExample`]s with a [`Metric`] on a dedicated
//! rayon pool sized by the configured worker count. The metric and the
//! retrieval index are only read, never written, during a run.
//!
//! The missing-gold policy is applied here and nowhere else: unlabelled
//! examples are either skipped or given the policy score, and the metric is
//! only ever asked to score labelled ones.

use crate::config::{EvalConfig, MissingGoldPolicy, DEFAULT_WORKERS, FAILURE_SENTINEL};
use crate::dataset::{EvaluationExample, ExampleKey};
use crate::error::{EvaluationError, GenerationError};
use crate::evaluation::{bootstrap_ci, mean, BootstrapResult};
use crate::metric::{Metric, Prediction};
use crate::taxonomy::MisconceptionId;
use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;
use tracing::{info, instrument, warn};

/// The external pipeline that turns a question prompt into an explanation.
pub trait Generator: Send + Sync {
    fn generate(&self, question: &str) -> Result<Prediction, GenerationError>;
}

/// Score of one evaluated example.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExampleScore {
    pub key: ExampleKey,
    pub gold: Option<MisconceptionId>,
    pub prediction: String,
    pub score: f64,
    /// The prediction was the failure sentinel
    pub generation_failed: bool,
}

/// Aggregate result of an evaluation run.
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub metric: String,
    /// Per-example scores, in input order, excluded examples omitted
    pub scores: Vec<ExampleScore>,
    /// Mean score, `0.0` when nothing was evaluated
    pub mean: f64,
    pub evaluated: usize,
    /// Unlabelled examples skipped under [`MissingGoldPolicy::Exclude`]
    pub excluded: usize,
    pub generation_failures: usize,
    pub elapsed_ms: f64,
}

impl EvaluationReport {
    pub fn values(&self) -> Vec<f64> {
        self.scores.iter().map(|s| s.score).collect()
    }

    /// 95% bootstrap confidence interval of the mean score.
    pub fn confidence_interval(&self, n_bootstrap: usize, seed: u64) -> Option<BootstrapResult> {
        bootstrap_ci(&self.values(), n_bootstrap, seed)
    }

    /// Labelled examples with a perfect score.
    ///
    /// Under MAP@k a score of `1.0` means the gold id was ranked first, so
    /// this is Hit@1. Unlabelled examples never count, whatever the policy.
    pub fn hits_at_1(&self) -> usize {
        self.scores
            .iter()
            .filter(|s| s.gold.is_some() && s.score >= 1.0)
            .count()
    }
}

/// Runs metrics over examples with a fixed number of worker threads.
#[derive(Debug, Clone)]
pub struct Evaluator {
    workers: usize,
    missing_gold: MissingGoldPolicy,
    sentinel: String,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS)
    }
}

impl Evaluator {
    /// Creates an evaluator with `workers` threads (at least one).
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
            missing_gold: MissingGoldPolicy::default(),
            sentinel: FAILURE_SENTINEL.to_string(),
        }
    }

    pub fn from_config(config: &EvalConfig) -> Self {
        Self {
            workers: config.workers.max(1),
            missing_gold: config.missing_gold,
            sentinel: config.failure_sentinel.clone(),
        }
    }

    pub fn with_missing_gold(mut self, policy: MissingGoldPolicy) -> Self {
        self.missing_gold = policy;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Scores every example.
    ///
    /// # Arguments
    ///
    /// * `examples` - Examples to score; the report keeps their order
    /// * `predict` - Supplies the prediction for an example
    /// * `metric` - Scores labelled examples
    /// * `on_progress` - Called with `(done, total)` after each example
    ///
    /// Under [`MissingGoldPolicy::Exclude`] unlabelled examples are neither
    /// predicted nor scored. Under the other policies they are predicted and
    /// given [`MissingGoldPolicy::score`] without consulting `metric`.
    ///
    /// # Errors
    ///
    /// `EvaluationError::ThreadPool` if the worker pool cannot be created.
    #[instrument(skip_all, fields(examples = examples.len(), metric = metric.name()))]
    pub fn run<P, F>(
        &self,
        examples: &[EvaluationExample],
        predict: P,
        metric: &dyn Metric,
        on_progress: F,
    ) -> Result<EvaluationReport, EvaluationError>
    where
        P: Fn(&EvaluationExample) -> Prediction + Sync,
        F: Fn(usize, usize) + Sync,
    {
        let start = Instant::now();

        let selected: Vec<&EvaluationExample> = examples
            .iter()
            .filter(|e| e.is_labelled() || self.missing_gold != MissingGoldPolicy::Exclude)
            .collect();
        let excluded = examples.len() - selected.len();
        let total = selected.len();

        let worker_count = self.workers.min(total).max(1);
        let pool = ThreadPoolBuilder::new().num_threads(worker_count).build()?;
        let done = AtomicUsize::new(0);

        let scores: Vec<ExampleScore> = pool.install(|| {
            selected
                .par_iter()
                .map(|example| {
                    let score = self.score_one(example, &predict, metric);
                    on_progress(done.fetch_add(1, Ordering::Relaxed) + 1, total);
                    score
                })
                .collect()
        });
        let values: Vec<f64> = scores.iter().map(|s| s.score).collect();
        let generation_failures = scores.iter().filter(|s| s.generation_failed).count();
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let report = EvaluationReport {
            metric: metric.name().to_string(),
            mean: mean(&values),
            evaluated: scores.len(),
            excluded,
            generation_failures,
            elapsed_ms,
            scores,
        };
        info!(
            "{}: mean {:.4} over {} examples ({} excluded, {} generation failures) in {:.0}ms",
            report.metric,
            report.mean,
            report.evaluated,
            report.excluded,
            report.generation_failures,
            report.elapsed_ms
        );
        Ok(report)
    }

    /// Like [`run`](Self::run), generating predictions with `generator`.
    ///
    /// A generation error is logged and replaced by the failure sentinel.
    pub fn run_with_generator<F>(
        &self,
        examples: &[EvaluationExample],
        generator: &dyn Generator,
        metric: &dyn Metric,
        on_progress: F,
    ) -> Result<EvaluationReport, EvaluationError>
    where
        F: Fn(usize, usize) + Sync,
    {
        let predict = |example: &EvaluationExample| match generator.generate(&example.question) {
            Ok(prediction) => prediction,
            Err(e) => {
                warn!("{}: {}", example.key(), e);
                Prediction::new(self.sentinel.clone())
            }
        };
        self.run(examples, predict, metric, on_progress)
    }

    fn score_one<P>(
        &self,
        example: &EvaluationExample,
        predict: &P,
        metric: &dyn Metric,
    ) -> ExampleScore
    where
        P: Fn(&EvaluationExample) -> Prediction + Sync,
    {
        let prediction = predict(example);
        let generation_failed = prediction.is_failure(&self.sentinel);
        let score = if generation_failed {
            0.0
        } else if example.is_labelled() {
            metric.score(example, &prediction)
        } else {
            self.missing_gold.score()
        };
        ExampleScore {
            key: example.key(),
            gold: example.gold_misconception_id,
            generation_failed,
            score,
            prediction: prediction.text,
        }
    }
}
