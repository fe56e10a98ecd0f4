use super::{Metric, Prediction};
use crate::config::{EvalConfig, JUDGE_FALLBACK_SCORE};
use crate::dataset::EvaluationExample;
use crate::error::JudgeError;
use tracing::warn;

/// External model that rates how similar two misconception descriptions are.
///
/// Implementations are expected to answer with a single number in `[0, 1]`;
/// the raw reply is returned and parsed by [`JudgeMetric`].
pub trait Judge: Send + Sync {
    fn judge(&self, ground_truth: &str, prediction: &str) -> Result<String, JudgeError>;
}

/// Parses a judge reply as a single finite number.
pub fn parse_judge_score(reply: &str) -> Result<f64, JudgeError> {
    let trimmed = reply.trim();
    match trimmed.parse::<f64>() {
        Ok(score) if score.is_finite() => Ok(score),
        _ => Err(JudgeError::Parse(trimmed.to_string())),
    }
}

/// LLM-judged similarity between the gold misconception text and the
/// prediction.
///
/// Any judge failure scores [`JUDGE_FALLBACK_SCORE`]; parsed scores are
/// clamped to `[0, 1]`. Sentinel predictions and examples without a gold id
/// score `0.0` without calling the judge.
pub struct JudgeMetric<J: Judge> {
    judge: J,
    sentinel: String,
}

impl<J: Judge> JudgeMetric<J> {
    pub fn new(judge: J, config: &EvalConfig) -> Self {
        Self {
            judge,
            sentinel: config.failure_sentinel.clone(),
        }
    }

    /// Scores without the fallback conversion.
    pub fn try_score(
        &self,
        gold: &EvaluationExample,
        prediction: &Prediction,
    ) -> Result<f64, JudgeError> {
        if prediction.is_failure(&self.sentinel) || !gold.is_labelled() {
            return Ok(0.0);
        }
        let ground_truth = gold
            .gold_text
            .as_deref()
            .ok_or(JudgeError::MissingGroundTruth)?;

        let reply = self.judge.judge(ground_truth, &prediction.text)?;
        Ok(parse_judge_score(&reply)?.clamp(0.0, 1.0))
    }
}

impl<J: Judge> Metric for JudgeMetric<J> {
    fn name(&self) -> &'static str {
        "judge"
    }

    fn score(&self, gold: &EvaluationExample, prediction: &Prediction) -> f64 {
        match self.try_score(gold, prediction) {
            Ok(score) => score,
            Err(e) => {
                warn!(
                    "{}: judge failed, scoring {}: {}",
                    gold.key(),
                    JUDGE_FALLBACK_SCORE,
                    e
                );
                JUDGE_FALLBACK_SCORE
            }
        }
    }
}
