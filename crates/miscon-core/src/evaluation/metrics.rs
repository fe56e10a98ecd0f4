//! MAP@k for single-label retrieval.
//!
//! Every example has exactly one relevant misconception, so average
//! precision reduces to the reciprocal rank of the gold id inside the
//! cutoff window, and zero outside it.

use crate::config::MAP_CUTOFF;
use crate::error::ShapeError;
use crate::taxonomy::MisconceptionId;

/// Average precision of one ranked list against a single gold id.
///
/// Returns `1 / (i + 1)` where `i` is the 0-indexed position of the first
/// occurrence of `gold_id` within the first `k` entries, or `0.0` if it does
/// not occur there.
pub fn average_precision_at_k(
    ranked_ids: &[MisconceptionId],
    gold_id: MisconceptionId,
    k: usize,
) -> f64 {
    ranked_ids
        .iter()
        .take(k)
        .position(|&id| id == gold_id)
        .map_or(0.0, |i| 1.0 / (i + 1) as f64)
}

/// Whether `gold_id` appears in the first `k` entries.
pub fn hit_at_k(ranked_ids: &[MisconceptionId], gold_id: MisconceptionId, k: usize) -> bool {
    ranked_ids.iter().take(k).any(|&id| id == gold_id)
}

/// Mean of [`average_precision_at_k`] over a batch, at cutoff `k`.
///
/// # Errors
///
/// `ShapeError::RowMismatch` if the number of prediction rows differs from
/// the number of ground-truth labels. An empty batch scores `0.0`.
pub fn mean_average_precision_at_k(
    predictions: &[Vec<MisconceptionId>],
    ground_truth: &[MisconceptionId],
    k: usize,
) -> Result<f64, ShapeError> {
    if predictions.len() != ground_truth.len() {
        return Err(ShapeError::RowMismatch {
            predictions: predictions.len(),
            ground_truth: ground_truth.len(),
        });
    }
    let scores: Vec<f64> = predictions
        .iter()
        .zip(ground_truth)
        .map(|(ranked, &gold)| average_precision_at_k(ranked, gold, k))
        .collect();
    Ok(mean(&scores))
}

/// MAP at the evaluation cutoff ([`MAP_CUTOFF`] = 25).
pub fn mean_average_precision_at_cutoff(
    predictions: &[Vec<MisconceptionId>],
    ground_truth: &[MisconceptionId],
) -> Result<f64, ShapeError> {
    mean_average_precision_at_k(predictions, ground_truth, MAP_CUTOFF)
}

/// Arithmetic mean; `0.0` for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
