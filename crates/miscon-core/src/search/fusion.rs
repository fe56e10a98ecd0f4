// Reciprocal Rank Fusion (RRF)

use std::collections::HashMap;
use std::hash::Hash;

/// Combines several rankings with reciprocal rank fusion.
///
/// RRF Formula: `score(d) = sum_r 1 / (k + rank_r(d))`
///
/// Where:
/// - `rank_r(d)` is the 1-indexed position of `d` in ranking `r`
/// - `k` damps the weight of top positions (60 in Cormack et al., SIGIR 2009)
///
/// Items missing from a ranking contribute nothing for it. The output is
/// sorted by descending fused score; equal scores are ordered by item so the
/// result does not depend on hash iteration order.
pub fn reciprocal_rank_fusion<T: Copy + Eq + Hash + Ord>(
    rankings: &[&[T]],
    k: usize,
) -> Vec<(T, f32)> {
    let k_param = k as f32;
    let mut rrf_scores: HashMap<T, f32> = HashMap::new();

    for ranking in rankings {
        for (rank, item) in ranking.iter().enumerate() {
            let rank_position = (rank + 1) as f32;
            *rrf_scores.entry(*item).or_insert(0.0) += 1.0 / (k_param + rank_position);
        }
    }

    let mut combined: Vec<(T, f32)> = rrf_scores.into_iter().collect();
    combined.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    combined
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RRF_K;

    #[test]
    fn test_rrf() {
        let vector_rows = [1, 2, 3];
        let lexical_rows = [3, 1, 4];

        let fused = reciprocal_rank_fusion(&[&vector_rows[..], &lexical_rows[..]], RRF_K);

        // 1: ranks 1 and 2; 3: ranks 3 and 1; 2 and 4 appear once
        assert_eq!(fused.len(), 4);
        assert_eq!(fused[0].0, 1);
        assert_eq!(fused[1].0, 3);
        assert_eq!(fused[2].0, 2);
        assert_eq!(fused[3].0, 4);

        let expected = 1.0 / 61.0 + 1.0 / 62.0;
        assert!((fused[0].1 - expected).abs() < 1e-6);
    }

    #[test]
    fn test_rrf_ties_ordered_by_item() {
        let a = [5];
        let b = [2];
        let fused = reciprocal_rank_fusion(&[&a[..], &b[..]], RRF_K);

        assert_eq!(fused[0].0, 2);
        assert_eq!(fused[1].0, 5);
    }

    #[test]
    fn test_rrf_empty() {
        let empty: [usize; 0] = [];
        assert!(reciprocal_rank_fusion(&[&empty[..], &empty[..]], RRF_K).is_empty());
        assert!(reciprocal_rank_fusion::<usize>(&[], RRF_K).is_empty());
    }
}
