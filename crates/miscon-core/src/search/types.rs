use crate::taxonomy::{Misconception, MisconceptionId};
use serde::{Deserialize, Serialize};

/// A taxonomy row index paired with a stage score.
///
/// For the embedding stage the score is a distance (smaller is better); for
/// the lexical stage and fusion it is a relevance score (larger is better).
pub type RowScore = (usize, f32);

/// A hybrid search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedMisconception {
    pub misconception: Misconception,
    /// Distance from the query embedding
    pub distance: f32,
}

impl RankedMisconception {
    pub fn id(&self) -> MisconceptionId {
        self.misconception.id
    }
}

/// Sorts by ascending score, ties broken by ascending row.
pub fn sort_ascending(scored: &mut [RowScore]) {
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
}

/// Sorts by descending score, ties broken by ascending row.
pub(crate) fn sort_descending(scored: &mut [RowScore]) {
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_ascending_breaks_ties_by_row() {
        let mut scored = vec![(3, 0.5), (1, 0.5), (2, 0.1)];
        sort_ascending(&mut scored);
        assert_eq!(scored, vec![(2, 0.1), (1, 0.5), (3, 0.5)]);
    }

    #[test]
    fn test_sort_descending_breaks_ties_by_row() {
        let mut scored = vec![(4, 1.0), (0, 2.0), (2, 1.0)];
        sort_descending(&mut scored);
        assert_eq!(scored, vec![(0, 2.0), (2, 1.0), (4, 1.0)]);
    }
}
