//! Best-cell tracking.
//!
//! Each chunk-task keeps its own candidate while it fills; after the fill the
//! candidates are reduced in one pass. Ties on score go to the lowest row,
//! then the lowest column, so the winner does not depend on chunking.

use std::cmp::Ordering;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Winner {
    pub row: usize,
    pub col: usize,
    pub score: i32,
}

impl Winner {
    /// True when `self` should replace `other` as the global best.
    fn beats(&self, other: &Winner) -> bool {
        match self.score.cmp(&other.score) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => (self.row, self.col) < (other.row, other.col),
        }
    }
}

/// Winner candidate local to one chunk-task.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LocalWinner(Option<Winner>);

impl LocalWinner {
    /// Keeps the first cell seen with a strictly greater positive score.
    /// Fed in row-major order this keeps the lowest row and column on ties.
    #[inline]
    pub fn offer(&mut self, row: usize, col: usize, score: i32) {
        let current = self.0.map_or(0, |w| w.score);
        if score > current {
            self.0 = Some(Winner { row, col, score });
        }
    }

    pub fn get(&self) -> Option<Winner> {
        self.0
    }
}

/// Reduces per-chunk candidates to the global winner.
pub fn reduce<I>(candidates: I) -> Option<Winner>
where
    I: IntoIterator<Item = LocalWinner>,
{
    candidates
        .into_iter()
        .filter_map(|c| c.get())
        .fold(None, |best: Option<Winner>, w| match best {
            Some(b) if !w.beats(&b) => Some(b),
            _ => Some(w),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(row: usize, col: usize, score: i32) -> LocalWinner {
        let mut w = LocalWinner::default();
        w.offer(row, col, score);
        w
    }

    #[test]
    fn offer_ignores_zero_and_equal_scores() {
        let mut w = LocalWinner::default();
        w.offer(1, 1, 0);
        assert_eq!(w.get(), None);
        w.offer(1, 2, 5);
        w.offer(1, 3, 5);
        w.offer(2, 1, 4);
        assert_eq!(w.get(), Some(Winner { row: 1, col: 2, score: 5 }));
    }

    #[test]
    fn reduce_picks_highest_score() {
        let best = reduce([local(1, 1, 3), local(4, 2, 9), local(2, 7, 5)]);
        assert_eq!(best, Some(Winner { row: 4, col: 2, score: 9 }));
    }

    #[test]
    fn reduce_breaks_ties_by_row_then_column() {
        let a = [local(5, 1, 7), local(2, 9, 7), local(2, 3, 7)];
        let b = [local(2, 3, 7), local(5, 1, 7), local(2, 9, 7)];
        let expected = Some(Winner { row: 2, col: 3, score: 7 });
        assert_eq!(reduce(a), expected);
        assert_eq!(reduce(b), expected);
    }

    #[test]
    fn reduce_of_empty_candidates_is_none() {
        assert_eq!(reduce([LocalWinner::default(), LocalWinner::default()]), None);
        assert_eq!(reduce(Vec::new()), None);
    }
}
