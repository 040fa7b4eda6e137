//! Walks back from the winning cell through the recorded directions.
//!
//! The grid is only read. A cursor sits in one of three layers: H (match),
//! E (gap in the query) or F (gap in the subject). In H, a cell with no
//! direction bit is terminal; with several bits it is a branch point, and
//! recursive traceback forks one walk per alternative.

use log::{debug, warn};

use super::grid::{
    Cell, Grid, DIAGONAL, LEFT, LEFT_EXTEND, LEFT_OPEN, UP, UP_EXTEND, UP_OPEN,
};
use super::types::{Alignment, Cigar, CigarOp, Markup, GAP};
use crate::matrices::ScoringMatrix;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Layer {
    Match,
    Deletion,
    Insertion,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cursor {
    row: usize,
    col: usize,
    layer: Layer,
}

/// A single bit of the direction mask, taken as a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Move {
    Diagonal,
    Up,
    Left,
    UpOpen,
    UpExtend,
    LeftOpen,
    LeftExtend,
}

/// Moves available at a cursor, highest priority first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Moves {
    buf: [Move; 3],
    len: usize,
}

impl Moves {
    fn collect(direction: u8, candidates: &[(u8, Move)]) -> Self {
        let mut moves = Moves {
            buf: [Move::Diagonal; 3],
            len: 0,
        };
        for &(bit, mv) in candidates {
            if direction & bit != 0 {
                moves.buf[moves.len] = mv;
                moves.len += 1;
            }
        }
        moves
    }

    pub fn as_slice(&self) -> &[Move] {
        &self.buf[..self.len]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Walking(Move),
    Branching(Moves),
    Terminal,
}

const MATCH_MOVES: [(u8, Move); 3] = [(DIAGONAL, Move::Diagonal), (UP, Move::Up), (LEFT, Move::Left)];
// opening is preferred over extending on ties
const DELETION_MOVES: [(u8, Move); 2] = [(UP_OPEN, Move::UpOpen), (UP_EXTEND, Move::UpExtend)];
const INSERTION_MOVES: [(u8, Move); 2] = [(LEFT_OPEN, Move::LeftOpen), (LEFT_EXTEND, Move::LeftExtend)];

/// One walk in progress: where it is and the columns emitted so far,
/// last column first.
#[derive(Clone, Debug)]
struct Branch {
    cursor: Cursor,
    columns: Vec<(u8, u8)>,
}

pub struct Traceback<'a> {
    grid: &'a Grid,
    subject: &'a [u8],
    query: &'a [u8],
    matrix: &'a ScoringMatrix,
}

impl<'a> Traceback<'a> {
    pub fn new(grid: &'a Grid, subject: &'a [u8], query: &'a [u8], matrix: &'a ScoringMatrix) -> Self {
        debug_assert_eq!(grid.subject_len(), subject.len());
        debug_assert_eq!(grid.query_len(), query.len());
        Self {
            grid,
            subject,
            query,
            matrix,
        }
    }

    fn state(&self, cursor: Cursor) -> State {
        let cell: &Cell = self.grid.cell(cursor.row, cursor.col);
        let moves = match cursor.layer {
            Layer::Match => Moves::collect(cell.direction, &MATCH_MOVES),
            // a gap layer at the boundary has nothing left to consume
            Layer::Deletion if cursor.row == 0 => return State::Terminal,
            Layer::Insertion if cursor.col == 0 => return State::Terminal,
            Layer::Deletion => Moves::collect(cell.direction, &DELETION_MOVES),
            Layer::Insertion => Moves::collect(cell.direction, &INSERTION_MOVES),
        };
        match moves.len {
            0 => State::Terminal,
            1 => State::Walking(moves.buf[0]),
            _ => State::Branching(moves),
        }
    }

    fn advance(&self, branch: &mut Branch, mv: Move) {
        let Cursor { row, col, .. } = branch.cursor;
        let (cursor, column) = match mv {
            Move::Diagonal => (
                Cursor { row: row - 1, col: col - 1, layer: Layer::Match },
                Some((self.subject[row - 1], self.query[col - 1])),
            ),
            Move::Up => (Cursor { row, col, layer: Layer::Deletion }, None),
            Move::Left => (Cursor { row, col, layer: Layer::Insertion }, None),
            Move::UpOpen | Move::UpExtend => {
                let layer = if mv == Move::UpOpen { Layer::Match } else { Layer::Deletion };
                (Cursor { row: row - 1, col, layer }, Some((self.subject[row - 1], GAP)))
            }
            Move::LeftOpen | Move::LeftExtend => {
                let layer = if mv == Move::LeftOpen { Layer::Match } else { Layer::Insertion };
                (Cursor { row, col: col - 1, layer }, Some((GAP, self.query[col - 1])))
            }
        };
        branch.cursor = cursor;
        if let Some(column) = column {
            branch.columns.push(column);
        }
    }

    /// An extend fork is redundant when the H cell the open fork lands on
    /// can step straight back into the same gap layer: both then reach the
    /// same cursor having emitted the same columns.
    fn rejoins(&self, cursor: Cursor, mv: Move) -> bool {
        match mv {
            Move::UpExtend => self.grid.cell(cursor.row - 1, cursor.col).direction & UP != 0,
            Move::LeftExtend => self.grid.cell(cursor.row, cursor.col - 1).direction & LEFT != 0,
            _ => false,
        }
    }

    /// Reconstructs alignments ending at grid cell `(row, col)`. The first
    /// alignment always follows the DIAGONAL > UP > LEFT priority; with
    /// `recursive`, every co-optimal alternative follows, up to `limit`.
    /// Every walk yields a distinct alignment.
    pub fn run(&self, row: usize, col: usize, recursive: bool, limit: usize) -> Vec<Alignment> {
        let end = (row, col);
        let mut alignments: Vec<Alignment> = Vec::new();
        let mut pending = vec![Branch {
            cursor: Cursor { row, col, layer: Layer::Match },
            columns: Vec::new(),
        }];

        while let Some(mut branch) = pending.pop() {
            if alignments.len() >= limit {
                warn!(
                    "traceback stopped at {} alignments, {} branches unexplored",
                    alignments.len(),
                    pending.len() + 1
                );
                break;
            }
            loop {
                match self.state(branch.cursor) {
                    State::Terminal => break,
                    State::Walking(mv) => self.advance(&mut branch, mv),
                    State::Branching(moves) => {
                        let (&first, alternatives) = match moves.as_slice().split_first() {
                            Some(split) => split,
                            None => break,
                        };
                        if recursive {
                            for &alt in alternatives.iter().rev() {
                                if self.rejoins(branch.cursor, alt) {
                                    continue;
                                }
                                let mut fork = branch.clone();
                                self.advance(&mut fork, alt);
                                pending.push(fork);
                            }
                        }
                        self.advance(&mut branch, first);
                    }
                }
            }
            let alignment = self.finish(branch, end);
            debug_assert!(!alignments.contains(&alignment));
            alignments.push(alignment);
        }

        debug!("traceback from ({row}, {col}) produced {} alignment(s)", alignments.len());
        alignments
    }

    fn finish(&self, branch: Branch, end: (usize, usize)) -> Alignment {
        let n = branch.columns.len();
        let mut aligned_subject = Vec::with_capacity(n);
        let mut markup = Vec::with_capacity(n);
        let mut aligned_query = Vec::with_capacity(n);
        let mut cigar = Cigar::default();
        let (mut identity, mut similarity, mut gaps) = (0, 0, 0);

        for &(s, q) in branch.columns.iter().rev() {
            let mark = if s == GAP {
                cigar.push(CigarOp::Ins, 1);
                Markup::Gap
            } else if q == GAP {
                cigar.push(CigarOp::Del, 1);
                Markup::Gap
            } else {
                cigar.push(CigarOp::Match, 1);
                Markup::classify(s, q, self.matrix)
            };
            match mark {
                Markup::Identity => {
                    identity += 1;
                    similarity += 1;
                }
                Markup::Similarity => similarity += 1,
                Markup::Gap => gaps += 1,
                Markup::Mismatch => {}
            }
            aligned_subject.push(s);
            markup.push(mark.symbol());
            aligned_query.push(q);
        }

        Alignment {
            aligned_subject,
            markup,
            aligned_query,
            subject_range: (branch.cursor.row, end.0),
            query_range: (branch.cursor.col, end.1),
            identity,
            similarity,
            gaps,
            cigar,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_follow_priority_order() {
        let moves = Moves::collect(LEFT | DIAGONAL | UP, &MATCH_MOVES);
        assert_eq!(moves.as_slice(), &[Move::Diagonal, Move::Up, Move::Left]);
        let moves = Moves::collect(LEFT | UP_OPEN, &MATCH_MOVES);
        assert_eq!(moves.as_slice(), &[Move::Left]);
    }

    #[test]
    fn gap_layers_prefer_opening() {
        let moves = Moves::collect(UP_EXTEND | UP_OPEN | DIAGONAL, &DELETION_MOVES);
        assert_eq!(moves.as_slice(), &[Move::UpOpen, Move::UpExtend]);
        let moves = Moves::collect(LEFT_EXTEND, &INSERTION_MOVES);
        assert_eq!(moves.as_slice(), &[Move::LeftExtend]);
    }

    #[test]
    fn extend_fork_skipped_when_open_path_rejoins() {
        // linear gaps: every deletion cell inside the run ties open and extend
        let m = ScoringMatrix::nucleotide(5, -4);
        let params = crate::align::AlignParams::new(1, 1).unwrap();
        let mut session = crate::align::Session::new(b"ACGGGGTA", &m, params).unwrap();
        session.set_query(b"ACGTA");
        session.align().unwrap();
        let tb = Traceback::new(session.grid(), b"ACGGGGTA", b"ACGTA", &m);
        let inside = Cursor { row: 5, col: 3, layer: Layer::Deletion };
        assert_eq!(
            tb.state(inside),
            State::Branching(Moves::collect(UP_OPEN | UP_EXTEND, &DELETION_MOVES))
        );
        assert!(tb.rejoins(inside, Move::UpExtend));
        assert!(!tb.rejoins(inside, Move::UpOpen));
        assert_eq!(tb.run(8, 5, true, 100).len(), 4);
    }

    #[test]
    fn winner_cell_state_on_filled_grid() {
        let m = ScoringMatrix::nucleotide(2, -1);
        let mut session = crate::align::Session::new(
            b"ACGT",
            &m,
            crate::align::AlignParams::new(3, 1).unwrap(),
        )
        .unwrap();
        session.set_query(b"ACGT");
        session.align().unwrap();
        let tb = Traceback::new(session.grid(), b"ACGT", b"ACGT", &m);
        let at = |row, col| Cursor { row, col, layer: Layer::Match };
        assert_eq!(tb.state(at(4, 4)), State::Walking(Move::Diagonal));
        assert_eq!(tb.state(at(0, 0)), State::Terminal);
        assert_eq!(tb.state(at(1, 2)), State::Terminal);
    }
}
