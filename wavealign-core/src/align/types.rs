use std::fmt;

use crate::error::{AlignError, AlignResult};
use crate::matrices::ScoringMatrix;

pub(crate) const GAP: u8 = b'-';

/// Affine gap costs: a gap of length `k` costs `open + (k - 1) * extend`.
/// Both costs are non-negative and extending never costs more than opening.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GapPenalties {
    pub open: i32,
    pub extend: i32,
}

impl GapPenalties {
    pub fn new(open: i32, extend: i32) -> AlignResult<Self> {
        if open < 0 || extend < 0 || extend > open {
            return Err(AlignError::InvalidGapPenalty {
                gap_open: open,
                gap_extend: extend,
            });
        }
        Ok(Self { open, extend })
    }

    /// Cost of one gap run of `len` positions.
    pub fn cost(&self, len: usize) -> i32 {
        if len == 0 {
            0
        } else {
            self.open + self.extend * (len as i32 - 1)
        }
    }
}

const DEFAULT_ALIGNMENT_LIMIT: usize = 1000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignParams {
    pub gaps: GapPenalties,
    pub recursive_traceback: bool,
    /// Upper bound on alignments produced by recursive traceback.
    pub alignment_limit: usize,
    /// Fixed chunk side; `None` derives it from the shorter sequence and
    /// the worker count.
    pub chunk_size: Option<usize>,
    /// Size of a dedicated worker pool; `None` uses the global pool.
    pub workers: Option<usize>,
}

impl AlignParams {
    pub fn new(gap_open: i32, gap_extend: i32) -> AlignResult<Self> {
        Ok(Self {
            gaps: GapPenalties::new(gap_open, gap_extend)?,
            recursive_traceback: false,
            alignment_limit: DEFAULT_ALIGNMENT_LIMIT,
            chunk_size: None,
            workers: None,
        })
    }

    pub fn with_recursive_traceback(mut self, recursive: bool) -> Self {
        self.recursive_traceback = recursive;
        self
    }

    pub fn with_alignment_limit(mut self, limit: usize) -> AlignResult<Self> {
        if limit == 0 {
            return Err(AlignError::InvalidParameter {
                msg: "alignment limit must be at least 1",
            });
        }
        self.alignment_limit = limit;
        Ok(self)
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> AlignResult<Self> {
        if chunk_size == 0 {
            return Err(AlignError::InvalidParameter {
                msg: "chunk size must be at least 1",
            });
        }
        self.chunk_size = Some(chunk_size);
        Ok(self)
    }

    pub fn with_workers(mut self, workers: usize) -> AlignResult<Self> {
        if workers == 0 {
            return Err(AlignError::InvalidParameter {
                msg: "worker count must be at least 1",
            });
        }
        self.workers = Some(workers);
        Ok(self)
    }
}

/// CIGAR operations consume sequence coordinates.
/// Ins consumes query (gap in subject), Del consumes subject (gap in query).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CigarOp {
    /// Consumes query and subject.
    Match,
    /// Consumes query, gap in subject.
    Ins,
    /// Consumes subject, gap in query.
    Del,
}

#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct Cigar {
    pub ops: Vec<(CigarOp, usize)>,
}

impl Cigar {
    pub fn push(&mut self, op: CigarOp, len: usize) {
        if len == 0 {
            return;
        }
        if let Some((last_op, last_len)) = self.ops.last_mut() {
            if *last_op == op {
                *last_len += len;
                return;
            }
        }
        self.ops.push((op, len));
    }

    pub fn len(&self) -> usize {
        self.ops.iter().map(|(_, n)| *n).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

impl fmt::Display for Cigar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (op, len) in &self.ops {
            let c = match op {
                CigarOp::Match => 'M',
                CigarOp::Ins => 'I',
                CigarOp::Del => 'D',
            };
            write!(f, "{len}{c}")?;
        }
        Ok(())
    }
}

/// Relation between the two symbols of one alignment column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Markup {
    Identity,
    Similarity,
    Mismatch,
    Gap,
}

impl Markup {
    pub fn symbol(self) -> u8 {
        match self {
            Markup::Identity => b'|',
            Markup::Similarity => b':',
            Markup::Mismatch => b'.',
            Markup::Gap => b' ',
        }
    }

    /// Symbols are compared by alphabet index, so case and wildcard
    /// folding apply. A pair that scores zero or less is a mismatch even
    /// when both sides fold to the same symbol.
    pub(crate) fn classify(a: u8, b: u8, matrix: &ScoringMatrix) -> Self {
        let score = matrix.score(a, b);
        if score <= 0 {
            Markup::Mismatch
        } else if matrix.index_of(a) == matrix.index_of(b) {
            Markup::Identity
        } else {
            Markup::Similarity
        }
    }
}

/// One local alignment, left to right.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Alignment {
    pub aligned_subject: Vec<u8>,
    pub markup: Vec<u8>,
    pub aligned_query: Vec<u8>,
    /// Half-open range of the subject covered by the alignment.
    pub subject_range: (usize, usize),
    /// Half-open range of the query covered by the alignment.
    pub query_range: (usize, usize),
    pub identity: usize,
    pub similarity: usize,
    pub gaps: usize,
    pub cigar: Cigar,
}

impl Alignment {
    pub fn len(&self) -> usize {
        self.markup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markup.is_empty()
    }

    /// Recomputes the score from the aligned columns.
    pub fn rescore(&self, matrix: &ScoringMatrix, gaps: &GapPenalties) -> i32 {
        let mut score = 0;
        let mut subject_gap = 0usize;
        let mut query_gap = 0usize;
        for (&s, &q) in self.aligned_subject.iter().zip(&self.aligned_query) {
            if s == GAP {
                score -= gaps.cost(query_gap);
                query_gap = 0;
                subject_gap += 1;
            } else if q == GAP {
                score -= gaps.cost(subject_gap);
                subject_gap = 0;
                query_gap += 1;
            } else {
                score -= gaps.cost(subject_gap) + gaps.cost(query_gap);
                subject_gap = 0;
                query_gap = 0;
                score += matrix.score(s, q);
            }
        }
        score - gaps.cost(subject_gap) - gaps.cost(query_gap)
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row = |bytes: &[u8]| bytes.iter().map(|&b| b as char).collect::<String>();
        writeln!(f, "{}", row(&self.aligned_subject))?;
        writeln!(f, "{}", row(&self.markup))?;
        write!(f, "{}", row(&self.aligned_query))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AlignmentResult {
    pub subject: Vec<u8>,
    pub query: Vec<u8>,
    pub score: i32,
    /// Grid cell `(row, col)` the traceback started from.
    pub end: Option<(usize, usize)>,
    pub alignments: Vec<Alignment>,
    /// Counts of the first alignment.
    pub identity: usize,
    pub similarity: usize,
    pub gaps: usize,
}

impl AlignmentResult {
    pub(crate) fn empty(subject: &[u8], query: &[u8]) -> Self {
        Self {
            subject: subject.to_vec(),
            query: query.to_vec(),
            score: 0,
            end: None,
            alignments: Vec::new(),
            identity: 0,
            similarity: 0,
            gaps: 0,
        }
    }

    pub fn best(&self) -> Option<&Alignment> {
        self.alignments.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gap_cost_is_affine() {
        let g = GapPenalties::new(10, 1).unwrap();
        assert_eq!(g.cost(0), 0);
        assert_eq!(g.cost(1), 10);
        assert_eq!(g.cost(4), 13);
    }

    #[test]
    fn negative_gap_penalties_rejected() {
        assert!(matches!(
            GapPenalties::new(-1, 1),
            Err(AlignError::InvalidGapPenalty { .. })
        ));
        assert!(AlignParams::new(1, -1).is_err());
        assert!(GapPenalties::new(1, 2).is_err());
        assert!(GapPenalties::new(0, 0).is_ok());
    }

    #[test]
    fn zero_valued_parameters_rejected() {
        let p = AlignParams::new(10, 1).unwrap();
        assert!(p.clone().with_chunk_size(0).is_err());
        assert!(p.clone().with_workers(0).is_err());
        assert!(p.with_alignment_limit(0).is_err());
    }

    #[test]
    fn cigar_merges_runs() {
        let mut c = Cigar::default();
        c.push(CigarOp::Match, 2);
        c.push(CigarOp::Match, 1);
        c.push(CigarOp::Del, 1);
        c.push(CigarOp::Ins, 0);
        assert_eq!(c.ops, vec![(CigarOp::Match, 3), (CigarOp::Del, 1)]);
        assert_eq!(c.len(), 4);
        assert_eq!(c.to_string(), "3M1D");
    }

    #[test]
    fn rescore_counts_gap_runs_once() {
        let m = ScoringMatrix::nucleotide(2, -1);
        let gaps = GapPenalties::new(3, 1).unwrap();
        let aln = Alignment {
            aligned_subject: b"AC--GT".to_vec(),
            markup: b"||  ||".to_vec(),
            aligned_query: b"ACTTGT".to_vec(),
            subject_range: (0, 4),
            query_range: (0, 6),
            identity: 4,
            similarity: 4,
            gaps: 2,
            cigar: Cigar::default(),
        };
        assert_eq!(aln.rescore(&m, &gaps), 8 - 4);
    }

    #[test]
    fn markup_classification() {
        let m = ScoringMatrix::blosum62();
        assert_eq!(Markup::classify(b'A', b'A', &m), Markup::Identity);
        assert_eq!(Markup::classify(b'H', b'Y', &m), Markup::Similarity);
        assert_eq!(Markup::classify(b'W', b'A', &m), Markup::Mismatch);
        assert_eq!(Markup::Gap.symbol(), b' ');
    }

    #[test]
    fn markup_follows_folded_symbols() {
        let m = ScoringMatrix::nucleotide(4, -4);
        assert_eq!(Markup::classify(b'a', b'A', &m), Markup::Identity);
        assert_eq!(Markup::classify(b'g', b'c', &m), Markup::Mismatch);
        // unknown bytes fold onto N, which never scores positively
        assert_eq!(Markup::classify(b'U', b'U', &m), Markup::Mismatch);
        assert_eq!(Markup::classify(b'U', b'R', &m), Markup::Mismatch);

        let blosum = ScoringMatrix::blosum62();
        assert_eq!(Markup::classify(b'w', b'W', &blosum), Markup::Identity);
        assert_eq!(Markup::classify(b'h', b'y', &blosum), Markup::Similarity);
        // '#' and '@' both fold onto '*', which scores 1 against itself
        assert_eq!(Markup::classify(b'#', b'@', &blosum), Markup::Identity);
    }
}
