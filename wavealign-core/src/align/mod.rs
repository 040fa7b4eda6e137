pub mod grid;
pub mod task_graph;
pub mod traceback;
pub mod types;
pub mod wavefront;
pub mod winner;

use log::debug;

pub use grid::{Cell, Grid, TileLayout};
pub use traceback::Traceback;
pub use types::{
    AlignParams, Alignment, AlignmentResult, Cigar, CigarOp, GapPenalties, Markup,
};
pub use wavefront::{CancelToken, FillReport};
pub use winner::Winner;

use crate::error::AlignResult;
use crate::matrices::ScoringMatrix;


/// Best local alignment of `query` against `subject`. With
/// `recursive_traceback`, every co-optimal alignment is returned.
pub fn align(
    subject: &[u8],
    query: &[u8],
    matrix: &ScoringMatrix,
    gap_open: i32,
    gap_extend: i32,
    recursive_traceback: bool,
) -> AlignResult<AlignmentResult> {
    let params = AlignParams::new(gap_open, gap_extend)?.with_recursive_traceback(recursive_traceback);
    align_with(subject, query, matrix, &params)
}

pub fn align_with(
    subject: &[u8],
    query: &[u8],
    matrix: &ScoringMatrix,
    params: &AlignParams,
) -> AlignResult<AlignmentResult> {
    let mut session = Session::new(subject, matrix, params.clone())?;
    session.set_query(query);
    session.align()
}

/// Aligns a series of queries against one subject, reusing the score grid.
/// The grid only grows, so ordering queries longest first allocates once.
pub struct Session<'m> {
    subject: Vec<u8>,
    subject_codes: Vec<u8>,
    query: Vec<u8>,
    query_codes: Vec<u8>,
    matrix: &'m ScoringMatrix,
    params: AlignParams,
    grid: Grid,
    cancel: CancelToken,
    last_fill: Option<FillReport>,
    #[cfg(feature = "parallel")]
    pool: Option<rayon::ThreadPool>,
}

impl<'m> Session<'m> {
    pub fn new(subject: &[u8], matrix: &'m ScoringMatrix, params: AlignParams) -> AlignResult<Self> {
        #[cfg(feature = "parallel")]
        let pool = match params.workers {
            Some(n) => Some(rayon::ThreadPoolBuilder::new().num_threads(n).build()?),
            None => None,
        };
        Ok(Self {
            subject: subject.to_vec(),
            subject_codes: matrix.encode(subject),
            query: Vec::new(),
            query_codes: Vec::new(),
            matrix,
            params,
            grid: Grid::new(subject.len(), 0),
            cancel: CancelToken::default(),
            last_fill: None,
            #[cfg(feature = "parallel")]
            pool,
        })
    }

    pub fn set_query(&mut self, query: &[u8]) {
        self.query.clear();
        self.query.extend_from_slice(query);
        self.query_codes.clear();
        self.query_codes
            .extend(query.iter().map(|&b| self.matrix.index_of(b)));
        self.grid.resize_for_query(query.len());
        self.last_fill = None;
    }

    pub fn subject(&self) -> &[u8] {
        &self.subject
    }

    pub fn query(&self) -> &[u8] {
        &self.query
    }

    pub fn params(&self) -> &AlignParams {
        &self.params
    }

    /// The grid as left by the last fill.
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn last_fill(&self) -> Option<&FillReport> {
        self.last_fill.as_ref()
    }

    /// Token that cancels fills run by this session.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn align(&mut self) -> AlignResult<AlignmentResult> {
        if self.subject.is_empty() || self.query.is_empty() {
            debug!(
                "degenerate input (subject {} / query {} symbols), skipping fill",
                self.subject.len(),
                self.query.len()
            );
            self.last_fill = None;
            return Ok(AlignmentResult::empty(&self.subject, &self.query));
        }

        let chunk = self.params.chunk_size.unwrap_or_else(|| {
            wavefront::auto_chunk_size(self.subject.len(), self.query.len(), self.workers())
        });
        let report = self.fill(chunk)?;

        let mut result = AlignmentResult::empty(&self.subject, &self.query);
        if let Some(w) = report.winner {
            let alignments = Traceback::new(&self.grid, &self.subject, &self.query, self.matrix).run(
                w.row,
                w.col,
                self.params.recursive_traceback,
                self.params.alignment_limit,
            );
            if let Some(best) = alignments.first() {
                result.identity = best.identity;
                result.similarity = best.similarity;
                result.gaps = best.gaps;
            }
            result.score = w.score;
            result.end = Some((w.row, w.col));
            result.alignments = alignments;
        }
        self.last_fill = Some(report);
        Ok(result)
    }

    fn fill(&mut self, chunk: usize) -> AlignResult<FillReport> {
        let mut run = || {
            wavefront::fill(
                &mut self.grid,
                &self.subject_codes,
                &self.query_codes,
                self.matrix,
                self.params.gaps,
                chunk,
                &self.cancel,
            )
        };
        #[cfg(feature = "parallel")]
        if let Some(pool) = &self.pool {
            return pool.install(run);
        }
        run()
    }

    fn workers(&self) -> usize {
        #[cfg(feature = "parallel")]
        {
            match &self.pool {
                Some(pool) => pool.current_num_threads(),
                None => rayon::current_num_threads(),
            }
        }
        #[cfg(not(feature = "parallel"))]
        {
            1
        }
    }
}
