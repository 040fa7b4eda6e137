//! Blocked wavefront fill of the score grid.
//!
//! The grid is cut into square chunks; chunk `(tr, tc)` depends on
//! `(tr - 1, tc)`, `(tr, tc - 1)` and `(tr - 1, tc - 1)`. Each chunk-task
//! owns its tile mutably while it runs and publishes it read-only when it
//! returns, so a tile can only be read by chunks scheduled after it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use log::debug;

use super::grid::{
    Cell, Grid, TileLayout, DIAGONAL, LEFT, LEFT_EXTEND, LEFT_OPEN, UP, UP_EXTEND, UP_OPEN,
};
use super::task_graph::{Flow, Span, TaskGraph};
use super::types::GapPenalties;
use super::winner::{self, LocalWinner, Winner};
use crate::error::{AlignError, AlignResult};
use crate::matrices::ScoringMatrix;

/// Cooperative cancellation flag, checked at every chunk-task entry.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn reset(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Outcome of one fill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FillReport {
    pub layout: TileLayout,
    /// Span of each chunk-task, indexed by tile id.
    pub spans: Vec<Option<Span>>,
    pub winner: Option<Winner>,
}

impl FillReport {
    pub fn chunk_size(&self) -> usize {
        self.layout.chunk()
    }

    pub fn span(&self, tile_row: usize, tile_col: usize) -> Option<Span> {
        self.spans[self.layout.tile_id(tile_row, tile_col)]
    }
}

/// `max(1, min(subject_len, query_len) / workers)`.
pub fn auto_chunk_size(subject_len: usize, query_len: usize, workers: usize) -> usize {
    (subject_len.min(query_len) / workers.max(1)).max(1)
}

/// Dependency graph over the tiles of `layout`, node id = tile id.
pub fn chunk_graph(layout: &TileLayout) -> TaskGraph {
    let mut graph = TaskGraph::new(layout.tile_count());
    for tr in 0..layout.tile_rows() {
        for tc in 0..layout.tile_cols() {
            let id = layout.tile_id(tr, tc);
            if tr > 0 {
                graph.add_dependency(id, layout.tile_id(tr - 1, tc));
            }
            if tc > 0 {
                graph.add_dependency(id, layout.tile_id(tr, tc - 1));
            }
            if tr > 0 && tc > 0 {
                graph.add_dependency(id, layout.tile_id(tr - 1, tc - 1));
            }
        }
    }
    graph
}

/// A finished chunk: its cells and the best cell it saw.
struct Tile<'a> {
    cells: &'a [Cell],
    winner: LocalWinner,
}

struct Chunker<'a> {
    layout: TileLayout,
    subject: &'a [u8],
    query: &'a [u8],
    matrix: &'a ScoringMatrix,
    gaps: GapPenalties,
}

/// Fills every interior cell of `grid` for the encoded `subject` and
/// `query` and returns the reduced winner. Blocks until the bottom-right
/// chunk has finished.
pub(crate) fn fill(
    grid: &mut Grid,
    subject: &[u8],
    query: &[u8],
    matrix: &ScoringMatrix,
    gaps: GapPenalties,
    chunk: usize,
    cancel: &CancelToken,
) -> AlignResult<FillReport> {
    debug_assert_eq!(subject.len(), grid.subject_len());
    debug_assert_eq!(query.len(), grid.query_len());

    let (layout, cells) = grid.relayout(chunk);
    debug!(
        "wavefront fill: {}x{} cells, chunk {}, {}x{} tiles",
        layout.rows(),
        layout.cols(),
        layout.chunk(),
        layout.tile_rows(),
        layout.tile_cols()
    );

    let graph = chunk_graph(&layout);
    let writable = split_tiles(&layout, cells);
    let published: Vec<OnceLock<Tile<'_>>> = (0..layout.tile_count()).map(|_| OnceLock::new()).collect();
    let failure: OnceLock<AlignError> = OnceLock::new();
    let chunker = Chunker {
        layout,
        subject,
        query,
        matrix,
        gaps,
    };

    let spans = graph.execute(|id| {
        if cancel.is_cancelled() {
            let _ = failure.set(AlignError::Cancelled);
            return Flow::Halt;
        }
        let slot = writable[id]
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(cells) = slot else {
            let (tile_row, tile_col) = layout.tile_coords(id);
            let _ = failure.set(AlignError::DependencyNotReady { tile_row, tile_col });
            return Flow::Halt;
        };
        match chunker.fill_tile(id, cells, &published) {
            Ok(tile) => {
                let _ = published[id].set(tile);
                Flow::Continue
            }
            Err(err) => {
                let _ = failure.set(err);
                Flow::Halt
            }
        }
    });

    if let Some(err) = failure.into_inner() {
        debug!("wavefront fill stopped: {err}");
        return Err(err);
    }
    let last = layout.tile_count() - 1;
    if published[last].get().is_none() {
        let (tile_row, tile_col) = layout.tile_coords(last);
        return Err(AlignError::DependencyNotReady { tile_row, tile_col });
    }

    let winner = winner::reduce(published.iter().filter_map(|t| t.get()).map(|t| t.winner));
    Ok(FillReport {
        layout,
        spans,
        winner,
    })
}

fn split_tiles<'a>(layout: &TileLayout, mut cells: &'a mut [Cell]) -> Vec<Mutex<Option<&'a mut [Cell]>>> {
    let mut tiles = Vec::with_capacity(layout.tile_count());
    for id in 0..layout.tile_count() {
        let (tr, tc) = layout.tile_coords(id);
        let (head, rest) = std::mem::take(&mut cells).split_at_mut(layout.tile_len(tr, tc));
        tiles.push(Mutex::new(Some(head)));
        cells = rest;
    }
    tiles
}

impl<'a> Chunker<'a> {
    fn published<'t>(
        &self,
        tile_row: usize,
        tile_col: usize,
        published: &[OnceLock<Tile<'t>>],
    ) -> AlignResult<&'t [Cell]> {
        published[self.layout.tile_id(tile_row, tile_col)]
            .get()
            .map(|t| t.cells)
            .ok_or(AlignError::DependencyNotReady { tile_row, tile_col })
    }

    fn fill_tile<'t>(
        &self,
        id: usize,
        cells: &'t mut [Cell],
        published: &[OnceLock<Tile<'t>>],
    ) -> AlignResult<Tile<'t>> {
        let layout = &self.layout;
        let (tr, tc) = layout.tile_coords(id);
        let rows = layout.row_span(tr);
        let cols = layout.col_span(tc);
        let width = cols.len();

        // above[0] is the corner cell, above[1..] the row over the tile
        let mut above = vec![Cell::default(); width + 1];
        let mut left = vec![Cell::default(); rows.len()];
        if tr > 0 {
            let up = self.published(tr - 1, tc, published)?;
            let last_row = layout.row_span(tr - 1).len() - 1;
            above[1..].copy_from_slice(&up[last_row * width..(last_row + 1) * width]);
            if tc > 0 {
                let corner = self.published(tr - 1, tc - 1, published)?;
                if let Some(&cell) = corner.last() {
                    above[0] = cell;
                }
            }
        }
        if tc > 0 {
            let side = self.published(tr, tc - 1, published)?;
            let side_width = layout.col_span(tc - 1).len();
            for (i, cell) in left.iter_mut().enumerate() {
                *cell = side[i * side_width + side_width - 1];
            }
        }

        let mut winner = LocalWinner::default();
        for (i, row) in rows.enumerate() {
            if row == 0 {
                continue;
            }
            let s = self.subject[row - 1];
            for (j, col) in cols.clone().enumerate() {
                if col == 0 {
                    continue;
                }
                let diag = match (i, j) {
                    (0, _) => above[j],
                    (_, 0) => left[i - 1],
                    _ => cells[(i - 1) * width + j - 1],
                };
                let up = if i == 0 {
                    above[j + 1]
                } else {
                    cells[(i - 1) * width + j]
                };
                let side = if j == 0 { left[i] } else { cells[i * width + j - 1] };
                let substitution = self.matrix.score_index(s, self.query[col - 1]);
                let cell = recurrence(diag, up, side, substitution, self.gaps);
                cells[i * width + j] = cell;
                winner.offer(row, col, cell.match_score);
            }
        }
        Ok(Tile { cells, winner })
    }
}

/// Affine-gap Smith-Waterman recurrence for one cell.
#[inline]
pub(crate) fn recurrence(diag: Cell, up: Cell, left: Cell, substitution: i32, gaps: GapPenalties) -> Cell {
    let diagonal = diag.match_score + substitution;

    let up_open = up.match_score - gaps.open;
    let up_extend = up.deletion_score - gaps.extend;
    let deletion = up_open.max(up_extend);

    let left_open = left.match_score - gaps.open;
    let left_extend = left.insertion_score - gaps.extend;
    let insertion = left_open.max(left_extend);

    let h = diagonal.max(deletion).max(insertion).max(0);

    let mut direction = 0u8;
    if deletion == up_open {
        direction |= UP_OPEN;
    }
    if deletion == up_extend {
        direction |= UP_EXTEND;
    }
    if insertion == left_open {
        direction |= LEFT_OPEN;
    }
    if insertion == left_extend {
        direction |= LEFT_EXTEND;
    }
    // a zero cell starts a fresh alignment
    if h > 0 {
        if h == diagonal {
            direction |= DIAGONAL;
        }
        if h == deletion {
            direction |= UP;
        }
        if h == insertion {
            direction |= LEFT;
        }
    }

    Cell {
        match_score: h,
        deletion_score: deletion,
        insertion_score: insertion,
        direction,
    }
}
