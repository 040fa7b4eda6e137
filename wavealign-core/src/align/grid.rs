//! Score grid storage.
//!
//! The grid has `(subject_len + 1) x (query_len + 1)` cells: row 0 and
//! column 0 are the zero boundary, and cell `(i, j)` scores `subject[i - 1]`
//! against `query[j - 1]`. Cells are stored tile by tile so each chunk of the
//! wavefront owns one contiguous, disjoint slice of the buffer.

use std::ops::Range;

use log::debug;

// Provenance of H.
pub const DIAGONAL: u8 = 0x01;
pub const UP: u8 = 0x02;
pub const LEFT: u8 = 0x04;
// Provenance of E (gap in query) and F (gap in subject).
pub const UP_OPEN: u8 = 0x08;
pub const UP_EXTEND: u8 = 0x10;
pub const LEFT_OPEN: u8 = 0x20;
pub const LEFT_EXTEND: u8 = 0x40;

pub const MATCH_MASK: u8 = DIAGONAL | UP | LEFT;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    /// H: best score of an alignment ending here.
    pub match_score: i32,
    /// E: best score ending here with a gap in the query.
    pub deletion_score: i32,
    /// F: best score ending here with a gap in the subject.
    pub insertion_score: i32,
    pub direction: u8,
}

impl Cell {
    /// No predecessor achieved H; traceback stops here.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        self.direction & MATCH_MASK == 0
    }

    /// More than one predecessor achieved H.
    #[inline]
    pub fn is_branching(&self) -> bool {
        (self.direction & MATCH_MASK).count_ones() > 1
    }
}

/// Partition of a `rows x cols` grid into square tiles of side `chunk`.
/// The last tile row and column may be shorter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileLayout {
    rows: usize,
    cols: usize,
    chunk: usize,
}

impl TileLayout {
    pub fn new(rows: usize, cols: usize, chunk: usize) -> Self {
        Self {
            rows,
            cols,
            chunk: chunk.max(1),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn chunk(&self) -> usize {
        self.chunk
    }

    pub fn tile_rows(&self) -> usize {
        self.rows.div_ceil(self.chunk)
    }

    pub fn tile_cols(&self) -> usize {
        self.cols.div_ceil(self.chunk)
    }

    pub fn tile_count(&self) -> usize {
        self.tile_rows() * self.tile_cols()
    }

    #[inline]
    pub fn tile_id(&self, tile_row: usize, tile_col: usize) -> usize {
        tile_row * self.tile_cols() + tile_col
    }

    #[inline]
    pub fn tile_coords(&self, id: usize) -> (usize, usize) {
        (id / self.tile_cols(), id % self.tile_cols())
    }

    pub fn row_span(&self, tile_row: usize) -> Range<usize> {
        let start = tile_row * self.chunk;
        start..(start + self.chunk).min(self.rows)
    }

    pub fn col_span(&self, tile_col: usize) -> Range<usize> {
        let start = tile_col * self.chunk;
        start..(start + self.chunk).min(self.cols)
    }

    pub fn tile_len(&self, tile_row: usize, tile_col: usize) -> usize {
        self.row_span(tile_row).len() * self.col_span(tile_col).len()
    }

    fn tile_offset(&self, tile_row: usize, tile_col: usize) -> usize {
        // every tile row above is full height; every tile to the left is full width
        tile_row * self.chunk * self.cols + tile_col * self.chunk * self.row_span(tile_row).len()
    }

    #[inline]
    pub fn cell_index(&self, row: usize, col: usize) -> usize {
        let tile_row = row / self.chunk;
        let tile_col = col / self.chunk;
        let width = self.col_span(tile_col).len();
        self.tile_offset(tile_row, tile_col)
            + (row - tile_row * self.chunk) * width
            + (col - tile_col * self.chunk)
    }
}

/// Dynamic-programming matrix, reusable across queries against one subject.
#[derive(Clone, Debug)]
pub struct Grid {
    cells: Vec<Cell>,
    layout: TileLayout,
    subject_len: usize,
    query_len: usize,
    /// Set once a fill has written into the buffer.
    dirty: bool,
}

impl Grid {
    pub fn new(subject_len: usize, query_len: usize) -> Self {
        let mut grid = Self {
            cells: Vec::new(),
            layout: single_tile(subject_len + 1, query_len + 1),
            subject_len,
            query_len,
            dirty: false,
        };
        grid.reset();
        grid
    }

    /// Switches to a query of `query_len` symbols, clearing the used cells.
    /// The buffer grows when needed and is never shrunk.
    pub fn resize_for_query(&mut self, query_len: usize) {
        self.query_len = query_len;
        self.layout = single_tile(self.rows(), self.cols());
        self.reset();
    }

    /// Re-partitions the grid for a fill and returns the cleared buffer.
    /// A buffer still clean from `resize_for_query` is not cleared again.
    pub(crate) fn relayout(&mut self, chunk: usize) -> (TileLayout, &mut [Cell]) {
        if self.dirty {
            self.reset();
        }
        self.layout = TileLayout::new(self.rows(), self.cols(), chunk);
        self.dirty = true;
        (self.layout, self.cells.as_mut_slice())
    }

    #[cfg(test)]
    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn reset(&mut self) {
        let len = self.rows() * self.cols();
        if len > self.cells.capacity() {
            debug!(
                "growing score grid from {} to {} cells",
                self.cells.capacity(),
                len
            );
        }
        // cleared before resizing so growth never copies stale cells
        self.cells.clear();
        self.cells.resize(len, Cell::default());
        self.dirty = false;
    }

    pub fn subject_len(&self) -> usize {
        self.subject_len
    }

    pub fn query_len(&self) -> usize {
        self.query_len
    }

    pub fn rows(&self) -> usize {
        self.subject_len + 1
    }

    pub fn cols(&self) -> usize {
        self.query_len + 1
    }

    pub fn capacity(&self) -> usize {
        self.cells.capacity()
    }

    pub fn layout(&self) -> TileLayout {
        self.layout
    }

    #[inline]
    pub fn cell(&self, row: usize, col: usize) -> &Cell {
        &self.cells[self.layout.cell_index(row, col)]
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&Cell> {
        if row < self.rows() && col < self.cols() {
            Some(self.cell(row, col))
        } else {
            None
        }
    }

    /// Cells in row-major order with their coordinates.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, &Cell)> + '_ {
        (0..self.rows()).flat_map(move |r| (0..self.cols()).map(move |c| (r, c, self.cell(r, c))))
    }
}

fn single_tile(rows: usize, cols: usize) -> TileLayout {
    TileLayout::new(rows, cols, rows.max(cols))
}
