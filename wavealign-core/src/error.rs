use thiserror::Error;

#[derive(Debug, Error)]
pub enum AlignError {
    #[error("invalid scoring matrix: {msg}")]
    InvalidMatrix { msg: String },

    #[error("invalid gap penalties: open={gap_open}, extend={gap_extend} (need 0 <= extend <= open)")]
    InvalidGapPenalty { gap_open: i32, gap_extend: i32 },

    #[error("invalid alignment parameter: {msg}")]
    InvalidParameter { msg: &'static str },

    #[cfg(feature = "parallel")]
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("alignment cancelled")]
    Cancelled,

    /// A chunk-task started before one of the tiles it reads was published.
    #[error("tile ({tile_row}, {tile_col}) read before its producing chunk finished")]
    DependencyNotReady { tile_row: usize, tile_col: usize },
}

pub type AlignResult<T> = Result<T, AlignError>;
