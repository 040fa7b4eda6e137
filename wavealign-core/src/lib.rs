pub mod align;
pub mod error;
pub mod matrices;

pub use align::{align, align_with, AlignParams, Alignment, AlignmentResult, GapPenalties, Session};
pub use error::{AlignError, AlignResult};
pub use matrices::ScoringMatrix;
