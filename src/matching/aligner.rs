use serde::Serialize;
use thiserror::Error;

use crate::core::entry::Coordinate;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AlignError {
    /// Recoverable failure for a single candidate
    #[error("Numerical failure: {0}")]
    Numerical(String),

    #[error("Structure of {required} residues exceeds aligner capacity of {capacity}")]
    CapacityExceeded { required: usize, capacity: usize },

    #[error("No query set on the aligner")]
    QueryNotSet,

    #[error("Invalid aligner input: {0}")]
    InvalidInput(String),
}

/// Result of scoring one target against the current query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alignment {
    /// Normalized similarity in [0, 1]
    pub score: f64,

    /// Footprint, 0-based inclusive
    pub query_start: usize,
    pub query_end: usize,
    pub target_start: usize,
    pub target_end: usize,

    /// Number of aligned residue pairs
    pub aligned_length: usize,

    /// Run-length encoded alignment over `M`, `I` (query only), and `D` (target only)
    pub trace: String,

    /// Distance reported by the aligner itself, if any
    pub distance: Option<f64>,
}

/// Structural comparator with an allocate-once, query-once, score-many lifecycle.
///
/// A search calls [`reserve`](Aligner::reserve) once with the longest structure it
/// will see, [`set_query`](Aligner::set_query) once, then
/// [`score_against`](Aligner::score_against) for every candidate. Implementations keep
/// their scratch buffers between calls and must not grow them during a scan.
pub trait Aligner {
    /// Size internal buffers for structures of up to `max_len` residues.
    ///
    /// # Errors
    ///
    /// Returns `AlignError::CapacityExceeded` if `max_len` is above the aligner's limit.
    fn reserve(&mut self, max_len: usize) -> Result<(), AlignError>;

    /// Residue count the buffers are currently sized for
    fn capacity(&self) -> usize;

    /// Load the query structure.
    ///
    /// # Errors
    ///
    /// Returns `AlignError::InvalidInput` if the lengths disagree or are zero, or
    /// `AlignError::CapacityExceeded` if the query does not fit the reserved buffers.
    fn set_query(&mut self, coordinates: &[Coordinate], sequence: &[u8])
        -> Result<(), AlignError>;

    /// Align one target against the current query.
    ///
    /// # Errors
    ///
    /// Returns `AlignError::Numerical` if the alignment cannot be computed for this
    /// target; callers skip the target and continue.
    fn score_against(
        &mut self,
        coordinates: &[Coordinate],
        sequence: &[u8],
    ) -> Result<Alignment, AlignError>;

    /// Refined distance over the aligned span of an accepted alignment.
    ///
    /// # Errors
    ///
    /// Returns `AlignError::Numerical` if the distance cannot be computed.
    fn refine(
        &mut self,
        coordinates: &[Coordinate],
        alignment: &Alignment,
    ) -> Result<f64, AlignError>;
}
