//! Core data types for structure search and clustering.
//!
//! - [`Entry`]: one materialized catalog record (sequence, structural alphabet, C-alpha
//!   coordinates)
//! - [`Query`]: a structure to search with
//! - [`Hit`]: one accepted search result
//! - [`Cluster`]: one group of a catalog partition
//! - [`Confidence`]: score bands used for reporting
//!
//! ## Scores
//!
//! Scores are TM-score style similarities in `[0, 1]`:
//!
//! | Score | Interpretation |
//! |-------|----------------|
//! | < 0.17 | Indistinguishable from random structures |
//! | >= 0.5 | Generally the same fold |
//! | 1.0   | Identical after superposition |

pub mod entry;
pub mod types;

pub use entry::{Coordinate, Entry, Query};
pub use types::{Cluster, Confidence, Hit};
