//! Test doubles for the aligner capability.

use std::collections::HashMap;

use super::aligner::{AlignError, Aligner, Alignment};
use crate::core::entry::Coordinate;

/// Aligner returning fixed results looked up by (query, target) sequence.
///
/// Identical sequences score 1.0 over their full length; unknown pairs score 0.0 with
/// nothing aligned.
#[derive(Debug, Default)]
pub struct TableAligner {
    pub table: HashMap<(String, String), (f64, usize)>,
    pub failing: Vec<String>,
    pub max_capacity: Option<usize>,
    pub capacity: usize,
    pub query: Option<String>,
    pub queries_set: usize,
    pub refined: usize,
}

impl TableAligner {
    /// Result for aligning `target` against `query`
    pub fn with(mut self, query: &str, target: &str, score: f64, aligned: usize) -> Self {
        self.table
            .insert((query.to_string(), target.to_string()), (score, aligned));
        self
    }

    /// Same result in both directions
    pub fn with_pair(self, a: &str, b: &str, score: f64, aligned: usize) -> Self {
        self.with(a, b, score, aligned).with(b, a, score, aligned)
    }
}

impl Aligner for TableAligner {
    fn reserve(&mut self, max_len: usize) -> Result<(), AlignError> {
        if let Some(capacity) = self.max_capacity {
            if max_len > capacity {
                return Err(AlignError::CapacityExceeded {
                    required: max_len,
                    capacity,
                });
            }
        }
        self.capacity = self.capacity.max(max_len);
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn set_query(&mut self, _: &[Coordinate], sequence: &[u8]) -> Result<(), AlignError> {
        self.query = Some(String::from_utf8_lossy(sequence).into_owned());
        self.queries_set += 1;
        Ok(())
    }

    fn score_against(
        &mut self,
        _: &[Coordinate],
        sequence: &[u8],
    ) -> Result<Alignment, AlignError> {
        let query = self.query.clone().ok_or(AlignError::QueryNotSet)?;
        let target = String::from_utf8_lossy(sequence).into_owned();
        if self.failing.contains(&target) {
            return Err(AlignError::Numerical("degenerate superposition".to_string()));
        }

        let (score, aligned) = if query == target {
            (1.0, target.len())
        } else {
            self.table.get(&(query, target)).copied().unwrap_or((0.0, 0))
        };
        Ok(Alignment {
            score,
            query_start: 0,
            query_end: aligned.saturating_sub(1),
            target_start: 0,
            target_end: aligned.saturating_sub(1),
            aligned_length: aligned,
            trace: format!("{aligned}M"),
            distance: Some(9.0),
        })
    }

    fn refine(&mut self, _: &[Coordinate], _: &Alignment) -> Result<f64, AlignError> {
        self.refined += 1;
        Ok(0.25)
    }
}
