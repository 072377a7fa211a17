use std::cmp::Ordering;

use crate::core::types::Hit;

/// Safely convert usize to f64 for fraction calculations
///
/// Residue counts are far below 2^52, so the conversion is exact in practice.
#[inline]
pub(crate) fn count_to_f64(count: usize) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    {
        count as f64
    }
}

/// Fraction of a structure spanned by an alignment, clamped to [0, 1].
///
/// Returns 0.0 for an empty structure.
#[must_use]
pub fn coverage(aligned_length: usize, length: usize) -> f64 {
    if length == 0 {
        0.0
    } else {
        (count_to_f64(aligned_length) / count_to_f64(length)).min(1.0)
    }
}

/// TM-score distance scale for a structure of `length` residues:
/// `1.24 * (L - 15)^(1/3) - 1.8`, never below 0.5
#[must_use]
pub fn tm_d0(length: usize) -> f64 {
    let l = count_to_f64(length);
    if l <= 21.0 {
        return 0.5;
    }
    (1.24 * (l - 15.0).cbrt() - 1.8).max(0.5)
}

/// Distance above which aligned pairs no longer count toward the footprint:
/// `1.5 * L^0.3 + 3.5`
#[must_use]
pub fn tm_d8(length: usize) -> f64 {
    1.5 * count_to_f64(length).powf(0.3) + 3.5
}

/// Contribution of one aligned pair at `distance` to an unnormalized TM-score
#[inline]
#[must_use]
pub fn tm_term(distance: f64, d0: f64) -> f64 {
    let ratio = distance / d0;
    1.0 / (1.0 + ratio * ratio)
}

/// Score and coverage thresholds an alignment has to meet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub score: f64,
    pub coverage: f64,
}

impl Thresholds {
    /// True when the score and both coverages reach their thresholds
    #[must_use]
    pub fn accept(&self, score: f64, query_coverage: f64, target_coverage: f64) -> bool {
        score >= self.score && query_coverage >= self.coverage && target_coverage >= self.coverage
    }
}

/// Result ordering: score descending, then target key ascending
#[must_use]
pub fn rank_hits(a: &Hit, b: &Hit) -> Ordering {
    // NaN scores rank last
    let rank = |score: f64| if score.is_nan() { f64::NEG_INFINITY } else { score };
    rank(b.score)
        .total_cmp(&rank(a.score))
        .then_with(|| a.target_key.cmp(&b.target_key))
}
