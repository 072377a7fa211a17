//! Gapless TM-score aligner.
//!
//! Threads the target along every diagonal of the query, superposes the overlapping
//! C-alpha pairs with the Kabsch algorithm, re-fits on the pairs closer than `d0`, and
//! keeps the diagonal with the best TM-score (normalized by the query length).

use nalgebra::{Matrix3, Vector3};

use super::aligner::{AlignError, Aligner, Alignment};
use super::scoring::{count_to_f64, tm_d0, tm_d8, tm_term};
use crate::core::entry::Coordinate;

/// Hard limit on structure length, in residues
pub const DEFAULT_MAX_CAPACITY: usize = 50_000;

/// Fewest overlapping residues a diagonal needs to be superposed
pub const DEFAULT_MIN_ALIGNED: usize = 3;

/// Re-fits on the close pairs after the initial superposition
const REFIT_ITERATIONS: usize = 3;

type Vec3 = Vector3<f64>;

/// Rigid transform taking target coordinates onto the query
#[derive(Debug, Clone, Copy)]
struct Superposition {
    rotation: Matrix3<f64>,
    translation: Vec3,
}

impl Superposition {
    fn apply(&self, point: &Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }
}

#[derive(Debug, Clone, Copy)]
struct Diagonal {
    offset: isize,
    query_start: usize,
    target_start: usize,
    len: usize,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    diagonal: Diagonal,
    superposition: Superposition,
    score: f64,
}

/// Reference [`Aligner`] scoring gapless superpositions with the TM-score.
///
/// All buffers are owned and sized once by [`Aligner::reserve`].
#[derive(Debug, Clone)]
pub struct TmAligner {
    max_capacity: usize,
    min_aligned: usize,
    capacity: usize,
    query: Vec<Vec3>,
    query_set: bool,

    // Per-candidate scratch, cleared on every call
    target: Vec<Vec3>,
    fixed: Vec<Vec3>,
    mobile: Vec<Vec3>,
    distances: Vec<f64>,
    close_fixed: Vec<Vec3>,
    close_mobile: Vec<Vec3>,
}

impl Default for TmAligner {
    fn default() -> Self {
        Self::new()
    }
}

impl TmAligner {
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_capacity(DEFAULT_MAX_CAPACITY)
    }

    /// Create an aligner that refuses structures longer than `max_capacity` residues
    #[must_use]
    pub fn with_max_capacity(max_capacity: usize) -> Self {
        Self {
            max_capacity,
            min_aligned: DEFAULT_MIN_ALIGNED,
            capacity: 0,
            query: Vec::new(),
            query_set: false,
            target: Vec::new(),
            fixed: Vec::new(),
            mobile: Vec::new(),
            distances: Vec::new(),
            close_fixed: Vec::new(),
            close_mobile: Vec::new(),
        }
    }

    /// Minimum overlap for a diagonal to be considered (at least 3)
    #[must_use]
    pub fn with_min_aligned(mut self, min_aligned: usize) -> Self {
        self.min_aligned = min_aligned.max(3);
        self
    }

    #[must_use]
    pub fn max_capacity(&self) -> usize {
        self.max_capacity
    }

    fn check_input(
        &self,
        what: &str,
        coordinates: &[Coordinate],
        sequence: &[u8],
    ) -> Result<(), AlignError> {
        if coordinates.is_empty() || coordinates.len() != sequence.len() {
            return Err(AlignError::InvalidInput(format!(
                "{what} has {} coordinates for {} residues",
                coordinates.len(),
                sequence.len()
            )));
        }
        if coordinates.len() > self.capacity {
            return Err(AlignError::CapacityExceeded {
                required: coordinates.len(),
                capacity: self.capacity,
            });
        }
        if coordinates.iter().any(|p| !p.coords.iter().all(|v| v.is_finite())) {
            return Err(AlignError::Numerical(format!(
                "{what} has non-finite coordinates"
            )));
        }
        Ok(())
    }

    fn load_target(&mut self, coordinates: &[Coordinate]) {
        self.target.clear();
        self.target
            .extend(coordinates.iter().map(|p| p.coords.cast::<f64>()));
    }

    /// Copy the pairs of one diagonal into the `fixed`/`mobile` scratch buffers
    fn load_pairs(&mut self, diagonal: &Diagonal) {
        self.fixed.clear();
        self.mobile.clear();
        self.fixed.extend_from_slice(
            &self.query[diagonal.query_start..diagonal.query_start + diagonal.len],
        );
        self.mobile.extend_from_slice(
            &self.target[diagonal.target_start..diagonal.target_start + diagonal.len],
        );
    }

    /// Fill `distances` for the loaded pairs under a superposition and return the
    /// unnormalized TM-score sum
    fn measure(&mut self, superposition: &Superposition, d0: f64) -> f64 {
        self.distances.clear();
        let mut sum = 0.0;
        for (fixed, mobile) in self.fixed.iter().zip(&self.mobile) {
            let distance = (superposition.apply(mobile) - fixed).norm();
            sum += tm_term(distance, d0);
            self.distances.push(distance);
        }
        sum
    }

    /// Copy the loaded pairs closer than `cutoff` into the `close_*` scratch buffers
    fn load_close_pairs(&mut self, cutoff: f64) {
        self.close_fixed.clear();
        self.close_mobile.clear();
        let pairs = self.fixed.iter().zip(&self.mobile);
        for (distance, (fixed, mobile)) in self.distances.iter().zip(pairs) {
            if *distance < cutoff {
                self.close_fixed.push(*fixed);
                self.close_mobile.push(*mobile);
            }
        }
    }

    /// Best TM-score superposition of the currently loaded pairs
    fn superpose_pairs(&mut self, d0: f64) -> Option<(Superposition, f64)> {
        let mut best = kabsch(&self.mobile, &self.fixed)?;
        let mut best_sum = self.measure(&best, d0);

        let mut cutoff = d0;
        for _ in 0..REFIT_ITERATIONS {
            self.load_close_pairs(cutoff);
            if self.close_fixed.len() < 3 {
                cutoff += 0.5 * d0;
                continue;
            }

            let Some(candidate) = kabsch(&self.close_mobile, &self.close_fixed) else {
                break;
            };
            let sum = self.measure(&candidate, d0);
            if sum > best_sum {
                best = candidate;
                best_sum = sum;
            } else {
                break;
            }
        }

        // Leave `distances` consistent with the returned superposition
        let _ = self.measure(&best, d0);
        best_sum.is_finite().then_some((best, best_sum))
    }
}

/// Every diagonal overlapping at least `min_aligned` residues, lowest offset first
fn diagonals(
    query_len: usize,
    target_len: usize,
    min_aligned: usize,
) -> impl Iterator<Item = Diagonal> {
    let query_len = isize::try_from(query_len).unwrap_or(isize::MAX);
    let target_len = isize::try_from(target_len).unwrap_or(isize::MAX);

    (-(target_len - 1)..query_len).filter_map(move |offset| {
        let query_start = offset.max(0);
        let query_end = query_len.min(target_len + offset);
        let len = usize::try_from(query_end - query_start).ok()?;
        if len < min_aligned {
            return None;
        }
        Some(Diagonal {
            offset,
            query_start: usize::try_from(query_start).ok()?,
            target_start: usize::try_from(query_start - offset).ok()?,
            len,
        })
    })
}

impl Aligner for TmAligner {
    fn reserve(&mut self, max_len: usize) -> Result<(), AlignError> {
        if max_len > self.max_capacity {
            return Err(AlignError::CapacityExceeded {
                required: max_len,
                capacity: self.max_capacity,
            });
        }
        if max_len > self.capacity {
            for buffer in [
                &mut self.query,
                &mut self.target,
                &mut self.fixed,
                &mut self.mobile,
                &mut self.close_fixed,
                &mut self.close_mobile,
            ] {
                buffer.reserve_exact(max_len.saturating_sub(buffer.len()));
            }
            self.distances
                .reserve_exact(max_len.saturating_sub(self.distances.len()));
            self.capacity = max_len;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn set_query(&mut self, coordinates: &[Coordinate], sequence: &[u8]) -> Result<(), AlignError> {
        self.query_set = false;
        self.check_input("query", coordinates, sequence)?;

        self.query.clear();
        self.query
            .extend(coordinates.iter().map(|p| p.coords.cast::<f64>()));
        self.query_set = true;
        Ok(())
    }

    fn score_against(
        &mut self,
        coordinates: &[Coordinate],
        sequence: &[u8],
    ) -> Result<Alignment, AlignError> {
        if !self.query_set {
            return Err(AlignError::QueryNotSet);
        }
        self.check_input("target", coordinates, sequence)?;
        self.load_target(coordinates);

        let query_len = self.query.len();
        let d0 = tm_d0(query_len);
        let norm = count_to_f64(query_len);

        let mut best: Option<Candidate> = None;
        for diagonal in diagonals(query_len, coordinates.len(), self.min_aligned) {
            self.load_pairs(&diagonal);
            let Some((superposition, sum)) = self.superpose_pairs(d0) else {
                continue;
            };
            let score = (sum / norm).clamp(0.0, 1.0);

            let better = match &best {
                None => true,
                Some(current) => {
                    score > current.score + 1e-12
                        || ((score - current.score).abs() <= 1e-12
                            && diagonal.offset.unsigned_abs()
                                < current.diagonal.offset.unsigned_abs())
                }
            };
            if better {
                best = Some(Candidate {
                    diagonal,
                    superposition,
                    score,
                });
            }
        }

        let best = best.ok_or_else(|| {
            AlignError::Numerical(format!(
                "no superposable overlap of at least {} residues",
                self.min_aligned
            ))
        })?;

        // Trim the footprint to the outermost pairs within d8 of each other
        self.load_pairs(&best.diagonal);
        self.measure(&best.superposition, d0);
        let d8 = tm_d8(query_len);
        let first = self.distances.iter().position(|d| *d < d8);
        let last = self.distances.iter().rposition(|d| *d < d8);
        let (first, last) = match (first, last) {
            (Some(first), Some(last)) => (first, last),
            _ => (0, best.diagonal.len - 1),
        };

        let aligned_length = last - first + 1;
        let squared: f64 = self.distances[first..=last].iter().map(|d| d * d).sum();
        let rmsd = (squared / count_to_f64(aligned_length)).sqrt();

        Ok(Alignment {
            score: best.score,
            query_start: best.diagonal.query_start + first,
            query_end: best.diagonal.query_start + last,
            target_start: best.diagonal.target_start + first,
            target_end: best.diagonal.target_start + last,
            aligned_length,
            trace: format!("{aligned_length}M"),
            distance: Some(rmsd),
        })
    }

    fn refine(&mut self, coordinates: &[Coordinate], alignment: &Alignment) -> Result<f64, AlignError> {
        if !self.query_set {
            return Err(AlignError::QueryNotSet);
        }
        let query_span = (alignment.query_end + 1).checked_sub(alignment.query_start);
        let target_span = (alignment.target_end + 1).checked_sub(alignment.target_start);
        let span = match (query_span, target_span) {
            (Some(q), Some(t)) if q == t => q,
            _ => {
                return Err(AlignError::InvalidInput(
                    "alignment footprint spans differ between query and target".to_string(),
                ))
            }
        };
        if alignment.query_end >= self.query.len()
            || alignment.target_end >= coordinates.len()
        {
            return Err(AlignError::InvalidInput(
                "alignment footprint does not fit the structures".to_string(),
            ));
        }
        if span < 3 {
            return Err(AlignError::Numerical(format!(
                "cannot superpose {span} aligned residues"
            )));
        }

        self.load_target(coordinates);
        self.load_pairs(&Diagonal {
            offset: 0,
            query_start: alignment.query_start,
            target_start: alignment.target_start,
            len: span,
        });

        let superposition = kabsch(&self.mobile, &self.fixed)
            .ok_or_else(|| AlignError::Numerical("superposition failed".to_string()))?;
        self.measure(&superposition, 1.0);
        let squared: f64 = self.distances.iter().map(|d| d * d).sum();
        let rmsd = (squared / count_to_f64(span)).sqrt();

        if rmsd.is_finite() {
            Ok(rmsd)
        } else {
            Err(AlignError::Numerical("non-finite RMSD".to_string()))
        }
    }
}

/// Kabsch superposition taking `mobile` onto `fixed`
fn kabsch(mobile: &[Vec3], fixed: &[Vec3]) -> Option<Superposition> {
    if mobile.len() != fixed.len() || mobile.is_empty() {
        return None;
    }
    let n = count_to_f64(mobile.len());
    let mobile_centroid = mobile.iter().fold(Vec3::zeros(), |acc, p| acc + p) / n;
    let fixed_centroid = fixed.iter().fold(Vec3::zeros(), |acc, p| acc + p) / n;

    let h = mobile
        .iter()
        .zip(fixed)
        .fold(Matrix3::zeros(), |acc, (m, f)| {
            acc + (m - mobile_centroid) * (f - fixed_centroid).transpose()
        });

    let svd = h.svd(true, true);
    let u = svd.u?;
    let v = svd.v_t?.transpose();

    let mut correction = Matrix3::identity();
    if (v * u.transpose()).determinant() < 0.0 {
        correction[(2, 2)] = -1.0;
    }

    let rotation = v * correction * u.transpose();
    let translation = fixed_centroid - rotation * mobile_centroid;
    if rotation.iter().chain(translation.iter()).all(|x| x.is_finite()) {
        Some(Superposition {
            rotation,
            translation,
        })
    } else {
        None
    }
}
