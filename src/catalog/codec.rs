//! C-alpha coordinate record encoding.
//!
//! Coordinates are stored axis-blocked (all x, then all y, then all z), little-endian,
//! in one of two layouts:
//!
//! - **Raw**: `3 * n` `f32` values (`12 * n` bytes)
//! - **Compact**: per axis, an `i32` start value in thousandths of an Angstrom followed by
//!   `n - 1` `i16` deltas (`3 * (4 + 2 * (n - 1))` bytes)
//!
//! The layout is recovered from the byte count, so decoding needs the residue count,
//! which comes from the matching amino-acid sequence.

use thiserror::Error;

use crate::core::entry::Coordinate;

/// Fixed-point scale of the compact layout (thousandths of an Angstrom)
pub const COMPACT_SCALE: f32 = 1000.0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error(
        "Coordinate record of {actual} bytes does not match {residues} residues \
         (expected {raw} or {compact} bytes)"
    )]
    LengthMismatch {
        residues: usize,
        actual: usize,
        raw: usize,
        compact: usize,
    },
}

/// Storage layout of one coordinate record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinateLayout {
    Raw,
    Compact,
}

impl CoordinateLayout {
    /// Size in bytes of a record holding `residues` points in this layout
    #[must_use]
    pub fn byte_len(self, residues: usize) -> usize {
        match self {
            Self::Raw => residues * 3 * 4,
            Self::Compact if residues == 0 => 0,
            Self::Compact => 3 * (4 + 2 * (residues - 1)),
        }
    }

    /// Identify the layout of a record from its size. Raw wins when both sizes agree
    /// (single-residue records).
    #[must_use]
    pub fn detect(byte_len: usize, residues: usize) -> Option<Self> {
        if byte_len == Self::Raw.byte_len(residues) {
            Some(Self::Raw)
        } else if byte_len == Self::Compact.byte_len(residues) {
            Some(Self::Compact)
        } else {
            None
        }
    }
}

/// Decode a coordinate record holding exactly `residues` points.
///
/// # Errors
///
/// Returns `CodecError::LengthMismatch` if the byte count matches neither layout for
/// the given residue count.
pub fn decode(bytes: &[u8], residues: usize) -> Result<Vec<Coordinate>, CodecError> {
    let layout = CoordinateLayout::detect(bytes.len(), residues).ok_or(
        CodecError::LengthMismatch {
            residues,
            actual: bytes.len(),
            raw: CoordinateLayout::Raw.byte_len(residues),
            compact: CoordinateLayout::Compact.byte_len(residues),
        },
    )?;

    let axes = match layout {
        CoordinateLayout::Raw => decode_raw(bytes, residues),
        CoordinateLayout::Compact => decode_compact(bytes, residues),
    };

    Ok((0..residues)
        .map(|i| Coordinate::new(axes[i], axes[residues + i], axes[2 * residues + i]))
        .collect())
}

fn decode_raw(bytes: &[u8], residues: usize) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .take(3 * residues)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

fn decode_compact(bytes: &[u8], residues: usize) -> Vec<f32> {
    let block = CoordinateLayout::Compact.byte_len(residues) / 3;
    let mut axes = Vec::with_capacity(3 * residues);

    for axis in bytes.chunks_exact(block) {
        let mut current = i64::from(i32::from_le_bytes([axis[0], axis[1], axis[2], axis[3]]));
        axes.push(fixed_to_f32(current));

        for delta in axis[4..].chunks_exact(2) {
            current += i64::from(i16::from_le_bytes([delta[0], delta[1]]));
            axes.push(fixed_to_f32(current));
        }
    }

    axes
}

#[allow(clippy::cast_precision_loss)] // milli-Angstrom values are far below 2^24
fn fixed_to_f32(value: i64) -> f32 {
    value as f32 / COMPACT_SCALE
}

/// Encode points, using the compact layout whenever every per-axis delta fits in `i16`
/// (and there is more than one residue), the raw layout otherwise.
#[must_use]
pub fn encode(points: &[Coordinate]) -> Vec<u8> {
    match encode_compact(points) {
        Some(bytes) => bytes,
        None => encode_raw(points),
    }
}

/// Encode points in the raw layout
#[must_use]
pub fn encode_raw(points: &[Coordinate]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(CoordinateLayout::Raw.byte_len(points.len()));
    for axis in 0..3 {
        for point in points {
            bytes.extend_from_slice(&point[axis].to_le_bytes());
        }
    }
    bytes
}

fn encode_compact(points: &[Coordinate]) -> Option<Vec<u8>> {
    if points.len() < 2 {
        return None;
    }

    let mut bytes = Vec::with_capacity(CoordinateLayout::Compact.byte_len(points.len()));
    for axis in 0..3 {
        let mut previous = quantize(points[0][axis])?;
        bytes.extend_from_slice(&previous.to_le_bytes());

        for point in &points[1..] {
            let current = quantize(point[axis])?;
            let delta = i16::try_from(i64::from(current) - i64::from(previous)).ok()?;
            bytes.extend_from_slice(&delta.to_le_bytes());
            previous = current;
        }
    }
    Some(bytes)
}

#[allow(clippy::cast_possible_truncation)] // range-checked against i32 before the cast
fn quantize(value: f32) -> Option<i32> {
    let scaled = (f64::from(value) * f64::from(COMPACT_SCALE)).round();
    if scaled.is_finite() && scaled >= f64::from(i32::MIN) && scaled <= f64::from(i32::MAX) {
        Some(scaled as i32)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn helix(n: usize) -> Vec<Coordinate> {
        (0..n)
            .map(|i| {
                #[allow(clippy::cast_precision_loss)]
                let t = i as f32;
                Coordinate::new(2.3 * (t * 1.745).cos(), 2.3 * (t * 1.745).sin(), 1.5 * t)
            })
            .collect()
    }

    #[test]
    fn test_compact_round_trip_within_quantization() {
        let points = helix(25);
        let bytes = encode(&points);
        assert_eq!(bytes.len(), CoordinateLayout::Compact.byte_len(25));

        let decoded = decode(&bytes, 25).unwrap();
        assert_eq!(decoded.len(), 25);
        for (a, b) in points.iter().zip(&decoded) {
            assert!((a - b).norm() < 0.001, "{a} vs {b}");
        }
    }

    #[test]
    fn test_large_jump_falls_back_to_raw() {
        let points = vec![
            Coordinate::new(0.0, 0.0, 0.0),
            Coordinate::new(100.0, 0.0, 0.0),
            Coordinate::new(101.5, -3.25, 0.5),
        ];
        let bytes = encode(&points);
        assert_eq!(bytes.len(), CoordinateLayout::Raw.byte_len(3));
        assert_eq!(decode(&bytes, 3).unwrap(), points);
    }

    #[test]
    fn test_single_residue_uses_raw_layout() {
        let points = vec![Coordinate::new(1.25, -2.5, 3.75)];
        let bytes = encode(&points);
        assert_eq!(bytes.len(), 12);
        assert_eq!(decode(&bytes, 1).unwrap(), points);
    }

    #[test]
    fn test_empty_record() {
        assert!(decode(&[], 0).unwrap().is_empty());
        assert!(encode(&[]).is_empty());
    }

    #[test]
    fn test_mismatched_residue_count_is_rejected() {
        let bytes = encode(&helix(10));

        let err = decode(&bytes, 11).unwrap_err();
        assert_eq!(
            err,
            CodecError::LengthMismatch {
                residues: 11,
                actual: bytes.len(),
                raw: 132,
                compact: 72,
            }
        );

        assert!(decode(&bytes, 9).is_err());
        assert!(decode(&bytes[..bytes.len() - 1], 10).is_err());
    }

    #[test]
    fn test_raw_layout_is_axis_blocked() {
        let points = vec![Coordinate::new(1.0, 2.0, 3.0), Coordinate::new(4.0, 5.0, 6.0)];
        let bytes = encode_raw(&points);
        let values: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(values, vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);
    }
}
