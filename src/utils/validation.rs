//! Centralized validation helpers shared by the engines and the CLI.

use thiserror::Error;

use crate::core::entry::Coordinate;

/// Maximum number of records accepted in a single JSON input file
pub const MAX_RECORDS: usize = 1_000_000;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{name} must be a finite value in [0, 1], got {value}")]
    FractionOutOfRange { name: &'static str, value: f64 },

    #[error("{what} is empty")]
    Empty { what: &'static str },

    #[error("{what} has {coordinates} coordinates but {residues} residues")]
    LengthMismatch {
        what: &'static str,
        coordinates: usize,
        residues: usize,
    },

    #[error("{what} has non-finite coordinates at residue {residue}")]
    NonFinite { what: &'static str, residue: usize },
}

/// Check that a threshold is a finite fraction.
///
/// # Examples
///
/// ```
/// use foldscan::utils::validation::is_valid_fraction;
///
/// assert!(is_valid_fraction(0.0));
/// assert!(is_valid_fraction(1.0));
/// assert!(!is_valid_fraction(1.1));
/// assert!(!is_valid_fraction(f64::NAN));
/// ```
#[must_use]
pub fn is_valid_fraction(value: f64) -> bool {
    value.is_finite() && (0.0..=1.0).contains(&value)
}

/// Validate a named threshold.
///
/// # Errors
///
/// Returns `ValidationError::FractionOutOfRange` if `value` is not in `[0, 1]`.
pub fn validate_fraction(name: &'static str, value: f64) -> Result<f64, ValidationError> {
    if is_valid_fraction(value) {
        Ok(value)
    } else {
        Err(ValidationError::FractionOutOfRange { name, value })
    }
}

/// Validate that a structure has one finite coordinate per residue.
///
/// # Errors
///
/// Returns `ValidationError::Empty` for a zero-length structure,
/// `ValidationError::LengthMismatch` if the counts differ, or
/// `ValidationError::NonFinite` for NaN or infinite coordinates.
pub fn validate_structure(
    what: &'static str,
    coordinates: &[Coordinate],
    sequence: &str,
) -> Result<(), ValidationError> {
    if sequence.is_empty() {
        return Err(ValidationError::Empty { what });
    }
    if coordinates.len() != sequence.len() {
        return Err(ValidationError::LengthMismatch {
            what,
            coordinates: coordinates.len(),
            residues: sequence.len(),
        });
    }
    if let Some(residue) = coordinates
        .iter()
        .position(|p| !p.coords.iter().all(|v| v.is_finite()))
    {
        return Err(ValidationError::NonFinite { what, residue });
    }
    Ok(())
}

/// Check whether a record count is within [`MAX_RECORDS`].
///
/// Returns an error message if the limit is exceeded, None otherwise.
#[must_use]
pub fn check_record_limit(count: usize) -> Option<String> {
    if count > MAX_RECORDS {
        Some(format!(
            "Too many records: {count} exceeds maximum of {MAX_RECORDS}"
        ))
    } else {
        None
    }
}
