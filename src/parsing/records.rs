use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::catalog::builder;
use crate::core::entry::{Coordinate, Entry, Query};
use crate::utils::validation::{check_record_limit, validate_structure, MAX_RECORDS};

#[derive(Error, Debug)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid record: {0}")]
    InvalidFormat(String),

    #[error("Too many records: {0} exceeds maximum allowed ({MAX_RECORDS})")]
    TooManyRecords(usize),
}

/// One structure as read from or written to JSON.
///
/// ```json
/// {"key": 7, "name": "1abc_A", "sequence": "MKV",
///  "symbolic_sequence": "DPV", "coordinates": [[0.0, 0.0, 0.0], [3.8, 0.0, 0.0], [7.6, 0.0, 0.0]]}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    pub sequence: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub symbolic_sequence: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Vec<[f32; 3]>>,
}

impl EntryRecord {
    /// Coordinates as points, if present
    #[must_use]
    pub fn points(&self) -> Option<Vec<Coordinate>> {
        self.coordinates
            .as_ref()
            .map(|c| c.iter().map(|&[x, y, z]| Coordinate::new(x, y, z)).collect())
    }

    /// Convert into a search query
    ///
    /// # Errors
    ///
    /// Returns `ParseError::InvalidFormat` if the record has no coordinates or they do
    /// not match the sequence.
    pub fn into_query(self) -> Result<Query, ParseError> {
        let coordinates = self.points().ok_or_else(|| {
            ParseError::InvalidFormat("query record has no coordinates".to_string())
        })?;
        validate_structure("query record", &coordinates, &self.sequence)
            .map_err(|e| ParseError::InvalidFormat(e.to_string()))?;

        let name = self
            .name
            .or_else(|| self.key.map(|k| k.to_string()))
            .unwrap_or_else(|| "query".to_string());
        let query = Query::new(name, self.sequence, coordinates);
        Ok(match self.symbolic_sequence {
            Some(symbolic) => query.with_symbolic_sequence(symbolic),
            None => query,
        })
    }
}

impl From<&Entry> for EntryRecord {
    fn from(entry: &Entry) -> Self {
        Self {
            key: Some(entry.key),
            name: Some(entry.name.clone()),
            sequence: entry.sequence.clone(),
            symbolic_sequence: (!entry.symbolic_sequence.is_empty())
                .then(|| entry.symbolic_sequence.clone()),
            coordinates: entry
                .has_coordinates()
                .then(|| entry.coordinates.iter().map(|p| [p.x, p.y, p.z]).collect()),
        }
    }
}

/// Either a single record or an array of records
#[derive(Deserialize)]
#[serde(untagged)]
enum RecordsJson {
    Many(Vec<EntryRecord>),
    One(Box<EntryRecord>),
}

/// Parse JSON text holding one record or an array of records
///
/// # Errors
///
/// Returns `ParseError::Json` for malformed JSON, `ParseError::InvalidFormat` if no
/// records are found, or `ParseError::TooManyRecords` if the limit is exceeded.
pub fn parse_records_text(text: &str) -> Result<Vec<EntryRecord>, ParseError> {
    let records = match serde_json::from_str::<RecordsJson>(text)? {
        RecordsJson::Many(records) => records,
        RecordsJson::One(record) => vec![*record],
    };

    if check_record_limit(records.len()).is_some() {
        return Err(ParseError::TooManyRecords(records.len()));
    }
    if records.is_empty() {
        return Err(ParseError::InvalidFormat("no records found".to_string()));
    }
    Ok(records)
}

/// Parse a JSON file holding one record or an array of records
///
/// # Errors
///
/// Returns `ParseError::Io` if the file cannot be read, or any error of
/// [`parse_records_text`].
pub fn parse_records_file(path: &Path) -> Result<Vec<EntryRecord>, ParseError> {
    let content = std::fs::read_to_string(path)?;
    parse_records_text(&content)
}

/// Parse a JSON file holding exactly one record as a query
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if the file holds more than one record or the
/// record cannot be searched with.
pub fn parse_query_file(path: &Path) -> Result<Query, ParseError> {
    let mut records = parse_records_file(path)?;
    if records.len() != 1 {
        return Err(ParseError::InvalidFormat(format!(
            "expected one query record, found {}",
            records.len()
        )));
    }
    records.remove(0).into_query()
}

/// Turn parsed records into catalog records, assigning missing keys.
///
/// Records without a key get consecutive keys following the largest explicit key (or
/// starting at 0), in input order.
///
/// # Errors
///
/// Returns `ParseError::InvalidFormat` if more keys are needed than `u32` can hold.
pub fn assign_keys(records: Vec<EntryRecord>) -> Result<Vec<builder::EntryRecord>, ParseError> {
    let mut next = records
        .iter()
        .filter_map(|r| r.key)
        .max()
        .map_or(Some(0), |max| max.checked_add(1));

    records
        .into_iter()
        .map(|record| {
            let key = match record.key {
                Some(key) => key,
                None => {
                    let key = next.ok_or_else(|| {
                        ParseError::InvalidFormat("ran out of keys to assign".to_string())
                    })?;
                    next = key.checked_add(1);
                    key
                }
            };
            let coordinates = record.points();
            Ok(builder::EntryRecord {
                key,
                name: record.name,
                sequence: record.sequence,
                symbolic_sequence: record.symbolic_sequence,
                coordinates,
            })
        })
        .collect()
}
