//! Offset index of a record store.
//!
//! Format: one line per record, `key<TAB>offset<TAB>length`. Line order defines the
//! dense internal index. `length` counts the trailing NUL of each record.

use std::collections::HashMap;
use std::io::BufRead;

use super::shard::StoreError;

/// Location of one record in the store's data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexRecord {
    pub key: u32,
    pub offset: u64,
    pub length: u64,
}

impl IndexRecord {
    /// Exclusive end offset of the record
    #[must_use]
    pub fn end(&self) -> u64 {
        self.offset.saturating_add(self.length)
    }
}

/// Parsed offset index with a key lookup table
#[derive(Debug, Clone, Default)]
pub struct StoreIndex {
    records: Vec<IndexRecord>,

    /// Index: key -> internal index
    key_to_index: HashMap<u32, usize>,
}

impl StoreIndex {
    /// Build an index from records, rejecting duplicate keys
    ///
    /// # Errors
    ///
    /// Returns `StoreError::InvalidIndex` if a key appears twice.
    pub fn from_records(records: Vec<IndexRecord>) -> Result<Self, StoreError> {
        let mut key_to_index = HashMap::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            if key_to_index.insert(record.key, i).is_some() {
                return Err(StoreError::InvalidIndex {
                    line: i + 1,
                    message: format!("duplicate key {}", record.key),
                });
            }
        }
        Ok(Self {
            records,
            key_to_index,
        })
    }

    /// Parse an index from text
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if reading fails or `StoreError::InvalidIndex` if a line
    /// is malformed or a key is duplicated.
    pub fn parse<R: BufRead>(reader: R) -> Result<Self, StoreError> {
        let mut records = Vec::new();

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end_matches('\r');
            if line.is_empty() {
                continue;
            }
            records.push(parse_line(line, line_no + 1)?);
        }

        Self::from_records(records)
    }

    /// Render the index in its on-disk text form
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut text = String::with_capacity(self.records.len() * 16);
        for record in &self.records {
            text.push_str(&format!(
                "{}\t{}\t{}\n",
                record.key, record.offset, record.length
            ));
        }
        text
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&IndexRecord> {
        self.records.get(index)
    }

    /// Internal index of a key
    #[must_use]
    pub fn index_of(&self, key: u32) -> Option<usize> {
        self.key_to_index.get(&key).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = &IndexRecord> {
        self.records.iter()
    }
}

fn parse_line(line: &str, line_no: usize) -> Result<IndexRecord, StoreError> {
    let invalid = |message: String| StoreError::InvalidIndex {
        line: line_no,
        message,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 3 {
        return Err(invalid(format!(
            "expected 3 tab-separated fields, found {}",
            fields.len()
        )));
    }

    let key = fields[0]
        .parse::<u32>()
        .map_err(|_| invalid(format!("invalid key '{}'", fields[0])))?;
    let offset = fields[1]
        .parse::<u64>()
        .map_err(|_| invalid(format!("invalid offset '{}'", fields[1])))?;
    let length = fields[2]
        .parse::<u64>()
        .map_err(|_| invalid(format!("invalid length '{}'", fields[2])))?;

    Ok(IndexRecord {
        key,
        offset,
        length,
    })
}
