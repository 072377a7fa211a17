//! Catalog writer.
//!
//! `CatalogBuilder` collects entry records and writes the sequence store plus the name,
//! coordinate, and structural-alphabet companions in the layout [`Catalog`] reads.
//! Companions without any data are not written.
//!
//! [`Catalog`]: super::store::Catalog

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use super::codec;
use super::index::{IndexRecord, StoreIndex};
use super::shard::{index_path, shard_path, StoreError};
use super::store::StoreKind;
use crate::core::entry::Coordinate;

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Duplicate key: {0}")]
    DuplicateKey(u32),

    #[error("Entry {key} has an empty sequence")]
    EmptySequence { key: u32 },

    #[error("Entry {key}: {field} has {actual} residues but the sequence has {expected}")]
    LengthMismatch {
        key: u32,
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Entry {key}: {field} contains invalid character {character:?}")]
    InvalidCharacter {
        key: u32,
        field: &'static str,
        character: char,
    },

    #[error("Entry {key}: name must be a single line")]
    MultilineName { key: u32 },

    #[error("Index error: {0}")]
    Index(#[from] StoreError),
}

/// One entry to write
#[derive(Debug, Clone, PartialEq)]
pub struct EntryRecord {
    pub key: u32,
    pub name: Option<String>,
    pub sequence: String,
    pub symbolic_sequence: Option<String>,
    pub coordinates: Option<Vec<Coordinate>>,
}

/// What a finished build wrote
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildSummary {
    pub entries: usize,
    pub with_coordinates: usize,
    pub with_symbolic: usize,
    pub shards: usize,
}

/// Writes a catalog at a path prefix
#[derive(Debug)]
pub struct CatalogBuilder {
    prefix: PathBuf,
    shards: usize,
    records: Vec<EntryRecord>,
    keys: HashSet<u32>,
}

impl CatalogBuilder {
    pub fn new(prefix: &Path) -> Self {
        Self {
            prefix: prefix.to_path_buf(),
            shards: 1,
            records: Vec::new(),
            keys: HashSet::new(),
        }
    }

    /// Split each store's data over `n` files (`P.0` .. `P.{n-1}`)
    #[must_use]
    pub fn shards(mut self, n: usize) -> Self {
        self.shards = n.max(1);
        self
    }

    /// Number of records added so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Add one record
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::DuplicateKey` if the key was already added, or a
    /// validation error if the record's fields disagree with its sequence length.
    pub fn add(&mut self, record: EntryRecord) -> Result<(), BuilderError> {
        let key = record.key;
        let expected = record.sequence.len();

        if expected == 0 {
            return Err(BuilderError::EmptySequence { key });
        }
        if record
            .name
            .as_deref()
            .is_some_and(|n| n.contains(['\n', '\r']))
        {
            return Err(BuilderError::MultilineName { key });
        }
        check_residues(key, "sequence", &record.sequence)?;
        if let Some(symbolic) = &record.symbolic_sequence {
            check_residues(key, "structural alphabet sequence", symbolic)?;
        }
        if let Some(symbolic) = &record.symbolic_sequence {
            if symbolic.len() != expected {
                return Err(BuilderError::LengthMismatch {
                    key,
                    field: "structural alphabet sequence",
                    expected,
                    actual: symbolic.len(),
                });
            }
        }
        if let Some(coordinates) = &record.coordinates {
            if coordinates.len() != expected {
                return Err(BuilderError::LengthMismatch {
                    key,
                    field: "coordinates",
                    expected,
                    actual: coordinates.len(),
                });
            }
        }
        if !self.keys.insert(key) {
            return Err(BuilderError::DuplicateKey(key));
        }

        self.records.push(record);
        Ok(())
    }

    /// Write all stores
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::Io` if any file cannot be written.
    pub fn finish(self) -> Result<BuildSummary, BuilderError> {
        let sequences: Vec<(u32, Vec<u8>)> = self
            .records
            .iter()
            .map(|r| (r.key, text_payload(&r.sequence)))
            .collect();
        self.write_store(StoreKind::Primary, &sequences)?;

        let names: Vec<(u32, Vec<u8>)> = self
            .records
            .iter()
            .map(|r| {
                let name = r.name.clone().unwrap_or_else(|| r.key.to_string());
                (r.key, text_payload(&name))
            })
            .collect();
        self.write_store(StoreKind::Names, &names)?;

        let coordinates: Vec<(u32, Vec<u8>)> = self
            .records
            .iter()
            .filter_map(|r| r.coordinates.as_ref().map(|c| (r.key, codec::encode(c))))
            .collect();
        if !coordinates.is_empty() {
            self.write_store(StoreKind::Coordinates, &coordinates)?;
        }

        let symbolic: Vec<(u32, Vec<u8>)> = self
            .records
            .iter()
            .filter_map(|r| {
                r.symbolic_sequence
                    .as_ref()
                    .map(|s| (r.key, text_payload(s)))
            })
            .collect();
        if !symbolic.is_empty() {
            self.write_store(StoreKind::Symbolic, &symbolic)?;
        }

        let summary = BuildSummary {
            entries: self.records.len(),
            with_coordinates: coordinates.len(),
            with_symbolic: symbolic.len(),
            shards: self.shards,
        };
        debug!("Wrote catalog {}: {summary:?}", self.prefix.display());
        Ok(summary)
    }

    fn write_store(&self, kind: StoreKind, payloads: &[(u32, Vec<u8>)]) -> Result<(), BuilderError> {
        let path = kind.path_for(&self.prefix);
        let per_shard = payloads.len().div_ceil(self.shards).max(1);

        let mut index = Vec::with_capacity(payloads.len());
        let mut offset = 0u64;

        for shard in 0..self.shards {
            let shard_file = if self.shards == 1 {
                path.clone()
            } else {
                shard_path(&path, shard)
            };
            let mut writer = BufWriter::new(File::create(&shard_file)?);

            let start = (shard * per_shard).min(payloads.len());
            let end = ((shard + 1) * per_shard).min(payloads.len());
            for (key, payload) in &payloads[start..end] {
                writer.write_all(payload)?;
                writer.write_all(&[0])?;
                let length = payload.len() as u64 + 1;
                index.push(IndexRecord {
                    key: *key,
                    offset,
                    length,
                });
                offset += length;
            }
            writer.flush()?;
        }

        let index = StoreIndex::from_records(index)?;
        std::fs::write(index_path(&path), index.to_text())?;
        Ok(())
    }
}

/// Residue strings are stored one per line, so only printable ASCII is allowed
fn check_residues(key: u32, field: &'static str, residues: &str) -> Result<(), BuilderError> {
    match residues.chars().find(|c| !c.is_ascii_graphic()) {
        Some(character) => Err(BuilderError::InvalidCharacter {
            key,
            field,
            character,
        }),
        None => Ok(()),
    }
}

fn text_payload(text: &str) -> Vec<u8> {
    let mut payload = Vec::with_capacity(text.len() + 1);
    payload.extend_from_slice(text.as_bytes());
    payload.push(b'\n');
    payload
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn record(key: u32, sequence: &str) -> EntryRecord {
        EntryRecord {
            key,
            name: Some(format!("entry_{key}")),
            sequence: sequence.to_string(),
            symbolic_sequence: None,
            coordinates: None,
        }
    }

    #[test]
    fn test_writes_primary_and_names_only() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("db");

        let mut builder = CatalogBuilder::new(&prefix);
        builder.add(record(1, "ACD")).unwrap();
        builder.add(record(2, "EFGH")).unwrap();
        let summary = builder.finish().unwrap();

        assert_eq!(summary.entries, 2);
        assert_eq!(summary.with_coordinates, 0);
        assert_eq!(fs::read(&prefix).unwrap(), b"ACD\n\0EFGH\n\0");
        assert_eq!(
            fs::read_to_string(index_path(&prefix)).unwrap(),
            "1\t0\t5\n2\t5\t6\n"
        );
        assert_eq!(
            fs::read(StoreKind::Names.path_for(&prefix)).unwrap(),
            b"entry_1\n\0entry_2\n\0"
        );
        assert!(!StoreKind::Coordinates.path_for(&prefix).exists());
        assert!(!StoreKind::Symbolic.path_for(&prefix).exists());
    }

    #[test]
    fn test_sharded_offsets_are_global() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("db");

        let mut builder = CatalogBuilder::new(&prefix).shards(2);
        builder.add(record(1, "ACD")).unwrap();
        builder.add(record(2, "EFGH")).unwrap();
        builder.add(record(3, "KL")).unwrap();
        builder.finish().unwrap();

        assert_eq!(fs::read(shard_path(&prefix, 0)).unwrap(), b"ACD\n\0EFGH\n\0");
        assert_eq!(fs::read(shard_path(&prefix, 1)).unwrap(), b"KL\n\0");
        assert_eq!(
            fs::read_to_string(index_path(&prefix)).unwrap(),
            "1\t0\t5\n2\t5\t6\n3\t11\t4\n"
        );
    }

    #[test]
    fn test_rejects_invalid_records() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = CatalogBuilder::new(&dir.path().join("db"));
        builder.add(record(1, "ACD")).unwrap();

        assert!(matches!(
            builder.add(record(1, "EFG")),
            Err(BuilderError::DuplicateKey(1))
        ));
        assert!(matches!(
            builder.add(record(2, "")),
            Err(BuilderError::EmptySequence { key: 2 })
        ));

        let mut bad = record(3, "ACD");
        bad.symbolic_sequence = Some("DD".to_string());
        assert!(matches!(
            builder.add(bad),
            Err(BuilderError::LengthMismatch { key: 3, expected: 3, actual: 2, .. })
        ));

        let mut bad = record(4, "ACD");
        bad.name = Some("two\nlines".to_string());
        assert!(matches!(
            builder.add(bad),
            Err(BuilderError::MultilineName { key: 4 })
        ));

        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_rejects_line_breaks_and_control_characters_in_residues() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = CatalogBuilder::new(&dir.path().join("db"));

        let mut trailing = record(1, "ACDE\n");
        trailing.coordinates = Some(vec![Coordinate::new(0.0, 0.0, 0.0); 5]);
        assert!(matches!(
            builder.add(trailing),
            Err(BuilderError::InvalidCharacter {
                key: 1,
                field: "sequence",
                character: '\n'
            })
        ));

        for sequence in ["AC\rD", "A\0CD", "AC D", "ACD\t"] {
            assert!(matches!(
                builder.add(record(2, sequence)),
                Err(BuilderError::InvalidCharacter { key: 2, .. })
            ));
        }

        let mut symbolic = record(3, "ACD");
        symbolic.symbolic_sequence = Some("DD\0".to_string());
        assert!(matches!(
            builder.add(symbolic),
            Err(BuilderError::InvalidCharacter {
                key: 3,
                field: "structural alphabet sequence",
                character: '\0'
            })
        ));

        assert!(builder.is_empty());
    }
}
