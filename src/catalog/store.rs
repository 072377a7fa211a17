use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use super::codec::{self, CodecError};
use super::shard::{append_suffix, store_exists, ShardedStore, StoreError};
use crate::core::entry::Entry;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Catalog file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Key not found in catalog: {0}")]
    KeyNotFound(u32),

    #[error("Catalog index out of range: {index} >= {size}")]
    OutOfRange { index: usize, size: usize },

    #[error("Failed to read {store} store: {source}")]
    Store {
        store: StoreKind,
        #[source]
        source: StoreError,
    },

    #[error("Invalid coordinates for key {key}: {source}")]
    Codec {
        key: u32,
        #[source]
        source: CodecError,
    },

    #[error("{store} record of key {key} has {actual} residues but its sequence has {expected}")]
    FieldLength {
        key: u32,
        store: StoreKind,
        expected: usize,
        actual: usize,
    },
}

/// The stores making up a catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreKind {
    /// Amino-acid sequences (mandatory)
    Primary,
    /// Header lines
    Names,
    /// C-alpha coordinates
    Coordinates,
    /// Structural-alphabet sequences
    Symbolic,
}

impl StoreKind {
    /// Suffix appended to the catalog prefix to locate this store
    #[must_use]
    pub fn suffix(self) -> &'static str {
        match self {
            Self::Primary => "",
            Self::Names => "_h",
            Self::Coordinates => "_ca",
            Self::Symbolic => "_ss",
        }
    }

    /// Data path of this store for a catalog prefix
    #[must_use]
    pub fn path_for(self, prefix: &Path) -> PathBuf {
        append_suffix(prefix, self.suffix())
    }
}

impl std::fmt::Display for StoreKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Primary => write!(f, "sequence"),
            Self::Names => write!(f, "name"),
            Self::Coordinates => write!(f, "coordinate"),
            Self::Symbolic => write!(f, "structural alphabet"),
        }
    }
}

/// Which optional companion stores a catalog has
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Companions {
    pub names: bool,
    pub coordinates: bool,
    pub symbolic: bool,
}

/// A read-only structure database: one sequence store plus optional name, coordinate,
/// and structural-alphabet stores sharing its key space.
///
/// Entries are re-read and re-decoded on every access; callers that need repeated
/// access should keep the returned [`Entry`] values.
#[derive(Debug)]
pub struct Catalog {
    path: PathBuf,
    primary: ShardedStore,
    names: Option<ShardedStore>,
    coordinates: Option<ShardedStore>,
    symbolic: Option<ShardedStore>,
}

impl Catalog {
    /// Open the catalog at a path prefix
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NotFound` if the sequence data or its index is missing, or
    /// `CatalogError::Store` if the sequence store is malformed. Missing or unreadable
    /// companion stores are skipped.
    pub fn open(prefix: &Path) -> Result<Self, CatalogError> {
        let primary = ShardedStore::open(prefix).map_err(|e| match e {
            StoreError::NotFound(path) => CatalogError::NotFound(path),
            source => CatalogError::Store {
                store: StoreKind::Primary,
                source,
            },
        })?;

        let catalog = Self {
            path: prefix.to_path_buf(),
            names: open_companion(prefix, StoreKind::Names),
            coordinates: open_companion(prefix, StoreKind::Coordinates),
            symbolic: open_companion(prefix, StoreKind::Symbolic),
            primary,
        };

        debug!(
            "Opened catalog {} with {} entries ({:?})",
            prefix.display(),
            catalog.size(),
            catalog.companions()
        );
        Ok(catalog)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of entries, fixed at open time
    #[must_use]
    pub fn size(&self) -> usize {
        self.primary.len()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.size()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty()
    }

    #[must_use]
    pub fn companions(&self) -> Companions {
        Companions {
            names: self.names.is_some(),
            coordinates: self.coordinates.is_some(),
            symbolic: self.symbolic.is_some(),
        }
    }

    /// Number of data shards of the sequence store
    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.primary.shard_count()
    }

    /// All keys in internal index order
    #[must_use]
    pub fn keys(&self) -> Vec<u32> {
        self.primary.keys().collect()
    }

    /// Internal index of a key
    #[must_use]
    pub fn index_of(&self, key: u32) -> Option<usize> {
        self.primary.index_of(key)
    }

    /// Residue count of an entry, taken from the sequence index without reading data.
    ///
    /// The sequence of a materialized entry is always exactly this long.
    #[must_use]
    pub fn residue_count(&self, index: usize) -> Option<usize> {
        self.primary
            .record_len(index)
            .map(|len| usize::try_from(len.saturating_sub(2)).unwrap_or(usize::MAX))
    }

    /// Longest entry in the catalog, in residues (0 for an empty catalog)
    #[must_use]
    pub fn max_residue_count(&self) -> usize {
        (0..self.size())
            .filter_map(|i| self.residue_count(i))
            .max()
            .unwrap_or(0)
    }

    /// Materialize the entry at an internal index
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::OutOfRange` if `index >= size()`, `CatalogError::Store` on
    /// read failures, or `CatalogError::Codec` / `CatalogError::FieldLength` if a
    /// companion record does not match the sequence length.
    pub fn get_by_index(&self, index: usize) -> Result<Entry, CatalogError> {
        let out_of_range = CatalogError::OutOfRange {
            index,
            size: self.size(),
        };
        let key = self.primary.key(index).ok_or(out_of_range)?;

        let sequence = self
            .primary
            .read(index)
            .map_err(|source| CatalogError::Store {
                store: StoreKind::Primary,
                source,
            })?
            .map(|bytes| {
                let residues = self.residue_count(index).unwrap_or(0).min(bytes.len());
                String::from_utf8_lossy(&bytes[..residues]).into_owned()
            })
            .unwrap_or_default();

        let name = self
            .read_companion(self.names.as_ref(), StoreKind::Names, key)?
            .map(|bytes| text_record(&bytes))
            .unwrap_or_else(|| key.to_string());

        let symbolic_sequence = match self.read_companion(
            self.symbolic.as_ref(),
            StoreKind::Symbolic,
            key,
        )? {
            Some(bytes) => {
                let symbolic = text_record(&bytes);
                if symbolic.len() != sequence.len() {
                    return Err(CatalogError::FieldLength {
                        key,
                        store: StoreKind::Symbolic,
                        expected: sequence.len(),
                        actual: symbolic.len(),
                    });
                }
                symbolic
            }
            None => String::new(),
        };

        let coordinates = match self.read_companion(
            self.coordinates.as_ref(),
            StoreKind::Coordinates,
            key,
        )? {
            Some(bytes) => codec::decode(&bytes, sequence.len())
                .map_err(|source| CatalogError::Codec { key, source })?,
            None => Vec::new(),
        };

        Ok(Entry {
            key,
            name,
            sequence,
            symbolic_sequence,
            coordinates,
            internal_index: index,
        })
    }

    /// Materialize the entry with an external key
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::KeyNotFound` if the key is not in the sequence index, or
    /// any error of [`Catalog::get_by_index`].
    pub fn get_by_key(&self, key: u32) -> Result<Entry, CatalogError> {
        let index = self
            .primary
            .index_of(key)
            .ok_or(CatalogError::KeyNotFound(key))?;
        self.get_by_index(index)
    }

    /// Iterate over all entries in internal index order
    pub fn iter(&self) -> impl Iterator<Item = Result<Entry, CatalogError>> + '_ {
        (0..self.size()).map(|i| self.get_by_index(i))
    }

    fn read_companion(
        &self,
        store: Option<&ShardedStore>,
        kind: StoreKind,
        key: u32,
    ) -> Result<Option<Vec<u8>>, CatalogError> {
        let Some(store) = store else {
            return Ok(None);
        };
        let Some(index) = store.index_of(key) else {
            return Ok(None);
        };
        store
            .read(index)
            .map_err(|source| CatalogError::Store {
                store: kind,
                source,
            })
    }
}

impl std::fmt::Display for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "<Catalog path='{}' size={}>",
            self.path.display(),
            self.size()
        )
    }
}

fn open_companion(prefix: &Path, kind: StoreKind) -> Option<ShardedStore> {
    let path = kind.path_for(prefix);
    if !store_exists(&path) {
        debug!("No {kind} store at {}", path.display());
        return None;
    }

    match ShardedStore::open(&path) {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("Ignoring unreadable {kind} store {}: {e}", path.display());
            None
        }
    }
}

/// Decode a text record, dropping its line terminator
fn text_record(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches(['\n', '\r'])
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::{CatalogBuilder, EntryRecord};
    use crate::core::entry::Coordinate;
    use std::fs;

    fn record(key: u32, name: &str, sequence: &str) -> EntryRecord {
        #[allow(clippy::cast_precision_loss)]
        let coordinates = (0..sequence.len())
            .map(|i| Coordinate::new(3.8 * i as f32, 0.5 * i as f32, 0.0))
            .collect();
        EntryRecord {
            key,
            name: Some(name.to_string()),
            sequence: sequence.to_string(),
            symbolic_sequence: Some("D".repeat(sequence.len())),
            coordinates: Some(coordinates),
        }
    }

    fn build_catalog(dir: &Path) -> PathBuf {
        let prefix = dir.join("db");
        let mut builder = CatalogBuilder::new(&prefix);
        builder.add(record(10, "first", "ACDEF")).unwrap();
        builder.add(record(20, "second", "GHIKLMN")).unwrap();
        builder.add(record(30, "third", "PQ")).unwrap();
        builder.finish().unwrap();
        prefix
    }

    #[test]
    fn test_open_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(&build_catalog(dir.path())).unwrap();

        assert_eq!(catalog.size(), 3);
        assert_eq!(catalog.keys(), vec![10, 20, 30]);
        assert_eq!(
            catalog.companions(),
            Companions {
                names: true,
                coordinates: true,
                symbolic: true
            }
        );
        assert_eq!(catalog.max_residue_count(), 7);
        assert_eq!(catalog.residue_count(2), Some(2));
    }

    #[test]
    fn test_get_by_index_and_key() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(&build_catalog(dir.path())).unwrap();

        let entry = catalog.get_by_index(1).unwrap();
        assert_eq!(entry.key, 20);
        assert_eq!(entry.name, "second");
        assert_eq!(entry.sequence, "GHIKLMN");
        assert_eq!(entry.symbolic_sequence, "DDDDDDD");
        assert_eq!(entry.coordinates.len(), 7);
        assert_eq!(entry.internal_index, 1);

        let by_key = catalog.get_by_key(20).unwrap();
        assert_eq!(by_key, entry);
    }

    #[test]
    fn test_out_of_range_and_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = Catalog::open(&build_catalog(dir.path())).unwrap();

        assert!(matches!(
            catalog.get_by_index(3),
            Err(CatalogError::OutOfRange { index: 3, size: 3 })
        ));
        assert!(matches!(
            catalog.get_by_key(99),
            Err(CatalogError::KeyNotFound(99))
        ));
    }

    #[test]
    fn test_missing_primary_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = Catalog::open(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, CatalogError::NotFound(_)));
    }

    #[test]
    fn test_missing_companions_degrade_fields() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = build_catalog(dir.path());
        for kind in [StoreKind::Names, StoreKind::Coordinates, StoreKind::Symbolic] {
            let path = kind.path_for(&prefix);
            fs::remove_file(crate::catalog::shard::index_path(&path)).unwrap();
        }

        let catalog = Catalog::open(&prefix).unwrap();
        assert_eq!(
            catalog.companions(),
            Companions {
                names: false,
                coordinates: false,
                symbolic: false
            }
        );

        let entry = catalog.get_by_index(0).unwrap();
        assert_eq!(entry.name, "10");
        assert_eq!(entry.sequence, "ACDEF");
        assert!(entry.symbolic_sequence.is_empty());
        assert!(entry.coordinates.is_empty());
    }

    #[test]
    fn test_coordinate_count_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = build_catalog(dir.path());

        // Point key 30 (2 residues) at the coordinate record of key 10 (5 residues)
        let ca_path = StoreKind::Coordinates.path_for(&prefix);
        let index_path = crate::catalog::shard::index_path(&ca_path);
        let text = fs::read_to_string(&index_path).unwrap();
        let first: Vec<&str> = text.lines().next().unwrap().split('\t').collect();
        let rewritten: String = text
            .lines()
            .map(|line| {
                if line.starts_with("30\t") {
                    format!("30\t{}\t{}\n", first[1], first[2])
                } else {
                    format!("{line}\n")
                }
            })
            .collect();
        fs::write(&index_path, rewritten).unwrap();

        let catalog = Catalog::open(&prefix).unwrap();
        assert!(matches!(
            catalog.get_by_key(30),
            Err(CatalogError::Codec { key: 30, .. })
        ));
        assert!(catalog.get_by_key(10).is_ok());
    }

    #[test]
    fn test_sequence_length_follows_the_index() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("db");
        // Second record lacks its line terminator
        fs::write(&prefix, b"ACD\n\0EFGH\0").unwrap();
        fs::write(
            crate::catalog::shard::index_path(&prefix),
            "1\t0\t5\n2\t5\t5\n",
        )
        .unwrap();

        let catalog = Catalog::open(&prefix).unwrap();
        assert_eq!(catalog.max_residue_count(), 3);
        for index in 0..catalog.size() {
            let entry = catalog.get_by_index(index).unwrap();
            assert_eq!(Some(entry.sequence.len()), catalog.residue_count(index));
        }
        assert_eq!(catalog.get_by_key(1).unwrap().sequence, "ACD");
        assert_eq!(catalog.get_by_key(2).unwrap().sequence, "EFG");
    }

    #[test]
    fn test_sharded_catalog_reads_like_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let single = build_catalog(dir.path());

        let sharded = dir.path().join("sharded");
        let mut builder = CatalogBuilder::new(&sharded).shards(2);
        builder.add(record(10, "first", "ACDEF")).unwrap();
        builder.add(record(20, "second", "GHIKLMN")).unwrap();
        builder.add(record(30, "third", "PQ")).unwrap();
        builder.finish().unwrap();

        let a = Catalog::open(&single).unwrap();
        let b = Catalog::open(&sharded).unwrap();
        assert_eq!(b.shard_count(), 2);
        for i in 0..a.size() {
            assert_eq!(a.get_by_index(i).unwrap(), b.get_by_index(i).unwrap());
        }
    }
}
