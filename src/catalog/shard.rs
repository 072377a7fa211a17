//! Read-only record store split over one or more data files.
//!
//! A store at path `P` keeps its data either in `P` or in shards `P.0`, `P.1`, ...,
//! and its offset index in `P.index`. Offsets in the index are global: shard `k`
//! starts at the combined size of shards `0..k`. Every record lives entirely inside
//! one shard and ends with a NUL byte.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::index::{IndexRecord, StoreIndex};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid index at line {line}: {message}")]
    InvalidIndex { line: usize, message: String },

    #[error("Record {index} (key {key}) spans bytes {offset}..{end} outside of its data shard")]
    RecordOutOfBounds {
        index: usize,
        key: u32,
        offset: u64,
        end: u64,
    },
}

/// Suffix appended to a store path to locate its index
pub const INDEX_SUFFIX: &str = ".index";

#[derive(Debug)]
struct Shard {
    path: PathBuf,
    file: File,
    start: u64,
    len: u64,
}

impl Shard {
    fn end(&self) -> u64 {
        self.start + self.len
    }
}

/// An opened record store: offset index plus data shards
#[derive(Debug)]
pub struct ShardedStore {
    path: PathBuf,
    index: StoreIndex,
    shards: Vec<Shard>,
}

impl ShardedStore {
    /// Open the store whose data lives at `path` (or `path.0`, `path.1`, ...)
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the index or the data is missing,
    /// `StoreError::InvalidIndex` if the index cannot be parsed, or
    /// `StoreError::RecordOutOfBounds` if a record does not fit inside a shard.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let index_path = index_path(path);
        if !index_path.is_file() {
            return Err(StoreError::NotFound(index_path));
        }

        let shard_paths = data_paths(path);
        if shard_paths.is_empty() {
            return Err(StoreError::NotFound(path.to_path_buf()));
        }

        let index = StoreIndex::parse(BufReader::new(File::open(&index_path)?))?;

        let mut shards = Vec::with_capacity(shard_paths.len());
        let mut start = 0u64;
        for shard_path in shard_paths {
            let file = File::open(&shard_path)?;
            let len = file.metadata()?.len();
            shards.push(Shard {
                path: shard_path,
                file,
                start,
                len,
            });
            start += len;
        }

        let store = Self {
            path: path.to_path_buf(),
            index,
            shards,
        };
        store.check_bounds()?;
        Ok(store)
    }

    /// Data path this store was opened from
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Shard data files, in offset order
    pub fn shard_paths(&self) -> impl Iterator<Item = &Path> {
        self.shards.iter().map(|s| s.path.as_path())
    }

    #[must_use]
    pub fn key(&self, index: usize) -> Option<u32> {
        self.index.get(index).map(|r| r.key)
    }

    #[must_use]
    pub fn index_of(&self, key: u32) -> Option<usize> {
        self.index.index_of(key)
    }

    /// Record length from the index, including the trailing NUL
    #[must_use]
    pub fn record_len(&self, index: usize) -> Option<u64> {
        self.index.get(index).map(|r| r.length)
    }

    pub fn keys(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.records().map(|r| r.key)
    }

    /// Read the payload of a record (without its trailing NUL) from disk.
    ///
    /// Returns `Ok(None)` when `index` is out of range.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if the shard cannot be read.
    ///
    /// Reads are positional, so one store can serve several threads at once.
    pub fn read(&self, index: usize) -> Result<Option<Vec<u8>>, StoreError> {
        let Some(record) = self.index.get(index) else {
            return Ok(None);
        };
        if record.length == 0 {
            return Ok(Some(Vec::new()));
        }
        let shard = self.shard_for(index, record)?;

        let mut buffer = vec![0u8; usize::try_from(record.length).unwrap_or(usize::MAX)];
        read_exact_at(&shard.file, &mut buffer, record.offset - shard.start)?;

        if buffer.last() == Some(&0) {
            buffer.pop();
        }
        Ok(Some(buffer))
    }

    fn shard_for(&self, index: usize, record: &IndexRecord) -> Result<&Shard, StoreError> {
        let position = self.shards.partition_point(|s| s.end() <= record.offset);
        self.shards
            .get(position)
            .filter(|s| record.offset >= s.start && record.end() <= s.end())
            .ok_or(StoreError::RecordOutOfBounds {
                index,
                key: record.key,
                offset: record.offset,
                end: record.end(),
            })
    }

    fn check_bounds(&self) -> Result<(), StoreError> {
        for (index, record) in self.index.records().enumerate() {
            if record.length > 0 {
                self.shard_for(index, record)?;
            }
        }
        Ok(())
    }
}

/// Path of the index belonging to a store data path
#[must_use]
pub fn index_path(path: &Path) -> PathBuf {
    append_suffix(path, INDEX_SUFFIX)
}

/// Path of shard `n` of a store data path
#[must_use]
pub fn shard_path(path: &Path, n: usize) -> PathBuf {
    append_suffix(path, &format!(".{n}"))
}

/// Append a raw suffix to a path (`db` + `_h` -> `db_h`)
#[must_use]
pub fn append_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut os = path.as_os_str().to_owned();
    os.push(suffix);
    PathBuf::from(os)
}

/// True when both the index and some data for a store exist
#[must_use]
pub fn store_exists(path: &Path) -> bool {
    index_path(path).is_file() && !data_paths(path).is_empty()
}

#[cfg(unix)]
fn read_exact_at(file: &File, buffer: &mut [u8], offset: u64) -> std::io::Result<()> {
    std::os::unix::fs::FileExt::read_exact_at(file, buffer, offset)
}

#[cfg(windows)]
fn read_exact_at(file: &File, mut buffer: &mut [u8], mut offset: u64) -> std::io::Result<()> {
    use std::os::windows::fs::FileExt;

    while !buffer.is_empty() {
        match file.seek_read(buffer, offset) {
            Ok(0) => return Err(std::io::ErrorKind::UnexpectedEof.into()),
            Ok(n) => {
                buffer = &mut buffer[n..];
                offset += n as u64;
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

fn data_paths(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        return vec![path.to_path_buf()];
    }

    (0..)
        .map(|n| shard_path(path, n))
        .take_while(|p| p.is_file())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_store(path: &Path, shards: &[&[u8]], index: &str) {
        if shards.len() == 1 {
            fs::write(path, shards[0]).unwrap();
        } else {
            for (n, data) in shards.iter().enumerate() {
                fs::write(shard_path(path, n), data).unwrap();
            }
        }
        fs::write(index_path(path), index).unwrap();
    }

    #[test]
    fn test_open_single_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        write_store(&path, &[b"ACD\n\0EFGH\n\0"], "3\t0\t5\n8\t5\t6\n");

        let store = ShardedStore::open(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.shard_count(), 1);
        assert_eq!(store.key(1), Some(8));
        assert_eq!(store.index_of(3), Some(0));
        assert_eq!(store.record_len(1), Some(6));
        assert_eq!(store.read(0).unwrap().unwrap(), b"ACD\n");
        assert_eq!(store.read(1).unwrap().unwrap(), b"EFGH\n");
        assert!(store.read(2).unwrap().is_none());
    }

    #[test]
    fn test_open_multi_shard_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        write_store(
            &path,
            &[b"ACD\n\0", b"EFGH\n\0KL\n\0"],
            "1\t0\t5\n2\t5\t6\n3\t11\t4\n",
        );

        let store = ShardedStore::open(&path).unwrap();
        assert_eq!(store.shard_count(), 2);
        assert_eq!(store.read(0).unwrap().unwrap(), b"ACD\n");
        assert_eq!(store.read(1).unwrap().unwrap(), b"EFGH\n");
        assert_eq!(store.read(2).unwrap().unwrap(), b"KL\n");
    }

    #[test]
    fn test_missing_index_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        fs::write(&path, b"ACD\n\0").unwrap();

        let err = ShardedStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(p) if p == index_path(&path)));
    }

    #[test]
    fn test_missing_data_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        fs::write(index_path(&path), "1\t0\t5\n").unwrap();

        let err = ShardedStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(p) if p == path));
    }

    #[test]
    fn test_record_past_end_of_data_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        write_store(&path, &[b"ACD\n\0"], "1\t0\t5\n2\t5\t6\n");

        let err = ShardedStore::open(&path).unwrap_err();
        assert!(matches!(err, StoreError::RecordOutOfBounds { key: 2, .. }));
    }

    #[test]
    fn test_record_spanning_shards_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");
        write_store(&path, &[b"ACD", b"\n\0"], "1\t0\t5\n");

        assert!(matches!(
            ShardedStore::open(&path),
            Err(StoreError::RecordOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_concurrent_reads_match_sequential_reads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db");

        let mut data = Vec::new();
        let mut index = String::new();
        for key in 0..64u32 {
            let record = format!("{}\n\0", "ACDEFGHIKL".repeat(1 + key as usize % 7));
            index.push_str(&format!("{key}\t{}\t{}\n", data.len(), record.len()));
            data.extend_from_slice(record.as_bytes());
        }
        write_store(&path, &[&data], &index);
        let store = ShardedStore::open(&path).unwrap();
        let expected: Vec<Vec<u8>> = (0..store.len())
            .map(|i| store.read(i).unwrap().unwrap())
            .collect();

        std::thread::scope(|scope| {
            for t in 0..8 {
                let store = &store;
                let expected = &expected;
                scope.spawn(move || {
                    for round in 0..500 {
                        let i = (t * 7 + round * 13) % expected.len();
                        assert_eq!(store.read(i).unwrap().unwrap(), expected[i]);
                    }
                });
            }
        });
    }

    #[test]
    fn test_append_suffix() {
        let path = Path::new("/data/pdb");
        assert_eq!(append_suffix(path, "_h"), PathBuf::from("/data/pdb_h"));
        assert_eq!(index_path(path), PathBuf::from("/data/pdb.index"));
        assert_eq!(shard_path(path, 3), PathBuf::from("/data/pdb.3"));
    }
}
