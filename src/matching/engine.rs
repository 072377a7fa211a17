use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::catalog::store::{Catalog, CatalogError};
use crate::core::entry::{Entry, Query};
use crate::core::types::Hit;
use crate::matching::aligner::{AlignError, Aligner, Alignment};
use crate::matching::scoring::{coverage, rank_hits, Thresholds};
use crate::utils::validation::{validate_fraction, validate_structure};

/// `max_hits` value meaning "return every accepted hit"
pub const UNLIMITED_HITS: usize = 0;

/// Default minimum alignment score
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.5;

/// Default minimum query and target coverage
pub const DEFAULT_COVERAGE_THRESHOLD: f64 = 0.0;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Structures of {required} residues exceed the aligner capacity of {capacity}")]
    ResourceExhausted { required: usize, capacity: usize },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<AlignError> for SearchError {
    fn from(e: AlignError) -> Self {
        match e {
            AlignError::CapacityExceeded { required, capacity } => {
                Self::ResourceExhausted { required, capacity }
            }
            other => Self::InvalidArgument(other.to_string()),
        }
    }
}

/// Thresholds and limits for one search
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Minimum alignment score in [0, 1]
    pub score_threshold: f64,

    /// Minimum coverage of both query and target, in [0, 1]
    pub coverage_threshold: f64,

    /// Maximum number of hits to return; [`UNLIMITED_HITS`] for no limit
    pub max_hits: usize,

    /// Replace the aligner's distance with a refined RMSD for accepted hits
    #[serde(default = "default_refine")]
    pub refine_distance: bool,
}

fn default_refine() -> bool {
    true
}

impl SearchConfig {
    #[must_use]
    pub fn new(score_threshold: f64, coverage_threshold: f64, max_hits: usize) -> Self {
        Self {
            score_threshold,
            coverage_threshold,
            max_hits,
            refine_distance: true,
        }
    }

    #[must_use]
    pub fn with_refine_distance(mut self, refine: bool) -> Self {
        self.refine_distance = refine;
        self
    }

    #[must_use]
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            score: self.score_threshold,
            coverage: self.coverage_threshold,
        }
    }

    /// Check that both thresholds are finite fractions
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidArgument` naming the offending threshold.
    pub fn validate(&self) -> Result<(), SearchError> {
        validate_fraction("score threshold", self.score_threshold)
            .and_then(|_| validate_fraction("coverage threshold", self.coverage_threshold))
            .map(|_| ())
            .map_err(|e| SearchError::InvalidArgument(e.to_string()))
    }
}

/// Counters for one scan over a catalog
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    /// Entries visited
    pub scanned: usize,
    /// Entries without coordinates
    pub skipped_without_coordinates: usize,
    /// Entries that failed to decode or align
    pub failed: usize,
    /// Entries passing all thresholds, before `max_hits` truncation
    pub accepted: usize,
}

impl std::ops::AddAssign for ScanStats {
    fn add_assign(&mut self, other: Self) {
        self.scanned += other.scanned;
        self.skipped_without_coordinates += other.skipped_without_coordinates;
        self.failed += other.failed;
        self.accepted += other.accepted;
    }
}

/// Ranked hits plus the counters of the scan that produced them
#[derive(Debug, Clone, Default, Serialize)]
pub struct SearchOutcome {
    pub hits: Vec<Hit>,
    pub stats: ScanStats,
}

/// Exhaustive structural search over a catalog.
///
/// The engine borrows the catalog; the aligner is supplied per call so that one
/// aligner instance is never shared between two searches.
pub struct SearchEngine<'a> {
    catalog: &'a Catalog,
}

impl<'a> SearchEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        self.catalog
    }

    /// Find every entry whose alignment to `query` passes the thresholds, best first
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidArgument` for a malformed query or thresholds, or
    /// `SearchError::ResourceExhausted` if the aligner cannot hold the longest structure.
    /// Failures on individual entries are skipped.
    pub fn search<A: Aligner + ?Sized>(
        &self,
        aligner: &mut A,
        query: &Query,
        config: &SearchConfig,
    ) -> Result<Vec<Hit>, SearchError> {
        self.search_with_stats(aligner, query, config)
            .map(|outcome| outcome.hits)
    }

    /// Like [`SearchEngine::search`], also returning the scan counters
    ///
    /// # Errors
    ///
    /// See [`SearchEngine::search`].
    pub fn search_with_stats<A: Aligner + ?Sized>(
        &self,
        aligner: &mut A,
        query: &Query,
        config: &SearchConfig,
    ) -> Result<SearchOutcome, SearchError> {
        validate_search(query, config)?;
        if self.catalog.is_empty() {
            return Ok(SearchOutcome::default());
        }

        let max_len = query.len().max(self.catalog.max_residue_count());
        prepare(aligner, query, max_len)?;

        let mut scan = Scan::new(query, config);
        for index in 0..self.catalog.size() {
            scan.stats.scanned += 1;
            match self.catalog.get_by_index(index) {
                Ok(entry) => scan.consider(aligner, &entry),
                Err(e) => {
                    debug!("Skipping entry at index {index}: {e}");
                    scan.stats.failed += 1;
                }
            }
        }

        Ok(scan.finish(&query.name))
    }

    /// Run the same scan over entries that are already in memory
    pub(crate) fn search_entries<A: Aligner + ?Sized>(
        aligner: &mut A,
        query: &Query,
        entries: &[Entry],
        config: &SearchConfig,
    ) -> Result<SearchOutcome, SearchError> {
        validate_search(query, config)?;
        if entries.is_empty() {
            return Ok(SearchOutcome::default());
        }

        let max_len = entries
            .iter()
            .map(Entry::len)
            .fold(query.len(), usize::max);
        prepare(aligner, query, max_len)?;

        let mut scan = Scan::new(query, config);
        for entry in entries {
            scan.stats.scanned += 1;
            scan.consider(aligner, entry);
        }

        Ok(scan.finish(&query.name))
    }
}

fn validate_search(query: &Query, config: &SearchConfig) -> Result<(), SearchError> {
    config.validate()?;
    validate_structure("query", &query.coordinates, &query.sequence)
        .map_err(|e| SearchError::InvalidArgument(e.to_string()))
}

fn prepare<A: Aligner + ?Sized>(
    aligner: &mut A,
    query: &Query,
    max_len: usize,
) -> Result<(), SearchError> {
    aligner.reserve(max_len)?;
    aligner.set_query(&query.coordinates, query.sequence.as_bytes())?;
    Ok(())
}

/// Accumulates accepted hits and counters while a scan runs
struct Scan {
    query_len: usize,
    thresholds: Thresholds,
    max_hits: usize,
    refine: bool,
    hits: Vec<Hit>,
    stats: ScanStats,
}

impl Scan {
    fn new(query: &Query, config: &SearchConfig) -> Self {
        Self {
            query_len: query.len(),
            thresholds: config.thresholds(),
            max_hits: config.max_hits,
            refine: config.refine_distance,
            hits: Vec::new(),
            stats: ScanStats::default(),
        }
    }

    fn consider<A: Aligner + ?Sized>(&mut self, aligner: &mut A, entry: &Entry) {
        if !entry.has_coordinates() {
            self.stats.skipped_without_coordinates += 1;
            return;
        }

        let alignment = match aligner.score_against(&entry.coordinates, entry.sequence.as_bytes()) {
            Ok(alignment) => alignment,
            Err(e) => {
                debug!("Alignment against {} failed: {e}", entry.key);
                self.stats.failed += 1;
                return;
            }
        };

        let query_coverage = coverage(alignment.aligned_length, self.query_len);
        let target_coverage = coverage(alignment.aligned_length, entry.len());
        if !self
            .thresholds
            .accept(alignment.score, query_coverage, target_coverage)
        {
            return;
        }

        let distance_metric = if self.refine {
            match aligner.refine(&entry.coordinates, &alignment) {
                Ok(rmsd) => Some(rmsd),
                Err(e) => {
                    debug!("Refinement against {} failed: {e}", entry.key);
                    alignment.distance
                }
            }
        } else {
            alignment.distance
        };

        self.stats.accepted += 1;
        self.hits.push(to_hit(
            entry,
            alignment,
            distance_metric,
            query_coverage,
            target_coverage,
        ));
    }

    fn finish(mut self, query_name: &str) -> SearchOutcome {
        self.hits.sort_by(rank_hits);
        if self.max_hits != UNLIMITED_HITS {
            self.hits.truncate(self.max_hits);
        }

        debug!(
            "Search for '{query_name}': {} scanned, {} without coordinates, {} failed, {} accepted, {} returned",
            self.stats.scanned,
            self.stats.skipped_without_coordinates,
            self.stats.failed,
            self.stats.accepted,
            self.hits.len()
        );

        SearchOutcome {
            hits: self.hits,
            stats: self.stats,
        }
    }
}

fn to_hit(
    entry: &Entry,
    alignment: Alignment,
    distance_metric: Option<f64>,
    query_coverage: f64,
    target_coverage: f64,
) -> Hit {
    Hit {
        target_key: entry.key,
        target_index: entry.internal_index,
        target_name: entry.name.clone(),
        score: alignment.score,
        distance_metric,
        aligned_length: alignment.aligned_length,
        query_coverage,
        target_coverage,
        query_start: alignment.query_start,
        query_end: alignment.query_end,
        target_start: alignment.target_start,
        target_end: alignment.target_end,
        alignment_trace: alignment.trace,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::builder::{CatalogBuilder, EntryRecord};
    use crate::core::entry::Coordinate;
    use crate::matching::testing::TableAligner;
    use std::path::Path;

    #[allow(clippy::cast_precision_loss)]
    fn coords(n: usize) -> Vec<Coordinate> {
        (0..n).map(|i| Coordinate::new(3.8 * i as f32, 0.0, 0.0)).collect()
    }

    fn record(key: u32, sequence: &str, with_coordinates: bool) -> EntryRecord {
        EntryRecord {
            key,
            name: Some(format!("s{key}")),
            sequence: sequence.to_string(),
            symbolic_sequence: None,
            coordinates: with_coordinates.then(|| coords(sequence.len())),
        }
    }

    fn build(prefix: &Path, records: Vec<EntryRecord>) -> Catalog {
        let mut builder = CatalogBuilder::new(prefix);
        for r in records {
            builder.add(r).unwrap();
        }
        builder.finish().unwrap();
        Catalog::open(prefix).unwrap()
    }

    fn query(sequence: &str) -> Query {
        Query::new("q", sequence, coords(sequence.len()))
    }

    fn three_entry_catalog(dir: &Path) -> Catalog {
        build(
            &dir.join("db"),
            vec![
                record(10, "AAAA", true),
                record(20, "CCCC", true),
                record(30, "GGGGGG", true),
            ],
        )
    }

    fn three_entry_aligner() -> TableAligner {
        TableAligner::default()
            .with("AAAA", "CCCC", 0.9, 4)
            .with("AAAA", "GGGGGG", 0.6, 4)
    }

    #[test]
    fn test_identical_entry_is_found_with_full_score() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = three_entry_aligner();

        let hits = engine
            .search(&mut aligner, &query("AAAA"), &SearchConfig::new(1.0, 1.0, UNLIMITED_HITS))
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].target_key, 10);
        assert!((hits[0].score - 1.0).abs() < 1e-12);
        assert!((hits[0].query_coverage - 1.0).abs() < 1e-12);
        assert!((hits[0].target_coverage - 1.0).abs() < 1e-12);
        assert_eq!(hits[0].distance_metric, Some(0.25));
    }

    #[test]
    fn test_hits_are_ranked_and_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = three_entry_aligner();

        let hits = engine
            .search(&mut aligner, &query("AAAA"), &SearchConfig::new(0.5, 0.0, UNLIMITED_HITS))
            .unwrap();
        let keys: Vec<u32> = hits.iter().map(|h| h.target_key).collect();
        assert_eq!(keys, vec![10, 20, 30]);

        let hits = engine
            .search(&mut aligner, &query("AAAA"), &SearchConfig::new(0.5, 0.0, 2))
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_raising_score_threshold_never_adds_hits() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = three_entry_aligner();

        let mut previous = usize::MAX;
        for threshold in [0.0, 0.3, 0.6, 0.61, 0.9, 0.95, 1.0] {
            let config = SearchConfig::new(threshold, 0.0, UNLIMITED_HITS);
            let count = engine.search(&mut aligner, &query("AAAA"), &config).unwrap().len();
            assert!(count <= previous, "threshold {threshold}");
            previous = count;
        }
    }

    #[test]
    fn test_full_coverage_excludes_entries_of_other_length() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = three_entry_aligner();

        let hits = engine
            .search(&mut aligner, &query("AAAA"), &SearchConfig::new(0.5, 1.0, UNLIMITED_HITS))
            .unwrap();
        let keys: Vec<u32> = hits.iter().map(|h| h.target_key).collect();
        assert_eq!(keys, vec![10, 20]);
    }

    #[test]
    fn test_failures_and_missing_coordinates_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = build(
            &dir.path().join("db"),
            vec![
                record(1, "AAAA", true),
                record(2, "CCCC", false),
                record(3, "GGGG", true),
            ],
        );
        let engine = SearchEngine::new(&catalog);
        let mut aligner = TableAligner {
            failing: vec!["GGGG".to_string()],
            ..TableAligner::default()
        };

        let outcome = engine
            .search_with_stats(&mut aligner, &query("AAAA"), &SearchConfig::new(0.0, 0.0, UNLIMITED_HITS))
            .unwrap();
        assert_eq!(
            outcome.stats,
            ScanStats {
                scanned: 3,
                skipped_without_coordinates: 1,
                failed: 1,
                accepted: 1,
            }
        );
        assert_eq!(outcome.hits.len(), 1);
    }

    #[test]
    fn test_refinement_can_be_disabled() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = three_entry_aligner();

        let config = SearchConfig::new(0.5, 0.0, UNLIMITED_HITS).with_refine_distance(false);
        let hits = engine.search(&mut aligner, &query("AAAA"), &config).unwrap();
        assert!(hits.iter().all(|h| h.distance_metric == Some(9.0)));
        assert_eq!(aligner.refined, 0);
    }

    #[test]
    fn test_empty_catalog_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = build(&dir.path().join("db"), Vec::new());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = TableAligner::default();

        for (score, cov) in [(0.0, 0.0), (0.5, 0.8), (1.0, 1.0)] {
            let hits = engine
                .search(&mut aligner, &query("AAAA"), &SearchConfig::new(score, cov, UNLIMITED_HITS))
                .unwrap();
            assert!(hits.is_empty());
        }
        assert!(aligner.query.is_none());
    }

    #[test]
    fn test_invalid_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = three_entry_aligner();

        let bad_threshold = SearchConfig::new(1.1, 0.0, UNLIMITED_HITS);
        assert!(matches!(
            engine.search(&mut aligner, &query("AAAA"), &bad_threshold),
            Err(SearchError::InvalidArgument(_))
        ));

        let mismatched = Query::new("q", "AAAA", coords(3));
        assert!(matches!(
            engine.search(&mut aligner, &mismatched, &SearchConfig::new(0.5, 0.0, 10)),
            Err(SearchError::InvalidArgument(_))
        ));

        let empty = Query::new("q", "", Vec::new());
        assert!(matches!(
            engine.search(&mut aligner, &empty, &SearchConfig::new(0.5, 0.0, 10)),
            Err(SearchError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_resource_exhausted_when_catalog_exceeds_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let engine = SearchEngine::new(&catalog);
        let mut aligner = TableAligner {
            max_capacity: Some(5),
            ..TableAligner::default()
        };

        let result = engine.search(&mut aligner, &query("AAAA"), &SearchConfig::new(0.5, 0.0, 10));
        assert!(matches!(
            result,
            Err(SearchError::ResourceExhausted {
                required: 6,
                capacity: 5
            })
        ));
    }

    #[test]
    fn test_search_entries_matches_catalog_scan() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = three_entry_catalog(dir.path());
        let entries: Vec<Entry> = catalog.iter().collect::<Result<_, _>>().unwrap();
        let config = SearchConfig::new(0.5, 0.0, UNLIMITED_HITS);

        let from_catalog = SearchEngine::new(&catalog)
            .search_with_stats(&mut three_entry_aligner(), &query("AAAA"), &config)
            .unwrap();
        let from_entries =
            SearchEngine::search_entries(&mut three_entry_aligner(), &query("AAAA"), &entries, &config)
                .unwrap();

        assert_eq!(from_catalog.hits, from_entries.hits);
        assert_eq!(from_catalog.stats, from_entries.stats);
    }

    #[test]
    fn test_config_serde_defaults_refinement() {
        let config: SearchConfig = serde_json::from_str(
            r#"{"score_threshold": 0.3, "coverage_threshold": 0.8, "max_hits": 0}"#,
        )
        .unwrap();
        assert_eq!(config, SearchConfig::new(0.3, 0.8, UNLIMITED_HITS));
    }
}
