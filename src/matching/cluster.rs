//! Whole-catalog clustering.
//!
//! Clustering runs in two phases. The first searches every entry against the whole
//! catalog and records, for each entry, the other entries that pass the thresholds.
//! The second partitions the catalog from that adjacency: greedy set cover picks the
//! entry with the most unclaimed neighbours as the next representative and claims its
//! neighbours, while connected mode also claims neighbours of neighbours.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::catalog::store::{Catalog, CatalogError};
use crate::core::entry::{Entry, Query};
use crate::core::types::Cluster;
use crate::matching::aligner::Aligner;
use crate::matching::engine::{
    ScanStats, SearchConfig, SearchEngine, SearchError, UNLIMITED_HITS,
};

/// Default minimum alignment score for two entries to be neighbours
pub const DEFAULT_CLUSTER_SCORE_THRESHOLD: f64 = 0.5;

/// Default minimum query and target coverage for two entries to be neighbours
pub const DEFAULT_CLUSTER_COVERAGE_THRESHOLD: f64 = 0.8;

/// Log progress every this many queries
const PROGRESS_INTERVAL: usize = 100;

#[derive(Error, Debug)]
pub enum ClusterError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Structures of {required} residues exceed the aligner capacity of {capacity}")]
    ResourceExhausted { required: usize, capacity: usize },

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl From<SearchError> for ClusterError {
    fn from(e: SearchError) -> Self {
        match e {
            SearchError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            SearchError::ResourceExhausted { required, capacity } => {
                Self::ResourceExhausted { required, capacity }
            }
            SearchError::Catalog(e) => Self::Catalog(e),
        }
    }
}

/// How clusters are grown from a representative
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum ClusterMode {
    /// Representative plus its direct unclaimed neighbours
    #[default]
    SetCover,
    /// Representative plus everything reachable through unclaimed neighbours
    Connected,
}

impl std::fmt::Display for ClusterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SetCover => write!(f, "set-cover"),
            Self::Connected => write!(f, "connected"),
        }
    }
}

/// Configuration for a clustering run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub score_threshold: f64,
    pub coverage_threshold: f64,
    #[serde(default)]
    pub mode: ClusterMode,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            score_threshold: DEFAULT_CLUSTER_SCORE_THRESHOLD,
            coverage_threshold: DEFAULT_CLUSTER_COVERAGE_THRESHOLD,
            mode: ClusterMode::default(),
        }
    }
}

impl ClusterConfig {
    #[must_use]
    pub fn new(score_threshold: f64, coverage_threshold: f64) -> Self {
        Self {
            score_threshold,
            coverage_threshold,
            mode: ClusterMode::default(),
        }
    }

    #[must_use]
    pub fn with_mode(mut self, mode: ClusterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Search configuration used for every query of the first phase
    fn search_config(&self) -> SearchConfig {
        SearchConfig::new(self.score_threshold, self.coverage_threshold, UNLIMITED_HITS)
            .with_refine_distance(false)
    }
}

/// Directed neighbour lists over internal indices.
///
/// `neighbors(i)` holds the entries that passed the thresholds when `i` was the query.
/// The relation is not symmetrized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Adjacency {
    neighbors: Vec<Vec<usize>>,
}

impl Adjacency {
    /// Build from raw neighbour lists.
    ///
    /// Lists are sorted and deduplicated; self-references and indices outside the
    /// node range are dropped.
    #[must_use]
    pub fn new(mut neighbors: Vec<Vec<usize>>) -> Self {
        let n = neighbors.len();
        for (i, list) in neighbors.iter_mut().enumerate() {
            list.retain(|&j| j != i && j < n);
            list.sort_unstable();
            list.dedup();
        }
        Self { neighbors }
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.neighbors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.neighbors.is_empty()
    }

    /// Neighbours of `index` in ascending order
    #[must_use]
    pub fn neighbors(&self, index: usize) -> &[usize] {
        self.neighbors.get(index).map_or(&[], Vec::as_slice)
    }

    /// Total number of directed edges
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.neighbors.iter().map(Vec::len).sum()
    }
}

/// One cluster over internal indices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexCluster {
    pub representative: usize,
    /// Ascending; never contains the representative
    pub members: Vec<usize>,
}

/// Partition the nodes of an adjacency into disjoint clusters covering every node.
///
/// Representatives are picked greedily: the unclaimed node with the most unclaimed
/// neighbours, lowest index first on ties.
#[must_use]
pub fn partition(adjacency: &Adjacency, mode: ClusterMode) -> Vec<IndexCluster> {
    let n = adjacency.len();
    let mut claimed = vec![false; n];
    let mut remaining = n;
    let mut clusters = Vec::new();

    while remaining > 0 {
        let Some(representative) = next_representative(adjacency, &claimed) else {
            break;
        };
        claimed[representative] = true;
        remaining -= 1;

        let mut members = Vec::new();
        match mode {
            ClusterMode::SetCover => {
                for &j in adjacency.neighbors(representative) {
                    if !claimed[j] {
                        claimed[j] = true;
                        members.push(j);
                    }
                }
            }
            ClusterMode::Connected => {
                let mut queue = VecDeque::from([representative]);
                while let Some(node) = queue.pop_front() {
                    for &j in adjacency.neighbors(node) {
                        if !claimed[j] {
                            claimed[j] = true;
                            members.push(j);
                            queue.push_back(j);
                        }
                    }
                }
                members.sort_unstable();
            }
        }

        remaining -= members.len();
        clusters.push(IndexCluster {
            representative,
            members,
        });
    }

    clusters
}

fn next_representative(adjacency: &Adjacency, claimed: &[bool]) -> Option<usize> {
    let mut best: Option<(usize, usize)> = None;
    for (i, _) in claimed.iter().enumerate().filter(|(_, c)| !**c) {
        let unclaimed = adjacency
            .neighbors(i)
            .iter()
            .filter(|&&j| !claimed[j])
            .count();
        if best.map_or(true, |(_, count)| unclaimed > count) {
            best = Some((i, unclaimed));
        }
    }
    best.map(|(i, _)| i)
}

/// Clusters plus the counters summed over every query of the run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ClusterOutcome {
    pub clusters: Vec<Cluster>,
    pub stats: ScanStats,
}

/// Partitions a whole catalog by structural similarity
pub struct ClusterEngine<'a> {
    catalog: &'a Catalog,
}

impl<'a> ClusterEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self { catalog }
    }

    /// Cluster every entry of the catalog
    ///
    /// # Errors
    ///
    /// Returns `ClusterError::InvalidArgument` for thresholds outside `[0, 1]`, or
    /// `ClusterError::ResourceExhausted` if the aligner cannot hold the longest entry.
    pub fn cluster<A: Aligner + ?Sized>(
        &self,
        aligner: &mut A,
        config: &ClusterConfig,
    ) -> Result<Vec<Cluster>, ClusterError> {
        self.cluster_with_stats(aligner, config)
            .map(|outcome| outcome.clusters)
    }

    /// Cluster every entry and report how the all-against-all scan went
    ///
    /// # Errors
    ///
    /// See [`ClusterEngine::cluster`].
    pub fn cluster_with_stats<A: Aligner + ?Sized>(
        &self,
        aligner: &mut A,
        config: &ClusterConfig,
    ) -> Result<ClusterOutcome, ClusterError> {
        config.search_config().validate()?;
        if self.catalog.is_empty() {
            return Ok(ClusterOutcome::default());
        }

        info!(
            "Clustering {} entries ({} mode, score >= {}, coverage >= {})",
            self.catalog.size(),
            config.mode,
            config.score_threshold,
            config.coverage_threshold
        );

        let entries = self.load_entries();
        let (adjacency, stats) = build_adjacency(aligner, &entries, config)?;
        let clusters: Vec<Cluster> = partition(&adjacency, config.mode)
            .into_iter()
            .map(|c| to_cluster(&entries, &c))
            .collect();

        info!(
            "Found {} clusters ({} singletons) from {} neighbour pairs",
            clusters.len(),
            clusters.iter().filter(|c| c.is_singleton()).count(),
            adjacency.edge_count()
        );
        info!(
            "Scanned {} pairs: {} failed, {} without coordinates",
            stats.scanned, stats.failed, stats.skipped_without_coordinates
        );
        Ok(ClusterOutcome { clusters, stats })
    }

    /// Compute only the neighbour lists
    ///
    /// # Errors
    ///
    /// See [`ClusterEngine::cluster`].
    pub fn adjacency<A: Aligner + ?Sized>(
        &self,
        aligner: &mut A,
        config: &ClusterConfig,
    ) -> Result<Adjacency, ClusterError> {
        config.search_config().validate()?;
        let entries = self.load_entries();
        build_adjacency(aligner, &entries, config).map(|(adjacency, _)| adjacency)
    }

    /// Materialize every entry once.
    ///
    /// Entries that fail to decode keep their key and name but lose their structure,
    /// so they end up as singletons.
    fn load_entries(&self) -> Vec<Entry> {
        (0..self.catalog.size())
            .map(|index| {
                self.catalog.get_by_index(index).unwrap_or_else(|e| {
                    warn!("Entry at index {index} cannot be read and will be a singleton: {e}");
                    let key = self
                        .catalog
                        .keys()
                        .get(index)
                        .copied()
                        .unwrap_or_default();
                    Entry {
                        key,
                        name: key.to_string(),
                        sequence: String::new(),
                        symbolic_sequence: String::new(),
                        coordinates: Vec::new(),
                        internal_index: index,
                    }
                })
            })
            .collect()
    }
}

fn build_adjacency<A: Aligner + ?Sized>(
    aligner: &mut A,
    entries: &[Entry],
    config: &ClusterConfig,
) -> Result<(Adjacency, ScanStats), ClusterError> {
    let search_config = config.search_config();
    let mut neighbors = vec![Vec::new(); entries.len()];
    let mut stats = ScanStats::default();

    for (i, entry) in entries.iter().enumerate() {
        if i > 0 && i % PROGRESS_INTERVAL == 0 {
            debug!("Searched {i} of {} entries", entries.len());
        }
        if !entry.has_coordinates() {
            continue;
        }

        let query = Query::from(entry);
        let outcome = match SearchEngine::search_entries(aligner, &query, entries, &search_config)
        {
            Ok(outcome) => outcome,
            Err(SearchError::InvalidArgument(msg)) => {
                debug!("Entry {} cannot be used as a query: {msg}", entry.key);
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        stats += outcome.stats;
        neighbors[i] = outcome
            .hits
            .iter()
            .map(|hit| hit.target_index)
            .filter(|&j| j != i)
            .collect();
    }

    Ok((Adjacency::new(neighbors), stats))
}

fn to_cluster(entries: &[Entry], cluster: &IndexCluster) -> Cluster {
    let representative = &entries[cluster.representative];
    let members: Vec<&Entry> = cluster.members.iter().map(|&j| &entries[j]).collect();

    Cluster {
        representative_key: representative.key,
        representative_index: representative.internal_index,
        representative_name: representative.name.clone(),
        member_keys: members.iter().map(|e| e.key).collect(),
        member_indices: members.iter().map(|e| e.internal_index).collect(),
        member_names: members.iter().map(|e| e.name.clone()).collect(),
    }
}
