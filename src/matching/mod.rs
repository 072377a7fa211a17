//! Structural search and clustering.
//!
//! - [`Aligner`]: the structural comparison capability, with an allocate-once,
//!   query-once, score-many lifecycle
//! - [`TmAligner`]: gapless TM-score aligner implementing [`Aligner`]
//! - [`SearchEngine`]: exhaustive search of one query against a catalog
//! - [`ClusterEngine`]: partition of a whole catalog by greedy set cover
//!
//! ## Search
//!
//! Every entry with coordinates is aligned against the query. An entry becomes a hit
//! when the alignment score and both coverages (aligned residues over query length and
//! over target length) reach their thresholds. Hits are ranked by score, then key.
//! Entries that fail to decode or align are skipped and counted.
//!
//! ## Clustering
//!
//! Each entry is searched against the catalog to find its neighbours. Representatives
//! are then chosen greedily by the number of neighbours not yet claimed by an earlier
//! cluster.
//!
//! ## Example
//!
//! ```rust,no_run
//! use foldscan::{Catalog, SearchConfig, SearchEngine, TmAligner, UNLIMITED_HITS};
//! use foldscan::core::Query;
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Path::new("/data/pdb")).unwrap();
//! let query = Query::from(catalog.get_by_index(0).unwrap());
//!
//! let mut aligner = TmAligner::new();
//! let engine = SearchEngine::new(&catalog);
//! let hits = engine
//!     .search(&mut aligner, &query, &SearchConfig::new(0.5, 0.8, UNLIMITED_HITS))
//!     .unwrap();
//!
//! for hit in &hits {
//!     println!("{} {:.3} ({})", hit.target_name, hit.score, hit.confidence());
//! }
//! ```

pub mod aligner;
pub mod cluster;
pub mod engine;
pub mod scoring;
pub mod tmalign;

#[cfg(test)]
pub(crate) mod testing;

pub use aligner::{AlignError, Aligner, Alignment};
pub use cluster::{ClusterConfig, ClusterEngine, ClusterError, ClusterMode};
pub use engine::{SearchConfig, SearchEngine, SearchError, SearchOutcome, UNLIMITED_HITS};
pub use tmalign::TmAligner;
