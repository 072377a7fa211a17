//! # foldscan
//!
//! A library for structural similarity search and clustering over indexed protein
//! structure databases.
//!
//! A catalog stores, for every entry, an amino-acid sequence and optionally a name, a
//! structural-alphabet sequence, and C-alpha coordinates. `foldscan` aligns a query
//! structure against every entry of a catalog, or every entry against every other to
//! partition the catalog into clusters.
//!
//! ## Features
//!
//! - **Sharded catalogs**: Reads the indexed flat-file layout with split data files
//! - **Compact coordinates**: Decodes both raw and delta-compressed C-alpha records
//! - **Pluggable aligners**: Engines only depend on the [`Aligner`] trait
//! - **Coverage filters**: Hits must span enough of both the query and the target
//! - **Set-cover clustering**: Greedy partition of a whole catalog
//!
//! ## Example
//!
//! ```rust,no_run
//! use foldscan::{Catalog, ClusterConfig, ClusterEngine, TmAligner};
//! use std::path::Path;
//!
//! let catalog = Catalog::open(Path::new("/data/pdb")).unwrap();
//! let mut aligner = TmAligner::new();
//!
//! let clusters = ClusterEngine::new(&catalog)
//!     .cluster(&mut aligner, &ClusterConfig::default())
//!     .unwrap();
//!
//! for cluster in &clusters {
//!     println!("{}: {} entries", cluster.representative_name, cluster.size());
//! }
//! ```
//!
//! ## Modules
//!
//! - [`catalog`]: Catalog storage, coordinate codec, and catalog writer
//! - [`core`]: Core data types for entries, hits, and clusters
//! - [`matching`]: Aligners, search engine, and clustering
//! - [`parsing`]: JSON structure records
//! - [`cli`]: Command-line interface implementation

pub mod catalog;
pub mod cli;
pub mod core;
pub mod matching;
pub mod parsing;
pub mod utils;

// Re-export commonly used types for convenience
pub use catalog::builder::CatalogBuilder;
pub use catalog::store::{Catalog, CatalogError};
pub use core::entry::{Coordinate, Entry, Query};
pub use core::types::*;
pub use matching::aligner::{AlignError, Aligner, Alignment};
pub use matching::cluster::{
    ClusterConfig, ClusterEngine, ClusterError, ClusterMode, ClusterOutcome,
};
pub use matching::engine::{
    ScanStats, SearchConfig, SearchEngine, SearchError, SearchOutcome, UNLIMITED_HITS,
};
pub use matching::tmalign::TmAligner;
