//! Command-line interface for foldscan.
//!
//! This module implements the CLI using clap. Available commands:
//!
//! - **search**: Find catalog entries structurally similar to a query
//! - **cluster**: Partition a catalog into clusters of similar structures
//! - **catalog**: Inspect or build catalogs
//!
//! ## Usage
//!
//! ```text
//! # Build a catalog from JSON records
//! foldscan catalog build --input structures.json --output db/pdb
//!
//! # Search with a JSON query
//! foldscan search db/pdb --query query.json
//!
//! # Search with an entry of the catalog itself
//! foldscan search db/pdb --query-key 42 --score-threshold 0.7 --format tsv
//!
//! # Cluster the whole catalog
//! foldscan cluster db/pdb --coverage-threshold 0.8 --format json
//! ```

use clap::{Parser, Subcommand};

use crate::utils::validation::is_valid_fraction;

pub mod catalog;
pub mod cluster;
pub mod search;

#[derive(Parser)]
#[command(name = "foldscan")]
#[command(version)]
#[command(about = "Search and cluster protein structure databases")]
#[command(
    long_about = "foldscan compares protein backbones stored in an indexed structure database.\n\nIt provides:\n- Exhaustive search of a query structure against every entry\n- Greedy set-cover clustering of a whole database\n- Tools to build and inspect databases"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Search a catalog for structures similar to a query
    Search(search::SearchArgs),

    /// Cluster every entry of a catalog
    Cluster(cluster::ClusterArgs),

    /// Inspect or build catalogs
    Catalog(catalog::CatalogArgs),
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Tsv,
}

/// Parse a threshold argument, accepting only values in [0, 1]
pub(crate) fn parse_fraction(s: &str) -> Result<f64, String> {
    let value: f64 = s
        .parse()
        .map_err(|_| format!("'{s}' is not a number"))?;
    if is_valid_fraction(value) {
        Ok(value)
    } else {
        Err(format!("{value} is not between 0 and 1"))
    }
}

/// Format a fraction as a percentage for text output
pub(crate) fn percent(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}
