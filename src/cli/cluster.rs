use std::path::PathBuf;

use clap::Args;

use crate::catalog::store::Catalog;
use crate::cli::{parse_fraction, OutputFormat};
use crate::core::types::Cluster;
use crate::matching::cluster::{ClusterConfig, ClusterEngine, ClusterMode, ClusterOutcome};
use crate::matching::tmalign::{TmAligner, DEFAULT_MAX_CAPACITY};

#[derive(Args)]
pub struct ClusterArgs {
    /// Catalog path prefix
    #[arg(required = true)]
    pub db: PathBuf,

    /// Minimum alignment score for two entries to be neighbours (0-1)
    #[arg(long, default_value = "0.5", value_parser = parse_fraction)]
    pub score_threshold: f64,

    /// Minimum coverage of both entries for them to be neighbours (0-1)
    #[arg(long, default_value = "0.8", value_parser = parse_fraction)]
    pub coverage_threshold: f64,

    /// How clusters grow from their representative
    #[arg(long, value_enum, default_value = "set-cover")]
    pub mode: ClusterMode,

    /// Longest structure the aligner accepts, in residues
    #[arg(long, default_value_t = DEFAULT_MAX_CAPACITY)]
    pub max_length: usize,
}

/// Run the cluster command
///
/// # Errors
///
/// Returns an error if the catalog cannot be opened or clustering fails.
pub fn run(args: ClusterArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = Catalog::open(&args.db)?;
    if verbose {
        eprintln!(
            "Clustering {} entries from {}",
            catalog.size(),
            args.db.display()
        );
    }

    let config =
        ClusterConfig::new(args.score_threshold, args.coverage_threshold).with_mode(args.mode);
    let mut aligner = TmAligner::with_max_capacity(args.max_length);
    let outcome = ClusterEngine::new(&catalog).cluster_with_stats(&mut aligner, &config)?;

    if verbose {
        let singletons = outcome.clusters.iter().filter(|c| c.is_singleton()).count();
        eprintln!(
            "Found {} clusters ({singletons} singletons), {} failed alignments",
            outcome.clusters.len(),
            outcome.stats.failed
        );
    }

    match format {
        OutputFormat::Text => print_text_results(&outcome.clusters),
        OutputFormat::Json => print_json_results(&catalog, &config, &outcome)?,
        OutputFormat::Tsv => print_tsv_results(&outcome.clusters),
    }

    Ok(())
}

fn print_text_results(clusters: &[Cluster]) {
    if clusters.is_empty() {
        eprintln!("Catalog is empty, no clusters.");
        return;
    }

    for (i, cluster) in clusters.iter().enumerate() {
        println!(
            "Cluster {}: {} (key {}), {} entries",
            i + 1,
            cluster.representative_name,
            cluster.representative_key,
            cluster.size()
        );
        for (key, name) in cluster.member_keys.iter().zip(&cluster.member_names) {
            println!("   {name} (key {key})");
        }
    }
}

fn print_json_results(
    catalog: &Catalog,
    config: &ClusterConfig,
    outcome: &ClusterOutcome,
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "catalog": catalog.path().display().to_string(),
        "entries": catalog.size(),
        "created_at": chrono::Utc::now().to_rfc3339(),
        "config": config,
        "cluster_count": outcome.clusters.len(),
        "stats": outcome.stats,
        "clusters": outcome.clusters,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// One line per entry, representative first: `representative<TAB>member`
fn print_tsv_results(clusters: &[Cluster]) {
    println!("representative_key\tmember_key\trepresentative_name\tmember_name");
    for cluster in clusters {
        println!(
            "{0}\t{0}\t{1}\t{1}",
            cluster.representative_key, cluster.representative_name
        );
        for (key, name) in cluster.member_keys.iter().zip(&cluster.member_names) {
            println!(
                "{}\t{key}\t{}\t{name}",
                cluster.representative_key, cluster.representative_name
            );
        }
    }
}
