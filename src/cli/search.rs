use std::path::PathBuf;

use clap::{ArgGroup, Args};

use crate::catalog::store::Catalog;
use crate::cli::{parse_fraction, percent, OutputFormat};
use crate::core::entry::Query;
use crate::core::types::Hit;
use crate::matching::engine::{ScanStats, SearchConfig, SearchEngine};
use crate::matching::tmalign::{TmAligner, DEFAULT_MAX_CAPACITY};
use crate::parsing::records::parse_query_file;

#[derive(Args)]
#[command(group(ArgGroup::new("query_source").required(true).args(["query", "query_key"])))]
pub struct SearchArgs {
    /// Catalog path prefix
    #[arg(required = true)]
    pub db: PathBuf,

    /// JSON file holding the query record
    #[arg(short, long)]
    pub query: Option<PathBuf>,

    /// Use the entry with this key as the query
    #[arg(long)]
    pub query_key: Option<u32>,

    /// Catalog to take --query-key from (defaults to the searched catalog)
    #[arg(long, requires = "query_key")]
    pub query_db: Option<PathBuf>,

    /// Minimum alignment score (0-1)
    #[arg(long, default_value = "0.5", value_parser = parse_fraction)]
    pub score_threshold: f64,

    /// Minimum coverage of both query and target (0-1)
    #[arg(long, default_value = "0.0", value_parser = parse_fraction)]
    pub coverage_threshold: f64,

    /// Maximum number of hits to report (0 for no limit)
    #[arg(short = 'n', long, default_value = "1000")]
    pub max_hits: usize,

    /// Report the aligner's distance instead of a refined RMSD
    #[arg(long)]
    pub no_refine: bool,

    /// Longest structure the aligner accepts, in residues
    #[arg(long, default_value_t = DEFAULT_MAX_CAPACITY)]
    pub max_length: usize,
}

/// Run the search command
///
/// # Errors
///
/// Returns an error if a catalog or the query cannot be loaded, or the search fails.
pub fn run(args: SearchArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    let catalog = Catalog::open(&args.db)?;
    if verbose {
        eprintln!(
            "Opened {} with {} entries in {} shard(s)",
            args.db.display(),
            catalog.size(),
            catalog.shard_count()
        );
    }

    let query = load_query(&args, &catalog)?;
    if verbose {
        eprintln!("Query '{}' has {} residues", query.name, query.len());
    }

    let config = SearchConfig::new(args.score_threshold, args.coverage_threshold, args.max_hits)
        .with_refine_distance(!args.no_refine);
    let mut aligner = TmAligner::with_max_capacity(args.max_length);
    let outcome = SearchEngine::new(&catalog).search_with_stats(&mut aligner, &query, &config)?;

    if verbose {
        print_stats(&outcome.stats);
    }

    match format {
        OutputFormat::Text => print_text_results(&query, &outcome.hits),
        OutputFormat::Json => print_json_results(&query, &config, &outcome.stats, &outcome.hits)?,
        OutputFormat::Tsv => print_tsv_results(&query, &outcome.hits),
    }

    Ok(())
}

fn load_query(args: &SearchArgs, catalog: &Catalog) -> anyhow::Result<Query> {
    if let Some(path) = &args.query {
        if !path.exists() {
            anyhow::bail!("Query file not found: {}", path.display());
        }
        return Ok(parse_query_file(path)?);
    }

    let key = args
        .query_key
        .ok_or_else(|| anyhow::anyhow!("Either --query or --query-key is required"))?;

    let entry = match &args.query_db {
        Some(path) => Catalog::open(path)?.get_by_key(key)?,
        None => catalog.get_by_key(key)?,
    };
    if !entry.has_coordinates() {
        anyhow::bail!("Entry {key} has no coordinates and cannot be used as a query");
    }
    Ok(Query::from(entry))
}

fn print_stats(stats: &ScanStats) {
    eprintln!(
        "Scanned {} entries: {} without coordinates, {} failed, {} accepted",
        stats.scanned, stats.skipped_without_coordinates, stats.failed, stats.accepted
    );
}

fn print_text_results(query: &Query, hits: &[Hit]) {
    if hits.is_empty() {
        eprintln!("No hits found for '{}'.", query.name);
        return;
    }

    println!("Query: {} ({} residues)", query.name, query.len());
    for (i, hit) in hits.iter().enumerate() {
        println!("\n#{} {} (key {})", i + 1, hit.target_name, hit.target_key);
        println!("   Score: {:.4} ({})", hit.score, hit.confidence());
        println!(
            "   Aligned: {} residues, {} of query, {} of target",
            hit.aligned_length,
            percent(hit.query_coverage),
            percent(hit.target_coverage)
        );
        println!(
            "   Query {}-{}, target {}-{} ({})",
            hit.query_start, hit.query_end, hit.target_start, hit.target_end, hit.alignment_trace
        );
        if let Some(distance) = hit.distance_metric {
            println!("   RMSD: {distance:.3}");
        }
    }
    println!();
}

fn print_json_results(
    query: &Query,
    config: &SearchConfig,
    stats: &ScanStats,
    hits: &[Hit],
) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "query": {
            "name": query.name,
            "length": query.len(),
        },
        "config": config,
        "stats": stats,
        "hits": hits,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn print_tsv_results(query: &Query, hits: &[Hit]) {
    println!(
        "query\ttarget_key\ttarget_name\tscore\trmsd\taligned_length\tquery_coverage\ttarget_coverage\tquery_start\tquery_end\ttarget_start\ttarget_end\ttrace"
    );
    for hit in hits {
        let rmsd = hit
            .distance_metric
            .map_or_else(|| "NA".to_string(), |d| format!("{d:.3}"));
        println!(
            "{}\t{}\t{}\t{:.4}\t{}\t{}\t{:.4}\t{:.4}\t{}\t{}\t{}\t{}\t{}",
            query.name,
            hit.target_key,
            hit.target_name,
            hit.score,
            rmsd,
            hit.aligned_length,
            hit.query_coverage,
            hit.target_coverage,
            hit.query_start,
            hit.query_end,
            hit.target_start,
            hit.target_end,
            hit.alignment_trace,
        );
    }
}
