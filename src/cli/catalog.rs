use std::path::{Path, PathBuf};

use clap::{ArgGroup, Args, Subcommand};

use crate::catalog::builder::CatalogBuilder;
use crate::catalog::shard::{index_path, shard_path, store_exists};
use crate::catalog::store::{Catalog, StoreKind};
use crate::cli::OutputFormat;
use crate::core::entry::Entry;
use crate::parsing::records::{assign_keys, parse_records_file, EntryRecord};

#[derive(Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommands,
}

#[derive(Subcommand)]
pub enum CatalogCommands {
    /// Summarize a catalog
    Info {
        /// Catalog path prefix
        #[arg(required = true)]
        db: PathBuf,
    },

    /// List the entries of a catalog
    List {
        /// Catalog path prefix
        #[arg(required = true)]
        db: PathBuf,

        /// Show at most this many entries
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Show one entry
    #[command(group(ArgGroup::new("selector").required(true).args(["key", "index"])))]
    Show {
        /// Catalog path prefix
        #[arg(required = true)]
        db: PathBuf,

        /// Entry key
        #[arg(long)]
        key: Option<u32>,

        /// Internal index (0-based position in the catalog)
        #[arg(long)]
        index: Option<usize>,
    },

    /// Build a catalog from JSON records
    Build {
        /// JSON file holding a record or an array of records
        #[arg(short, long, required = true)]
        input: PathBuf,

        /// Output path prefix
        #[arg(short, long, required = true)]
        output: PathBuf,

        /// Split each data file into this many shards
        #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..=1024))]
        shards: u32,

        /// Overwrite an existing catalog at the output prefix
        #[arg(long)]
        force: bool,
    },
}

/// Run a catalog subcommand
///
/// # Errors
///
/// Returns an error if the catalog cannot be opened or written, or an entry is missing.
pub fn run(args: CatalogArgs, format: OutputFormat, verbose: bool) -> anyhow::Result<()> {
    match args.command {
        CatalogCommands::Info { db } => run_info(&db, format),
        CatalogCommands::List { db, limit } => run_list(&db, limit, format, verbose),
        CatalogCommands::Show { db, key, index } => run_show(&db, key, index, format),
        CatalogCommands::Build {
            input,
            output,
            shards,
            force,
        } => run_build(&input, &output, shards, force, format, verbose),
    }
}

fn run_info(db: &Path, format: OutputFormat) -> anyhow::Result<()> {
    let catalog = Catalog::open(db)?;
    let companions = catalog.companions();

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": db.display().to_string(),
                "entries": catalog.size(),
                "shards": catalog.shard_count(),
                "max_length": catalog.max_residue_count(),
                "companions": companions,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("path\tentries\tshards\tmax_length\tnames\tcoordinates\tstructural_alphabet");
            println!(
                "{}\t{}\t{}\t{}\t{}\t{}\t{}",
                db.display(),
                catalog.size(),
                catalog.shard_count(),
                catalog.max_residue_count(),
                companions.names,
                companions.coordinates,
                companions.symbolic
            );
        }
        OutputFormat::Text => {
            println!("Catalog: {}", db.display());
            println!("   Entries: {}", catalog.size());
            println!("   Shards: {}", catalog.shard_count());
            println!("   Longest entry: {} residues", catalog.max_residue_count());
            println!("   Names: {}", yes_no(companions.names));
            println!("   Coordinates: {}", yes_no(companions.coordinates));
            println!("   Structural alphabet: {}", yes_no(companions.symbolic));
        }
    }
    Ok(())
}

fn run_list(
    db: &Path,
    limit: Option<usize>,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    let catalog = Catalog::open(db)?;
    if verbose {
        eprintln!("Loaded catalog with {} entries", catalog.size());
    }

    let count = limit.map_or(catalog.size(), |n| n.min(catalog.size()));
    let entries = catalog
        .iter()
        .take(count)
        .collect::<Result<Vec<Entry>, _>>()?;

    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        OutputFormat::Tsv => {
            println!("index\tkey\tname\tlength\thas_coordinates");
            for entry in &entries {
                println!(
                    "{}\t{}\t{}\t{}\t{}",
                    entry.internal_index,
                    entry.key,
                    entry.name,
                    entry.len(),
                    entry.has_coordinates()
                );
            }
        }
        OutputFormat::Text => {
            println!("{:<8} {:<10} {:>8}  Name", "Index", "Key", "Length");
            println!("{}", "-".repeat(60));
            for entry in &entries {
                println!(
                    "{:<8} {:<10} {:>8}  {}",
                    entry.internal_index,
                    entry.key,
                    entry.len(),
                    entry.name
                );
            }
            if count < catalog.size() {
                println!("... {} more", catalog.size() - count);
            }
        }
    }
    Ok(())
}

fn run_show(
    db: &Path,
    key: Option<u32>,
    index: Option<usize>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let catalog = Catalog::open(db)?;
    let entry = match (key, index) {
        (Some(key), _) => catalog.get_by_key(key)?,
        (None, Some(index)) => catalog.get_by_index(index)?,
        (None, None) => anyhow::bail!("Either --key or --index is required"),
    };

    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&EntryRecord::from(&entry))?
            );
        }
        OutputFormat::Tsv => {
            println!("key\tname\tsequence\tsymbolic_sequence");
            println!(
                "{}\t{}\t{}\t{}",
                entry.key, entry.name, entry.sequence, entry.symbolic_sequence
            );
        }
        OutputFormat::Text => {
            println!("{}", entry.name);
            println!("   Key: {}", entry.key);
            println!("   Index: {}", entry.internal_index);
            println!("   Length: {}", entry.len());
            println!("   Sequence: {}", entry.sequence);
            if !entry.symbolic_sequence.is_empty() {
                println!("   Structural alphabet: {}", entry.symbolic_sequence);
            }
            if let (Some(first), Some(last)) = (entry.coordinates.first(), entry.coordinates.last())
            {
                println!(
                    "   Coordinates: {} C-alpha, first ({:.3}, {:.3}, {:.3}), last ({:.3}, {:.3}, {:.3})",
                    entry.coordinates.len(),
                    first.x,
                    first.y,
                    first.z,
                    last.x,
                    last.y,
                    last.z
                );
            } else {
                println!("   Coordinates: none");
            }
        }
    }
    Ok(())
}

fn run_build(
    input: &Path,
    output: &Path,
    shards: u32,
    force: bool,
    format: OutputFormat,
    verbose: bool,
) -> anyhow::Result<()> {
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    if store_exists(output) {
        if !force {
            anyhow::bail!(
                "A catalog already exists at {}. Use --force to overwrite.",
                output.display()
            );
        }
        remove_catalog(output)?;
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let records = assign_keys(parse_records_file(input)?)?;
    if verbose {
        eprintln!("Read {} records from {}", records.len(), input.display());
    }

    let mut builder = CatalogBuilder::new(output).shards(usize::try_from(shards)?);
    for record in records {
        builder.add(record)?;
    }
    let summary = builder.finish()?;

    match format {
        OutputFormat::Json => {
            let output = serde_json::json!({
                "path": output.display().to_string(),
                "entries": summary.entries,
                "with_coordinates": summary.with_coordinates,
                "with_structural_alphabet": summary.with_symbolic,
                "shards": summary.shards,
                "created_at": chrono::Utc::now().to_rfc3339(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Tsv => {
            println!("path\tentries\twith_coordinates\twith_structural_alphabet\tshards");
            println!(
                "{}\t{}\t{}\t{}\t{}",
                output.display(),
                summary.entries,
                summary.with_coordinates,
                summary.with_symbolic,
                summary.shards
            );
        }
        OutputFormat::Text => {
            println!(
                "Wrote {} entries to {} ({} with coordinates, {} with structural alphabet, {} shard(s))",
                summary.entries,
                output.display(),
                summary.with_coordinates,
                summary.with_symbolic,
                summary.shards
            );
        }
    }
    Ok(())
}

/// Delete every data, shard, and index file of a catalog
fn remove_catalog(prefix: &Path) -> anyhow::Result<()> {
    for kind in [
        StoreKind::Primary,
        StoreKind::Names,
        StoreKind::Coordinates,
        StoreKind::Symbolic,
    ] {
        let path = kind.path_for(prefix);
        let shards = (0..).map(|n| shard_path(&path, n)).take_while(|p| p.is_file());
        for file in [path.clone(), index_path(&path)].into_iter().chain(shards) {
            if file.is_file() {
                std::fs::remove_file(&file)?;
            }
        }
    }
    Ok(())
}

fn yes_no(present: bool) -> &'static str {
    if present {
        "yes"
    } else {
        "no"
    }
}
