// src/cli/handlers/cache.rs

use crate::cli::args::DescriptionArgs;
use crate::cli::handlers::commons;
use crate::core::builder::Builder;
use crate::core::cache::{self, CacheHeader, CacheStatus, StaleReason};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use std::time::{SystemTime, UNIX_EPOCH};

// --- Command Argument Parsing ---

/// Inspect or clear the cache of a repository description.
#[derive(Parser, Debug)]
#[command(name = "brief cache", no_binary_name = true)]
struct CacheArgs {
    #[command(flatten)]
    description: DescriptionArgs,

    #[command(subcommand)]
    command: CacheSubcommand,
}

#[derive(Subcommand, Debug)]
enum CacheSubcommand {
    /// Prints the cache path, its header, its staleness and the description fingerprint.
    Inspect,
    /// Deletes the cache file, forcing `brief configure` before the next build.
    Clear,
}

// --- Main Handler ---

pub fn handle(args: Vec<String>) -> Result<()> {
    let cache_args = CacheArgs::try_parse_from(&args)?;
    let context = commons::load_context()?;
    let description = commons::locate_description(&cache_args.description)?;
    let mut builder = Builder::new(&context, &description)?;

    match cache_args.command {
        CacheSubcommand::Inspect => inspect_cache(&builder),
        CacheSubcommand::Clear => clear_cache(&mut builder),
    }
}

// --- Subcommand Logic ---

fn inspect_cache(builder: &Builder<'_>) -> Result<()> {
    let description = builder.description_path();
    let cache_path = builder.cache_path();
    println!("\nInspecting cache of '{}'", description.display().to_string().cyan());
    println!("  {:<15} {}", "Cache Path:".blue(), cache_path.display());

    let fingerprint = cache::calculate_validation_data(description)?;
    println!(
        "  {:<15} {} ({} bytes)",
        "Fingerprint:".blue(),
        fingerprint.content_hash,
        fingerprint.file_size
    );
    println!(
        "  {:<15} {}",
        "Modified:".blue(),
        format_timestamp(fingerprint.timestamp)
    );

    let status = cache::inspect(description, cache_path)
        .with_context(|| format!("Failed to inspect cache {}", cache_path.display()))?;
    match status {
        CacheStatus::Missing => {
            println!("{}", "\nStatus: not configured (no cache file).".yellow());
        }
        CacheStatus::Corrupt(message) => {
            println!("{}", format!("\nStatus: corrupt header ({}).", message).red());
        }
        CacheStatus::Stale { reason, header } => {
            print_header(&header);
            let why = match reason {
                StaleReason::SchemaMismatch { found } => format!(
                    "written by schema version {}, running {}",
                    found,
                    crate::constants::SCHEMA_VERSION
                ),
                StaleReason::SourceNewer => "description modified since configure".to_string(),
            };
            println!(
                "{}",
                format!("\nStatus: stale ({}), re-derived on next load.", why).yellow()
            );
        }
        CacheStatus::Fresh(header) => {
            print_header(&header);
            println!("{}", "\nStatus: fresh.".green());
        }
    }
    Ok(())
}

/// Seconds since the Unix epoch. Times before the epoch are shown as negative.
fn format_timestamp(time: SystemTime) -> String {
    match time.duration_since(UNIX_EPOCH) {
        Ok(elapsed) => format!("{} (unix time)", elapsed.as_secs()),
        Err(before) => format!("-{} (unix time)", before.duration().as_secs()),
    }
}

fn print_header(header: &CacheHeader) {
    println!("  {:<15} {}", "Schema:".blue(), header.schema_version);
    println!(
        "  {:<15} {}",
        "Flavors:".blue(),
        commons::format_list(&header.flavors)
    );
}

fn clear_cache(builder: &mut Builder<'_>) -> Result<()> {
    let cache_path = builder.cache_path().display().to_string();
    if builder.clean()? {
        commons::print_success(&format!("Deleted cache {}", cache_path));
    } else {
        println!("No cache at {}.", cache_path);
    }
    Ok(())
}
