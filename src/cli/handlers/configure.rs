// src/cli/handlers/configure.rs

use crate::cli::args::DescriptionArgs;
use crate::cli::handlers::commons;
use crate::core::builder::Builder;
use anyhow::Result;
use clap::Parser;
use colored::Colorize;

#[derive(Parser, Debug, Default)]
#[command(
    name = "brief configure",
    no_binary_name = true,
    about = "Parses the description and writes its cache."
)]
struct ConfigureArgs {
    #[command(flatten)]
    description: DescriptionArgs,

    /// Flavors recorded for later builds. Defaults to `default_flavors` from the settings.
    #[arg(long = "flavor", value_delimiter = ',')]
    flavors: Vec<String>,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let configure_args = ConfigureArgs::try_parse_from(&args)?;
    let context = commons::load_context()?;
    let description = commons::locate_description(&configure_args.description)?;

    let mut builder = Builder::new(&context, &description)?;
    let repository = builder.configure(&configure_args.flavors)?;
    let summary = format!(
        "Configured '{}' ({} task(s), {} export(s))",
        repository.name.cyan(),
        repository.tasks.len(),
        repository.exports.len()
    );

    commons::print_success(&summary);
    println!(
        "  {:<10} {}",
        "Flavors:".blue(),
        commons::format_list(builder.flavors())
    );
    println!("  {:<10} {}", "Cache:".blue(), builder.cache_path().display());
    Ok(())
}
