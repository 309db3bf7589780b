// src/cli/handlers/commons.rs

// Helpers shared by the handlers: settings, context and description lookup.

use crate::cli::args::DescriptionArgs;
use crate::core::builder::Builder;
use crate::core::context::Context;
use crate::core::paths;
use crate::core::settings::Settings;
use anyhow::{Context as _, Result};
use colored::Colorize;
use std::env;
use std::path::PathBuf;

/// Builds the startup context from the user settings.
pub fn load_context() -> Result<Context> {
    let settings = Settings::load().context("Failed to load the brief settings")?;
    let context = Context::from_settings(&settings);
    log::debug!("Startup context: {:?}", context);
    Ok(context)
}

/// The description named on the command line, or the one found in the current directory.
pub fn locate_description(args: &DescriptionArgs) -> Result<PathBuf> {
    if let Some(file) = &args.file {
        return Ok(file.clone());
    }
    let cwd = env::current_dir().context("Could not determine the current directory")?;
    let found = paths::discover_description(&cwd)?;
    log::info!("Using description {}", found.display());
    Ok(found)
}

/// A builder for the description selected by `args`, with its cache loaded.
pub fn open_configured<'c>(context: &'c Context, args: &DescriptionArgs) -> Result<Builder<'c>> {
    let description = locate_description(args)?;
    let mut builder = Builder::new(context, &description)?;
    builder.load()?;
    Ok(builder)
}

/// Prints the one-line summary shown after a successful command.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green(), message);
}

/// `[a, b]`, or `none` when empty.
pub fn format_list(values: &[String]) -> String {
    if values.is_empty() {
        "none".dimmed().to_string()
    } else {
        format!("[{}]", values.join(", "))
    }
}
