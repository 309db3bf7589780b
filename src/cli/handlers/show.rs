// src/cli/handlers/show.rs

use crate::cli::args::{DescriptionArgs, RequestArgs};
use crate::cli::handlers::commons;
use crate::core::text;
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

#[derive(Parser, Debug, Default)]
#[command(
    name = "brief show",
    no_binary_name = true,
    about = "Prints the configured repository, or the effective form of one task."
)]
struct ShowArgs {
    #[command(flatten)]
    description: DescriptionArgs,

    #[command(flatten)]
    request: RequestArgs,

    /// The task to resolve. Without it, the whole repository is printed.
    task: Option<String>,

    /// Print the task as cached, without selecting features, flavors or expanding variables.
    #[arg(long)]
    cached: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let show_args = ShowArgs::try_parse_from(&args)?;
    let context = commons::load_context()?;
    let builder = commons::open_configured(&context, &show_args.description)?;
    let repository = builder
        .repository()
        .ok_or_else(|| anyhow!("The repository could not be loaded."))?;

    let Some(name) = show_args.task else {
        print!("{}", text::to_string(repository));
        return Ok(());
    };

    if show_args.cached {
        let task = repository
            .get_task(&name)
            .ok_or_else(|| anyhow!("No task known as '{}'", name))?;
        println!("{}", format!("# {} (cached)", name).dimmed());
        print!("{}", text::to_string(task));
        return Ok(());
    }

    let resolved = builder.resolve(&name, &show_args.request.to_request())?;
    println!(
        "{}",
        format!(
            "# {} for {} with flavors {}",
            resolved.name,
            context.target(),
            commons::format_list(&resolved.flavors)
        )
        .dimmed()
    );
    print!("{}", text::to_string(&resolved.task));
    Ok(())
}
