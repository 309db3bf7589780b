// src/cli/handlers/tasks.rs

use crate::cli::args::DescriptionArgs;
use crate::cli::handlers::commons;
use crate::models::{Repository, Task};
use anyhow::{Result, anyhow};
use clap::Parser;
use colored::Colorize;

#[derive(Parser, Debug, Default)]
#[command(
    name = "brief tasks",
    no_binary_name = true,
    about = "Lists the tasks and exports of the configured repository."
)]
struct TasksArgs {
    #[command(flatten)]
    description: DescriptionArgs,

    /// Also list flavors and features of each task.
    #[arg(long, short)]
    verbose: bool,
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let tasks_args = TasksArgs::try_parse_from(&args)?;
    let context = commons::load_context()?;
    let builder = commons::open_configured(&context, &tasks_args.description)?;
    let repository = builder
        .repository()
        .ok_or_else(|| anyhow!("The repository could not be loaded."))?;

    println!("\n{}", repository_header(repository));
    print_section("Tasks", repository.tasks.iter(), tasks_args.verbose);
    print_section("Exports", repository.exports.iter(), tasks_args.verbose);
    Ok(())
}

fn repository_header(repository: &Repository) -> String {
    let name = if repository.name.is_empty() {
        "(unnamed)".to_string()
    } else {
        repository.name.clone()
    };
    if repository.description.summary.is_empty() {
        name.cyan().bold().to_string()
    } else {
        format!(
            "{} {}",
            name.cyan().bold(),
            format!("- {}", repository.description.summary).dimmed()
        )
    }
}

fn print_section<'r>(title: &str, tasks: impl Iterator<Item = (&'r String, &'r Task)>, verbose: bool) {
    let tasks: Vec<_> = tasks.collect();
    if tasks.is_empty() {
        return;
    }
    println!("\n{}", title.green().bold());
    for (name, task) in tasks {
        println!("  {}", task_line(name, task));
        if verbose {
            let flavors: Vec<String> = task.flavors.keys().map(str::to_string).collect();
            let mut features: Vec<String> = task.optionals.keys().map(str::to_string).collect();
            features.extend(task.experimental.keys().map(|key| format!("{key} (experimental)")));
            println!("    {:<10} {}", "flavors:".blue(), commons::format_list(&flavors));
            println!("    {:<10} {}", "features:".blue(), commons::format_list(&features));
        }
    }
}

fn task_line(name: &str, task: &Task) -> String {
    let mut line = format!("{:<20} {:<10}", name, task.task_type.to_string());
    if !task.toolchain.is_empty() {
        line.push_str(&format!(" {}", task.toolchain.yellow()));
    }
    if !task.filters.archs.is_empty() || !task.filters.platforms.is_empty() {
        let filters = [task.filters.archs.join("|"), task.filters.platforms.join("|")]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" on ");
        line.push_str(&format!(" {}", format!("({})", filters).dimmed()));
    }
    line
}
