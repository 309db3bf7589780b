// src/bin/brief.rs

use anyhow::Result;
use brief::cli::{Cli, handlers};
use clap::Parser;
use colored::*;

// --- Command Definition and Registry ---

/// A command, its aliases, and its handler.
struct CommandDefinition {
    name: &'static str,
    aliases: &'static [&'static str],
    about: &'static str,
    handler: fn(Vec<String>) -> Result<()>,
}

static COMMAND_REGISTRY: &[CommandDefinition] = &[
    CommandDefinition {
        name: "configure",
        aliases: &["conf"],
        about: "Parse the description and write its cache",
        handler: handlers::configure::handle,
    },
    CommandDefinition {
        name: "build",
        aliases: &[],
        about: "Build tasks (default: `all`)",
        handler: handlers::build::handle,
    },
    CommandDefinition {
        name: "test",
        aliases: &[],
        about: "Test tasks (default: `test`)",
        handler: handlers::test::handle,
    },
    CommandDefinition {
        name: "install",
        aliases: &[],
        about: "Install exports",
        handler: handlers::install::handle,
    },
    CommandDefinition {
        name: "show",
        aliases: &[],
        about: "Print the repository or an effective task",
        handler: handlers::show::handle,
    },
    CommandDefinition {
        name: "tasks",
        aliases: &["ls"],
        about: "List tasks and exports",
        handler: handlers::tasks::handle,
    },
    CommandDefinition {
        name: "cache",
        aliases: &[],
        about: "Inspect or clear the cache",
        handler: handlers::cache::handle,
    },
];

fn find_command(name: &str) -> Option<&'static CommandDefinition> {
    COMMAND_REGISTRY
        .iter()
        .find(|cmd| cmd.name == name || cmd.aliases.contains(&name))
}

fn print_commands() {
    println!("{} brief <command> [args...]\n", "Usage:".yellow().bold());
    println!("{}", "Commands:".yellow().bold());
    for command in COMMAND_REGISTRY {
        println!("  {:<12} {}", command.name.cyan(), command.about);
    }
    println!("\nRun `brief <command> --help` for the arguments of a command.");
}

/// Sets up logging, dispatches to the handler and prints any error.
fn main() {
    env_logger::init();

    if let Err(e) = run_cli(Cli::parse()) {
        // Help and version requests from a handler's own parser.
        if let Some(clap_error) = e.downcast_ref::<clap::Error>() {
            clap_error.exit();
        }
        eprintln!("\n{}: {:#}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    log::debug!("CLI args parsed: {:?}", cli);

    let Some(name) = cli.command else {
        print_commands();
        return Ok(());
    };

    match find_command(&name) {
        Some(command) => (command.handler)(cli.args),
        None => {
            print_commands();
            anyhow::bail!("Unknown command '{}'", name)
        }
    }
}
