// src/cli/mod.rs

use clap::Parser;

pub mod args;
pub mod handlers;

/// brief: configure, build, test and install the tasks of a repository description.
///
/// Usage: `brief <command> [args...]`. Run `brief <command> --help` for the
/// arguments of a command.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// The command to run: configure, build, test, install, show, tasks or cache.
    pub command: Option<String>,

    /// Arguments of the command, parsed by its handler.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}
