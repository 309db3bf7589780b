// src/cli/handlers/build.rs

//! `build`, and the task runner shared with `test` and `install`.
//!
//! Independent tasks are handed to their toolchains in parallel with rayon.
//! Every task is attempted; failures are reported together afterwards.

use crate::cli::args::{DescriptionArgs, RequestArgs};
use crate::cli::handlers::commons;
use crate::core::builder::{Builder, BuilderError, Request};
use crate::models::Repository;
use anyhow::{Result, bail};
use clap::Parser;
use colored::Colorize;
use rayon::prelude::*;

#[derive(Parser, Debug, Default)]
#[command(
    no_binary_name = true,
    about = "Hands tasks to their toolchains. Without task names, runs the repository defaults \
             (`all` for build, `test` for test, every export for install)."
)]
pub(super) struct RunArgs {
    #[command(flatten)]
    description: DescriptionArgs,

    #[command(flatten)]
    request: RequestArgs,

    /// Tasks to run. Defaults depend on the command.
    tasks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Action {
    Build,
    Test,
    Install,
}

impl Action {
    fn verb(self) -> &'static str {
        match self {
            Self::Build => "build",
            Self::Test => "test",
            Self::Install => "install",
        }
    }

    /// Tasks run when none is named.
    fn default_tasks(self, repository: &Repository) -> Vec<String> {
        match self {
            Self::Build => repository.all.clone(),
            Self::Test => repository.test.clone(),
            Self::Install => repository.exports.keys().cloned().collect(),
        }
    }

    fn run(self, builder: &Builder<'_>, name: &str, request: &Request) -> Result<(), BuilderError> {
        match self {
            Self::Build => builder.build(name, request),
            Self::Test => builder.test(name, request),
            Self::Install => builder.install(name, request),
        }
    }
}

pub(super) fn run(action: Action, run_args: RunArgs) -> Result<()> {
    let context = commons::load_context()?;
    let builder = commons::open_configured(&context, &run_args.description)?;
    let Some(repository) = builder.repository() else {
        bail!("The repository could not be loaded.");
    };

    let tasks = if run_args.tasks.is_empty() {
        action.default_tasks(repository)
    } else {
        run_args.tasks
    };
    if tasks.is_empty() {
        println!("Nothing to {}.", action.verb());
        return Ok(());
    }

    let request = run_args.request.to_request();
    let failures: Vec<(String, BuilderError)> = tasks
        .par_iter()
        .filter_map(|name| {
            action
                .run(&builder, name, &request)
                .err()
                .map(|e| (name.clone(), e))
        })
        .collect();

    for (name, error) in &failures {
        eprintln!("{} {}: {}", "✗".red(), name.yellow(), error);
    }
    if !failures.is_empty() {
        bail!(
            "{} of {} task(s) failed to {}",
            failures.len(),
            tasks.len(),
            action.verb()
        );
    }

    commons::print_success(&format!(
        "{} task(s) passed {}: {}",
        tasks.len(),
        action.verb(),
        tasks.join(", ")
    ));
    Ok(())
}

pub fn handle(args: Vec<String>) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    run(Action::Build, run_args)
}
