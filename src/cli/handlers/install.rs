// src/cli/handlers/install.rs

use crate::cli::handlers::build::{self, Action, RunArgs};
use anyhow::Result;
use clap::Parser;

pub fn handle(args: Vec<String>) -> Result<()> {
    let run_args = RunArgs::try_parse_from(&args)?;
    build::run(Action::Install, run_args)
}
