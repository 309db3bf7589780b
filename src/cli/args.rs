// src/cli/args.rs

//! Argument groups shared by several handlers.

use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Default, Clone)]
pub struct DescriptionArgs {
    /// The repository description. Defaults to the single `.json` file in the
    /// current directory.
    #[arg(long, short)]
    pub file: Option<PathBuf>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct RequestArgs {
    /// Optional or experimental features to enable (e.g., "ssl,gui").
    #[arg(long = "feature", value_delimiter = ',')]
    pub features: Vec<String>,

    /// Flavors to apply on top of the configured ones (e.g., "release").
    #[arg(long = "flavor", value_delimiter = ',')]
    pub flavors: Vec<String>,
}

impl RequestArgs {
    pub fn to_request(&self) -> crate::core::builder::Request {
        crate::core::builder::Request {
            features: self.features.clone(),
            flavors: self.flavors.clone(),
        }
    }
}
