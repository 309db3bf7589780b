// src/cli/handlers/mod.rs

// One module per CLI command.

pub mod build;
pub mod cache;
pub mod commons;
pub mod configure;
pub mod install;
pub mod show;
pub mod tasks;
