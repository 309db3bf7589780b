// src/system/toolchain.rs

//! Toolchain plugins.
//!
//! A toolchain receives an already-merged [`Task`] that owns all of its data,
//! so independent tasks can be handed to toolchains on several threads at once.
//! Implementations must therefore be `Send + Sync`.

use crate::core::text;
use crate::models::Task;
use anyhow::Result;
use std::sync::Arc;

/// Builds, tests and installs resolved tasks.
pub trait Toolchain: Send + Sync {
    /// Builds `task` (registered as `name`) with the flavors that were folded into it.
    fn build(&self, name: &str, task: &Task, flavors: &[String]) -> Result<()>;

    fn test(&self, name: &str, task: &Task) -> Result<()>;

    fn install(&self, name: &str, task: &Task) -> Result<()>;
}

/// Creates a toolchain instance. Called once per task handoff.
pub type ToolchainFactory = Box<dyn Fn() -> Arc<dyn Toolchain> + Send + Sync>;

/// Name under which [`DryRun`] is registered by default.
pub const DRY_RUN: &str = "dry-run";

/// Prints the effective task instead of building it.
#[derive(Debug, Default)]
pub struct DryRun;

impl DryRun {
    fn report(&self, action: &str, name: &str, task: &Task, flavors: &[String]) {
        log::info!("[dry-run] {} '{}'", action, name);
        let mut header = format!("# {} {}", action, name);
        if !flavors.is_empty() {
            header.push_str(&format!(" [{}]", flavors.join(", ")));
        }
        println!("{}\n{}", header, text::to_string(task));
    }
}

impl Toolchain for DryRun {
    fn build(&self, name: &str, task: &Task, flavors: &[String]) -> Result<()> {
        self.report("build", name, task, flavors);
        Ok(())
    }

    fn test(&self, name: &str, task: &Task) -> Result<()> {
        self.report("test", name, task, &[]);
        Ok(())
    }

    fn install(&self, name: &str, task: &Task) -> Result<()> {
        self.report("install", name, task, &[]);
        Ok(())
    }
}
