// src/core/context.rs

//! # Context
//!
//! The explicit configuration object built once at startup and passed by
//! reference to the builder: toolchain and VCS registries, global variables,
//! prefix resolvers and the target used for variant selection. It is read-only
//! once built; everything it hands out is `Send + Sync`.

use crate::constants::MAX_EXPANSION_DEPTH;
use crate::core::resolver::{ResolutionError, Target};
use crate::core::settings::Settings;
use crate::models::{Repository, Task};
use crate::system::toolchain::{self, DryRun, Toolchain, ToolchainFactory};
use crate::system::vcs::{self, Git, Vcs, VcsFactory};
use regex::Regex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

/// Resolves `prefix::rest` variables. Receives the repository, the task and `rest`.
pub type PrefixCallback = Box<dyn Fn(&Repository, &Task, &str) -> Option<String> + Send + Sync>;

pub struct Context {
    toolchains: HashMap<String, ToolchainFactory>,
    vcs: Vec<(Regex, VcsFactory)>,
    vars: BTreeMap<String, String>,
    prefixes: HashMap<String, PrefixCallback>,
    target: Target,
    default_flavors: Vec<String>,
    cache_suffix: String,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut toolchains: Vec<&String> = self.toolchains.keys().collect();
        toolchains.sort();
        let mut prefixes: Vec<&String> = self.prefixes.keys().collect();
        prefixes.sort();
        f.debug_struct("Context")
            .field("toolchains", &toolchains)
            .field(
                "vcs",
                &self.vcs.iter().map(|(re, _)| re.as_str()).collect::<Vec<_>>(),
            )
            .field("vars", &self.vars)
            .field("prefixes", &prefixes)
            .field("target", &self.target)
            .field("default_flavors", &self.default_flavors)
            .field("cache_suffix", &self.cache_suffix)
            .finish()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// An empty context targeting the host, with no plugin registered.
    pub fn new() -> Self {
        Self {
            toolchains: HashMap::new(),
            vcs: Vec::new(),
            vars: BTreeMap::new(),
            prefixes: HashMap::new(),
            target: Target::host(),
            default_flavors: Vec::new(),
            cache_suffix: crate::constants::CACHE_SUFFIX.to_string(),
        }
    }

    /// A context with the built-in `dry-run` toolchain and the git driver.
    pub fn with_builtins() -> Self {
        let mut context = Self::new();
        context.register_toolchain(
            toolchain::DRY_RUN,
            Box::new(|| Arc::new(DryRun) as Arc<dyn Toolchain>),
        );
        if let Err(e) = context.register_vcs(
            vcs::GIT_PATTERN,
            Box::new(|root: &Path| Arc::new(Git::new(root)) as Arc<dyn Vcs>),
        ) {
            log::warn!("Could not register the git driver: {}", e);
        }
        context
    }

    /// Builds the startup context from the user settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut context = Self::with_builtins();
        for (name, value) in &settings.vars {
            context.register_var(name.clone(), value.clone());
        }
        context.target = settings.target();
        context.default_flavors = settings.default_flavors.clone();
        context.cache_suffix = settings.cache_suffix.clone();
        context
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn set_target(&mut self, target: Target) {
        self.target = target;
    }

    /// Flavors recorded by `configure` when none are requested.
    pub fn default_flavors(&self) -> &[String] {
        &self.default_flavors
    }

    pub fn cache_suffix(&self) -> &str {
        &self.cache_suffix
    }

    // --- Registries ---

    /// Registers a toolchain factory, replacing any previous one with that name.
    pub fn register_toolchain(&mut self, name: impl Into<String>, factory: ToolchainFactory) {
        self.toolchains.insert(name.into(), factory);
    }

    /// Instantiates the toolchain registered as `name`.
    pub fn toolchain(&self, name: &str) -> Result<Arc<dyn Toolchain>, ResolutionError> {
        self.toolchains
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| ResolutionError::UnknownToolchain(name.to_string()))
    }

    /// Registers a VCS driver for URLs matching `pattern`. Earlier registrations win.
    pub fn register_vcs(&mut self, pattern: &str, factory: VcsFactory) -> Result<(), regex::Error> {
        self.vcs.push((Regex::new(pattern)?, factory));
        Ok(())
    }

    /// Opens the driver whose pattern matches `url` on the working copy at `root`.
    pub fn vcs_for(&self, url: &str, root: &Path) -> Result<Arc<dyn Vcs>, ResolutionError> {
        self.vcs
            .iter()
            .find(|(pattern, _)| pattern.is_match(url))
            .map(|(_, factory)| factory(root))
            .ok_or_else(|| ResolutionError::UnknownVcs(url.to_string()))
    }

    /// Registers a global variable and returns the previous value, if any.
    pub fn register_var(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(name.into(), value.into())
    }

    /// Registers the resolver for variables named `prefix::...`.
    pub fn register_var_prefix(&mut self, prefix: impl Into<String>, callback: PrefixCallback) {
        self.prefixes.insert(prefix.into(), callback);
    }

    // --- Variables ---

    /// Resolves `name` for `task` of `repo`: task symbols, then repository
    /// constants, then global variables, then `prefix::rest` resolvers.
    pub fn lookup_var(
        &self,
        repo: &Repository,
        task: &Task,
        name: &str,
    ) -> Result<String, ResolutionError> {
        if let Some(value) = task.symbols.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = repo.constants.get(name) {
            return Ok(value.clone());
        }
        if let Some(value) = self.vars.get(name) {
            return Ok(value.clone());
        }
        if let Some((prefix, rest)) = name.split_once("::") {
            if let Some(callback) = self.prefixes.get(prefix) {
                if let Some(value) = callback(repo, task, rest) {
                    return Ok(value);
                }
            }
        }
        Err(ResolutionError::UnknownVariable(name.to_string()))
    }

    /// Expands every `${name}` reference in `input`, recursively.
    /// An unterminated `${` is kept verbatim.
    pub fn expand(
        &self,
        repo: &Repository,
        task: &Task,
        input: &str,
    ) -> Result<String, ResolutionError> {
        let mut stack = Vec::new();
        self.expand_with(repo, task, input, &mut stack)
    }

    fn expand_with(
        &self,
        repo: &Repository,
        task: &Task,
        input: &str,
        stack: &mut Vec<String>,
    ) -> Result<String, ResolutionError> {
        let mut result = String::with_capacity(input.len());
        let mut rest = input;

        while let Some(start) = rest.find("${") {
            let (before, reference) = rest.split_at(start);
            let Some(end) = reference.find('}') else {
                break;
            };
            result.push_str(before);
            let name = reference.get(2..end).unwrap_or_default();
            rest = reference.get(end + 1..).unwrap_or_default();

            if stack.iter().any(|entry| entry == name) {
                let mut chain: Vec<&str> = stack.iter().map(String::as_str).collect();
                chain.push(name);
                return Err(ResolutionError::VariableCycle(chain.join(" -> ")));
            }
            if u32::try_from(stack.len()).unwrap_or(u32::MAX) >= MAX_EXPANSION_DEPTH {
                return Err(ResolutionError::VariableDepthExceeded {
                    name: name.to_string(),
                    depth: MAX_EXPANSION_DEPTH,
                });
            }

            let raw = self.lookup_var(repo, task, name)?;
            stack.push(name.to_string());
            let expanded = self.expand_with(repo, task, &raw, stack);
            stack.pop();
            result.push_str(&expanded?);
        }

        result.push_str(rest);
        Ok(result)
    }

    /// Expands references in the path, flag, standard and symbol fields of an
    /// effective task. Variables resolve against the unexpanded task.
    pub fn expand_task(&self, repo: &Repository, task: &Task) -> Result<Task, ResolutionError> {
        let expand_all = |values: &[String]| -> Result<Vec<String>, ResolutionError> {
            values
                .iter()
                .map(|value| self.expand(repo, task, value))
                .collect()
        };

        let mut expanded = task.clone();
        expanded.sources = expand_all(&task.sources)?;
        expanded.include_dirs = expand_all(&task.include_dirs)?;
        expanded.headers = expand_all(&task.headers)?;
        expanded.patches = expand_all(&task.patches)?;
        expanded.toolchain_flags = expand_all(&task.toolchain_flags)?;
        expanded.standard = self.expand(repo, task, &task.standard)?;
        for (name, value) in &task.symbols {
            expanded
                .symbols
                .insert(name.clone(), self.expand(repo, task, value)?);
        }
        Ok(expanded)
    }
}
