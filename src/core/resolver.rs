// src/core/resolver.rs

//! # Task resolution
//!
//! - [`resolve_inheritance`]: configure-time pass folding every `inherits`
//!   parent into its child, so the cached graph never carries `inherits`.
//!   Chains resolve depth-first: a parent is fully resolved (its own parents
//!   included) before it is merged under the child. Cycles are rejected.
//! - [`validate_filters`]: rejects a repository where two variants sharing a
//!   name could both apply to the same target.
//! - [`validate_flavors`]: rejects configured flavors no task declares.
//! - [`select_task`] / [`select_variant`] / [`apply_features`]: build-time
//!   selection of the variant matching the target and folding of the
//!   requested features and flavors.

use crate::core::merge::merge;
use crate::models::{MultiMap, Repository, Task, TaskFilters};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Failures to turn a name into a concrete task, flavor, variable or plugin.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("no task known as '{0}'")]
    UnknownTask(String),

    #[error("no flavor known as '{flavor}' in task '{task}'")]
    UnknownFlavor { task: String, flavor: String },

    #[error("no optional or experimental feature known as '{feature}' in task '{task}'")]
    UnknownFeature { task: String, feature: String },

    #[error("no variant of '{name}' matches target {target}")]
    NoMatchingVariant { name: String, target: String },

    #[error("task '{task}' inherits from unknown task '{target}'")]
    UnresolvedInherits { task: String, target: String },

    #[error("inheritance cycle detected: {0}")]
    InheritanceCycle(String),

    #[error("unknown variable '{0}'")]
    UnknownVariable(String),

    #[error("variable reference cycle detected: {0}")]
    VariableCycle(String),

    #[error("maximum expansion depth ({depth}) exceeded while expanding '{name}'")]
    VariableDepthExceeded { name: String, depth: u32 },

    #[error("no toolchain registered as '{0}'")]
    UnknownToolchain(String),

    #[error("no version control driver matches '{0}'")]
    UnknownVcs(String),

    #[error("task '{0}' has no toolchain")]
    MissingToolchain(String),

    #[error("variants of '{name}' in {scope} have overlapping filters")]
    FilterCollision { name: String, scope: String },
}

// --- TARGET ---

/// The architecture and platform variants are matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub arch: String,
    pub platform: String,
}

impl Target {
    /// The machine this process runs on.
    pub fn host() -> Self {
        Self {
            arch: std::env::consts::ARCH.to_string(),
            platform: std::env::consts::OS.to_string(),
        }
    }

    pub fn new(arch: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            platform: platform.into(),
        }
    }
}

impl Default for Target {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.platform)
    }
}

impl TaskFilters {
    /// Whether the arch and platform whitelists admit `target`.
    /// Tag bounds are not checked here; they need the repository history.
    pub fn matches(&self, target: &Target) -> bool {
        let arch_ok = self.archs.is_empty() || self.archs.contains(&target.arch);
        let platform_ok = self.platforms.is_empty() || self.platforms.contains(&target.platform);
        arch_ok && platform_ok
    }

    /// Whether some target could satisfy both filters.
    pub fn overlaps(&self, other: &Self) -> bool {
        let disjoint = |a: &[String], b: &[String]| {
            !a.is_empty() && !b.is_empty() && !a.iter().any(|item| b.contains(item))
        };
        if disjoint(&self.archs, &other.archs) || disjoint(&self.platforms, &other.platforms) {
            return false;
        }
        let bounded = |f: &Self| !f.min_tag.is_empty() || !f.max_tag.is_empty();
        let same_range = self.min_tag == other.min_tag && self.max_tag == other.max_tag;
        !(bounded(self) && bounded(other) && !same_range)
    }
}

// --- INHERITANCE ---

struct InheritanceResolver<'a> {
    original: &'a Repository,
    resolved: HashMap<String, Task>,
    // Names currently being resolved, in order, for cycle reporting.
    stack: Vec<String>,
}

impl<'a> InheritanceResolver<'a> {
    fn new(original: &'a Repository) -> Self {
        Self {
            original,
            resolved: HashMap::new(),
            stack: Vec::new(),
        }
    }

    /// Resolves the task visible under `name` (local first, then exported).
    fn resolve_name(&mut self, name: &str, requested_by: &str) -> Result<Task, ResolutionError> {
        if let Some(task) = self.resolved.get(name) {
            return Ok(task.clone());
        }
        if let Some(pos) = self.stack.iter().position(|entry| entry == name) {
            let mut chain: Vec<&str> = self
                .stack
                .get(pos..)
                .unwrap_or_default()
                .iter()
                .map(String::as_str)
                .collect();
            chain.push(name);
            return Err(ResolutionError::InheritanceCycle(chain.join(" -> ")));
        }
        let original = self.original;
        let raw = original
            .get_task(name)
            .ok_or_else(|| ResolutionError::UnresolvedInherits {
                task: requested_by.to_string(),
                target: name.to_string(),
            })?;

        self.stack.push(name.to_string());
        let result = self.resolve_task(name, raw);
        self.stack.pop();

        let task = result?;
        self.resolved.insert(name.to_string(), task.clone());
        Ok(task)
    }

    /// Resolves `task` and every nested feature, then merges it over its parent.
    fn resolve_task(&mut self, label: &str, task: &Task) -> Result<Task, ResolutionError> {
        let mut task = task.clone();
        for (kind, map) in [
            ("optionals", &mut task.optionals),
            ("experimental", &mut task.experimental),
            ("flavors", &mut task.flavors),
        ] {
            let mut resolved = MultiMap::new();
            for (key, variant) in map.iter() {
                let nested_label = format!("{}/{}/{}", label, kind, key);
                resolved.insert(key, self.resolve_task(&nested_label, variant)?);
            }
            *map = resolved;
        }

        if task.inherits.is_empty() {
            return Ok(task);
        }
        log::trace!("Resolving '{}' inherits '{}'", label, task.inherits);
        let parent = self.resolve_name(&task.inherits, label)?;
        let mut merged = merge(&parent, &task);
        merged.inherits.clear();
        Ok(merged)
    }
}

/// Replaces every task of `repo` by its fully inherited form.
pub fn resolve_inheritance(repo: &mut Repository) -> Result<(), ResolutionError> {
    let original = repo.clone();
    let mut resolver = InheritanceResolver::new(&original);

    for (name, task) in repo.tasks.iter_mut() {
        *task = resolver.resolve_name(name, name)?;
    }
    for (name, task) in repo.exports.iter_mut() {
        let Some(raw) = original.exports.get(name) else {
            continue;
        };
        if original.tasks.contains_key(name) {
            // Shadowed by a local task: resolve this entry on its own.
            resolver.stack.push(name.clone());
            let result = resolver.resolve_task(name, raw);
            resolver.stack.pop();
            *task = result?;
        } else {
            *task = resolver.resolve_name(name, name)?;
        }
    }
    Ok(())
}

// --- FILTER VALIDATION ---

fn check_variants(
    name: &str,
    scope: &str,
    variants: &[Task],
) -> Result<(), ResolutionError> {
    for (i, first) in variants.iter().enumerate() {
        for second in variants.iter().skip(i + 1) {
            if first.filters.overlaps(&second.filters) {
                return Err(ResolutionError::FilterCollision {
                    name: name.to_string(),
                    scope: scope.to_string(),
                });
            }
        }
    }
    Ok(())
}

fn validate_task(label: &str, task: &Task) -> Result<(), ResolutionError> {
    for (kind, map) in [
        ("optionals", &task.optionals),
        ("experimental", &task.experimental),
        ("flavors", &task.flavors),
    ] {
        let scope = format!("{}/{}", label, kind);
        for (key, variants) in map.groups() {
            check_variants(key, &scope, variants)?;
            for variant in variants {
                validate_task(&format!("{}/{}", scope, key), variant)?;
            }
        }
    }
    Ok(())
}

/// Ensures that no two same-named variants can apply to one target.
pub fn validate_filters(repo: &Repository) -> Result<(), ResolutionError> {
    for (name, task) in &repo.tasks {
        if let Some(export) = repo.exports.get(name) {
            if task.filters.overlaps(&export.filters) {
                return Err(ResolutionError::FilterCollision {
                    name: name.clone(),
                    scope: "tasks and exports".to_string(),
                });
            }
        }
    }
    for (name, task) in repo.tasks.iter().chain(repo.exports.iter()) {
        validate_task(name, task)?;
    }
    Ok(())
}

/// Whether `task`, or a feature variant that could be folded into it, declares `flavor`.
fn declares_flavor(task: &Task, flavor: &str) -> bool {
    task.has_flavor(flavor)
        || task
            .optionals
            .iter()
            .chain(task.experimental.iter())
            .any(|(_, variant)| declares_flavor(variant, flavor))
}

/// Ensures every flavor in `flavors` is declared by at least one task or export.
///
/// Tasks that do not declare a flavor still skip it at build time.
pub fn validate_flavors(repo: &Repository, flavors: &[String]) -> Result<(), ResolutionError> {
    for flavor in flavors {
        let declared = repo
            .tasks
            .values()
            .chain(repo.exports.values())
            .any(|task| declares_flavor(task, flavor));
        if !declared {
            return Err(ResolutionError::UnknownFlavor {
                task: "*".to_string(),
                flavor: flavor.clone(),
            });
        }
    }
    Ok(())
}

// --- SELECTION ---

/// Picks the task called `name` whose filters admit `target`, local tasks first.
pub fn select_task<'r>(
    repo: &'r Repository,
    name: &str,
    target: &Target,
) -> Result<&'r Task, ResolutionError> {
    let candidates: Vec<&Task> = [repo.tasks.get(name), repo.exports.get(name)]
        .into_iter()
        .flatten()
        .collect();
    if candidates.is_empty() {
        return Err(ResolutionError::UnknownTask(name.to_string()));
    }
    candidates
        .into_iter()
        .find(|task| task.filters.matches(target))
        .ok_or_else(|| ResolutionError::NoMatchingVariant {
            name: name.to_string(),
            target: target.to_string(),
        })
}

/// The first variant of `key` admitting `target`. `Ok(None)` when the key is absent.
pub fn select_variant<'m>(
    map: &'m MultiMap<Task>,
    key: &str,
    target: &Target,
) -> Result<Option<&'m Task>, ResolutionError> {
    let variants = map.get_all(key);
    if variants.is_empty() {
        return Ok(None);
    }
    variants
        .iter()
        .find(|variant| variant.filters.matches(target))
        .map(Some)
        .ok_or_else(|| ResolutionError::NoMatchingVariant {
            name: key.to_string(),
            target: target.to_string(),
        })
}

/// What to fold into a task at build time.
#[derive(Debug, Clone, Default)]
pub struct Selection<'s> {
    /// Optional or experimental features, folded first.
    pub features: &'s [String],
    /// Flavors the caller asked for; each must exist.
    pub flavors: &'s [String],
    /// Flavors recorded at configure time; applied only where declared.
    pub default_flavors: &'s [String],
}

/// A task with its features and flavors folded in.
#[derive(Debug, Clone, PartialEq)]
pub struct Effective {
    pub task: Task,
    /// Flavors actually applied, explicit ones first.
    pub flavors: Vec<String>,
}

/// Folds the selected features, then flavors, into a copy of `task`.
pub fn apply_features(
    name: &str,
    task: &Task,
    selection: &Selection<'_>,
    target: &Target,
) -> Result<Effective, ResolutionError> {
    let mut effective = task.clone();
    let mut applied = Vec::new();

    for feature in selection.features {
        let variant = match select_variant(&effective.optionals, feature, target)? {
            Some(variant) => Some(variant),
            None => select_variant(&effective.experimental, feature, target)?,
        };
        let variant = variant.ok_or_else(|| ResolutionError::UnknownFeature {
            task: name.to_string(),
            feature: feature.clone(),
        })?;
        effective = merge(&effective, variant);
    }

    for flavor in selection.flavors {
        let variant = select_variant(&effective.flavors, flavor, target)?.ok_or_else(|| {
            ResolutionError::UnknownFlavor {
                task: name.to_string(),
                flavor: flavor.clone(),
            }
        })?;
        effective = merge(&effective, variant);
        applied.push(flavor.clone());
    }

    for flavor in selection.default_flavors {
        if selection.flavors.contains(flavor) {
            continue;
        }
        match select_variant(&effective.flavors, flavor, target)? {
            Some(variant) => {
                effective = merge(&effective, variant);
                applied.push(flavor.clone());
            }
            None => log::debug!(
                "Task '{}' does not declare configured flavor '{}', skipping.",
                name,
                flavor
            ),
        }
    }

    Ok(Effective {
        task: effective,
        flavors: applied,
    })
}
