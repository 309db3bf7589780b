// src/models.rs

use crate::core::codec::{entity_codec, enum_codec};
use std::collections::BTreeMap;
use std::collections::btree_map;

// --- MULTI-VALUED MAP ---
// Optionals, experimental features and flavors may declare several variants
// under one name; the variants are told apart by their filters.

/// An ordered map from name to one or more values. Insertion order is kept
/// within a key; keys iterate in ascending order.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiMap<V> {
    entries: BTreeMap<String, Vec<V>>,
}

impl<V> Default for MultiMap<V> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<V> MultiMap<V> {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` to the variants of `key`.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        self.entries.entry(key.into()).or_default().push(value);
    }

    /// Replaces every variant of `key`. An empty list removes the key.
    pub fn replace(&mut self, key: impl Into<String>, values: Vec<V>) {
        let key = key.into();
        if values.is_empty() {
            self.entries.remove(&key);
        } else {
            self.entries.insert(key, values);
        }
    }

    /// All variants declared under `key`, in declaration order.
    pub fn get_all(&self, key: &str) -> &[V] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Distinct keys in ascending order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Each key with its list of variants.
    pub fn groups(&self) -> btree_map::Iter<'_, String, Vec<V>> {
        self.entries.iter()
    }

    /// Every (key, variant) pair, keys ascending, variants in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries
            .iter()
            .flat_map(|(key, values)| values.iter().map(move |value| (key.as_str(), value)))
    }

    /// Mutable access to every variant.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> {
        self.entries.values_mut().flatten()
    }

    /// Total number of variants across all keys.
    pub fn len(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// --- REPOSITORY METADATA ---

/// A point in a repository's history.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tag {
    /// Revision identifier, for example a commit hash.
    pub id: String,
    pub branch: String,
    pub tag: String,
}

entity_codec!(Tag {
    id => "id",
    branch => "branch",
    tag => "tag",
});

/// One license entry, as listed by [`Description::license_entries`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct License {
    pub name: String,
    pub path: String,
}

entity_codec!(License {
    name => "name",
    path => "path",
});

/// Human-facing information attached to repositories and tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Description {
    pub title: String,
    pub summary: String,
    pub home: String,
    pub bugs: String,
    pub icon: String,
    pub public_icons: Vec<String>,
    /// License name to license text or path.
    pub licenses: BTreeMap<String, String>,
}

entity_codec!(Description {
    title => "title",
    summary => "summary",
    home => "home",
    bugs => "bugs",
    icon => "icon",
    public_icons => "publicIcons",
    licenses => "licenses",
});

impl Description {
    pub fn license_entries(&self) -> Vec<License> {
        self.licenses
            .iter()
            .map(|(name, path)| License {
                name: name.clone(),
                path: path.clone(),
            })
            .collect()
    }
}

// --- TASK MODEL ---

/// A reference from a task to another task it needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dependency {
    pub name: String,
    pub tag: String,
    /// Prefer embedding the dependency over linking a shared copy.
    pub static_link: bool,
    /// Optional, experimental or flavor sub-tasks of the dependency to enable.
    pub require: Vec<String>,
}

entity_codec!(Dependency {
    name => "name",
    tag => "tag",
    static_link => "staticLink",
    require => "require",
});

/// Criteria restricting where a task variant applies. Empty whitelists match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilters {
    pub archs: Vec<String>,
    pub platforms: Vec<String>,
    pub min_tag: String,
    pub max_tag: String,
}

entity_codec!(TaskFilters {
    archs => "archs",
    platforms => "platforms",
    min_tag => "minTag",
    max_tag => "maxTag",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskType {
    #[default]
    Other,
    /// Implements a specification (libc, opengl...); exposes only dependencies.
    Specification,
    Library,
    Application,
    /// Lists repositories available for install.
    Packages,
    /// A named group of other tasks.
    Bundle,
    /// Builds, tests and installs other tasks.
    Toolchain,
}

enum_codec!(TaskType {
    Other = 0 => "other",
    Specification = 1 => "spec",
    Library = 2 => "lib",
    Application = 3 => "app",
    Packages = 4 => "packages",
    Bundle = 5 => "bundle",
    Toolchain = 6 => "toolchain",
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Optimization {
    #[default]
    None,
    Size,
    Speed,
}

enum_codec!(Optimization {
    None = 0 => "none",
    Size = 1 => "size",
    Speed = 2 => "speed",
});

/// A buildable or installable unit of work.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Task {
    /// Name of a task in the same repository to take defaults from.
    /// Resolved at configure time and never cached.
    pub inherits: String,
    pub task_type: TaskType,
    pub filters: TaskFilters,
    pub dependencies: Vec<Dependency>,
    /// Features enabled only when all their dependencies are available.
    pub optionals: MultiMap<Task>,
    /// Features disabled unless explicitly requested.
    pub experimental: MultiMap<Task>,
    /// Named build variants (debug/release, free/paid...).
    pub flavors: MultiMap<Task>,
    /// URIs of raw diffs applied to the sources.
    pub patches: Vec<String>,
    pub toolchain: String,
    /// Opaque arguments forwarded to the toolchain.
    pub toolchain_flags: Vec<String>,
    pub standard: String,
    pub optimize: Optimization,
    pub sources: Vec<String>,
    pub include_dirs: Vec<String>,
    pub headers: Vec<String>,
    pub symbols: BTreeMap<String, String>,
    pub description: Description,
}

entity_codec!(Task {
    #[text_only] inherits => "inherits",
    task_type => "type",
    filters => "filters",
    dependencies => "dependencies",
    optionals => "optionals",
    experimental => "experimental",
    flavors => "flavors",
    patches => "patches",
    toolchain => "toolchain",
    toolchain_flags => "toolchainFlags",
    standard => "standard",
    optimize => "optimize",
    sources => "sources",
    include_dirs => "includeDirs",
    headers => "headers",
    symbols => "symbols",
    description => "description",
});

impl Task {
    /// Whether the task declares a flavor called `name`.
    pub fn has_flavor(&self, name: &str) -> bool {
        self.flavors.contains_key(name)
    }
}

// --- REPOSITORY ---

/// The root of a description file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Repository {
    pub name: String,
    pub url: String,
    pub constants: BTreeMap<String, String>,
    pub tags: BTreeMap<String, Tag>,
    /// Estimated repository size in KiB.
    pub repo_size: u32,
    /// Estimated build output size in KiB.
    pub build_size: u32,
    /// Estimated build time in seconds.
    pub build_time: f32,
    /// Description files merged in at configure time. Never cached.
    pub imports: Vec<String>,
    /// Tasks built when no task is named.
    pub all: Vec<String>,
    /// Tasks run by `test`.
    pub test: Vec<String>,
    /// Local tasks.
    pub tasks: BTreeMap<String, Task>,
    /// Installable tasks.
    pub exports: BTreeMap<String, Task>,
    pub description: Description,
}

entity_codec!(Repository {
    name => "name",
    url => "url",
    constants => "constants",
    tags => "tags",
    repo_size => "repoSize",
    build_size => "buildSize",
    build_time => "buildTime",
    #[text_only] imports => "imports",
    all => "all",
    test => "test",
    tasks => "tasks",
    exports => "exports",
    description => "description",
});

impl Repository {
    /// Looks a task up by name, local tasks first, then exports.
    pub fn get_task(&self, name: &str) -> Option<&Task> {
        self.tasks.get(name).or_else(|| self.exports.get(name))
    }

    /// Every task name, local then exported, each once.
    pub fn task_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tasks.keys().map(String::as_str).collect();
        for name in self.exports.keys() {
            if !self.tasks.contains_key(name) {
                names.push(name);
            }
        }
        names
    }
}
