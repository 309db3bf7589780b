// src/core/builder.rs

//! # Builder
//!
//! Drives one description file through its lifecycle:
//!
//! 1. `configure`: parse the description, merge its imports, fill tags from
//!    the VCS, resolve inheritance, validate filters and write the cache with
//!    the flavors in use.
//! 2. `load`: read the cache back. A cache written by another schema version,
//!    or older than its description, is deleted and re-derived with the
//!    flavors it recorded. Any other read failure deletes the cache and fails.
//! 3. `build` / `test` / `install`: select the task variant for the target,
//!    fold in the requested features and flavors, expand variables and hand
//!    the effective task to its toolchain.

use crate::core::binary::{Binary, BinaryError};
use crate::core::cache::{self, StaleReason};
use crate::core::context::Context;
use crate::core::paths;
use crate::core::resolver::{self, ResolutionError, Selection};
use crate::core::text;
use crate::core::tokenizer::ParseError;
use crate::models::{Repository, Task, TaskType};
use crate::system::toolchain::Toolchain;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Repository description must be a file: '{0}'")]
    NotAFile(String),

    #[error("Failed to parse '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: ParseError,
    },

    #[error(transparent)]
    Binary(#[from] BinaryError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Repository '{path}' is not configured. Run `brief configure` first.")]
    NotConfigured { path: String },

    #[error("Cache '{path}' was corrupt and has been deleted ({source}). Run `brief configure` again.")]
    CorruptCache {
        path: String,
        #[source]
        source: BinaryError,
    },

    #[error("Toolchain failed on task '{task}': {source}")]
    Toolchain {
        task: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("Version control failed: {0}")]
    Vcs(#[source] anyhow::Error),
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> BuilderError + '_ {
    move |source| BuilderError::Io {
        path: path.display().to_string(),
        source,
    }
}

/// What to fold into a task on top of its variant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// Optional or experimental features to enable.
    pub features: Vec<String>,
    /// Flavors to apply. Each must be declared by the task.
    pub flavors: Vec<String>,
}

/// An effective task, ready for a toolchain.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTask {
    pub name: String,
    pub task: Task,
    /// Flavors folded into `task`.
    pub flavors: Vec<String>,
}

#[derive(Debug)]
pub struct Builder<'c> {
    context: &'c Context,
    description: PathBuf,
    cache: PathBuf,
    repository: Option<Repository>,
    /// Flavors recorded in the cache header.
    flavors: Vec<String>,
}

impl<'c> Builder<'c> {
    /// A builder for the description file at `description`. Nothing is read yet.
    pub fn new(context: &'c Context, description: &Path) -> Result<Self, BuilderError> {
        if !description.is_file() {
            return Err(BuilderError::NotAFile(description.display().to_string()));
        }
        let cache = paths::cache_path_for(description, context.cache_suffix());
        Ok(Self {
            context,
            description: description.to_path_buf(),
            cache,
            repository: None,
            flavors: Vec::new(),
        })
    }

    pub fn description_path(&self) -> &Path {
        &self.description
    }

    pub fn cache_path(&self) -> &Path {
        &self.cache
    }

    /// Flavors recorded when the repository was configured.
    pub fn flavors(&self) -> &[String] {
        &self.flavors
    }

    /// The loaded repository, if `configure` or `load` ran.
    pub fn repository(&self) -> Option<&Repository> {
        self.repository.as_ref()
    }

    // --- Lifecycle ---

    /// Parses the description and writes a fresh cache recording `flavors`,
    /// or the context's default flavors when `flavors` is empty.
    ///
    /// Each flavor named in `flavors` must be declared by at least one task or
    /// export. The context's defaults are not checked, since they are shared
    /// by every repository.
    pub fn configure(&mut self, flavors: &[String]) -> Result<&Repository, BuilderError> {
        self.configure_with(flavors, true)
    }

    fn configure_with(
        &mut self,
        flavors: &[String],
        check_flavors: bool,
    ) -> Result<&Repository, BuilderError> {
        let (flavors, check_flavors) = if flavors.is_empty() {
            (self.context.default_flavors().to_vec(), false)
        } else {
            (flavors.to_vec(), check_flavors)
        };
        info!(
            "Configuring {} (flavors: {:?})",
            self.description.display(),
            flavors
        );

        let repository = self.derive()?;
        if check_flavors {
            resolver::validate_flavors(&repository, &flavors)?;
        }
        cache::write_cache(&self.cache, &flavors, &repository)?;
        self.flavors = flavors;
        Ok(&*self.repository.insert(repository))
    }

    /// Loads the cached repository, re-deriving a stale cache.
    pub fn load(&mut self) -> Result<&Repository, BuilderError> {
        if !self.cache.exists() {
            return Err(BuilderError::NotConfigured {
                path: self.description.display().to_string(),
            });
        }

        let (header, mut reader) = match cache::open_cache(&self.cache) {
            Ok(opened) => opened,
            Err(e) => return Err(self.discard_corrupt(e)),
        };

        let staleness = cache::staleness(&self.description, &self.cache, &header)
            .map_err(io_error(&self.cache))?;
        if let Some(reason) = staleness {
            drop(reader);
            match reason {
                StaleReason::SchemaMismatch { found } => info!(
                    "Cache {} has schema version {}, reconfiguring",
                    self.cache.display(),
                    found
                ),
                StaleReason::SourceNewer => info!(
                    "{} changed since it was configured, reconfiguring",
                    self.description.display()
                ),
            }
            self.remove_cache()?;
            let check_flavors = header.flavors != self.context.default_flavors();
            return self.configure_with(&header.flavors, check_flavors);
        }

        let repository = match Repository::read(&mut reader) {
            Ok(repository) => repository,
            Err(e) => {
                drop(reader);
                return Err(self.discard_corrupt(e));
            }
        };
        debug!("Loaded {} from cache", self.cache.display());
        self.flavors = header.flavors;
        Ok(&*self.repository.insert(repository))
    }

    /// Deletes the cache file. Returns whether there was one.
    pub fn clean(&mut self) -> Result<bool, BuilderError> {
        self.repository = None;
        if !self.cache.exists() {
            return Ok(false);
        }
        self.remove_cache()?;
        Ok(true)
    }

    fn remove_cache(&self) -> Result<(), BuilderError> {
        debug!("Removing cache {}", self.cache.display());
        fs::remove_file(&self.cache).map_err(io_error(&self.cache))
    }

    fn discard_corrupt(&self, source: BinaryError) -> BuilderError {
        warn!(
            "Deleting corrupt cache {}: {}",
            self.cache.display(),
            source
        );
        if let Err(e) = fs::remove_file(&self.cache) {
            warn!("Could not delete {}: {}", self.cache.display(), e);
        }
        BuilderError::CorruptCache {
            path: self.cache.display().to_string(),
            source,
        }
    }

    // --- Derivation ---

    fn derive(&self) -> Result<Repository, BuilderError> {
        let mut repository = parse_file(&self.description)?;

        let mut visited = HashSet::new();
        visited.insert(canonical(&self.description));
        let base_dir = parent_dir(&self.description);
        merge_imports(&mut repository, &base_dir, &mut visited)?;

        if repository.tags.is_empty() && !repository.url.is_empty() {
            match self.context.vcs_for(&repository.url, &base_dir) {
                Ok(vcs) if vcs.is_working_copy() => vcs
                    .fill_tags(&mut repository.tags)
                    .map_err(BuilderError::Vcs)?,
                Ok(_) => debug!(
                    "{} is not a working copy of '{}', tags stay empty",
                    base_dir.display(),
                    repository.url
                ),
                Err(_) => debug!("No VCS driver matches '{}', tags stay empty", repository.url),
            }
        }

        resolver::resolve_inheritance(&mut repository)?;
        resolver::validate_filters(&repository)?;
        Ok(repository)
    }

    // --- Resolution and handoff ---

    fn loaded(&self) -> Result<&Repository, BuilderError> {
        self.repository
            .as_ref()
            .ok_or_else(|| BuilderError::NotConfigured {
                path: self.description.display().to_string(),
            })
    }

    /// The effective task `name` for the context's target.
    pub fn resolve(&self, name: &str, request: &Request) -> Result<ResolvedTask, BuilderError> {
        let repository = self.loaded()?;
        let target = self.context.target();
        let variant = resolver::select_task(repository, name, target)?;
        let selection = Selection {
            features: &request.features,
            flavors: &request.flavors,
            default_flavors: &self.flavors,
        };
        let effective = resolver::apply_features(name, variant, &selection, target)?;
        let task = self.context.expand_task(repository, &effective.task)?;
        Ok(ResolvedTask {
            name: name.to_string(),
            task,
            flavors: effective.flavors,
        })
    }

    pub fn build(&self, name: &str, request: &Request) -> Result<(), BuilderError> {
        let resolved = self.resolve(name, request)?;
        self.hand_off("build", &resolved, |toolchain, resolved| {
            toolchain.build(&resolved.name, &resolved.task, &resolved.flavors)
        })
    }

    pub fn test(&self, name: &str, request: &Request) -> Result<(), BuilderError> {
        let resolved = self.resolve(name, request)?;
        self.hand_off("test", &resolved, |toolchain, resolved| {
            toolchain.test(&resolved.name, &resolved.task)
        })
    }

    pub fn install(&self, name: &str, request: &Request) -> Result<(), BuilderError> {
        let resolved = self.resolve(name, request)?;
        self.hand_off("install", &resolved, |toolchain, resolved| {
            toolchain.install(&resolved.name, &resolved.task)
        })
    }

    fn hand_off<F>(&self, action: &str, resolved: &ResolvedTask, run: F) -> Result<(), BuilderError>
    where
        F: FnOnce(&dyn Toolchain, &ResolvedTask) -> anyhow::Result<()>,
    {
        if resolved.task.toolchain.is_empty() {
            return match resolved.task.task_type {
                TaskType::Specification | TaskType::Bundle => {
                    info!(
                        "Nothing to {} for {} task '{}'",
                        action, resolved.task.task_type, resolved.name
                    );
                    Ok(())
                }
                _ => Err(ResolutionError::MissingToolchain(resolved.name.clone()).into()),
            };
        }

        let toolchain = self.context.toolchain(&resolved.task.toolchain)?;
        info!(
            "Handing '{}' to toolchain '{}' for {} (flavors: {:?})",
            resolved.name, resolved.task.toolchain, action, resolved.flavors
        );
        run(toolchain.as_ref(), resolved).map_err(|source| BuilderError::Toolchain {
            task: resolved.name.clone(),
            source,
        })
    }
}

// --- Description files ---

fn parse_file(path: &Path) -> Result<Repository, BuilderError> {
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    text::from_str(&content).map_err(|source| BuilderError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn canonical(path: &Path) -> PathBuf {
    dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Merges the tasks, exports and constants of every import into `repository`.
/// Definitions already present win.
fn merge_imports(
    repository: &mut Repository,
    base_dir: &Path,
    visited: &mut HashSet<PathBuf>,
) -> Result<(), BuilderError> {
    for import in std::mem::take(&mut repository.imports) {
        let path = base_dir.join(&import);
        if !path.is_file() {
            debug!("Skipping missing import {}", path.display());
            continue;
        }
        if !visited.insert(canonical(&path)) {
            debug!("Import {} already merged", path.display());
            continue;
        }

        let mut imported = parse_file(&path)?;
        merge_imports(&mut imported, &parent_dir(&path), visited)?;
        debug!(
            "Importing {} task(s) and {} export(s) from {}",
            imported.tasks.len(),
            imported.exports.len(),
            path.display()
        );

        for (name, task) in imported.tasks {
            repository.tasks.entry(name).or_insert(task);
        }
        for (name, task) in imported.exports {
            repository.exports.entry(name).or_insert(task);
        }
        for (name, value) in imported.constants {
            repository.constants.entry(name).or_insert(value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SCHEMA_VERSION;
    use crate::core::binary;
    use crate::core::settings::Settings;
    use crate::models::Tag;
    use crate::system::vcs::Vcs;
    use std::collections::BTreeMap;
    use std::fs::File;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, SystemTime};

    const DESCRIPTION: &str = r#"{
  "name": "demo",
  "url": "https://example.org/demo.tar.gz",
  "constants": {"root": "/src"},
  "all": ["app"],
  "tasks": {
    "base": {"toolchain": "recorder", "standard": "c++11"},
    "app": {
      "inherits": "base",
      "type": "app",
      "sources": ["${root}/main.cpp"],
      "optionals": {"ssl": {"symbols": {"SSL": "1"}}},
      "flavors": {
        "release": {"optimize": "speed"},
        "debug": {"symbols": {"DEBUG": "1"}}
      }
    },
    "headers": {"type": "spec"},
    "tool": {"type": "lib"}
  }
}"#;

    type Calls = Arc<Mutex<Vec<(String, String, Vec<String>)>>>;

    struct Recorder(Calls);

    impl Recorder {
        fn record(&self, action: &str, name: &str, flavors: &[String]) {
            self.0
                .lock()
                .unwrap()
                .push((action.to_string(), name.to_string(), flavors.to_vec()));
        }
    }

    impl Toolchain for Recorder {
        fn build(&self, name: &str, _: &Task, flavors: &[String]) -> anyhow::Result<()> {
            self.record("build", name, flavors);
            Ok(())
        }

        fn test(&self, name: &str, _: &Task) -> anyhow::Result<()> {
            self.record("test", name, &[]);
            Ok(())
        }

        fn install(&self, _: &str, _: &Task) -> anyhow::Result<()> {
            anyhow::bail!("read-only prefix")
        }
    }

    fn context_with_recorder() -> (Context, Calls) {
        let calls: Calls = Arc::default();
        let mut context = Context::new();
        let shared = calls.clone();
        context.register_toolchain(
            "recorder",
            Box::new(move || Arc::new(Recorder(shared.clone())) as Arc<dyn Toolchain>),
        );
        (context, calls)
    }

    fn write_description(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("brief.json");
        fs::write(&path, content).unwrap();
        path
    }

    fn set_mtime(path: &Path, time: SystemTime) {
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(time)
            .unwrap();
    }

    #[test]
    fn test_new_rejects_missing_description() {
        let dir = tempfile::tempdir().unwrap();
        let context = Context::new();
        assert!(matches!(
            Builder::new(&context, &dir.path().join("brief.json")),
            Err(BuilderError::NotAFile(_))
        ));
    }

    #[test]
    fn test_load_unconfigured_repository() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = Context::new();
        let mut builder = Builder::new(&context, &description).unwrap();

        let err = builder.load().unwrap_err();
        assert!(matches!(err, BuilderError::NotConfigured { .. }));
        assert!(err.to_string().contains("brief configure"));
    }

    #[test]
    fn test_configure_then_load() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let (context, _) = context_with_recorder();

        // --- Execute ---
        let configured = Builder::new(&context, &description)
            .unwrap()
            .configure(&["release".to_string()])
            .unwrap()
            .clone();
        let mut builder = Builder::new(&context, &description).unwrap();
        let loaded = builder.load().unwrap().clone();

        // --- Assert ---
        assert_eq!(loaded, configured);
        assert_eq!(builder.flavors(), ["release".to_string()]);
        assert!(builder.cache_path().ends_with("brief.json.brief"));
        let app = loaded.tasks.get("app").unwrap();
        assert!(app.inherits.is_empty());
        assert_eq!(app.standard, "c++11");
        assert_eq!(app.toolchain, "recorder");
    }

    #[test]
    fn test_stale_cache_is_rederived_with_recorded_flavors() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let (context, _) = context_with_recorder();
        Builder::new(&context, &description)
            .unwrap()
            .configure(&["debug".to_string()])
            .unwrap();

        let updated = DESCRIPTION.replace("\"tool\": {\"type\": \"lib\"}", "\"tool\": {\"type\": \"app\"}");
        fs::write(&description, updated).unwrap();
        set_mtime(&description, SystemTime::now() + Duration::from_secs(60));

        // --- Execute ---
        let mut builder = Builder::new(&context, &description).unwrap();
        let repository = builder.load().unwrap();

        // --- Assert ---
        assert_eq!(
            repository.tasks.get("tool").unwrap().task_type,
            TaskType::Application
        );
        assert_eq!(builder.flavors(), ["debug".to_string()]);

        let (header, mut reader) = cache::open_cache(builder.cache_path()).unwrap();
        assert_eq!(header.flavors, vec!["debug"]);
        let cached = Repository::read(&mut reader).unwrap();
        assert_eq!(cached.tasks.get("tool").unwrap().task_type, TaskType::Application);
    }

    #[test]
    fn test_schema_mismatch_is_rederived() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = Context::new();
        let mut builder = Builder::new(&context, &description).unwrap();

        let mut old = binary::to_bytes(&(SCHEMA_VERSION + 1, vec!["release".to_string()])).unwrap();
        Repository::default().write(&mut old).unwrap();
        fs::write(builder.cache_path(), old).unwrap();

        assert_eq!(builder.load().unwrap().name, "demo");
        let (header, _) = cache::open_cache(builder.cache_path()).unwrap();
        assert_eq!(header.schema_version, SCHEMA_VERSION);
        assert_eq!(header.flavors, vec!["release"]);
    }

    #[test]
    fn test_corrupt_payload_deletes_cache() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = Context::new();
        let mut builder = Builder::new(&context, &description).unwrap();

        let mut bytes = binary::to_bytes(&(SCHEMA_VERSION, Vec::<String>::new())).unwrap();
        bytes.extend_from_slice(&[binary::tag::STR, 0xff]);
        fs::write(builder.cache_path(), bytes).unwrap();
        set_mtime(&description, SystemTime::now() - Duration::from_secs(60));

        // --- Execute & Assert ---
        let err = builder.load().unwrap_err();
        assert!(matches!(err, BuilderError::CorruptCache { .. }));
        assert!(!builder.cache_path().exists());

        // The next invocation reports the repository as unconfigured.
        assert!(matches!(
            builder.load(),
            Err(BuilderError::NotConfigured { .. })
        ));
    }

    #[test]
    fn test_corrupt_header_deletes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = Context::new();
        let mut builder = Builder::new(&context, &description).unwrap();
        fs::write(builder.cache_path(), b"not a cache").unwrap();

        assert!(matches!(
            builder.load(),
            Err(BuilderError::CorruptCache { .. })
        ));
        assert!(!builder.cache_path().exists());
    }

    #[test]
    fn test_build_hands_effective_task_to_toolchain() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let (context, calls) = context_with_recorder();
        let mut builder = Builder::new(&context, &description).unwrap();
        builder.configure(&["debug".to_string()]).unwrap();

        let request = Request {
            features: vec!["ssl".to_string()],
            flavors: vec!["release".to_string()],
        };

        // --- Execute ---
        let resolved = builder.resolve("app", &request).unwrap();
        builder.build("app", &request).unwrap();

        // --- Assert ---
        assert_eq!(resolved.task.sources, vec!["/src/main.cpp"]);
        assert_eq!(resolved.task.symbols.get("SSL").map(String::as_str), Some("1"));
        assert_eq!(resolved.task.symbols.get("DEBUG").map(String::as_str), Some("1"));
        assert_eq!(resolved.flavors, vec!["release", "debug"]);
        assert_eq!(
            calls.lock().unwrap().as_slice(),
            [(
                "build".to_string(),
                "app".to_string(),
                vec!["release".to_string(), "debug".to_string()]
            )]
        );
    }

    #[test]
    fn test_unknown_flavor_names_the_flavor() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let (context, _) = context_with_recorder();
        let mut builder = Builder::new(&context, &description).unwrap();
        builder.configure(&[]).unwrap();

        let request = Request {
            flavors: vec!["release".to_string()],
            ..Request::default()
        };
        let err = builder.build("base", &request).unwrap_err();
        assert!(matches!(
            err,
            BuilderError::Resolution(ResolutionError::UnknownFlavor { ref flavor, .. }) if flavor == "release"
        ));
    }

    #[test]
    fn test_handoff_rules() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let (context, _) = context_with_recorder();
        let mut builder = Builder::new(&context, &description).unwrap();
        builder.configure(&[]).unwrap();
        let request = Request::default();

        // spec task without toolchain: no-op
        builder.build("headers", &request).unwrap();
        assert!(matches!(
            builder.build("tool", &request),
            Err(BuilderError::Resolution(ResolutionError::MissingToolchain(_)))
        ));
        assert!(matches!(
            builder.build("nope", &request),
            Err(BuilderError::Resolution(ResolutionError::UnknownTask(_)))
        ));
        assert!(matches!(
            builder.install("app", &request),
            Err(BuilderError::Toolchain { ref task, .. }) if task == "app"
        ));
    }

    #[test]
    fn test_build_requires_loaded_repository() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = Context::new();
        let builder = Builder::new(&context, &description).unwrap();
        assert!(matches!(
            builder.build("app", &Request::default()),
            Err(BuilderError::NotConfigured { .. })
        ));
    }

    #[test]
    fn test_imports_are_merged() {
        // --- Setup ---
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("deps")).unwrap();
        fs::write(
            dir.path().join("deps").join("common.json"),
            r#"{"imports": ["extra.json"], "tasks": {"app": {"standard": "c89"}, "shared": {"type": "lib"}}}"#,
        )
        .unwrap();
        fs::write(
            dir.path().join("deps").join("extra.json"),
            r#"{"imports": ["common.json"], "exports": {"pkg": {"type": "packages"}}, "constants": {"root": "/ignored", "extra": "1"}}"#,
        )
        .unwrap();
        let description = write_description(
            dir.path(),
            r#"{"imports": ["deps/common.json", "missing.json"], "constants": {"root": "/src"}, "tasks": {"app": {"standard": "c++20"}}}"#,
        );
        let context = Context::new();

        // --- Execute ---
        let mut builder = Builder::new(&context, &description).unwrap();
        let repository = builder.configure(&[]).unwrap();

        // --- Assert ---
        assert!(repository.imports.is_empty());
        assert_eq!(repository.tasks.get("app").unwrap().standard, "c++20");
        assert!(repository.tasks.contains_key("shared"));
        assert!(repository.exports.contains_key("pkg"));
        assert_eq!(repository.constants.get("root").map(String::as_str), Some("/src"));
        assert_eq!(repository.constants.get("extra").map(String::as_str), Some("1"));
    }

    #[derive(Clone, Copy)]
    struct FakeVcs {
        working_copy: bool,
        broken: bool,
    }

    impl Vcs for FakeVcs {
        fn is_working_copy(&self) -> bool {
            self.working_copy
        }
        fn reset(&self) -> anyhow::Result<()> {
            Ok(())
        }
        fn checkout(&self, _: &Tag) -> anyhow::Result<()> {
            Ok(())
        }
        fn date(&self, _: &str) -> anyhow::Result<SystemTime> {
            Ok(SystemTime::UNIX_EPOCH)
        }
        fn fill_tags(&self, dest: &mut BTreeMap<String, Tag>) -> anyhow::Result<()> {
            if self.broken {
                anyhow::bail!("object database is corrupt");
            }
            dest.insert(
                "v1.0".to_string(),
                Tag {
                    id: "abc123".to_string(),
                    branch: String::new(),
                    tag: "v1.0".to_string(),
                },
            );
            Ok(())
        }
        fn diff(&self) -> anyhow::Result<Vec<PathBuf>> {
            Ok(Vec::new())
        }
    }

    fn context_with_vcs(vcs: FakeVcs) -> Context {
        let mut context = Context::new();
        context
            .register_vcs(
                r"\.tar\.gz$",
                Box::new(move |_: &Path| Arc::new(vcs) as Arc<dyn Vcs>),
            )
            .unwrap();
        context
    }

    #[test]
    fn test_configure_fills_tags_from_vcs() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = context_with_vcs(FakeVcs {
            working_copy: true,
            broken: false,
        });

        let mut builder = Builder::new(&context, &description).unwrap();
        let repository = builder.configure(&[]).unwrap();
        assert_eq!(repository.tags.get("v1.0").unwrap().id, "abc123");
    }

    #[test]
    fn test_configure_outside_working_copy_leaves_tags_empty() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = context_with_vcs(FakeVcs {
            working_copy: false,
            broken: true,
        });

        let mut builder = Builder::new(&context, &description).unwrap();
        assert!(builder.configure(&[]).unwrap().tags.is_empty());
        assert!(builder.cache_path().exists());
    }

    #[test]
    fn test_configure_git_url_in_plain_directory() {
        let dir = tempfile::tempdir().unwrap();
        let content = DESCRIPTION.replace(
            "https://example.org/demo.tar.gz",
            "https://github.com/jiboo/brief.git",
        );
        let description = write_description(dir.path(), &content);
        let context = Context::with_builtins();

        let mut builder = Builder::new(&context, &description).unwrap();
        let repository = builder.configure(&[]).unwrap();
        assert_eq!(repository.url, "https://github.com/jiboo/brief.git");
        assert!(repository.tags.is_empty());
    }

    #[test]
    fn test_tag_failure_in_working_copy_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = context_with_vcs(FakeVcs {
            working_copy: true,
            broken: true,
        });

        let mut builder = Builder::new(&context, &description).unwrap();
        let err = builder.configure(&[]).unwrap_err();
        assert!(matches!(err, BuilderError::Vcs(_)));
        assert!(!builder.cache_path().exists());
    }

    #[test]
    fn test_configure_rejects_undeclared_flavor() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let (context, _) = context_with_recorder();
        let mut builder = Builder::new(&context, &description).unwrap();

        let err = builder.configure(&["relase".to_string()]).unwrap_err();
        assert!(matches!(
            err,
            BuilderError::Resolution(ResolutionError::UnknownFlavor { ref flavor, .. }) if flavor == "relase"
        ));
        assert!(!builder.cache_path().exists());

        // Declared by `app` only; the other tasks skip it at build time.
        assert!(builder.configure(&["debug".to_string()]).is_ok());
    }

    #[test]
    fn test_context_default_flavors_are_not_checked() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let context = Context::from_settings(&Settings {
            default_flavors: vec!["profile".to_string()],
            ..Settings::default()
        });
        let mut builder = Builder::new(&context, &description).unwrap();

        builder.configure(&[]).unwrap();
        assert_eq!(builder.flavors(), ["profile".to_string()]);

        set_mtime(&description, SystemTime::now() + Duration::from_secs(60));
        let mut builder = Builder::new(&context, &description).unwrap();
        assert_eq!(builder.load().unwrap().name, "demo");
        assert_eq!(builder.flavors(), ["profile".to_string()]);
    }

    #[test]
    fn test_invalid_description_reports_path_and_position() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), "{\n  \"nmae\": \"demo\"\n}");
        let context = Context::new();
        let mut builder = Builder::new(&context, &description).unwrap();

        let err = builder.configure(&[]).unwrap_err();
        assert!(matches!(
            err,
            BuilderError::Parse { ref path, ref source } if path.ends_with("brief.json") && source.line == 2
        ));
        assert!(!builder.cache_path().exists());
    }

    #[test]
    fn test_clean_removes_cache() {
        let dir = tempfile::tempdir().unwrap();
        let description = write_description(dir.path(), DESCRIPTION);
        let (context, _) = context_with_recorder();
        let mut builder = Builder::new(&context, &description).unwrap();
        builder.configure(&[]).unwrap();

        assert!(builder.clean().unwrap());
        assert!(!builder.cache_path().exists());
        assert!(builder.repository().is_none());
        assert!(!builder.clean().unwrap());
    }
}
