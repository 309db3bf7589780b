// src/system/vcs.rs

//! Version control drivers, selected by matching the repository URL against
//! the patterns registered on the context.

use crate::models::Tag;
use crate::system::executor;
use anyhow::{Context, Result, anyhow};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Drives one working copy.
pub trait Vcs: Send + Sync {
    /// Whether the driver's root lies inside a working copy it can read.
    fn is_working_copy(&self) -> bool;

    /// Discards local modifications.
    fn reset(&self) -> Result<()>;

    fn checkout(&self, tag: &Tag) -> Result<()>;

    /// Commit time of `revision`.
    fn date(&self, revision: &str) -> Result<SystemTime>;

    /// Adds every tag known to the working copy to `dest`.
    fn fill_tags(&self, dest: &mut BTreeMap<String, Tag>) -> Result<()>;

    /// Files modified in the working copy, relative to its root.
    fn diff(&self) -> Result<Vec<PathBuf>>;
}

/// Opens a driver on the working copy rooted at the given directory.
pub type VcsFactory = Box<dyn Fn(&Path) -> Arc<dyn Vcs> + Send + Sync>;

/// URL pattern under which [`Git`] is registered by default.
pub const GIT_PATTERN: &str = r"(^git@|^git://|\.git/?$)";

/// Driver shelling out to the `git` executable.
#[derive(Debug, Clone)]
pub struct Git {
    root: PathBuf,
}

impl Git {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    fn git(&self, args: &[&str]) -> Result<String> {
        executor::capture_output("git", args, &self.root)
            .with_context(|| format!("git {} failed in {}", args.join(" "), self.root.display()))
    }
}

impl Vcs for Git {
    fn is_working_copy(&self) -> bool {
        self.git(&["rev-parse", "--is-inside-work-tree"])
            .is_ok_and(|output| output.trim() == "true")
    }

    fn reset(&self) -> Result<()> {
        self.git(&["reset", "--hard"]).map(|_| ())
    }

    fn checkout(&self, tag: &Tag) -> Result<()> {
        let reference = [&tag.tag, &tag.branch, &tag.id]
            .into_iter()
            .find(|reference| !reference.is_empty())
            .ok_or_else(|| anyhow!("Tag has neither a tag, a branch nor a revision"))?;
        self.git(&["checkout", reference.as_str()]).map(|_| ())
    }

    fn date(&self, revision: &str) -> Result<SystemTime> {
        let output = self.git(&["show", "-s", "--format=%ct", revision])?;
        let seconds: u64 = output
            .trim()
            .parse()
            .with_context(|| format!("Unexpected commit time '{}'", output.trim()))?;
        Ok(UNIX_EPOCH + Duration::from_secs(seconds))
    }

    fn fill_tags(&self, dest: &mut BTreeMap<String, Tag>) -> Result<()> {
        let listing = self.git(&["tag", "--list"])?;
        for name in listing.lines().map(str::trim).filter(|line| !line.is_empty()) {
            let id = self.git(&["rev-list", "-n", "1", name])?;
            dest.insert(
                name.to_string(),
                Tag {
                    id: id.trim().to_string(),
                    branch: String::new(),
                    tag: name.to_string(),
                },
            );
        }
        log::debug!("Filled {} tag(s) from {}", dest.len(), self.root.display());
        Ok(())
    }

    fn diff(&self) -> Result<Vec<PathBuf>> {
        let listing = self.git(&["diff", "--name-only"])?;
        Ok(listing
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(PathBuf::from)
            .collect())
    }
}
