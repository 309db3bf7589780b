// src/core/paths.rs

use crate::constants::{
    CONFIG_DIR_NAME, DESCRIPTION_EXTENSION, SETTINGS_ENV_VAR, SETTINGS_FILENAME,
};
use lazy_static::lazy_static;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use walkdir::WalkDir;

lazy_static! {
    static ref BRIEF_CONFIG_DIR: Mutex<Option<PathBuf>> = Mutex::new(None);
}

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Could not find system config directory.")]
    ConfigDirNotFound,
    #[error("Failed to expand path '{template}': {message}")]
    Expansion { template: String, message: String },
    #[error("No .{ext} description found in '{dir}'. Pass the description path explicitly.", ext = DESCRIPTION_EXTENSION)]
    NoDescription { dir: String },
    #[error("Several descriptions found in '{dir}' ({candidates}). Pass the description path explicitly.")]
    AmbiguousDescription { dir: String, candidates: String },
    #[error("Could not scan '{dir}': {source}")]
    Scan {
        dir: String,
        #[source]
        source: walkdir::Error,
    },
}

/// Returns the brief configuration directory (`~/.config/brief` on Linux).
/// The directory is not created.
///
/// This function is memoized: the first call computes and caches the path,
/// subsequent calls return the cached value instantly.
pub fn get_brief_config_dir() -> Result<PathBuf, PathError> {
    let mut cached_path_guard = BRIEF_CONFIG_DIR
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner());

    if let Some(path) = &*cached_path_guard {
        return Ok(path.clone());
    }

    let config_path = dirs::config_dir()
        .ok_or(PathError::ConfigDirNotFound)?
        .join(CONFIG_DIR_NAME);

    *cached_path_guard = Some(config_path.clone());
    Ok(config_path)
}

/// Location of the settings file: `$BRIEF_CONFIG` when set, else `config.toml`
/// in the configuration directory.
pub fn get_settings_path() -> Result<PathBuf, PathError> {
    match std::env::var(SETTINGS_ENV_VAR) {
        Ok(template) if !template.trim().is_empty() => expand_path(&template),
        _ => get_brief_config_dir().map(|dir| dir.join(SETTINGS_FILENAME)),
    }
}

/// Expands `~` and environment variables (`$VAR`, `${VAR}`) in a path.
pub fn expand_path(template: &str) -> Result<PathBuf, PathError> {
    let expanded = shellexpand::full(template).map_err(|e| PathError::Expansion {
        template: template.to_string(),
        message: e.to_string(),
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

/// The cache file of a description: its full path with `suffix` appended
/// (`brief.json` becomes `brief.json.brief`).
pub fn cache_path_for(description: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = description.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Finds the single description file directly inside `dir`.
pub fn discover_description(dir: &Path) -> Result<PathBuf, PathError> {
    let mut candidates = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| PathError::Scan {
            dir: dir.display().to_string(),
            source: e,
        })?;
        let is_description = entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some(DESCRIPTION_EXTENSION);
        if is_description {
            candidates.push(entry.into_path());
        }
    }

    log::debug!("Description candidates in {}: {:?}", dir.display(), candidates);
    match candidates.len() {
        0 => Err(PathError::NoDescription {
            dir: dir.display().to_string(),
        }),
        1 => Ok(candidates.remove(0)),
        _ => Err(PathError::AmbiguousDescription {
            dir: dir.display().to_string(),
            candidates: candidates
                .iter()
                .filter_map(|path| path.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join(", "),
        }),
    }
}
