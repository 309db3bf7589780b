// src/core/settings.rs

//! User settings, read from `config.toml`.
//!
//! ```toml
//! default_flavors = ["release"]
//! cache_suffix = ".brief"
//!
//! [vars]
//! prefix = "/usr/local"
//!
//! [target]
//! arch = "aarch64"
//! platform = "linux"
//! ```

use crate::constants::{ALT_CACHE_SUFFIX, CACHE_SUFFIX};
use crate::core::paths::{self, PathError};
use crate::core::resolver::Target;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error("Could not read settings file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error(
        "Invalid cache suffix '{0}': expected '{primary}' or '{alt}'",
        primary = CACHE_SUFFIX,
        alt = ALT_CACHE_SUFFIX
    )]
    InvalidCacheSuffix(String),
}

/// Overrides of the host target used for filter matching.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TargetSettings {
    pub arch: Option<String>,
    pub platform: Option<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Global variables available to `${...}` references.
    pub vars: BTreeMap<String, String>,
    /// Flavors recorded by `configure` when none are requested.
    pub default_flavors: Vec<String>,
    pub cache_suffix: String,
    pub target: TargetSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            vars: BTreeMap::new(),
            default_flavors: Vec::new(),
            cache_suffix: CACHE_SUFFIX.to_string(),
            target: TargetSettings::default(),
        }
    }
}

impl Settings {
    /// Loads the user settings. A missing file yields the defaults.
    pub fn load() -> Result<Self, SettingsError> {
        let path = paths::get_settings_path()?;
        if !path.exists() {
            log::debug!("No settings file at {}, using defaults.", path.display());
            return Ok(Self::default());
        }
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            source: e,
        })?;
        let settings: Self = toml::from_str(&content).map_err(|e| SettingsError::Parse {
            path: path.display().to_string(),
            source: e,
        })?;
        settings.validate()?;
        log::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.cache_suffix != CACHE_SUFFIX && self.cache_suffix != ALT_CACHE_SUFFIX {
            return Err(SettingsError::InvalidCacheSuffix(self.cache_suffix.clone()));
        }
        Ok(())
    }

    /// The host target with any configured overrides applied.
    pub fn target(&self) -> Target {
        let host = Target::host();
        Target {
            arch: self.target.arch.clone().unwrap_or(host.arch),
            platform: self.target.platform.clone().unwrap_or(host.platform),
        }
    }
}
