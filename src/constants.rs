// src/constants.rs

/// Version stamp written at the head of every binary cache file.
/// Bump it whenever the field order or the set of cached fields changes.
pub const SCHEMA_VERSION: i32 = 1;

/// Default suffix appended to the description path to name its cache file.
pub const CACHE_SUFFIX: &str = ".brief";

/// Alternative cache suffix accepted in the settings file.
pub const ALT_CACHE_SUFFIX: &str = ".cache";

/// Extension of repository description files, used for discovery.
pub const DESCRIPTION_EXTENSION: &str = "json";

/// Name of the directory holding the user settings (inside the system config dir).
pub const CONFIG_DIR_NAME: &str = "brief";

/// Name of the user settings file.
pub const SETTINGS_FILENAME: &str = "config.toml";

/// Environment variable overriding the settings file location.
pub const SETTINGS_ENV_VAR: &str = "BRIEF_CONFIG";

/// Compact renderings shorter than this are emitted on a single line.
pub const INLINE_THRESHOLD: usize = 64;

/// Largest string, array or map the binary cache can hold.
pub const MAX_CONTAINER_LEN: usize = u16::MAX as usize;

/// Maximum nesting of `${...}` references during variable expansion.
pub const MAX_EXPANSION_DEPTH: u32 = 32;
