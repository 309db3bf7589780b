// src/core/cache.rs

//! Configure-time cache files.
//!
//! Layout: the header tuple `(i32 schema_version, [string] flavors)` followed
//! by the resolved `Repository`, all in the binary codec. The whole file is
//! encoded in memory first so an encoding failure never leaves bytes on disk,
//! and a scope guard removes a partially written file if the write fails.

use crate::constants::SCHEMA_VERSION;
use crate::core::binary::{self, Binary, BinaryError};
use crate::models::Repository;
use anyhow::{Context, Result};
use log::debug;
use std::fs::{self, File};
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::time::SystemTime;

const HASH_TRUNCATE_LENGTH: usize = 16; // 16 bytes = 32 hex characters

/// The fixed prefix of every cache file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheHeader {
    pub schema_version: i32,
    /// Flavors recorded when the repository was configured.
    pub flavors: Vec<String>,
}

impl Binary for CacheHeader {
    fn write<W: Write>(&self, out: &mut W) -> Result<(), BinaryError> {
        (self.schema_version, self.flavors.clone()).write(out)
    }

    fn read<R: Read>(input: &mut R) -> Result<Self, BinaryError> {
        let (schema_version, flavors) = <(i32, Vec<String>)>::read(input)?;
        Ok(Self {
            schema_version,
            flavors,
        })
    }
}

/// Why a cache must be re-derived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StaleReason {
    /// Written by another schema version.
    SchemaMismatch { found: i32 },
    /// The description was modified after the cache was written.
    SourceNewer,
}

/// What a cache file looks like before its payload is read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    /// No cache file: the repository is not configured.
    Missing,
    /// The header is unreadable.
    Corrupt(String),
    Stale {
        reason: StaleReason,
        header: CacheHeader,
    },
    Fresh(CacheHeader),
}

/// Serializes `repo` with its header and writes it to `path`.
pub fn write_cache(path: &Path, flavors: &[String], repo: &Repository) -> Result<(), BinaryError> {
    let header = CacheHeader {
        schema_version: SCHEMA_VERSION,
        flavors: flavors.to_vec(),
    };
    let mut buffer = binary::to_bytes(&header)?;
    repo.write(&mut buffer)?;

    let guard = scopeguard::guard(path.to_path_buf(), |partial| {
        log::warn!("Removing partially written cache {}", partial.display());
        let _ = fs::remove_file(&partial);
    });
    let mut file = File::create(path)?;
    file.write_all(&buffer)?;
    file.sync_all()?;
    scopeguard::ScopeGuard::into_inner(guard);

    debug!(
        "Wrote cache {} ({} bytes, flavors: {:?})",
        path.display(),
        buffer.len(),
        flavors
    );
    Ok(())
}

/// Opens a cache file and reads its header, leaving the reader on the payload.
pub fn open_cache(path: &Path) -> Result<(CacheHeader, BufReader<File>), BinaryError> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = CacheHeader::read(&mut reader)?;
    Ok((header, reader))
}

fn modified(path: &Path) -> std::io::Result<SystemTime> {
    fs::metadata(path)?.modified()
}

/// Why the cache written with `header` can no longer be used for `description`, if it can't.
pub fn staleness(
    description: &Path,
    cache: &Path,
    header: &CacheHeader,
) -> std::io::Result<Option<StaleReason>> {
    if header.schema_version != SCHEMA_VERSION {
        return Ok(Some(StaleReason::SchemaMismatch {
            found: header.schema_version,
        }));
    }
    if modified(description)? > modified(cache)? {
        return Ok(Some(StaleReason::SourceNewer));
    }
    Ok(None)
}

/// Classifies the cache of `description` without reading the payload.
pub fn inspect(description: &Path, cache: &Path) -> std::io::Result<CacheStatus> {
    if !cache.exists() {
        return Ok(CacheStatus::Missing);
    }
    let header = match open_cache(cache) {
        Ok((header, _)) => header,
        Err(e) => return Ok(CacheStatus::Corrupt(e.to_string())),
    };
    Ok(match staleness(description, cache, &header)? {
        Some(reason) => CacheStatus::Stale { reason, header },
        None => CacheStatus::Fresh(header),
    })
}

/// Represents the validation metadata for a description file.
#[derive(Debug, PartialEq, Eq)]
pub struct CacheValidationData {
    pub timestamp: SystemTime,
    pub file_size: u64,
    pub content_hash: String,
}

/// Calculates the modification time, size and truncated blake3 hash of a file.
///
/// # Errors
/// Returns an I/O error if the file cannot be read or its metadata cannot be accessed.
pub fn calculate_validation_data(path: &Path) -> Result<CacheValidationData> {
    debug!("Calculating validation data for '{}'", path.display());

    let metadata = fs::metadata(path)
        .with_context(|| format!("Failed to read metadata for file '{}'", path.display()))?;
    let timestamp = metadata.modified()?;
    let file_size = metadata.len();

    let content = fs::read(path)
        .with_context(|| format!("Failed to read content of file '{}'", path.display()))?;
    let hash = blake3::hash(&content);
    let truncated = hash.as_bytes().get(..HASH_TRUNCATE_LENGTH).unwrap_or_default();
    let content_hash = hex::encode(truncated);

    debug!(
        "Validation data for '{}': size={}, hash={}",
        path.display(),
        file_size,
        content_hash
    );

    Ok(CacheValidationData {
        timestamp,
        file_size,
        content_hash,
    })
}
