//! # Config - archive tuning knobs
//!
//! All settings have defaults and can be overridden from the environment:
//!
//! ```text
//! ARCHIVER_MAX_EXTRACT_BYTES   largest payload extract will write  (default: 1073741824 = 1 GiB)
//! ARCHIVER_COMPACT_ON_EXTRACT  compact right after an extraction   (default: "true")
//! ARCHIVER_SYNC                fsync appends and tombstone writes  (default: "true")
//! ```

use anyhow::{Context, Result};
use std::str::FromStr;

/// Default ceiling for extractable payloads (1 GiB).
pub const DEFAULT_MAX_EXTRACT_SIZE: u64 = 1024 * 1024 * 1024;

pub const ENV_MAX_EXTRACT_BYTES: &str = "ARCHIVER_MAX_EXTRACT_BYTES";
pub const ENV_COMPACT_ON_EXTRACT: &str = "ARCHIVER_COMPACT_ON_EXTRACT";
pub const ENV_SYNC: &str = "ARCHIVER_SYNC";

/// Per-archive behaviour settings, passed to the archive handle explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveConfig {
    /// Records whose payload exceeds this many bytes are never extracted.
    pub max_extract_size: u64,
    /// Run compaction immediately after a successful extraction.
    pub compact_after_extract: bool,
    /// fsync the archive after appends and tombstone writes.
    pub sync: bool,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            max_extract_size: DEFAULT_MAX_EXTRACT_SIZE,
            compact_after_extract: true,
            sync: true,
        }
    }
}

impl ArchiveConfig {
    /// Defaults overridden by any `ARCHIVER_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error naming the variable if a value does not parse.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](ArchiveConfig::from_env) but reads values through
    /// `lookup`, so callers (and tests) can supply their own source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            max_extract_size: parse_or(&lookup, ENV_MAX_EXTRACT_BYTES, defaults.max_extract_size)?,
            compact_after_extract: parse_or(
                &lookup,
                ENV_COMPACT_ON_EXTRACT,
                defaults.compact_after_extract,
            )?,
            sync: parse_or(&lookup, ENV_SYNC, defaults.sync)?,
        })
    }

    #[must_use]
    pub fn with_max_extract_size(mut self, bytes: u64) -> Self {
        self.max_extract_size = bytes;
        self
    }

    #[must_use]
    pub fn with_compact_after_extract(mut self, enabled: bool) -> Self {
        self.compact_after_extract = enabled;
        self
    }

    #[must_use]
    pub fn with_sync(mut self, enabled: bool) -> Self {
        self.sync = enabled;
        self
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("invalid value for {}: {:?}", key, raw)),
        None => Ok(default),
    }
}
