//! # Archive - single-file archive manager
//!
//! Stores named files with their metadata inside one flat container file
//! and ties the [`record`], [`transfer`] and [`config`] crates together.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌────────────────────────────────────────────────────┐
//! │                      ARCHIVE                       │
//! │                                                    │
//! │ append.rs  → header + payload at end of file       │
//! │                                                    │
//! │ extract.rs → scan → copy payload → restore meta    │
//! │              → tombstone patch (in place)          │
//! │              |                                     │
//! │              v                                     │
//! │ compaction.rs → live records into temp file        │
//! │                 → fsync → atomic rename            │
//! │                                                    │
//! │ list.rs    → scan, tombstones hidden (read-only)   │
//! └────────────────────────────────────────────────────┘
//! ```
//!
//! ## Record lifecycle
//!
//! ```text
//! Live ──(extract)──> Tombstoned ──(compact)──> Removed
//! ```
//!
//! Only live records take part in extraction lookups and listings. The first
//! live record whose name matches wins; duplicates are not rejected.
//!
//! ## Crash Safety
//!
//! Extraction commits by flipping one byte in the record header. Compaction
//! never touches the original file: it writes a sibling temp file, fsyncs it
//! and renames it over the archive, so readers that open the path see either
//! the old or the new archive, never a mix.
//!
//! There is no locking. Concurrent writers against one archive path must be
//! serialized by the caller.
mod append;
mod compaction;
mod extract;
mod list;

pub use compaction::CompactStats;
pub use config::ArchiveConfig;
pub use extract::ExtractOutcome;
pub use list::{ArchiveStats, ListEntry, Listing, TIME_FORMAT, UNKNOWN_TIME};
pub use record::{FileStat, RecordError, RecordHeader, Timestamp, HEADER_LEN, MAX_NAME_BYTES};

use std::path::{Path, PathBuf};

/// Handle to an archive file.
///
/// Holds only the path and configuration; every operation opens the file
/// itself, so the handle never keeps a descriptor alive across a
/// compaction's rename.
#[derive(Debug, Clone)]
pub struct Archive {
    pub(crate) path: PathBuf,
    pub(crate) config: ArchiveConfig,
}

impl Archive {
    /// Creates a handle for the archive at `path`. The file is not touched
    /// until an operation runs; [`append`](Archive::append) creates it.
    pub fn new<P: AsRef<Path>>(path: P, config: ArchiveConfig) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config,
        }
    }

    /// Returns the archive path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Directory that holds the archive (`.` for a bare file name).
    pub(crate) fn dir(&self) -> &Path {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        }
    }
}

/// Converts a path to the bytes stored in a record name.
#[cfg(unix)]
pub fn path_to_name(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub fn path_to_name(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Converts stored record-name bytes back to a path.
#[cfg(unix)]
pub(crate) fn name_to_path(name: &[u8]) -> PathBuf {
    use std::os::unix::ffi::OsStrExt;
    PathBuf::from(std::ffi::OsStr::from_bytes(name))
}

#[cfg(not(unix))]
pub(crate) fn name_to_path(name: &[u8]) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(name).into_owned())
}

/// Fsyncs the directory containing `path` so a rename inside it is durable.
/// No-op where directories cannot be opened.
pub(crate) fn sync_parent_dir(path: &Path) {
    if let Some(parent) = path.parent() {
        let parent = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Ok(dir) = std::fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
}

#[cfg(test)]
mod tests;
