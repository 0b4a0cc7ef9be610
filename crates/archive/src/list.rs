//! Read path: `list()` and `stats()`. Neither mutates the archive.

use anyhow::{Context, Result};
use chrono::{Local, TimeZone};
use record::{RecordScanner, Timestamp};
use std::fs::File;

use crate::Archive;

/// `strftime`-style format used by [`ListEntry::modified_display`].
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Shown instead of a time that has no local-time representation.
pub const UNKNOWN_TIME: &str = "unknown";

/// One live record as reported by [`Archive::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub name: Vec<u8>,
    pub size: u64,
    /// Modification time exactly as stored in the header.
    pub modified: Timestamp,
    /// Offset of the record header in the archive.
    pub offset: u64,
}

impl ListEntry {
    #[must_use]
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Modification time in local time, formatted with [`TIME_FORMAT`].
    ///
    /// Stored times are not range-checked on decode, so a value chrono
    /// cannot represent yields [`UNKNOWN_TIME`].
    #[must_use]
    pub fn modified_display(&self) -> String {
        match Local
            .timestamp_opt(self.modified.secs, self.modified.nanos)
            .single()
        {
            Some(t) => t.format(TIME_FORMAT).to_string(),
            None => UNKNOWN_TIME.to_string(),
        }
    }
}

/// Lazy iterator over the live records of an archive.
///
/// Yields `Err` at most once; iteration stops after the first error.
pub struct Listing {
    scanner: RecordScanner<File>,
    done: bool,
}

impl Iterator for Listing {
    type Item = Result<ListEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let rec = match self.scanner.next_record() {
                Ok(Some(rec)) => rec,
                Ok(None) => {
                    self.done = true;
                    return None;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e.into()));
                }
            };

            if let Err(e) = self.scanner.skip_payload() {
                self.done = true;
                return Some(Err(e.into()));
            }

            if rec.header.deleted {
                continue;
            }

            return Some(Ok(ListEntry {
                size: rec.header.size(),
                modified: rec.header.stat.mtime,
                offset: rec.offset,
                name: rec.header.name,
            }));
        }
    }
}

/// Record counts and byte totals (header + payload) for an archive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    pub live: u64,
    pub tombstoned: u64,
    pub live_bytes: u64,
    /// Bytes a compaction would reclaim.
    pub dead_bytes: u64,
}

impl Archive {
    /// Returns a lazy iterator over live records in archive order.
    pub fn list(&self) -> Result<Listing> {
        let scanner = RecordScanner::open(&self.path)
            .with_context(|| format!("failed to open archive {}", self.path.display()))?;
        Ok(Listing {
            scanner,
            done: false,
        })
    }

    /// Scans the whole archive and counts live and tombstoned records.
    pub fn stats(&self) -> Result<ArchiveStats> {
        let mut scanner = RecordScanner::open(&self.path)
            .with_context(|| format!("failed to open archive {}", self.path.display()))?;
        let mut stats = ArchiveStats::default();

        while let Some(rec) = scanner.next_record()? {
            scanner.skip_payload()?;
            if rec.header.deleted {
                stats.tombstoned += 1;
                stats.dead_bytes += rec.header.record_len();
            } else {
                stats.live += 1;
                stats.live_bytes += rec.header.record_len();
            }
        }

        Ok(stats)
    }
}
