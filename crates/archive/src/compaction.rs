//! Compaction: rewrites the archive keeping only live records.
//!
//! Live headers and payloads are copied byte for byte, in their original
//! order, into a temp file next to the archive. Tombstoned payloads are
//! skipped. The temp file is fsynced and then renamed over the archive; that
//! rename is the only commit point. Every failure before it drops the temp
//! file (deleting it) and leaves the original archive untouched.

use anyhow::{Context, Result};
use record::RecordScanner;
use std::fs::File;
use std::io::{BufWriter, Write};
use tracing::{debug, info};

use crate::{sync_parent_dir, Archive};

/// Counters reported by [`Archive::compact`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompactStats {
    /// Live records carried over.
    pub kept: u64,
    /// Tombstoned records dropped.
    pub dropped: u64,
    /// Archive length before compaction.
    pub bytes_before: u64,
    /// Archive length after compaction.
    pub bytes_after: u64,
}

impl CompactStats {
    /// Bytes returned to the filesystem.
    #[must_use]
    pub fn reclaimed(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

impl Archive {
    /// Compacts the archive in place (see module docs).
    ///
    /// # Errors
    ///
    /// Returns an error if the archive is missing or corrupt, or on any I/O
    /// failure. The original archive is unchanged in every error case.
    pub fn compact(&self) -> Result<CompactStats> {
        self.compact_with(|f| f)
    }

    /// [`compact`](Archive::compact) with the temp-file writer passed
    /// through `wrap`, so tests can inject write failures.
    pub(crate) fn compact_with<W, F>(&self, wrap: F) -> Result<CompactStats>
    where
        W: Write,
        F: FnOnce(File) -> W,
    {
        let src = File::open(&self.path)
            .with_context(|| format!("failed to open archive {} for compaction", self.path.display()))?;
        let src_meta = src.metadata()?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "archive".to_string());
        let tmp = tempfile::Builder::new()
            .prefix(&format!(".{}.", file_name))
            .suffix(".compact.tmp")
            .tempfile_in(self.dir())
            .with_context(|| format!("failed to create temp file in {}", self.dir().display()))?;
        tmp.as_file().set_permissions(src_meta.permissions())?;

        let mut stats = CompactStats {
            bytes_before: src_meta.len(),
            ..CompactStats::default()
        };

        {
            let mut out = BufWriter::new(wrap(tmp.as_file().try_clone()?));
            let mut scanner = RecordScanner::new(src);

            while let Some(rec) = scanner.next_record()? {
                if rec.header.deleted {
                    debug!(offset = rec.offset, end = rec.end_offset(), "dropping tombstoned record");
                    scanner.skip_payload()?;
                    stats.dropped += 1;
                    continue;
                }

                out.write_all(&rec.raw[..])
                    .context("failed to write header to compaction temp file")?;
                scanner.copy_payload(&mut out)?;
                stats.kept += 1;
                stats.bytes_after += rec.header.record_len();
            }

            out.flush().context("failed to flush compaction temp file")?;
        }

        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)
            .map_err(|e| e.error)
            .with_context(|| format!("failed to replace {}", self.path.display()))?;
        sync_parent_dir(&self.path);

        info!(
            archive = %self.path.display(),
            kept = stats.kept,
            dropped = stats.dropped,
            reclaimed = stats.reclaimed(),
            "compacted"
        );

        Ok(stats)
    }
}
