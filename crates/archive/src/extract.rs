//! Extract path: find, copy out, restore metadata, tombstone, compact.

use anyhow::{anyhow, bail, ensure, Context, Result};
use record::{tombstone_patch, RecordScanner, ScannedRecord};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, Write};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info, warn};

use crate::{name_to_path, Archive};

/// What [`Archive::extract`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// The payload was written to `path` and the record tombstoned.
    /// `compacted` is `false` when compaction was disabled or failed.
    Extracted {
        path: PathBuf,
        size: u64,
        compacted: bool,
    },
    /// No live record has that name.
    NotFound,
    /// The first live match is larger than the configured ceiling. Nothing
    /// was written and the archive is unchanged.
    TooLarge { size: u64, limit: u64 },
}

impl Archive {
    /// Extracts the first live record named `name` into `dest_dir`, then
    /// removes it from the archive.
    ///
    /// # Steps
    ///
    /// 1. Scan records in order; tombstones and other names are skipped.
    /// 2. On the first live match, stop searching. If it exceeds
    ///    `max_extract_size`, return [`ExtractOutcome::TooLarge`].
    /// 3. Copy the payload to `dest_dir/<name>`, created with the captured
    ///    mode. A failed copy removes the partial output and leaves the
    ///    archive untouched.
    /// 4. Restore permissions, ownership (best-effort) and timestamps.
    ///    Failures here are logged, not returned.
    /// 5. Patch the record's `is_deleted` byte in place.
    /// 6. Compact (if enabled). A compaction failure is only a warning: the
    ///    tombstone already removed the record logically.
    ///
    /// Leading `/` in a stored name is dropped so output always lands
    /// under `dest_dir`; names with `..` components are refused.
    pub fn extract<P: AsRef<Path>>(&self, name: &[u8], dest_dir: P) -> Result<ExtractOutcome> {
        let dest_dir = dest_dir.as_ref();

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&self.path)
            .with_context(|| format!("failed to open archive {}", self.path.display()))?;

        let mut scanner = RecordScanner::new(&file);
        let found = loop {
            let Some(rec) = scanner.next_record()? else {
                break None;
            };

            if rec.header.deleted || rec.header.name != name {
                debug!(offset = rec.offset, next = rec.end_offset(), name = %rec.header.name_lossy(), deleted = rec.header.deleted, "skipping record");
                scanner.skip_payload()?;
                continue;
            }

            let size = rec.header.size();
            let limit = self.config.max_extract_size;
            if size > limit {
                warn!(name = %rec.header.name_lossy(), size, limit, "record exceeds extract size limit, not extracted");
                return Ok(ExtractOutcome::TooLarge { size, limit });
            }

            let out_path = output_path(dest_dir, name)?;
            ensure!(
                !is_same_file(&out_path, &self.path, &file)?,
                "refusing to extract {} over the archive itself",
                out_path.display()
            );
            self.write_payload(&mut scanner, &rec, &out_path)?;
            break Some((rec, out_path));
        };
        drop(scanner);

        let Some((rec, out_path)) = found else {
            info!(archive = %self.path.display(), name = %String::from_utf8_lossy(name), "not found");
            return Ok(ExtractOutcome::NotFound);
        };

        if let Err(e) = transfer::restore_metadata(&out_path, &rec.header.stat) {
            warn!(path = %out_path.display(), error = %e, "metadata not fully restored");
        }

        let mut handle = &file;
        tombstone_patch(rec.offset)
            .apply(&mut handle)
            .with_context(|| format!("failed to mark record at offset {} deleted", rec.offset))?;
        if self.config.sync {
            file.sync_all()?;
        }
        drop(file);

        info!(
            archive = %self.path.display(),
            name = %rec.header.name_lossy(),
            size = rec.header.size(),
            path = %out_path.display(),
            "extracted"
        );

        let compacted = if self.config.compact_after_extract {
            match self.compact() {
                Ok(_) => true,
                Err(e) => {
                    warn!(archive = %self.path.display(), error = %format!("{:#}", e), "compaction after extract failed; record is tombstoned but space is not reclaimed");
                    false
                }
            }
        } else {
            false
        };

        Ok(ExtractOutcome::Extracted {
            path: out_path,
            size: rec.header.size(),
            compacted,
        })
    }

    /// Copies the current payload of `scanner` into a fresh file at `out_path`.
    fn write_payload<R: Read + Seek>(
        &self,
        scanner: &mut RecordScanner<R>,
        rec: &ScannedRecord,
        out_path: &Path,
    ) -> Result<()> {
        if let Some(parent) = out_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
        }

        let out = create_output(out_path, rec.header.stat.permission_bits())
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        let mut w = BufWriter::new(out);

        let copied = scanner
            .copy_payload(&mut w)
            .map_err(anyhow::Error::from)
            .and_then(|_| w.flush().map_err(anyhow::Error::from))
            .and_then(|()| {
                if self.config.sync {
                    w.get_ref().sync_all()?;
                }
                Ok(())
            });

        if let Err(e) = copied {
            drop(w);
            let _ = fs::remove_file(out_path);
            return Err(e.context(format!(
                "failed to extract record at offset {} to {}",
                rec.offset,
                out_path.display()
            )));
        }

        Ok(())
    }
}

#[cfg(unix)]
fn create_output(path: &Path, mode: u32) -> std::io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode)
        .open(path)
}

#[cfg(not(unix))]
fn create_output(path: &Path, _mode: u32) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Whether `out_path` already exists and is the open archive `file`
/// (same inode, so hard links and symlinks count too).
#[cfg(unix)]
fn is_same_file(out_path: &Path, _archive_path: &Path, file: &File) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let out = match fs::metadata(out_path) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let archive = file.metadata()?;
    Ok(out.dev() == archive.dev() && out.ino() == archive.ino())
}

#[cfg(not(unix))]
fn is_same_file(out_path: &Path, archive_path: &Path, _file: &File) -> io::Result<bool> {
    match fs::canonicalize(out_path) {
        Ok(out) => Ok(out == fs::canonicalize(archive_path)?),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

/// Maps a stored record name to a path under `dest_dir`.
fn output_path(dest_dir: &Path, name: &[u8]) -> Result<PathBuf> {
    let stored = name_to_path(name);
    let mut rel = PathBuf::new();

    for component in stored.components() {
        match component {
            Component::Normal(part) => rel.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => bail!(
                "refusing to extract {}: name escapes the destination directory",
                stored.display()
            ),
        }
    }

    if rel.as_os_str().is_empty() {
        return Err(anyhow!("record name {:?} has no file component", stored));
    }

    Ok(dest_dir.join(rel))
}
