//! Append path: `append()` and `append_named()`.
//!
//! A record is written as its encoded header followed by exactly `size`
//! payload bytes, where `size` is the length captured before copying. Every
//! check (source type, name length) happens before the first byte is
//! written. A failure mid-copy leaves a partial trailing record behind; the
//! scanner reports it as a format error rather than hiding it.

use anyhow::{ensure, Context, Result};
use record::RecordHeader;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;
use transfer::FileStat;

use crate::{path_to_name, Archive};

impl Archive {
    /// Appends `source` to the archive under the name it was given by (the
    /// path exactly as passed, not canonicalized).
    ///
    /// Creates the archive, and any missing parent directories, on first
    /// use. Returns the header that was written.
    ///
    /// # Errors
    ///
    /// - the source cannot be opened or is not a regular file
    /// - the name is empty or longer than [`record::MAX_NAME_BYTES`]
    ///   (a [`record::RecordError`] inside the `anyhow` chain)
    /// - any I/O failure while writing
    pub fn append<P: AsRef<Path>>(&self, source: P) -> Result<RecordHeader> {
        let source = source.as_ref();
        self.append_named(source, path_to_name(source))
    }

    /// Appends `source` under an explicit record `name`.
    pub fn append_named<P: AsRef<Path>>(&self, source: P, name: Vec<u8>) -> Result<RecordHeader> {
        let source = source.as_ref();

        let mut input = File::open(source)
            .with_context(|| format!("failed to open input file {}", source.display()))?;
        let meta = input
            .metadata()
            .with_context(|| format!("failed to stat input file {}", source.display()))?;
        ensure!(meta.is_file(), "{} is not a regular file", source.display());

        let header = RecordHeader::new(name, FileStat::from_metadata(&meta))?;
        let encoded = header.encode()?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create archive directory {}", parent.display())
                })?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open archive {}", self.path.display()))?;

        let mut out = BufWriter::new(&file);
        out.write_all(&encoded)
            .with_context(|| format!("failed to write header to {}", self.path.display()))?;
        transfer::copy_exact(&mut input, &mut out, header.size()).with_context(|| {
            format!(
                "failed to copy {} bytes of {} into the archive",
                header.size(),
                source.display()
            )
        })?;
        out.flush()?;
        drop(out);

        if self.config.sync {
            file.sync_all()?;
        }

        info!(
            archive = %self.path.display(),
            name = %header.name_lossy(),
            size = header.size(),
            "appended"
        );

        Ok(header)
    }
}
