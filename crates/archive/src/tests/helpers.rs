use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::{Archive, ArchiveConfig};

/// Config used by most tests: no fsync, everything else default.
pub fn test_config() -> ArchiveConfig {
    ArchiveConfig::default().with_sync(false)
}

pub fn test_archive(dir: &Path) -> Archive {
    Archive::new(dir.join("arc.bin"), test_config())
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path
}

/// Writes `contents` to a scratch file and appends it under `name`.
pub fn add(archive: &Archive, scratch: &Path, name: &str, contents: &[u8]) {
    let src = write_file(scratch, &format!("src-{}", name.replace('/', "_")), contents);
    archive.append_named(&src, name.as_bytes().to_vec()).unwrap();
}

pub fn live_names(archive: &Archive) -> Vec<String> {
    archive
        .list()
        .unwrap()
        .map(|e| e.unwrap().name_lossy())
        .collect()
}

pub fn archive_len(archive: &Archive) -> u64 {
    fs::metadata(archive.path()).unwrap().len()
}

pub fn count_files(dir: &Path) -> usize {
    fs::read_dir(dir).unwrap().filter_map(|e| e.ok()).count()
}

/// Writer that accepts `budget` bytes and then fails every write.
pub struct FailAfter<W> {
    pub inner: W,
    pub budget: usize,
}

impl<W: Write> Write for FailAfter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.budget == 0 {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure"));
        }
        let n = buf.len().min(self.budget);
        let written = self.inner.write(&buf[..n])?;
        self.budget -= written;
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
