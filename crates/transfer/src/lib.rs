//! # Transfer - byte movement and metadata restoration
//!
//! Leaf helpers shared by every archive operation:
//!
//! - [`copy_exact`] moves exactly `len` bytes from one stream to another.
//! - [`skip`] advances a stream by `len` bytes, seeking when the stream
//!   allows it and draining otherwise.
//! - [`FileStat`] is the metadata snapshot captured when a file enters an
//!   archive, and [`restore_metadata`] reapplies it to an extracted file.
//!
//! Full-buffer writes go through [`std::io::Write::write_all`], which already
//! retries short writes and reports a zero-length write as `WriteZero`.

mod stat;

pub use stat::{FileStat, Timestamp};

use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Size of the scratch buffer used by [`copy_exact`] (64 KiB).
pub const COPY_BUF_BYTES: usize = 64 * 1024;

/// Copies exactly `len` bytes from `r` into `w`.
///
/// Returns `UnexpectedEof` if `r` runs dry before `len` bytes were read.
/// Bytes copied before the failure have already been written to `w`.
pub fn copy_exact<R, W>(r: &mut R, w: &mut W, len: u64) -> io::Result<u64>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    if len == 0 {
        return Ok(0);
    }

    let buf_len = usize::try_from(len).unwrap_or(usize::MAX).min(COPY_BUF_BYTES);
    let mut buf = vec![0u8; buf_len];
    let mut remaining = len;

    while remaining > 0 {
        let want = remaining.min(buf.len() as u64) as usize;
        let n = match r.read(&mut buf[..want]) {
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!("source ended with {} of {} bytes left to copy", remaining, len),
                ))
            }
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        w.write_all(&buf[..n])?;
        remaining -= n as u64;
    }

    Ok(len)
}

/// Advances `r` by `len` bytes.
///
/// Tries a relative seek first. Streams that refuse to seek (pipes, FIFOs)
/// are drained instead. Seeking past end-of-file is not an error here; the
/// next read simply comes back empty.
pub fn skip<R>(r: &mut R, len: u64) -> io::Result<()>
where
    R: Read + Seek + ?Sized,
{
    if len == 0 {
        return Ok(());
    }

    if let Ok(delta) = i64::try_from(len) {
        match r.seek(SeekFrom::Current(delta)) {
            Ok(_) => return Ok(()),
            Err(e) => debug!(error = %e, len, "seek failed, draining instead"),
        }
    }

    drain(r, len)
}

/// Reads and discards exactly `len` bytes from `r`.
pub fn drain<R>(r: &mut R, len: u64) -> io::Result<()>
where
    R: Read + ?Sized,
{
    let drained = io::copy(&mut (&mut *r).take(len), &mut io::sink())?;
    if drained < len {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("stream ended after {} of {} skipped bytes", drained, len),
        ));
    }
    Ok(())
}

/// Reapplies a captured [`FileStat`] to `path`.
///
/// Steps, in order:
///
/// 1. ownership (unix only, best-effort: failures are logged and ignored,
///    since only root may give files away)
/// 2. permission bits
/// 3. access and modification times
///
/// Every step is attempted even when an earlier one fails; the first
/// permission or timestamp error is returned.
pub fn restore_metadata(path: &Path, stat: &FileStat) -> io::Result<()> {
    let mut first_err: Option<io::Error> = None;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Err(e) = std::os::unix::fs::chown(path, Some(stat.uid), Some(stat.gid)) {
            debug!(path = %path.display(), uid = stat.uid, gid = stat.gid, error = %e, "ownership not restored");
        }

        if let Err(e) = fs::set_permissions(path, fs::Permissions::from_mode(stat.permission_bits())) {
            first_err.get_or_insert(e);
        }
    }

    #[cfg(not(unix))]
    {
        let mut perms = fs::metadata(path)?.permissions();
        perms.set_readonly(stat.permission_bits() & 0o222 == 0);
        if let Err(e) = fs::set_permissions(path, perms) {
            first_err.get_or_insert(e);
        }
    }

    if let Err(e) = filetime::set_file_times(path, stat.atime.to_file_time(), stat.mtime.to_file_time()) {
        first_err.get_or_insert(e);
    }

    match first_err {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
