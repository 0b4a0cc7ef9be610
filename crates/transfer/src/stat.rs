use filetime::FileTime;
use std::fs::Metadata;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds + nanoseconds relative to the Unix epoch.
///
/// `secs` may be negative for pre-1970 timestamps; `nanos` is always in
/// `0..1_000_000_000`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp {
    pub secs: i64,
    pub nanos: u32,
}

impl Timestamp {
    #[must_use]
    pub fn new(secs: i64, nanos: u32) -> Self {
        Self { secs, nanos }
    }

    /// Converts a [`SystemTime`], handling times before the epoch.
    #[must_use]
    pub fn from_system_time(t: SystemTime) -> Self {
        match t.duration_since(UNIX_EPOCH) {
            Ok(d) => Self::new(d.as_secs() as i64, d.subsec_nanos()),
            Err(e) => {
                let d = e.duration();
                let mut secs = -(d.as_secs() as i64);
                let mut nanos = d.subsec_nanos();
                if nanos > 0 {
                    secs -= 1;
                    nanos = 1_000_000_000 - nanos;
                }
                Self::new(secs, nanos)
            }
        }
    }

    #[must_use]
    pub fn to_file_time(self) -> FileTime {
        FileTime::from_unix_time(self.secs, self.nanos)
    }
}

/// Filesystem metadata captured when a file is appended to an archive.
///
/// `size` is authoritative for the payload length of the record that carries
/// this snapshot; it is never recomputed after capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStat {
    /// File type and permission bits, as in `st_mode`.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    pub nlink: u64,
    /// Payload length in bytes.
    pub size: u64,
    pub atime: Timestamp,
    pub mtime: Timestamp,
}

impl FileStat {
    /// Snapshots `meta` (as returned by `fs::metadata` / `File::metadata`).
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            mode: meta.mode(),
            uid: meta.uid(),
            gid: meta.gid(),
            nlink: meta.nlink(),
            size: meta.size(),
            atime: Timestamp::new(meta.atime(), meta.atime_nsec() as u32),
            mtime: Timestamp::new(meta.mtime(), meta.mtime_nsec() as u32),
        }
    }

    /// Snapshots `meta` (as returned by `fs::metadata` / `File::metadata`).
    ///
    /// Platforms without unix modes get `0o644`, or `0o444` for read-only
    /// files, and no ownership.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(meta: &Metadata) -> Self {
        let mode = if meta.permissions().readonly() { 0o100444 } else { 0o100644 };
        let now = SystemTime::now();

        Self {
            mode,
            uid: 0,
            gid: 0,
            nlink: 1,
            size: meta.len(),
            atime: Timestamp::from_system_time(meta.accessed().unwrap_or(now)),
            mtime: Timestamp::from_system_time(meta.modified().unwrap_or(now)),
        }
    }

    /// The permission part of `mode` (setuid/setgid/sticky + rwx bits).
    #[must_use]
    pub fn permission_bits(&self) -> u32 {
        self.mode & 0o7777
    }
}
