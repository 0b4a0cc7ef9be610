//! # Record - archive record codec and scanner
//!
//! An archive is a flat concatenation of records with no magic number,
//! index, padding or trailer. Each record is a fixed-size header followed by
//! exactly `size` payload bytes, where `size` comes from the header itself.
//!
//! ## Header layout
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ name        [u8; 1024]  NUL-terminated, zero padded           │
//! │ mode        u32 LE      file type + permission bits           │
//! │ uid         u32 LE                                            │
//! │ gid         u32 LE                                            │
//! │ nlink       u64 LE                                            │
//! │ size        u64 LE      payload length (authoritative)        │
//! │ atime_secs  i64 LE | atime_nanos u32 LE                       │
//! │ mtime_secs  i64 LE | mtime_nanos u32 LE                       │
//! │ is_deleted  u8          0 = live, anything else = tombstone   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ payload     [u8; size]                                        │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The header is always [`HEADER_LEN`] bytes. Changing any field width
//! invalidates every existing archive; there is no versioning.
//!
//! ## Tombstones
//!
//! Removing a record never rewrites it. The single byte at
//! [`DELETED_FLAG_OFFSET`] is patched in place (see [`tombstone_patch`]) and
//! the payload stays where it is until the archive is compacted.

mod error;
mod format;
mod scanner;

pub use error::RecordError;
pub use format::{
    tombstone_patch, Patch, RecordHeader, DELETED_FLAG_OFFSET, HEADER_LEN, MAX_NAME_BYTES,
    NAME_FIELD_BYTES,
};
pub use scanner::{RecordScanner, ScannedRecord};
pub use transfer::{FileStat, Timestamp};

#[cfg(test)]
mod tests;
