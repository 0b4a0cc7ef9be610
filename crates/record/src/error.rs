use std::io;
use thiserror::Error;

use crate::format::HEADER_LEN;

/// Errors produced while encoding, decoding or scanning records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// Record names must contain at least one byte.
    #[error("record name is empty")]
    EmptyName,

    /// The name does not fit in the fixed-size name field.
    #[error("record name is {len} bytes, the limit is {max}")]
    NameTooLong { len: usize, max: usize },

    /// The name would be cut short by the NUL terminator on decode.
    #[error("record name contains a NUL byte")]
    NameContainsNul,

    /// The on-disk name field has no terminator.
    #[error("name field is not NUL-terminated")]
    UnterminatedName,

    /// A nanosecond field is outside `0..1_000_000_000`.
    #[error("invalid timestamp nanoseconds: {0}")]
    InvalidTimestamp(u32),

    /// A header at `offset` failed to decode.
    #[error("corrupt record header at offset {offset}")]
    CorruptHeader {
        offset: u64,
        #[source]
        source: Box<RecordError>,
    },

    /// The archive ends in the middle of a header.
    #[error("partial record header at offset {offset}: read {read} of {} bytes", HEADER_LEN)]
    PartialHeader { offset: u64, read: usize },

    /// The archive ends in the middle of a payload.
    #[error("record at offset {offset} is truncated: payload of {expected} bytes ends early")]
    Truncated { offset: u64, expected: u64 },
}
