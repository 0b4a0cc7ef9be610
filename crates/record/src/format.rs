//! Fixed-size record header encoding and the tombstone patch.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{self, Seek, SeekFrom, Write};

use crate::{FileStat, RecordError, Timestamp};

/// Capacity of the on-disk name field, terminator included.
pub const NAME_FIELD_BYTES: usize = 1024;

/// Longest name that fits in the name field.
pub const MAX_NAME_BYTES: usize = NAME_FIELD_BYTES - 1;

/// Size of an encoded header in bytes:
/// name (1024) + mode, uid, gid (3 × 4) + nlink, size (2 × 8)
/// + atime, mtime (2 × 12) + is_deleted (1).
pub const HEADER_LEN: usize = NAME_FIELD_BYTES + 3 * 4 + 2 * 8 + 2 * (8 + 4) + 1;

/// Position of the `is_deleted` byte inside a header.
pub const DELETED_FLAG_OFFSET: usize = HEADER_LEN - 1;

const NANOS_PER_SEC: u32 = 1_000_000_000;

/// Decoded record header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Raw name bytes, without terminator.
    pub name: Vec<u8>,
    /// Metadata captured at append time. `stat.size` is the payload length.
    pub stat: FileStat,
    /// `true` once the record has been extracted (tombstone).
    pub deleted: bool,
}

impl RecordHeader {
    /// Builds a live header, validating `name` against the name field.
    pub fn new(name: Vec<u8>, stat: FileStat) -> Result<Self, RecordError> {
        validate_name(&name)?;
        Ok(Self {
            name,
            stat,
            deleted: false,
        })
    }

    /// Payload length in bytes.
    #[must_use]
    pub fn size(&self) -> u64 {
        self.stat.size
    }

    /// Total on-disk footprint of the record (header + payload).
    #[must_use]
    pub fn record_len(&self) -> u64 {
        HEADER_LEN as u64 + self.stat.size
    }

    /// The name as text, replacing invalid UTF-8.
    #[must_use]
    pub fn name_lossy(&self) -> String {
        String::from_utf8_lossy(&self.name).into_owned()
    }

    /// Serializes the header into exactly [`HEADER_LEN`] bytes.
    pub fn encode(&self) -> Result<Vec<u8>, RecordError> {
        validate_name(&self.name)?;

        let mut buf = Vec::with_capacity(HEADER_LEN);
        buf.extend_from_slice(&self.name);
        buf.resize(NAME_FIELD_BYTES, 0);

        let st = &self.stat;
        buf.write_u32::<LittleEndian>(st.mode)?;
        buf.write_u32::<LittleEndian>(st.uid)?;
        buf.write_u32::<LittleEndian>(st.gid)?;
        buf.write_u64::<LittleEndian>(st.nlink)?;
        buf.write_u64::<LittleEndian>(st.size)?;
        buf.write_i64::<LittleEndian>(st.atime.secs)?;
        buf.write_u32::<LittleEndian>(st.atime.nanos)?;
        buf.write_i64::<LittleEndian>(st.mtime.secs)?;
        buf.write_u32::<LittleEndian>(st.mtime.nanos)?;
        buf.write_u8(u8::from(self.deleted))?;

        debug_assert_eq!(buf.len(), HEADER_LEN);
        Ok(buf)
    }

    /// Parses a header. Does not check `size` against the archive length.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, RecordError> {
        let (name_field, mut rest) = buf.split_at(NAME_FIELD_BYTES);

        let name_len = name_field
            .iter()
            .position(|&b| b == 0)
            .ok_or(RecordError::UnterminatedName)?;
        if name_len == 0 {
            return Err(RecordError::EmptyName);
        }

        let mode = rest.read_u32::<LittleEndian>()?;
        let uid = rest.read_u32::<LittleEndian>()?;
        let gid = rest.read_u32::<LittleEndian>()?;
        let nlink = rest.read_u64::<LittleEndian>()?;
        let size = rest.read_u64::<LittleEndian>()?;
        let atime = read_timestamp(&mut rest)?;
        let mtime = read_timestamp(&mut rest)?;
        let deleted = rest.read_u8()? != 0;

        Ok(Self {
            name: name_field[..name_len].to_vec(),
            stat: FileStat {
                mode,
                uid,
                gid,
                nlink,
                size,
                atime,
                mtime,
            },
            deleted,
        })
    }
}

fn read_timestamp(rest: &mut &[u8]) -> Result<Timestamp, RecordError> {
    let secs = rest.read_i64::<LittleEndian>()?;
    let nanos = rest.read_u32::<LittleEndian>()?;
    if nanos >= NANOS_PER_SEC {
        return Err(RecordError::InvalidTimestamp(nanos));
    }
    Ok(Timestamp::new(secs, nanos))
}

fn validate_name(name: &[u8]) -> Result<(), RecordError> {
    if name.is_empty() {
        return Err(RecordError::EmptyName);
    }
    if name.len() > MAX_NAME_BYTES {
        return Err(RecordError::NameTooLong {
            len: name.len(),
            max: MAX_NAME_BYTES,
        });
    }
    if name.contains(&0) {
        return Err(RecordError::NameContainsNul);
    }
    Ok(())
}

/// An in-place overwrite of `bytes.len()` bytes at absolute `offset`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Patch {
    pub offset: u64,
    pub bytes: Vec<u8>,
}

impl Patch {
    /// Seeks to `offset` and writes the patch bytes, then flushes.
    ///
    /// The cursor is left just past the patched range.
    pub fn apply<W: Write + Seek + ?Sized>(&self, w: &mut W) -> io::Result<()> {
        w.seek(SeekFrom::Start(self.offset))?;
        w.write_all(&self.bytes)?;
        w.flush()
    }
}

/// The patch that tombstones the record whose header starts at
/// `record_offset`: one byte, set to `1`.
#[must_use]
pub fn tombstone_patch(record_offset: u64) -> Patch {
    Patch {
        offset: record_offset + DELETED_FLAG_OFFSET as u64,
        bytes: vec![1],
    }
}
