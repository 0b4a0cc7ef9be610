use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::{RecordError, RecordHeader, HEADER_LEN};

/// A header yielded by [`RecordScanner`], with its position in the archive.
#[derive(Debug, Clone)]
pub struct ScannedRecord {
    /// Absolute offset of the first header byte.
    pub offset: u64,
    pub header: RecordHeader,
    /// The header exactly as it appears on disk.
    pub raw: Box<[u8; HEADER_LEN]>,
}

impl ScannedRecord {
    /// Absolute offset of the first payload byte.
    #[must_use]
    pub fn payload_offset(&self) -> u64 {
        self.offset + HEADER_LEN as u64
    }

    /// Absolute offset one past the last payload byte (the next header).
    #[must_use]
    pub fn end_offset(&self) -> u64 {
        self.payload_offset() + self.header.size()
    }
}

/// Sequential reader over the records of an archive.
///
/// After [`next_record`](RecordScanner::next_record) returns a record, the
/// underlying cursor sits at the start of that record's payload. The caller
/// either copies it with [`copy_payload`](RecordScanner::copy_payload) or
/// skips it with [`skip_payload`](RecordScanner::skip_payload). Payload left
/// unconsumed is skipped automatically on the next `next_record` call.
///
/// # Termination
///
/// - **Clean EOF** (zero bytes where a header would start) -> `Ok(None)`.
/// - **Partial header** -> `Err(RecordError::PartialHeader)`. Unlike a WAL,
///   a short header here means the archive was cut mid-record.
/// - **Undecodable header** -> `Err(RecordError::CorruptHeader)`.
pub struct RecordScanner<R: Read + Seek> {
    rdr: BufReader<R>,
    /// Absolute position of the underlying cursor.
    pos: u64,
    /// Offset and payload length of the record most recently yielded.
    current: Option<(u64, u64)>,
    /// Payload bytes of the current record not yet consumed.
    pending: u64,
    /// Stream length, measured on the first skip.
    len: Option<u64>,
}

impl RecordScanner<File> {
    /// Opens an archive file for scanning from its first record.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RecordError> {
        let f = File::open(path)?;
        Ok(Self::new(f))
    }
}

impl<R: Read + Seek> RecordScanner<R> {
    /// Wraps a reader positioned at the start of an archive.
    pub fn new(reader: R) -> Self {
        Self {
            rdr: BufReader::new(reader),
            pos: 0,
            current: None,
            pending: 0,
            len: None,
        }
    }

    /// Offset of the next header to be read.
    #[must_use]
    pub fn next_offset(&self) -> u64 {
        self.pos + self.pending
    }

    /// Reads the next header, skipping whatever is left of the previous
    /// record's payload.
    pub fn next_record(&mut self) -> Result<Option<ScannedRecord>, RecordError> {
        if self.pending > 0 {
            self.skip_payload()?;
        }
        self.current = None;

        let offset = self.pos;
        let mut raw = Box::new([0u8; HEADER_LEN]);
        let read = read_full(&mut self.rdr, &mut raw[..])?;
        self.pos += read as u64;

        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_LEN {
            return Err(RecordError::PartialHeader { offset, read });
        }

        let header = RecordHeader::decode(&raw).map_err(|e| RecordError::CorruptHeader {
            offset,
            source: Box::new(e),
        })?;

        self.current = Some((offset, header.size()));
        self.pending = header.size();

        Ok(Some(ScannedRecord {
            offset,
            header,
            raw,
        }))
    }

    /// Copies the rest of the current payload into `w`, returning the
    /// number of bytes copied.
    ///
    /// An archive that ends before the payload does is reported as
    /// [`RecordError::Truncated`].
    pub fn copy_payload<W: Write + ?Sized>(&mut self, w: &mut W) -> Result<u64, RecordError> {
        let len = self.pending;
        self.pending = 0;

        match transfer::copy_exact(&mut self.rdr, w, len) {
            Ok(n) => {
                self.pos += n;
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.truncated(len)),
            Err(e) => Err(e.into()),
        }
    }

    /// Moves past the rest of the current payload without reading it.
    ///
    /// A payload that runs past the end of the stream is reported as
    /// [`RecordError::Truncated`], the same as for
    /// [`copy_payload`](RecordScanner::copy_payload).
    pub fn skip_payload(&mut self) -> Result<(), RecordError> {
        let len = self.pending;
        if len == 0 {
            return Ok(());
        }

        let end = self.next_offset();
        if let Some(stream_len) = self.stream_len() {
            if end > stream_len {
                self.pending = 0;
                return Err(self.truncated(len));
            }
        }

        self.pending = 0;
        match transfer::skip(&mut self.rdr, len) {
            Ok(()) => {
                self.pos = end;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Err(self.truncated(len)),
            Err(e) => Err(e.into()),
        }
    }

    /// Length of the underlying stream, or `None` if it cannot seek.
    fn stream_len(&mut self) -> Option<u64> {
        if self.len.is_none() {
            let end = self.rdr.seek(SeekFrom::End(0)).ok()?;
            self.rdr.seek(SeekFrom::Start(self.pos)).ok()?;
            self.len = Some(end);
        }
        self.len
    }

    fn truncated(&self, len: u64) -> RecordError {
        let (offset, expected) = self.current.unwrap_or((self.pos, len));
        RecordError::Truncated { offset, expected }
    }
}

/// Reads until `buf` is full or the reader reports EOF.
fn read_full<R: Read + ?Sized>(r: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
