use super::*;
use std::io::{Cursor, Seek, SeekFrom};

// -------------------- Helpers --------------------

fn stat_with_size(size: u64) -> FileStat {
    FileStat {
        mode: 0o100644,
        uid: 1000,
        gid: 100,
        nlink: 1,
        size,
        atime: Timestamp::new(1_700_000_100, 42),
        mtime: Timestamp::new(1_700_000_000, 999_999_999),
    }
}

fn header(name: &[u8], size: u64) -> RecordHeader {
    RecordHeader::new(name.to_vec(), stat_with_size(size)).unwrap()
}

/// Encodes `(name, payload, deleted)` triples into one archive image.
fn archive_bytes(records: &[(&[u8], &[u8], bool)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (name, payload, deleted) in records {
        let mut h = header(name, payload.len() as u64);
        h.deleted = *deleted;
        out.extend_from_slice(&h.encode().unwrap());
        out.extend_from_slice(payload);
    }
    out
}

fn fixed(buf: &[u8]) -> [u8; HEADER_LEN] {
    buf.try_into().unwrap()
}

// -------------------- Layout --------------------

#[test]
fn header_len_is_stable() {
    // Changing this breaks every archive on disk.
    assert_eq!(HEADER_LEN, 1077);
    assert_eq!(DELETED_FLAG_OFFSET, 1076);
    assert_eq!(MAX_NAME_BYTES, 1023);
}

#[test]
fn encode_has_fixed_length_and_zero_padding() {
    let buf = header(b"a.txt", 4).encode().unwrap();
    assert_eq!(buf.len(), HEADER_LEN);
    assert_eq!(&buf[..5], b"a.txt");
    assert!(buf[5..NAME_FIELD_BYTES].iter().all(|&b| b == 0));
    assert_eq!(buf[DELETED_FLAG_OFFSET], 0);
}

#[test]
fn encode_decode_preserves_all_fields() {
    let mut h = header(b"dir/file.bin", 12345);
    h.stat.nlink = 3;
    let back = RecordHeader::decode(&fixed(&h.encode().unwrap())).unwrap();
    assert_eq!(back, h);

    h.deleted = true;
    let back = RecordHeader::decode(&fixed(&h.encode().unwrap())).unwrap();
    assert!(back.deleted);
}

#[test]
fn any_nonzero_flag_is_deleted() {
    let mut buf = fixed(&header(b"x", 0).encode().unwrap());
    buf[DELETED_FLAG_OFFSET] = 0x7f;
    assert!(RecordHeader::decode(&buf).unwrap().deleted);
}

// -------------------- Name validation --------------------

#[test]
fn longest_name_is_accepted() {
    let name = vec![b'n'; MAX_NAME_BYTES];
    let h = header(&name, 0);
    let back = RecordHeader::decode(&fixed(&h.encode().unwrap())).unwrap();
    assert_eq!(back.name, name);
}

#[test]
fn name_over_capacity_is_rejected() {
    let err = RecordHeader::new(vec![b'n'; NAME_FIELD_BYTES], stat_with_size(0)).unwrap_err();
    assert!(matches!(
        err,
        RecordError::NameTooLong { len: 1024, max: 1023 }
    ));
}

#[test]
fn empty_and_nul_names_are_rejected() {
    assert!(matches!(
        RecordHeader::new(Vec::new(), stat_with_size(0)),
        Err(RecordError::EmptyName)
    ));
    assert!(matches!(
        RecordHeader::new(b"a\0b".to_vec(), stat_with_size(0)),
        Err(RecordError::NameContainsNul)
    ));
}

#[test]
fn unterminated_name_field_is_corrupt() {
    let mut buf = fixed(&header(b"x", 0).encode().unwrap());
    buf[..NAME_FIELD_BYTES].fill(b'z');
    assert!(matches!(
        RecordHeader::decode(&buf),
        Err(RecordError::UnterminatedName)
    ));
}

#[test]
fn out_of_range_nanos_are_corrupt() {
    let mut buf = fixed(&header(b"x", 0).encode().unwrap());
    // atime_nanos sits after name, mode/uid/gid, nlink/size and atime_secs.
    let at = NAME_FIELD_BYTES + 12 + 16 + 8;
    buf[at..at + 4].copy_from_slice(&2_000_000_000u32.to_le_bytes());
    assert!(matches!(
        RecordHeader::decode(&buf),
        Err(RecordError::InvalidTimestamp(2_000_000_000))
    ));
}

// -------------------- Tombstone patch --------------------

#[test]
fn tombstone_patch_changes_exactly_one_byte() {
    let original = archive_bytes(&[(b"a.txt", b"abcd", false), (b"b.txt", b"xyz", false)]);
    let second = (HEADER_LEN + 4) as u64;

    let patch = tombstone_patch(second);
    assert_eq!(patch.offset, second + DELETED_FLAG_OFFSET as u64);
    assert_eq!(patch.bytes, vec![1]);

    let mut cur = Cursor::new(original.clone());
    patch.apply(&mut cur).unwrap();
    let patched = cur.into_inner();

    assert_eq!(patched.len(), original.len());
    let diffs: Vec<usize> = (0..original.len())
        .filter(|&i| original[i] != patched[i])
        .collect();
    assert_eq!(diffs, vec![patch.offset as usize]);
}

// -------------------- Scanner --------------------

#[test]
fn scan_empty_archive() {
    let mut s = RecordScanner::new(Cursor::new(Vec::new()));
    assert!(s.next_record().unwrap().is_none());
}

#[test]
fn scan_yields_offsets_and_payloads() {
    let data = archive_bytes(&[(b"a.txt", b"abcd", false), (b"b.txt", b"xyz", true)]);
    let mut s = RecordScanner::new(Cursor::new(data));

    let a = s.next_record().unwrap().unwrap();
    assert_eq!(a.offset, 0);
    assert_eq!(a.header.name, b"a.txt");
    assert!(!a.header.deleted);
    let mut payload = Vec::new();
    assert_eq!(s.copy_payload(&mut payload).unwrap(), 4);
    assert_eq!(payload, b"abcd");

    let b = s.next_record().unwrap().unwrap();
    assert_eq!(b.offset, a.end_offset());
    assert!(b.header.deleted);
    s.skip_payload().unwrap();

    assert!(s.next_record().unwrap().is_none());
}

#[test]
fn raw_header_is_verbatim() {
    let data = archive_bytes(&[(b"a.txt", b"abcd", false)]);
    let mut s = RecordScanner::new(Cursor::new(data.clone()));
    let rec = s.next_record().unwrap().unwrap();
    assert_eq!(&rec.raw[..], &data[..HEADER_LEN]);
}

#[test]
fn unconsumed_payload_is_skipped() {
    let data = archive_bytes(&[
        (b"one", b"1111111", false),
        (b"two", b"22", false),
        (b"three", b"", false),
    ]);
    let mut s = RecordScanner::new(Cursor::new(data));

    let mut names = Vec::new();
    while let Some(rec) = s.next_record().unwrap() {
        names.push(rec.header.name_lossy());
    }
    assert_eq!(names, vec!["one", "two", "three"]);
}

#[test]
fn partial_header_is_an_error() {
    let mut data = archive_bytes(&[(b"a.txt", b"abcd", false)]);
    let full = data.len() as u64;
    data.extend_from_slice(&[0u8; 100]);

    let mut s = RecordScanner::new(Cursor::new(data));
    s.next_record().unwrap().unwrap();
    match s.next_record() {
        Err(RecordError::PartialHeader { offset, read }) => {
            assert_eq!(offset, full);
            assert_eq!(read, 100);
        }
        other => panic!("expected PartialHeader, got {:?}", other),
    }
}

#[test]
fn truncated_payload_is_an_error_on_copy() {
    let mut data = archive_bytes(&[(b"a.txt", b"abcdefgh", false)]);
    data.truncate(HEADER_LEN + 3);

    let mut s = RecordScanner::new(Cursor::new(data));
    s.next_record().unwrap().unwrap();
    let mut sink = Vec::new();
    assert!(matches!(
        s.copy_payload(&mut sink),
        Err(RecordError::Truncated { offset: 0, expected: 8 })
    ));
}

#[test]
fn truncated_payload_is_an_error_on_skip() {
    let mut data = archive_bytes(&[(b"a.txt", b"abcd", false), (b"b.txt", b"abcdefgh", true)]);
    data.truncate(2 * HEADER_LEN + 4 + 3);

    let mut s = RecordScanner::new(Cursor::new(data));
    s.next_record().unwrap().unwrap();
    s.skip_payload().unwrap();
    let b = s.next_record().unwrap().unwrap();
    assert_eq!(b.end_offset(), (2 * HEADER_LEN + 4 + 8) as u64);
    assert!(matches!(
        s.skip_payload(),
        Err(RecordError::Truncated { offset, expected: 8 }) if offset == (HEADER_LEN + 4) as u64
    ));
}

#[test]
fn truncated_payload_is_an_error_on_auto_skip() {
    let mut data = archive_bytes(&[(b"a.txt", b"abcdefgh", false)]);
    data.truncate(HEADER_LEN + 3);

    let mut s = RecordScanner::new(Cursor::new(data));
    s.next_record().unwrap().unwrap();
    assert!(matches!(
        s.next_record(),
        Err(RecordError::Truncated { offset: 0, expected: 8 })
    ));
}

#[test]
fn payload_ending_exactly_at_eof_is_not_truncated() {
    let data = archive_bytes(&[(b"a", b"12", false), (b"b", b"345", false)]);
    let mut s = RecordScanner::new(Cursor::new(data));

    s.next_record().unwrap().unwrap();
    s.skip_payload().unwrap();
    let b = s.next_record().unwrap().unwrap();
    assert_eq!(b.payload_offset(), (2 * HEADER_LEN + 2) as u64);
    let mut payload = Vec::new();
    s.copy_payload(&mut payload).unwrap();
    assert_eq!(payload, b"345");
    assert!(s.next_record().unwrap().is_none());
}

#[test]
fn corrupt_header_reports_offset() {
    let mut data = archive_bytes(&[(b"a", b"1", false), (b"b", b"2", false)]);
    let second = HEADER_LEN + 1;
    data[second..second + NAME_FIELD_BYTES].fill(b'q');

    let mut s = RecordScanner::new(Cursor::new(data));
    s.next_record().unwrap().unwrap();
    match s.next_record() {
        Err(RecordError::CorruptHeader { offset, .. }) => assert_eq!(offset, second as u64),
        other => panic!("expected CorruptHeader, got {:?}", other),
    }
}

#[test]
fn scanner_over_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("arc.bin");
    std::fs::write(&path, archive_bytes(&[(b"f", b"data", false)])).unwrap();

    let mut s = RecordScanner::open(&path).unwrap();
    let rec = s.next_record().unwrap().unwrap();
    assert_eq!(rec.header.size(), 4);
    assert_eq!(s.next_offset(), (HEADER_LEN + 4) as u64);
    assert!(s.next_record().unwrap().is_none());
}

#[test]
fn patch_then_rescan_sees_tombstone() {
    let data = archive_bytes(&[(b"a", b"1", false), (b"b", b"2", false)]);
    let mut cur = Cursor::new(data);
    tombstone_patch(0).apply(&mut cur).unwrap();
    cur.seek(SeekFrom::Start(0)).unwrap();

    let mut s = RecordScanner::new(cur);
    assert!(s.next_record().unwrap().unwrap().header.deleted);
    assert!(!s.next_record().unwrap().unwrap().header.deleted);
}
