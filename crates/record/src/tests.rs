use super::*;

// -------------------- Encode layout --------------------

#[test]
fn encode_layout_is_big_endian() {
    let rec = Record::new(1, b"k".to_vec(), b"vv".to_vec());
    let bytes = rec.encode();

    assert_eq!(bytes.len(), 24 + 1 + 2);
    // timestamp = 1
    assert_eq!(&bytes[0..8], &[0, 0, 0, 0, 0, 0, 0, 1]);
    // key_size = 1
    assert_eq!(&bytes[8..16], &[0, 0, 0, 0, 0, 0, 0, 1]);
    // value_size = 2
    assert_eq!(&bytes[16..24], &[0, 0, 0, 0, 0, 0, 0, 2]);
    assert_eq!(&bytes[24..25], b"k");
    assert_eq!(&bytes[25..27], b"vv");
}

#[test]
fn encoded_len_matches_output() {
    let rec = Record::new(42, b"key".to_vec(), b"value".to_vec());
    assert_eq!(rec.encode().len() as u64, rec.encoded_len());
}

// -------------------- Round trip --------------------

#[test]
fn roundtrip_at_zero_offset() {
    let rec = Record::new(1_700_000_000, b"mykey".to_vec(), b"myvalue".to_vec());
    let bytes = rec.encode();
    assert_eq!(decode_record(&bytes, 0).unwrap(), rec);
}

#[test]
fn roundtrip_at_nonzero_offset() {
    let rec = Record::new(7, b"abc".to_vec(), b"def".to_vec());
    let mut buf = vec![0xAA; 100];
    buf.extend_from_slice(&rec.encode());
    assert_eq!(decode_record(&buf, 100).unwrap(), rec);
}

#[test]
fn roundtrip_empty_key_and_value() {
    let rec = Record::new(1, Vec::new(), Vec::new());
    let bytes = rec.encode();
    assert_eq!(bytes.len(), HEADER_SIZE);
    assert_eq!(decode_record(&bytes, 0).unwrap(), rec);
}

#[test]
fn roundtrip_tombstone_timestamp() {
    let rec = Record::new(0, b"gone".to_vec(), b"value".to_vec());
    let decoded = decode_record(&rec.encode(), 0).unwrap();
    assert_eq!(decoded.timestamp, 0);
    assert_eq!(decoded.key, b"gone");
}

// -------------------- Borrowed decode --------------------

#[test]
fn decode_ref_borrows_from_buffer() {
    let rec = Record::new(5, b"k".to_vec(), b"v".to_vec());
    let bytes = rec.encode();
    let r = decode_record_ref(&bytes, 0).unwrap();
    assert_eq!(r.key, b"k");
    assert_eq!(r.value, b"v");
    assert_eq!(r.to_record(), rec);
}

// -------------------- Header decode --------------------

#[test]
fn decode_header_fields() {
    let rec = Record::new(99, b"ab".to_vec(), b"cdef".to_vec());
    let h = decode_header(&rec.encode(), 0).unwrap();
    assert_eq!(h.timestamp, 99);
    assert_eq!(h.key_size, 2);
    assert_eq!(h.value_size, 4);
    assert_eq!(h.record_len(), 30);
    assert!(!h.is_zero());
}

#[test]
fn zero_header_is_terminator() {
    let buf = [0u8; 64];
    let h = decode_header(&buf, 0).unwrap();
    assert!(h.is_zero());
}

// -------------------- Short buffer --------------------

#[test]
fn header_short_buffer() {
    let buf = [0u8; 23];
    let err = decode_header(&buf, 0).unwrap_err();
    assert!(matches!(err, RecordError::ShortBuffer { .. }));
}

#[test]
fn header_short_buffer_at_offset() {
    let buf = [0u8; 40];
    assert!(decode_header(&buf, 20).is_err());
    assert!(decode_header(&buf, 16).is_ok());
}

#[test]
fn record_short_buffer_truncated_payload() {
    let rec = Record::new(1, b"key".to_vec(), b"value".to_vec());
    let bytes = rec.encode();
    // Header intact, payload truncated
    let err = decode_record(&bytes[..bytes.len() - 1], 0).unwrap_err();
    assert!(matches!(err, RecordError::ShortBuffer { .. }));
}

#[test]
fn record_short_buffer_hostile_sizes_do_not_wrap() {
    // Header claims a key_size of u64::MAX; the bounds check must fail
    // cleanly instead of wrapping into a small length.
    let mut buf = vec![0u8; HEADER_SIZE];
    buf[8..16].copy_from_slice(&u64::MAX.to_be_bytes());
    let err = decode_record(&buf, 0).unwrap_err();
    assert!(matches!(err, RecordError::ShortBuffer { .. }));
}
