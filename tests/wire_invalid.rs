use metabridge::wire::{decode, decode_with_limits, encode, DataType, Limits, WireError, WireValue};

fn header(count: u32, arena_len: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&u32::from_le_bytes(*b"MBWV").to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&count.to_le_bytes());
    bytes.extend_from_slice(&arena_len.to_le_bytes());
    bytes
}

fn envelope(bytes: &mut Vec<u8>, tag: u16, len: u32, data: u64) {
    bytes.extend_from_slice(&tag.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&len.to_le_bytes());
    bytes.extend_from_slice(&data.to_le_bytes());
    bytes.extend_from_slice(&0u64.to_le_bytes());
}

#[test]
fn rejects_bad_magic() {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&u32::from_le_bytes(*b"BAD!").to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&0u16.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&0u32.to_le_bytes());

    assert!(matches!(decode(&bytes), Err(WireError::BadMagic(_))));
}

#[test]
fn rejects_truncated_buffer() {
    let bytes = encode(&WireValue::string("hello")).expect("encode");
    let result = decode(&bytes[..bytes.len() - 2]);
    assert!(matches!(result, Err(WireError::BufferTooSmall { .. })));
}

#[test]
fn rejects_counts_the_buffer_cannot_hold() {
    // a bare header claiming a thousand envelopes
    assert_eq!(
        decode(&header(1000, 0)),
        Err(WireError::BufferTooSmall {
            need: 16 + 1000 * 24,
            have: 16,
        })
    );
}

#[test]
fn rejects_trailing_bytes() {
    let mut bytes = encode(&WireValue::Bool(true)).expect("encode");
    bytes.push(0xFF);
    assert_eq!(decode(&bytes), Err(WireError::TrailingBytes));
}

#[test]
fn rejects_empty_buffer() {
    assert_eq!(decode(&header(0, 0)), Err(WireError::Empty));
}

#[test]
fn rejects_unknown_tag() {
    let mut bytes = header(1, 0);
    envelope(&mut bytes, 999, 0, 0);
    assert_eq!(
        decode(&bytes),
        Err(WireError::UnknownTag { index: 0, tag: 999 })
    );
}

#[test]
fn rejects_member_kinds_as_wire_tags() {
    for tag in [DataType::Any, DataType::Method] {
        let mut bytes = header(1, 0);
        envelope(&mut bytes, tag as u16, 0, 0);
        assert!(matches!(decode(&bytes), Err(WireError::UnknownTag { .. })));
    }
}

#[test]
fn rejects_shared_child() {
    // Two lists claiming the same element.
    let mut bytes = header(4, 0);
    envelope(&mut bytes, DataType::List as u16, 2, 1);
    envelope(&mut bytes, DataType::List as u16, 1, 3);
    envelope(&mut bytes, DataType::List as u16, 1, 3);
    envelope(&mut bytes, DataType::Bool as u16, 0, 1);
    assert_eq!(decode(&bytes), Err(WireError::SharedChild { index: 3 }));
}

#[test]
fn rejects_orphaned_envelope() {
    let mut bytes = header(2, 0);
    envelope(&mut bytes, DataType::Bool as u16, 0, 1);
    envelope(&mut bytes, DataType::Bool as u16, 0, 0);
    assert_eq!(decode(&bytes), Err(WireError::Orphaned { index: 1 }));
}

#[test]
fn rejects_backward_reference() {
    let mut bytes = header(1, 0);
    envelope(&mut bytes, DataType::List as u16, 1, 0);
    assert_eq!(
        decode(&bytes),
        Err(WireError::BackwardReference { index: 0, child: 0 })
    );
}

#[test]
fn rejects_child_out_of_range() {
    let mut bytes = header(1, 0);
    envelope(&mut bytes, DataType::List as u16, 3, 5);
    assert_eq!(decode(&bytes), Err(WireError::ChildOutOfRange { index: 0 }));
}

#[test]
fn rejects_invalid_utf8() {
    let mut bytes = header(1, 2);
    envelope(&mut bytes, DataType::String as u16, 2, 0);
    bytes.extend_from_slice(&[0xFF, 0xFF]);
    assert_eq!(decode(&bytes), Err(WireError::InvalidUtf8 { index: 0 }));
}

#[test]
fn rejects_odd_map_length() {
    let mut bytes = header(4, 0);
    envelope(&mut bytes, DataType::Map as u16, 3, 1);
    for _ in 0..3 {
        envelope(&mut bytes, DataType::Invalid as u16, 0, 0);
    }
    assert!(matches!(
        decode(&bytes),
        Err(WireError::InvalidPayload { index: 0, .. })
    ));
}

#[test]
fn rejects_out_of_range_bool() {
    let mut bytes = header(1, 0);
    envelope(&mut bytes, DataType::Bool as u16, 0, 2);
    assert!(matches!(decode(&bytes), Err(WireError::InvalidPayload { .. })));
}

#[test]
fn enforces_limits() {
    let value = WireValue::list((0..10).map(WireValue::Int));
    let bytes = encode(&value).expect("encode");

    let limits = Limits {
        max_envelopes: 5,
        ..Limits::default()
    };
    assert_eq!(
        decode_with_limits(&bytes, &limits),
        Err(WireError::LimitExceeded("envelope count"))
    );

    let limits = Limits {
        max_sequence_len: 5,
        ..Limits::default()
    };
    assert_eq!(
        decode_with_limits(&bytes, &limits),
        Err(WireError::LimitExceeded("sequence length"))
    );

    let limits = Limits {
        max_buffer_size: 32,
        ..Limits::default()
    };
    assert!(matches!(
        decode_with_limits(&bytes, &limits),
        Err(WireError::BufferTooLarge { .. })
    ));
}
