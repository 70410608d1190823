//! Tests for the wire protocol codec
//!
//! These tests verify:
//! - Command frames for every command type
//! - Response frames and status codes
//! - Scan payload encoding
//! - Rejection of malformed and oversized frames
//! - Stream helpers over an in-memory buffer

use std::io::Cursor;

use cfkv::protocol::{
    decode_command, decode_kv_pairs, decode_response, encode_command, encode_kv_pairs,
    encode_response, read_command, read_response, write_command, write_response, Command,
    CommandType, KvPair, Response, Status, HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
use cfkv::KvError;

// =============================================================================
// Command Encoding
// =============================================================================

#[test]
fn test_encode_raw_get_layout() {
    let bytes = encode_command(&Command::RawGet {
        cf: "default".to_string(),
        key: b"k1".to_vec(),
    })
    .unwrap();

    let mut expected = vec![0x01];
    expected.extend_from_slice(&(4 + 7 + 4 + 2u32).to_be_bytes());
    expected.extend_from_slice(&7u32.to_be_bytes());
    expected.extend_from_slice(b"default");
    expected.extend_from_slice(&2u32.to_be_bytes());
    expected.extend_from_slice(b"k1");

    assert_eq!(bytes, expected);
}

#[test]
fn test_encode_ping_is_header_only() {
    let bytes = encode_command(&Command::Ping).unwrap();
    assert_eq!(bytes, vec![0x05, 0, 0, 0, 0]);
    assert_eq!(bytes.len(), HEADER_SIZE);
}

#[test]
fn test_every_command_decodes_to_itself() {
    let commands = vec![
        Command::RawGet {
            cf: "lock".to_string(),
            key: b"k".to_vec(),
        },
        Command::RawPut {
            cf: "default".to_string(),
            key: b"key".to_vec(),
            value: b"value with spaces".to_vec(),
        },
        Command::RawPut {
            cf: "write".to_string(),
            key: Vec::new(),
            value: Vec::new(),
        },
        Command::RawDelete {
            cf: "write".to_string(),
            key: vec![0, 1, 2, 255],
        },
        Command::RawScan {
            cf: "default".to_string(),
            start_key: b"a".to_vec(),
            limit: 2,
        },
        Command::Ping,
    ];

    for command in commands {
        let decoded = decode_command(&encode_command(&command).unwrap()).unwrap();
        assert_eq!(decoded, command);
    }
}

#[test]
fn test_command_types() {
    assert_eq!(Command::Ping.command_type(), CommandType::Ping);
    assert_eq!(CommandType::RawScan as u8, 0x04);
}

// =============================================================================
// Command Decoding Errors
// =============================================================================

#[test]
fn test_decode_unknown_command() {
    let err = decode_command(&[0x7F, 0, 0, 0, 0]).unwrap_err();
    assert!(matches!(err, KvError::Protocol(_)));
}

#[test]
fn test_decode_incomplete_header() {
    assert!(decode_command(&[0x01, 0, 0]).is_err());
}

#[test]
fn test_decode_incomplete_payload() {
    let bytes = encode_command(&Command::RawGet {
        cf: "default".to_string(),
        key: b"k".to_vec(),
    })
    .unwrap();
    assert!(decode_command(&bytes[..bytes.len() - 1]).is_err());
}

#[test]
fn test_decode_field_overruns_payload() {
    // RAW_DELETE whose cf claims 100 bytes
    let mut bytes = vec![0x03];
    bytes.extend_from_slice(&4u32.to_be_bytes());
    bytes.extend_from_slice(&100u32.to_be_bytes());
    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_decode_scan_without_limit() {
    let mut payload = Vec::new();
    payload.extend_from_slice(&7u32.to_be_bytes());
    payload.extend_from_slice(b"default");
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(b"a");

    let mut bytes = vec![0x04];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_decode_rejects_trailing_bytes() {
    let mut bytes = vec![0x05];
    bytes.extend_from_slice(&1u32.to_be_bytes());
    bytes.push(0xAA);
    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_decode_rejects_non_utf8_cf() {
    let mut payload = Vec::new();
    payload.extend_from_slice(&2u32.to_be_bytes());
    payload.extend_from_slice(&[0xFF, 0xFE]);
    payload.extend_from_slice(&1u32.to_be_bytes());
    payload.extend_from_slice(b"k");

    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    bytes.extend_from_slice(&payload);

    assert!(decode_command(&bytes).is_err());
}

#[test]
fn test_decode_rejects_oversized_payload() {
    let mut bytes = vec![0x02];
    bytes.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
    assert!(matches!(
        decode_command(&bytes),
        Err(KvError::Protocol(_))
    ));
}

// =============================================================================
// Responses
// =============================================================================

#[test]
fn test_response_frames() {
    assert_eq!(
        encode_response(&Response::not_found()).unwrap(),
        vec![0x01, 0, 0, 0, 0]
    );

    let ok = encode_response(&Response::ok(Some(b"val".to_vec()))).unwrap();
    assert_eq!(ok, vec![0x00, 0, 0, 0, 3, b'v', b'a', b'l']);

    let decoded = decode_response(&ok).unwrap();
    assert_eq!(decoded.status, Status::Ok);
    assert_eq!(decoded.payload, Some(b"val".to_vec()));
}

#[test]
fn test_error_response_message() {
    let response = Response::error("boom");
    let decoded = decode_response(&encode_response(&response).unwrap()).unwrap();

    assert_eq!(decoded.status, Status::Error);
    assert_eq!(decoded.error_message(), Some("boom".to_string()));
    assert_eq!(Response::ok(None).error_message(), None);
}

#[test]
fn test_empty_ok_payload_decodes_to_none() {
    let decoded = decode_response(&encode_response(&Response::ok(None)).unwrap()).unwrap();
    assert_eq!(decoded, Response::ok(None));
}

#[test]
fn test_encode_refuses_oversized_payload() {
    let at_limit = Response::ok(Some(vec![0u8; MAX_PAYLOAD_SIZE as usize]));
    assert_eq!(
        encode_response(&at_limit).unwrap().len(),
        HEADER_SIZE + MAX_PAYLOAD_SIZE as usize
    );

    let over = Response::ok(Some(vec![0u8; MAX_PAYLOAD_SIZE as usize + 1]));
    assert!(matches!(encode_response(&over), Err(KvError::Protocol(_))));

    let put = Command::RawPut {
        cf: "default".to_string(),
        key: b"k".to_vec(),
        value: vec![0u8; MAX_PAYLOAD_SIZE as usize],
    };
    assert!(matches!(encode_command(&put), Err(KvError::Protocol(_))));
}

#[test]
fn test_oversized_write_leaves_stream_untouched() {
    let mut buffer = Vec::new();
    let over = Response::ok(Some(vec![0u8; MAX_PAYLOAD_SIZE as usize + 1]));
    assert!(write_response(&mut buffer, &over).is_err());
    assert!(buffer.is_empty());
}

#[test]
fn test_decode_unknown_status() {
    assert!(decode_response(&[0x09, 0, 0, 0, 0]).is_err());
}

// =============================================================================
// Scan Payloads
// =============================================================================

#[test]
fn test_kv_pairs_encoding() {
    let pairs = vec![
        KvPair {
            key: b"a".to_vec(),
            value: b"1".to_vec(),
        },
        KvPair {
            key: b"b".to_vec(),
            value: Vec::new(),
        },
    ];

    let bytes = encode_kv_pairs(&pairs);
    assert_eq!(&bytes[0..4], &2u32.to_be_bytes());
    assert_eq!(decode_kv_pairs(&bytes).unwrap(), pairs);
}

#[test]
fn test_kv_pairs_empty() {
    let bytes = encode_kv_pairs(&[]);
    assert_eq!(bytes, vec![0, 0, 0, 0]);
    assert!(decode_kv_pairs(&bytes).unwrap().is_empty());
}

#[test]
fn test_kv_pairs_truncated() {
    let bytes = encode_kv_pairs(&[KvPair {
        key: b"key".to_vec(),
        value: b"value".to_vec(),
    }]);
    assert!(decode_kv_pairs(&bytes[..bytes.len() - 1]).is_err());
    assert!(decode_kv_pairs(&[]).is_err());

    // count promises more pairs than present
    let mut lying = bytes.clone();
    lying[3] = 2;
    assert!(decode_kv_pairs(&lying).is_err());
}

// =============================================================================
// Stream Helpers
// =============================================================================

#[test]
fn test_stream_round_trip() {
    let mut buffer = Vec::new();
    write_command(&mut buffer, &Command::Ping).unwrap();
    write_command(
        &mut buffer,
        &Command::RawPut {
            cf: "default".to_string(),
            key: b"k".to_vec(),
            value: b"v".to_vec(),
        },
    )
    .unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_command(&mut cursor).unwrap(), Command::Ping);
    assert!(matches!(
        read_command(&mut cursor).unwrap(),
        Command::RawPut { .. }
    ));

    // clean end of stream surfaces as an I/O error
    assert!(matches!(read_command(&mut cursor), Err(KvError::Io(_))));
}

#[test]
fn test_response_stream() {
    let mut buffer = Vec::new();
    write_response(&mut buffer, &Response::not_found()).unwrap();
    write_response(&mut buffer, &Response::ok(Some(b"x".to_vec()))).unwrap();

    let mut cursor = Cursor::new(buffer);
    assert_eq!(read_response(&mut cursor).unwrap().status, Status::NotFound);
    assert_eq!(read_response(&mut cursor).unwrap().payload, Some(b"x".to_vec()));
}

#[test]
fn test_read_rejects_oversized_frame_before_allocating() {
    let mut bytes = vec![0x01];
    bytes.extend_from_slice(&u32::MAX.to_be_bytes());

    let mut cursor = Cursor::new(bytes);
    assert!(matches!(read_command(&mut cursor), Err(KvError::Protocol(_))));
}
