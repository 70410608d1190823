//! Protocol codec
//!
//! Encoding and decoding functions for the wire protocol.
//!
//! ## Wire Format
//!
//! ### Request (Command) Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Payload by Command Type
//! Every `field` is `len (4 bytes) + bytes`; integers are big-endian.
//! - RAW_GET:    field(cf) + field(key)
//! - RAW_PUT:    field(cf) + field(key) + value (rest of payload)
//! - RAW_DELETE: field(cf) + field(key)
//! - RAW_SCAN:   field(cf) + field(start_key) + limit (4 bytes)
//! - PING:       empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! A scan response payload is `count (4)` followed by
//! `field(key) + field(value)` per pair.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{KvError, Result};

use super::{Command, KvPair, Response, Status};

/// Header size: 1 byte command/status + 4 bytes length
pub const HEADER_SIZE: usize = 5;

/// Maximum payload size (16 MB)
pub const MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

// =============================================================================
// Command Encoding/Decoding
// =============================================================================

/// Encode a command to bytes
///
/// Format: cmd_type (1) + payload_len (4) + payload
///
/// Fails with `Protocol` if the payload exceeds `MAX_PAYLOAD_SIZE`.
pub fn encode_command(command: &Command) -> Result<Vec<u8>> {
    let mut payload = BytesMut::new();

    match command {
        Command::RawGet { cf, key } | Command::RawDelete { cf, key } => {
            put_field(&mut payload, cf.as_bytes());
            put_field(&mut payload, key);
        }
        Command::RawPut { cf, key, value } => {
            put_field(&mut payload, cf.as_bytes());
            put_field(&mut payload, key);
            payload.put_slice(value);
        }
        Command::RawScan {
            cf,
            start_key,
            limit,
        } => {
            put_field(&mut payload, cf.as_bytes());
            put_field(&mut payload, start_key);
            payload.put_u32(*limit);
        }
        Command::Ping => {}
    }

    frame(command.command_type() as u8, &payload, "command")
}

/// Decode a command from bytes
pub fn decode_command(bytes: &[u8]) -> Result<Command> {
    let (cmd_type, mut payload) = unframe(bytes, "command")?;

    let command = match cmd_type {
        0x01 => Command::RawGet {
            cf: get_cf(&mut payload, "RAW_GET")?,
            key: get_field(&mut payload, "RAW_GET key")?,
        },
        0x02 => Command::RawPut {
            cf: get_cf(&mut payload, "RAW_PUT")?,
            key: get_field(&mut payload, "RAW_PUT key")?,
            value: std::mem::take(&mut payload).to_vec(),
        },
        0x03 => Command::RawDelete {
            cf: get_cf(&mut payload, "RAW_DELETE")?,
            key: get_field(&mut payload, "RAW_DELETE key")?,
        },
        0x04 => {
            let cf = get_cf(&mut payload, "RAW_SCAN")?;
            let start_key = get_field(&mut payload, "RAW_SCAN start key")?;
            if payload.remaining() < 4 {
                return Err(KvError::Protocol(
                    "RAW_SCAN command: missing limit".to_string(),
                ));
            }
            let limit = payload.get_u32();
            Command::RawScan {
                cf,
                start_key,
                limit,
            }
        }
        0x05 => Command::Ping,
        _ => {
            return Err(KvError::Protocol(format!(
                "Unknown command type: 0x{:02x}",
                cmd_type
            )))
        }
    };

    if payload.has_remaining() {
        return Err(KvError::Protocol(format!(
            "{:?} command: {} unexpected trailing bytes",
            command.command_type(),
            payload.remaining()
        )));
    }

    Ok(command)
}

// =============================================================================
// Response Encoding/Decoding
// =============================================================================

/// Encode a response to bytes
///
/// Format: status (1) + payload_len (4) + payload
///
/// Fails with `Protocol` if the payload exceeds `MAX_PAYLOAD_SIZE`.
pub fn encode_response(response: &Response) -> Result<Vec<u8>> {
    let payload = response.payload.as_deref().unwrap_or(&[]);
    frame(response.status as u8, payload, "response")
}

/// Decode a response from bytes
pub fn decode_response(bytes: &[u8]) -> Result<Response> {
    let (status_byte, payload) = unframe(bytes, "response")?;

    let status = match status_byte {
        0x00 => Status::Ok,
        0x01 => Status::NotFound,
        0x02 => Status::Error,
        _ => {
            return Err(KvError::Protocol(format!(
                "Unknown response status: 0x{:02x}",
                status_byte
            )))
        }
    };

    let payload = if payload.is_empty() {
        None
    } else {
        Some(payload.to_vec())
    };

    Ok(Response { status, payload })
}

/// Size of the pair count that starts an encoded pair list
pub const KV_PAIRS_HEADER_SIZE: usize = 4;

/// Bytes one pair adds to an encoded pair list
pub fn encoded_pair_len(key_len: usize, value_len: usize) -> usize {
    4 + key_len + 4 + value_len
}

/// Encode scan results as a response payload
pub fn encode_kv_pairs(pairs: &[KvPair]) -> Vec<u8> {
    let mut buf = BytesMut::new();
    buf.put_u32(pairs.len() as u32);
    for pair in pairs {
        put_field(&mut buf, &pair.key);
        put_field(&mut buf, &pair.value);
    }
    buf.to_vec()
}

/// Decode a scan response payload
pub fn decode_kv_pairs(mut bytes: &[u8]) -> Result<Vec<KvPair>> {
    if bytes.remaining() < 4 {
        return Err(KvError::Protocol(
            "scan payload: missing pair count".to_string(),
        ));
    }
    let count = bytes.get_u32() as usize;

    // each pair needs at least two length prefixes
    let mut pairs = Vec::with_capacity(count.min(bytes.remaining() / 8));
    for _ in 0..count {
        let key = get_field(&mut bytes, "scan pair key")?;
        let value = get_field(&mut bytes, "scan pair value")?;
        pairs.push(KvPair { key, value });
    }

    if bytes.has_remaining() {
        return Err(KvError::Protocol(format!(
            "scan payload: {} unexpected trailing bytes",
            bytes.remaining()
        )));
    }

    Ok(pairs)
}

// =============================================================================
// Stream-based I/O helpers
// =============================================================================

/// Read a complete command from a stream
///
/// Blocks until a complete command is received or an error occurs
pub fn read_command<R: Read>(reader: &mut R) -> Result<Command> {
    let message = read_frame(reader, "command")?;
    decode_command(&message)
}

/// Write a command to a stream
pub fn write_command<W: Write>(writer: &mut W, command: &Command) -> Result<()> {
    writer.write_all(&encode_command(command)?)?;
    writer.flush()?;
    Ok(())
}

/// Read a complete response from a stream
pub fn read_response<R: Read>(reader: &mut R) -> Result<Response> {
    let message = read_frame(reader, "response")?;
    decode_response(&message)
}

/// Write a response to a stream
pub fn write_response<W: Write>(writer: &mut W, response: &Response) -> Result<()> {
    writer.write_all(&encode_response(response)?)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Private Helpers
// =============================================================================

fn frame(tag: u8, payload: &[u8], what: &str) -> Result<Vec<u8>> {
    check_payload_len(payload.len(), what)?;

    let mut message = BytesMut::with_capacity(HEADER_SIZE + payload.len());
    message.put_u8(tag);
    message.put_u32(payload.len() as u32);
    message.put_slice(payload);
    Ok(message.to_vec())
}

/// Split a framed message into (tag, payload)
fn unframe<'a>(bytes: &'a [u8], what: &str) -> Result<(u8, &'a [u8])> {
    if bytes.len() < HEADER_SIZE {
        return Err(KvError::Protocol(format!(
            "Incomplete {} header: expected {} bytes, got {}",
            what,
            HEADER_SIZE,
            bytes.len()
        )));
    }

    let tag = bytes[0];
    let payload_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]);
    check_payload_len(payload_len as usize, what)?;

    let total_len = HEADER_SIZE + payload_len as usize;
    if bytes.len() < total_len {
        return Err(KvError::Protocol(format!(
            "Incomplete {} payload: expected {} bytes, got {}",
            what,
            total_len,
            bytes.len()
        )));
    }

    Ok((tag, &bytes[HEADER_SIZE..total_len]))
}

fn read_frame<R: Read>(reader: &mut R, what: &str) -> Result<Vec<u8>> {
    let mut header = [0u8; HEADER_SIZE];
    reader.read_exact(&mut header)?;

    let payload_len = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    check_payload_len(payload_len as usize, what)?;

    let mut message = vec![0u8; HEADER_SIZE + payload_len as usize];
    message[..HEADER_SIZE].copy_from_slice(&header);
    reader.read_exact(&mut message[HEADER_SIZE..])?;

    Ok(message)
}

fn check_payload_len(payload_len: usize, what: &str) -> Result<()> {
    if payload_len > MAX_PAYLOAD_SIZE as usize {
        return Err(KvError::Protocol(format!(
            "{} payload too large: {} bytes (max {})",
            what, payload_len, MAX_PAYLOAD_SIZE
        )));
    }
    Ok(())
}

fn put_field(buf: &mut BytesMut, field: &[u8]) {
    buf.put_u32(field.len() as u32);
    buf.put_slice(field);
}

fn get_field(buf: &mut &[u8], what: &str) -> Result<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(KvError::Protocol(format!("{}: missing length", what)));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(KvError::Protocol(format!(
            "{}: incomplete (expected {}, got {})",
            what,
            len,
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len).to_vec())
}

fn get_cf(buf: &mut &[u8], command: &str) -> Result<String> {
    let raw = get_field(buf, &format!("{} cf", command))?;
    String::from_utf8(raw)
        .map_err(|_| KvError::Protocol(format!("{} command: cf is not UTF-8", command)))
}
