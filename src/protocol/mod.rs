//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Protocol Format (V1 - Simple Binary)
//!
//! ### Request Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │ Cmd (1)  │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Commands
//! - 0x01: RAW_GET    - Payload: cf + key
//! - 0x02: RAW_PUT    - Payload: cf + key + value
//! - 0x03: RAW_DELETE - Payload: cf + key
//! - 0x04: RAW_SCAN   - Payload: cf + start_key + limit (4)
//! - 0x05: PING       - Payload: empty
//!
//! ### Response Format
//! ```text
//! ┌──────────┬──────────┬─────────────────────────────┐
//! │Status(1) │ Len (4)  │         Payload             │
//! └──────────┴──────────┴─────────────────────────────┘
//! ```
//!
//! ### Status Codes
//! - 0x00: OK
//! - 0x01: NOT_FOUND
//! - 0x02: ERROR

mod command;
mod response;
mod codec;

pub use command::{Command, CommandType};
pub use response::{KvPair, Response, Status};
pub use codec::{
    decode_command, decode_kv_pairs, decode_response, encode_command, encode_kv_pairs,
    encode_response, encoded_pair_len, read_command, read_response, write_command,
    write_response, HEADER_SIZE, KV_PAIRS_HEADER_SIZE, MAX_PAYLOAD_SIZE,
};
