//! Response definitions
//!
//! Represents responses to clients.

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Status {
    Ok = 0x00,
    NotFound = 0x01,
    Error = 0x02,
}

/// A response to send to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Optional payload (value for GET, encoded pairs for SCAN,
    /// error message for ERROR)
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Create an OK response with optional payload
    pub fn ok(payload: Option<Vec<u8>>) -> Self {
        Self {
            status: Status::Ok,
            payload,
        }
    }

    /// Create a NOT_FOUND response
    pub fn not_found() -> Self {
        Self {
            status: Status::NotFound,
            payload: None,
        }
    }

    /// Create an ERROR response
    pub fn error(message: &str) -> Self {
        Self {
            status: Status::Error,
            payload: Some(message.as_bytes().to_vec()),
        }
    }

    /// Error message carried by an ERROR response
    pub fn error_message(&self) -> Option<String> {
        match (self.status, &self.payload) {
            (Status::Error, Some(p)) => Some(String::from_utf8_lossy(p).into_owned()),
            _ => None,
        }
    }
}

/// One key-value pair of a scan result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}
