//! Command definitions
//!
//! Represents Raw API requests from clients.

/// Command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandType {
    RawGet = 0x01,
    RawPut = 0x02,
    RawDelete = 0x03,
    RawScan = 0x04,
    Ping = 0x05,
}

/// A parsed command
///
/// The column family travels as its name; handlers reject unknown names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Get a value by key
    RawGet { cf: String, key: Vec<u8> },

    /// Put a key-value pair
    RawPut { cf: String, key: Vec<u8>, value: Vec<u8> },

    /// Delete a key
    RawDelete { cf: String, key: Vec<u8> },

    /// Up to `limit` pairs starting at `start_key`, ascending
    RawScan { cf: String, start_key: Vec<u8>, limit: u32 },

    /// Ping (health check)
    Ping,
}

impl Command {
    /// Get the command type
    pub fn command_type(&self) -> CommandType {
        match self {
            Command::RawGet { .. } => CommandType::RawGet,
            Command::RawPut { .. } => CommandType::RawPut,
            Command::RawDelete { .. } => CommandType::RawDelete,
            Command::RawScan { .. } => CommandType::RawScan,
            Command::Ping => CommandType::Ping,
        }
    }
}
