//! Blocking client for the Raw API protocol

use std::io::{BufReader, BufWriter};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{KvError, Result};
use crate::protocol::{
    decode_kv_pairs, read_response, write_command, Command, KvPair, Response, Status,
};

/// One connection to a cfkv server; requests are sent one at a time
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    pub fn connect<A: ToSocketAddrs>(addr: A) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| KvError::Network(format!("failed to connect: {}", e)))?;
        stream.set_nodelay(true)?;
        let read_stream = stream.try_clone()?;

        Ok(Self {
            reader: BufReader::new(read_stream),
            writer: BufWriter::new(stream),
        })
    }

    pub fn set_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.reader.get_ref().set_read_timeout(timeout)?;
        self.writer.get_ref().set_write_timeout(timeout)?;
        Ok(())
    }

    /// `Ok(None)` when the key is absent
    pub fn raw_get(&mut self, cf: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let response = self.call(&Command::RawGet {
            cf: cf.to_string(),
            key: key.to_vec(),
        })?;
        match response.status {
            Status::NotFound => Ok(None),
            _ => Ok(Some(response.payload.unwrap_or_default())),
        }
    }

    pub fn raw_put(&mut self, cf: &str, key: &[u8], value: &[u8]) -> Result<()> {
        self.call(&Command::RawPut {
            cf: cf.to_string(),
            key: key.to_vec(),
            value: value.to_vec(),
        })?;
        Ok(())
    }

    pub fn raw_delete(&mut self, cf: &str, key: &[u8]) -> Result<()> {
        self.call(&Command::RawDelete {
            cf: cf.to_string(),
            key: key.to_vec(),
        })?;
        Ok(())
    }

    pub fn raw_scan(&mut self, cf: &str, start_key: &[u8], limit: u32) -> Result<Vec<KvPair>> {
        let response = self.call(&Command::RawScan {
            cf: cf.to_string(),
            start_key: start_key.to_vec(),
            limit,
        })?;
        decode_kv_pairs(response.payload.as_deref().unwrap_or(&[]))
    }

    pub fn ping(&mut self) -> Result<()> {
        self.call(&Command::Ping)?;
        Ok(())
    }

    /// Send one command and wait for its response; ERROR becomes `Err`
    fn call(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        let response = read_response(&mut self.reader)?;
        if let Some(message) = response.error_message() {
            return Err(KvError::Network(format!("server error: {}", message)));
        }
        if response.status == Status::Error {
            return Err(KvError::Network("server error".to_string()));
        }
        Ok(response)
    }
}
