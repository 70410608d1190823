//! Network Module
//!
//! TCP server and client handling.
//!
//! ## Architecture
//! - Single acceptor thread
//! - Worker thread pool for connections
//! - Commands routed through the Raw API

mod client;
mod connection;
mod server;

pub use client::Client;
pub use connection::Connection;
pub use server::{Server, ShutdownHandle};
