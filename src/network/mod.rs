//! Network module - Framed TCP transport between the two game endpoints
//!
//! Provides:
//! - A listening (host) and a dialling (client) connection
//! - A background worker per connection that owns the socket
//! - The version handshake gating gameplay traffic
//! - An in-memory transport for running two controllers in one process
//!
//! The simulation thread only ever touches the two queues of a connection
//! through the non-blocking `Transport` trait.

mod client;
mod connection;
mod handshake;
mod memory;
mod server;

pub use client::*;
pub use connection::*;
pub use handshake::*;
pub use memory::*;
pub use server::*;

use std::io;
use std::net::SocketAddr;
use thiserror::Error;

use crate::protocol::{Frame, Message};

/// Errors setting up a connection
#[derive(Error, Debug)]
pub enum NetError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Bind failed: {0}")]
    BindFailed(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),
}

pub type NetResult<T> = Result<T, NetError>;

/// The simulation thread's view of a connection.
///
/// Both operations return immediately; neither blocks on network I/O.
pub trait Transport {
    /// Queue a message for the peer
    fn send(&self, message: Message);

    /// Take the next inbound item, if one is waiting.
    ///
    /// After an `Err` event has been returned, nothing further is.
    fn try_receive(&mut self) -> Option<Frame>;

    /// Ask the connection to say goodbye and close
    fn close(&mut self);
}

/// Resolve a hostname to a socket address
pub async fn resolve_host(host: &str, port: u16) -> io::Result<SocketAddr> {
    use tokio::net::lookup_host;

    let addr_string = format!("{}:{}", host, port);
    let mut addrs = lookup_host(&addr_string).await?;

    addrs.next().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("Could not resolve host: {}", host),
        )
    })
}
