//! Protocol module - Defines the wire protocol between the two game endpoints
//!
//! Each frame on the wire is:
//! - 4 bytes body length (big-endian)
//! - 1 byte opcode
//! - bincode-serialized `Message`

mod codec;
mod message;

pub use codec::*;
pub use message::*;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version announced during the handshake
pub const PROTOCOL_VERSION: Version = Version::new(1, 0, 4);

/// Build revision announced during the handshake
pub const REVISION: &str = match option_env!("ARTATTACK_REVISION") {
    Some(revision) => revision,
    None => "dev",
};

/// Default port for game connections
pub const DEFAULT_PORT: u16 = 9067;

/// A major.minor.patch version, ordered lexicographically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version {
    pub major: u16,
    pub minor: u16,
    pub patch: u16,
}

impl Version {
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
