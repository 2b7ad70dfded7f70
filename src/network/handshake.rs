//! Version handshake
//!
//! Each endpoint announces its protocol version and build revision as its
//! first frame. Until the peer's announcement arrives nothing is delivered
//! to the game; any mismatch stops the connection before gameplay begins.

use std::cmp::Ordering;
use thiserror::Error;

use crate::protocol::{Frame, Message, Version, PROTOCOL_VERSION, REVISION};

/// Why two builds refused to play together
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionMismatch {
    #[error("Version mismatch: the remote player's game is older (v{remote}, this is v{local})")]
    Older { local: Version, remote: Version },

    #[error("Version mismatch: the remote player's game is newer (v{remote}, this is v{local})")]
    Newer { local: Version, remote: Version },

    #[error("Version mismatch: the remote player's game is a different revision ({remote}, this is {local})")]
    DifferentRevision { local: String, remote: String },

    #[error("Version mismatch: the remote player did not announce a version (opcode {opcode:#04x})")]
    NotAnnounced { opcode: u8 },
}

/// Compare a remote announcement against the local build
pub fn check_version(
    local: Version,
    local_revision: &str,
    remote: Version,
    remote_revision: &str,
) -> Result<(), VersionMismatch> {
    match remote.cmp(&local) {
        Ordering::Less => Err(VersionMismatch::Older { local, remote }),
        Ordering::Greater => Err(VersionMismatch::Newer { local, remote }),
        Ordering::Equal if remote_revision != local_revision => {
            Err(VersionMismatch::DifferentRevision {
                local: local_revision.to_string(),
                remote: remote_revision.to_string(),
            })
        }
        Ordering::Equal => Ok(()),
    }
}

/// State of the handshake on one connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No announcement received yet
    AwaitingVersion,
    /// Versions matched; frames flow to the game
    Established,
}

/// What to do with an inbound frame
#[derive(Debug, Clone, PartialEq)]
pub enum Gate {
    /// The announcement matched; nothing to deliver
    Established,
    /// Pass the frame on to the game
    Deliver(Frame),
    /// Stop the connection
    Rejected(VersionMismatch),
}

/// Per-connection handshake state machine
#[derive(Debug, Clone)]
pub struct Handshake {
    state: HandshakeState,
    version: Version,
    revision: String,
}

impl Default for Handshake {
    fn default() -> Self {
        Self::new(PROTOCOL_VERSION, REVISION)
    }
}

impl Handshake {
    pub fn new(version: Version, revision: impl Into<String>) -> Self {
        Self {
            state: HandshakeState::AwaitingVersion,
            version,
            revision: revision.into(),
        }
    }

    pub fn state(&self) -> HandshakeState {
        self.state
    }

    pub fn is_established(&self) -> bool {
        self.state == HandshakeState::Established
    }

    /// The announcement this endpoint sends on connecting
    pub fn announcement(&self) -> Message {
        Message::Version {
            version: self.version,
            revision: self.revision.clone(),
        }
    }

    /// Run an inbound frame through the gate
    pub fn admit(&mut self, frame: Frame) -> Gate {
        if self.state == HandshakeState::Established {
            return Gate::Deliver(frame);
        }

        match frame {
            Frame::Message(Message::Version { version, revision }) => {
                match check_version(self.version, &self.revision, version, &revision) {
                    Ok(()) => {
                        self.state = HandshakeState::Established;
                        Gate::Established
                    }
                    Err(mismatch) => Gate::Rejected(mismatch),
                }
            }
            Frame::Message(other) => Gate::Rejected(VersionMismatch::NotAnnounced {
                opcode: other.opcode() as u8,
            }),
            Frame::Unknown { opcode } => Gate::Rejected(VersionMismatch::NotAnnounced { opcode }),
        }
    }
}
