//! Protocol message definitions
//!
//! Defines every message exchanged between host and client, plus the two
//! events the transport raises locally (`Connect` and `Err`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;

use super::Version;
use crate::world::{
    ActorId, ArtworkPosition, ColourId, Outcome, PaletteSnapshot, PlayerId, PowerupKind, ToolKind,
    Vec2,
};

/// Opcode carried in the first byte of every frame body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    Connect = 0x00,
    Start = 0x01,
    Version = 0x02,
    GameConfig = 0x03,
    PaletteChange = 0x10,
    ToolMove = 0x11,
    Paint = 0x12,
    Attack = 0x13,
    Hit = 0x14,
    PowerupSpawn = 0x20,
    Pickup = 0x21,
    Pos = 0x30,
    EndGame = 0x40,
    Disconnect = 0xFE,
    Err = 0xFF,
}

impl TryFrom<u8> for Opcode {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Ok(match value {
            0x00 => Opcode::Connect,
            0x01 => Opcode::Start,
            0x02 => Opcode::Version,
            0x03 => Opcode::GameConfig,
            0x10 => Opcode::PaletteChange,
            0x11 => Opcode::ToolMove,
            0x12 => Opcode::Paint,
            0x13 => Opcode::Attack,
            0x14 => Opcode::Hit,
            0x20 => Opcode::PowerupSpawn,
            0x21 => Opcode::Pickup,
            0x30 => Opcode::Pos,
            0x40 => Opcode::EndGame,
            0xFE => Opcode::Disconnect,
            0xFF => Opcode::Err,
            other => return Err(other),
        })
    }
}

/// Match setup sent once by the host; both world copies evolve from it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub painting: String,
    pub time_limit_secs: u32,
    /// Initial palettes, indexed by `PlayerId::index`
    pub palettes: [PaletteSnapshot; 2],
}

/// Category of a network failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailureKind {
    /// Socket error during connect, read or write
    Transport,
    /// The peer runs an incompatible build
    VersionMismatch,
    /// A frame could not be decoded
    Malformed,
    /// The peer closed the socket without saying goodbye
    Closed,
}

/// A network failure surfaced to the game as an `Err` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl NetFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for NetFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// All protocol messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    /// The transport has connected to `remote` (local only)
    Connect { remote: SocketAddr },

    /// Version announcement, the first frame in each direction
    Version { version: Version, revision: String },

    /// Host to client: the match setup
    GameConfig(GameConfig),

    /// Ready to begin the countdown
    Start,

    /// A player's palette after a local change
    PaletteChange {
        player: PlayerId,
        palette: PaletteSnapshot,
    },

    /// A player's tool moved
    ToolMove {
        player: PlayerId,
        pos: ArtworkPosition,
    },

    /// A player painted with `tool` at `pos`
    Paint {
        player: PlayerId,
        tool: ToolKind,
        pos: ArtworkPosition,
        colour: ColourId,
    },

    /// A character attacked from `pos`
    Attack { actor: ActorId, pos: Vec2 },

    /// Host to client: an attack landed on `actor`
    Hit {
        actor: ActorId,
        vector: Vec2,
        stun: f32,
    },

    /// Host to client: a powerup was dropped
    PowerupSpawn {
        id: ActorId,
        kind: PowerupKind,
        pos: Vec2,
    },

    /// Host to client: a player collected a powerup
    Pickup { player: PlayerId, powerup: ActorId },

    /// Periodic actor position correction
    Pos { actors: Vec<(ActorId, Vec2)> },

    /// Client to host: time is up. Host to client: the result.
    EndGame { outcome: Option<Outcome> },

    /// The peer is leaving
    Disconnect,

    /// The connection failed (local only)
    Err(NetFailure),
}

impl Message {
    pub fn opcode(&self) -> Opcode {
        match self {
            Message::Connect { .. } => Opcode::Connect,
            Message::Version { .. } => Opcode::Version,
            Message::GameConfig(_) => Opcode::GameConfig,
            Message::Start => Opcode::Start,
            Message::PaletteChange { .. } => Opcode::PaletteChange,
            Message::ToolMove { .. } => Opcode::ToolMove,
            Message::Paint { .. } => Opcode::Paint,
            Message::Attack { .. } => Opcode::Attack,
            Message::Hit { .. } => Opcode::Hit,
            Message::PowerupSpawn { .. } => Opcode::PowerupSpawn,
            Message::Pickup { .. } => Opcode::Pickup,
            Message::Pos { .. } => Opcode::Pos,
            Message::EndGame { .. } => Opcode::EndGame,
            Message::Disconnect => Opcode::Disconnect,
            Message::Err(_) => Opcode::Err,
        }
    }
}

/// An item taken off the inbound queue
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Message(Message),
    /// A frame with an opcode this build does not know
    Unknown { opcode: u8 },
}

impl From<Message> for Frame {
    fn from(message: Message) -> Self {
        Frame::Message(message)
    }
}
