//! Art Attack - Two-player competitive painting
//!
//! The authoritative game-state synchronization layer: framed TCP transport,
//! version handshake, opcode dispatch, and host/client controllers that keep
//! two copies of the world in step.

pub mod config;
pub mod game;
pub mod network;
pub mod protocol;
pub mod world;
