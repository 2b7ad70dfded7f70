//! Protocol codec for encoding/decoding frames
//!
//! Handles serialization and length-prefix framing of protocol messages.
//! The decoder buffers partial input, so a frame may arrive split across any
//! number of socket reads.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

use super::{Frame, Message, Opcode};

/// Default maximum frame body size (1 MiB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Length prefix size
const HEADER_SIZE: usize = 4;

/// Codec errors
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Frame too large: {0} bytes (max: {1})")]
    FrameTooLarge(usize, usize),

    #[error("Empty frame")]
    EmptyFrame,

    #[error("Opcode {opcode:#04x} does not match payload {payload:?}")]
    OpcodeMismatch { opcode: u8, payload: Opcode },

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

pub type CodecResult<T> = Result<T, CodecError>;

/// Encodes messages into the wire format
#[derive(Debug)]
pub struct FrameEncoder {
    max_frame_size: usize,
}

impl FrameEncoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Append one complete frame for `message` to `buf`
    pub fn encode(&self, message: &Message, buf: &mut BytesMut) -> CodecResult<()> {
        let payload = bincode::serialize(message)?;
        let length = payload.len() + 1;

        if length > self.max_frame_size {
            return Err(CodecError::FrameTooLarge(length, self.max_frame_size));
        }

        buf.reserve(HEADER_SIZE + length);
        buf.put_u32(length as u32);
        buf.put_u8(message.opcode() as u8);
        buf.put_slice(&payload);
        Ok(())
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes frames from the wire format
#[derive(Debug)]
pub struct FrameDecoder {
    state: DecodeState,
    max_frame_size: usize,
}

#[derive(Debug, Default)]
enum DecodeState {
    #[default]
    Header,
    Body {
        length: usize,
    },
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(DEFAULT_MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            state: DecodeState::Header,
            max_frame_size,
        }
    }

    /// Attempt to decode a frame from the buffer
    /// Returns Ok(None) if more data is needed
    pub fn decode(&mut self, buf: &mut BytesMut) -> CodecResult<Option<Frame>> {
        loop {
            match self.state {
                DecodeState::Header => {
                    if buf.len() < HEADER_SIZE {
                        return Ok(None);
                    }

                    let length = buf.get_u32() as usize;
                    if length == 0 {
                        return Err(CodecError::EmptyFrame);
                    }
                    if length > self.max_frame_size {
                        return Err(CodecError::FrameTooLarge(length, self.max_frame_size));
                    }

                    self.state = DecodeState::Body { length };
                }
                DecodeState::Body { length } => {
                    if buf.len() < length {
                        buf.reserve(length - buf.len());
                        return Ok(None);
                    }

                    let body = buf.split_to(length);
                    self.state = DecodeState::Header;
                    return decode_body(&body).map(Some);
                }
            }
        }
    }

    /// Decode every complete frame currently in the buffer
    pub fn decode_all(&mut self, buf: &mut BytesMut) -> CodecResult<Vec<Frame>> {
        let mut frames = Vec::new();
        while let Some(frame) = self.decode(buf)? {
            frames.push(frame);
        }
        Ok(frames)
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn decode_body(body: &[u8]) -> CodecResult<Frame> {
    let opcode = body[0];
    if Opcode::try_from(opcode).is_err() {
        return Ok(Frame::Unknown { opcode });
    }

    let message: Message = bincode::deserialize(&body[1..])?;
    if message.opcode() as u8 != opcode {
        return Err(CodecError::OpcodeMismatch {
            opcode,
            payload: message.opcode(),
        });
    }
    Ok(Frame::Message(message))
}
