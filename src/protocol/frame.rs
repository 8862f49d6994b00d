// src/protocol/frame.rs

use crate::protocol::opcode::OpCode;
use bytes::Bytes;

/// A typed frame before encoding / after decoding. The channel only builds
/// control frames itself; application frames carry caller-supplied bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub opcode: OpCode,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(opcode: OpCode, payload: Bytes) -> Self {
        Self { opcode, payload }
    }

    pub fn hello(payload: Bytes) -> Self {
        Self::new(OpCode::Hello, payload)
    }

    pub fn welcome(payload: Bytes) -> Self {
        Self::new(OpCode::Welcome, payload)
    }

    pub fn ping() -> Self {
        Self::new(OpCode::Ping, Bytes::new())
    }

    pub fn pong() -> Self {
        Self::new(OpCode::Pong, Bytes::new())
    }
}

/// Result of decoding a frame header out of an inbound buffer. Offsets are
/// relative to the start of that buffer, so the payload can be sliced out of
/// it without copying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub opcode: OpCode,
    pub payload_offset: usize,
    pub payload_length: usize,
}
