// src/protocol/mod.rs

pub mod frame;
pub mod frame_codec;
pub mod identity_codec;
pub mod opcode;

pub use frame::{Frame, FrameHeader};
pub use frame_codec::FrameCodec;
pub use identity_codec::IdentityCodec;
pub use opcode::OpCode;
