// src/protocol/frame_codec.rs

use crate::protocol::frame::{Frame, FrameHeader};
use crate::protocol::opcode::OpCode;
use crate::utils::binary_stream::BinaryStream;
use crate::utils::error::{BinaryDataError, Result};
use bytes::Bytes;

/// Owner of the on-wire frame layout:
///
/// ```text
/// [u32 BE length][u8 opcode][payload ...]
/// ```
///
/// `length` counts the opcode byte plus the payload, so an empty control
/// frame encodes as five bytes. Nothing outside this module reads or writes
/// the layout directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Length prefix plus opcode byte.
    pub const HEADER_LENGTH: usize = 5;
    /// Upper bound on `length`; anything larger is rejected before the
    /// payload is touched.
    pub const MAX_FRAME_LENGTH: usize = 8 * 1024 * 1024;

    pub fn new() -> Self {
        Self
    }

    /// Encodes a frame into a self-delimiting buffer.
    pub fn encode_frame(&self, frame: &Frame) -> Result<Vec<u8>> {
        let length = frame.payload.len() + 1;
        if length > Self::MAX_FRAME_LENGTH {
            return Err(BinaryDataError::ValueTooLarge(format!(
                "frame of {} bytes exceeds maximum of {}",
                length,
                Self::MAX_FRAME_LENGTH
            )));
        }
        let mut stream = BinaryStream::with_capacity(4 + length);
        stream.put_u32_be(length as u32);
        stream.put_u8(frame.opcode.to_u8());
        stream.put(&frame.payload);
        Ok(stream.into_inner())
    }

    /// Attempts to decode a header from the front of `buffer`. Fails when the
    /// buffer is shorter than the header, shorter than the declared frame, or
    /// declares an impossible length.
    pub fn try_decode_header(&self, buffer: &[u8]) -> Result<FrameHeader> {
        let mut stream = BinaryStream::from_slice(&buffer[..buffer.len().min(Self::HEADER_LENGTH)]);
        let length = stream.get_u32_be()? as usize;
        let raw_opcode = stream.get_u8()?;
        if length == 0 {
            return Err(BinaryDataError::InvalidData(
                "frame length must cover the opcode byte".into(),
            ));
        }
        if length > Self::MAX_FRAME_LENGTH {
            return Err(BinaryDataError::ValueTooLarge(format!(
                "declared frame length {} exceeds maximum of {}",
                length,
                Self::MAX_FRAME_LENGTH
            )));
        }
        let payload_length = length - 1;
        if buffer.len() < Self::HEADER_LENGTH + payload_length {
            return Err(BinaryDataError::NotEnoughData {
                needed: Self::HEADER_LENGTH + payload_length,
                have: buffer.len(),
            });
        }
        Ok(FrameHeader {
            opcode: OpCode::from_u8(raw_opcode),
            payload_offset: Self::HEADER_LENGTH,
            payload_length,
        })
    }

    /// Slices the payload a previously decoded header describes out of the
    /// same buffer.
    pub fn decode_payload(&self, buffer: &Bytes, header: &FrameHeader) -> Bytes {
        buffer.slice(header.payload_offset..header.payload_offset + header.payload_length)
    }

    /// Full decode, for callers that want the typed frame back.
    pub fn decode_frame(&self, buffer: &Bytes) -> Result<Frame> {
        let header = self.try_decode_header(buffer)?;
        Ok(Frame::new(header.opcode, self.decode_payload(buffer, &header)))
    }
}
