// src/utils/binary_stream.rs

use crate::utils::error::{BinaryDataError, Result};
use byteorder::{BigEndian, ByteOrder};

/// Growable byte buffer with a read cursor.
///
/// All multi-byte integers are big-endian on the wire. Strings are
/// `u16`-length-prefixed UTF-8.
#[derive(Debug, Clone, Default)]
pub struct BinaryStream {
    buffer: Vec<u8>,
    offset: usize,
}

impl BinaryStream {
    pub fn new() -> Self {
        Self { buffer: Vec::new(), offset: 0 }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self { buffer: Vec::with_capacity(capacity), offset: 0 }
    }

    pub fn from_slice(slice: &[u8]) -> Self {
        Self { buffer: slice.to_vec(), offset: 0 }
    }

    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }

    pub fn feof(&self) -> bool {
        self.offset >= self.buffer.len()
    }

    #[inline]
    fn ensure_available(&self, len: usize) -> Result<()> {
        let have = self.buffer.len().saturating_sub(self.offset);
        if have < len {
            return Err(BinaryDataError::NotEnoughData { needed: len, have });
        }
        Ok(())
    }

    pub fn get(&mut self, len: usize) -> Result<&[u8]> {
        self.ensure_available(len)?;
        let start = self.offset;
        self.offset += len;
        Ok(&self.buffer[start..self.offset])
    }

    pub fn put(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    pub fn get_u8(&mut self) -> Result<u8> {
        Ok(self.get(1)?[0])
    }

    pub fn put_u8(&mut self, v: u8) {
        self.buffer.push(v);
    }

    pub fn get_u16_be(&mut self) -> Result<u16> {
        Ok(BigEndian::read_u16(self.get(2)?))
    }

    pub fn put_u16_be(&mut self, v: u16) {
        let mut buf = [0u8; 2];
        BigEndian::write_u16(&mut buf, v);
        self.put(&buf);
    }

    pub fn get_u32_be(&mut self) -> Result<u32> {
        Ok(BigEndian::read_u32(self.get(4)?))
    }

    pub fn put_u32_be(&mut self, v: u32) {
        let mut buf = [0u8; 4];
        BigEndian::write_u32(&mut buf, v);
        self.put(&buf);
    }

    /// Reads a `u16`-length-prefixed UTF-8 string.
    pub fn get_string(&mut self) -> Result<String> {
        let len = self.get_u16_be()? as usize;
        let bytes = self.get(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| BinaryDataError::InvalidUtf8)
    }

    /// Writes a `u16`-length-prefixed UTF-8 string.
    pub fn put_string(&mut self, v: &str) -> Result<()> {
        let bytes = v.as_bytes();
        let len: u16 = bytes
            .len()
            .try_into()
            .map_err(|_| BinaryDataError::ValueTooLarge(format!("string of {} bytes", bytes.len())))?;
        self.put_u16_be(len);
        self.put(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_round_trip_big_endian() {
        let mut stream = BinaryStream::new();
        stream.put_u8(0x7f);
        stream.put_u16_be(0x1234);
        stream.put_u32_be(0xdead_beef);
        assert_eq!(stream.buffer(), &[0x7f, 0x12, 0x34, 0xde, 0xad, 0xbe, 0xef]);

        assert_eq!(stream.get_u8().unwrap(), 0x7f);
        assert_eq!(stream.get_u16_be().unwrap(), 0x1234);
        assert_eq!(stream.get_u32_be().unwrap(), 0xdead_beef);
        assert!(stream.feof());
    }

    #[test]
    fn string_round_trip() {
        let mut stream = BinaryStream::new();
        stream.put_string("chat#lobby").unwrap();
        assert_eq!(stream.get_string().unwrap(), "chat#lobby");
        assert!(stream.feof());
    }

    #[test]
    fn short_read_reports_needed_and_have() {
        let mut stream = BinaryStream::from_slice(&[0x01, 0x02]);
        let err = stream.get_u32_be().unwrap_err();
        assert_eq!(err, BinaryDataError::NotEnoughData { needed: 4, have: 2 });
    }

    #[test]
    fn truncated_string_errors() {
        let mut stream = BinaryStream::new();
        stream.put_u16_be(10);
        stream.put(b"abc");
        assert!(matches!(
            stream.get_string().unwrap_err(),
            BinaryDataError::NotEnoughData { needed: 10, have: 3 }
        ));
    }

}
