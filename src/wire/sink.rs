//! Output byte sink for the wire layer.
//!
//! All multi-byte primitives are written little-endian; the header's
//! endianness marker tells readers what to correct against.

use byteorder::{LittleEndian, WriteBytesExt};

use crate::util::Result;

/// Growable in-memory sink with position tracking.
pub struct ByteSink {
    buf: Vec<u8>,
}

impl ByteSink {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Current write position (= bytes written so far).
    #[inline]
    pub fn pos(&self) -> u64 {
        self.buf.len() as u64
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        use std::io::Write;
        self.buf.write_all(data)?;
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.buf.write_u8(value)?;
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.buf.write_u16::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.buf.write_u32::<LittleEndian>(value)?;
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.buf.write_u64::<LittleEndian>(value)?;
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string (u32 length + bytes).
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        self.write_u32(s.len() as u32)?;
        self.write_bytes(s.as_bytes())
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}

impl Default for ByteSink {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_little_endian_layout() {
        let mut sink = ByteSink::new();
        sink.write_u32(0x04030201).unwrap();
        sink.write_u16(0x0605).unwrap();
        assert_eq!(sink.into_bytes(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_string_prefix() {
        let mut sink = ByteSink::new();
        sink.write_string("ab").unwrap();
        assert_eq!(sink.into_bytes(), vec![2, 0, 0, 0, b'a', b'b']);
    }

    #[test]
    fn test_pos_tracks_writes() {
        let mut sink = ByteSink::new();
        assert_eq!(sink.pos(), 0);
        sink.write_u64(0).unwrap();
        assert_eq!(sink.pos(), 8);
        sink.write_u8(1).unwrap();
        assert_eq!(sink.pos(), 9);
    }
}
