//! Input byte sources and the swap-aware read cursor.
//!
//! [`FbomSource`] supplies a whole stream as one byte slice, either
//! memory-mapped from a file or owned in memory. [`ByteCursor`] is the
//! single place host/stream endianness correction happens: every
//! multi-byte primitive read goes through it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

#[cfg(feature = "mmap")]
use memmap2::Mmap;

use crate::util::{Error, Result};

/// Backing storage for a stream being read.
pub enum FbomSource {
    /// Memory-mapped file (preferred for large streams).
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
    /// Owned byte buffer.
    Buffer(Vec<u8>),
}

impl FbomSource {
    /// Open a file, memory-mapping it when the feature allows.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut file = File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound(path.to_path_buf())
            } else {
                Error::Io(e)
            }
        })?;

        #[cfg(feature = "mmap")]
        {
            let len = file.metadata()?.len();
            if len > 0 {
                // Safety: mapping is read-only for the life of the source.
                let mmap = unsafe { Mmap::map(&file) }
                    .map_err(|e| Error::MmapFailed(e.to_string()))?;
                return Ok(Self::Mapped(mmap));
            }
        }

        let mut buf = Vec::new();
        file.read_to_end(&mut buf)?;
        Ok(Self::Buffer(buf))
    }

    /// Wrap an owned byte buffer.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self::Buffer(buf)
    }

    pub fn bytes(&self) -> &[u8] {
        match self {
            #[cfg(feature = "mmap")]
            Self::Mapped(mmap) => mmap,
            Self::Buffer(buf) => buf,
        }
    }
}

/// Position-tracking reader over a byte slice.
///
/// `swap` is set from the stream header's endianness marker when it
/// differs from the host's canonical little-endian reads.
#[derive(Clone, Copy)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
    swap: bool,
}

impl<'a> ByteCursor<'a> {
    pub fn new(buf: &'a [u8], swap: bool) -> Self {
        Self { buf, pos: 0, swap }
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    #[inline]
    pub fn is_at_end(&self) -> bool {
        self.pos >= self.buf.len()
    }

    #[inline]
    pub fn swapped(&self) -> bool {
        self.swap
    }

    /// Take `len` raw bytes, advancing the cursor.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(len)
            .ok_or(Error::UnexpectedEof(u64::MAX))?;
        if end > self.buf.len() {
            return Err(Error::UnexpectedEof(end as u64));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        let v = u16::from_le_bytes([b[0], b[1]]);
        Ok(if self.swap { v.swap_bytes() } else { v })
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        let v = u32::from_le_bytes([b[0], b[1], b[2], b[3]]);
        Ok(if self.swap { v.swap_bytes() } else { v })
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        let v = u64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]);
        Ok(if self.swap { v.swap_bytes() } else { v })
    }

    /// Read a length-prefixed UTF-8 string (u32 length + bytes).
    pub fn read_string(&mut self) -> Result<String> {
        let len = self.read_u32()? as usize;
        let bytes = self.take(len)?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    /// Peek the next byte without advancing.
    pub fn peek_u8(&self) -> Result<u8> {
        self.buf
            .get(self.pos)
            .copied()
            .ok_or(Error::UnexpectedEof(self.pos as u64))
    }
}

/// Byte-swap a flat POD payload in place, treating it as a sequence of
/// `elem_size`-byte primitives. Single-byte payloads are untouched.
pub fn swap_payload(bytes: &mut [u8], elem_size: usize) {
    if elem_size <= 1 {
        return;
    }
    for chunk in bytes.chunks_exact_mut(elem_size) {
        chunk.reverse();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_reads_le() {
        let buf = [1u8, 2, 3, 4, 5, 6, 7, 8];
        let mut cur = ByteCursor::new(&buf, false);
        assert_eq!(cur.read_u32().unwrap(), 0x04030201);
        assert_eq!(cur.read_u16().unwrap(), 0x0605);
        assert_eq!(cur.remaining(), 2);
    }

    #[test]
    fn test_cursor_swaps_when_marked() {
        let buf = [0x12u8, 0x34, 0x56, 0x78];
        let mut le = ByteCursor::new(&buf, false);
        let mut be = ByteCursor::new(&buf, true);
        assert_eq!(le.read_u32().unwrap(), 0x78563412);
        assert_eq!(be.read_u32().unwrap(), 0x12345678);
    }

    #[test]
    fn test_cursor_eof() {
        let buf = [0u8; 3];
        let mut cur = ByteCursor::new(&buf, false);
        assert!(matches!(cur.read_u32(), Err(Error::UnexpectedEof(_))));
        // Failed read does not advance.
        assert_eq!(cur.pos(), 0);
        assert_eq!(cur.read_u8().unwrap(), 0);
    }

    #[test]
    fn test_string_roundtrip() {
        let buf = [3u8, 0, 0, 0, b'a', b'b', b'c', 9];
        let mut cur = ByteCursor::new(&buf, false);
        assert_eq!(cur.read_string().unwrap(), "abc");
        assert_eq!(cur.read_u8().unwrap(), 9);
    }

    #[test]
    fn test_swap_payload() {
        let mut bytes = [1u8, 2, 3, 4, 5, 6, 7, 8];
        swap_payload(&mut bytes, 4);
        assert_eq!(bytes, [4, 3, 2, 1, 8, 7, 6, 5]);

        let mut single = [1u8, 2, 3];
        swap_payload(&mut single, 1);
        assert_eq!(single, [1, 2, 3]);
    }
}
