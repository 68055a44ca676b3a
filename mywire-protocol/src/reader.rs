//! Cursor over a packet payload.
//!
//! All multi-byte integers on the wire are little-endian. Length-coded
//! integers use a one-byte prefix:
//!
//! ```text
//! 0x00..=0xfa  value is the byte itself
//! 0xfb         SQL NULL (row context only)
//! 0xfc         2-byte value follows
//! 0xfd         3-byte value follows
//! 0xfe         8-byte value follows
//! 0xff         never valid as a length prefix
//! ```

use crate::error::ProtocolError;
use bytes::Bytes;

/// Marker byte for a NULL column value inside a row.
pub const NULL_MARKER: u8 = 0xfb;

/// A reader over one reassembled packet payload.
#[derive(Debug)]
pub struct PacketReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left after the cursor.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn take(&mut self, len: usize, what: &'static str) -> Result<&'a [u8], ProtocolError> {
        if self.remaining() < len {
            return Err(ProtocolError::Truncated {
                what,
                needed: len,
                available: self.remaining(),
            });
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16, ProtocolError> {
        let b = self.take(2, "u16")?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn read_u24(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(3, "u24")?;
        Ok(u32::from(b[0]) | (u32::from(b[1]) << 8) | (u32::from(b[2]) << 16))
    }

    pub fn read_u32(&mut self) -> Result<u32, ProtocolError> {
        let b = self.take(4, "u32")?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, ProtocolError> {
        let b = self.take(8, "u64")?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(b);
        Ok(u64::from_le_bytes(raw))
    }

    /// Reads a length-coded integer, returning `None` for the NULL marker.
    pub fn read_lenenc_int_or_null(&mut self) -> Result<Option<u64>, ProtocolError> {
        let first = self.read_u8()?;
        match first {
            0x00..=0xfa => Ok(Some(u64::from(first))),
            NULL_MARKER => Ok(None),
            0xfc => self.read_u16().map(|v| Some(u64::from(v))),
            0xfd => self.read_u24().map(|v| Some(u64::from(v))),
            0xfe => self.read_u64().map(Some),
            0xff => Err(ProtocolError::InvalidLengthPrefix(first)),
        }
    }

    /// Reads a length-coded integer where NULL is not permitted.
    pub fn read_lenenc_int(&mut self) -> Result<u64, ProtocolError> {
        self.read_lenenc_int_or_null()?
            .ok_or(ProtocolError::InvalidLengthPrefix(NULL_MARKER))
    }

    /// Reads a length-coded byte string; `None` means SQL NULL.
    pub fn read_lenenc_bytes_or_null(&mut self) -> Result<Option<&'a [u8]>, ProtocolError> {
        match self.read_lenenc_int_or_null()? {
            Some(len) => {
                let len = usize::try_from(len).map_err(|_| ProtocolError::Truncated {
                    what: "length-coded string",
                    needed: usize::MAX,
                    available: self.remaining(),
                })?;
                self.take(len, "length-coded string").map(Some)
            }
            None => Ok(None),
        }
    }

    pub fn read_lenenc_bytes(&mut self) -> Result<&'a [u8], ProtocolError> {
        self.read_lenenc_bytes_or_null()?
            .ok_or(ProtocolError::InvalidLengthPrefix(NULL_MARKER))
    }

    /// Reads a length-coded string, decoding it as UTF-8 (lossy).
    pub fn read_lenenc_string(&mut self) -> Result<String, ProtocolError> {
        Ok(String::from_utf8_lossy(self.read_lenenc_bytes()?).into_owned())
    }

    /// Reads a NUL-terminated string. A missing terminator consumes the rest.
    pub fn read_null_string(&mut self) -> Result<String, ProtocolError> {
        let rest = &self.data[self.pos.min(self.data.len())..];
        match rest.iter().position(|&b| b == 0) {
            Some(end) => {
                let s = String::from_utf8_lossy(&rest[..end]).into_owned();
                self.pos += end + 1;
                Ok(s)
            }
            None => Ok(self.read_rest_string()),
        }
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        self.take(len, "bytes")
    }

    pub fn read_string(&mut self, len: usize) -> Result<String, ProtocolError> {
        Ok(String::from_utf8_lossy(self.take(len, "string")?).into_owned())
    }

    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.data[self.pos.min(self.data.len())..];
        self.pos = self.data.len();
        rest
    }

    pub fn read_rest_string(&mut self) -> String {
        String::from_utf8_lossy(self.read_rest()).into_owned()
    }

    pub fn read_rest_bytes(&mut self) -> Bytes {
        Bytes::copy_from_slice(self.read_rest())
    }

    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.take(len, "filler").map(|_| ())
    }
}
