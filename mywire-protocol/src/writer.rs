//! Payload builder for length-coded values.

use crate::reader::NULL_MARKER;
use bytes::{BufMut, BytesMut};

/// Accumulates one packet payload. Framing is applied separately by the codec.
#[derive(Debug, Default)]
pub struct PacketWriter {
    buf: BytesMut,
}

impl PacketWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.buf.put_u16_le(value);
    }

    pub fn write_u24(&mut self, value: u32) {
        self.buf.put_slice(&value.to_le_bytes()[..3]);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32_le(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64_le(value);
    }

    pub fn write_zeros(&mut self, count: usize) {
        self.buf.put_bytes(0, count);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.put_slice(data);
    }

    /// Writes the shortest length-coded form of `value`.
    pub fn write_lenenc_int(&mut self, value: u64) {
        match value {
            0..=250 => self.write_u8(value as u8),
            251..=0xffff => {
                self.write_u8(0xfc);
                self.write_u16(value as u16);
            }
            0x1_0000..=0xff_ffff => {
                self.write_u8(0xfd);
                self.write_u24(value as u32);
            }
            _ => {
                self.write_u8(0xfe);
                self.write_u64(value);
            }
        }
    }

    pub fn write_lenenc_bytes(&mut self, data: &[u8]) {
        self.write_lenenc_int(data.len() as u64);
        self.write_bytes(data);
    }

    pub fn write_lenenc_string(&mut self, s: &str) {
        self.write_lenenc_bytes(s.as_bytes());
    }

    /// Writes a length-coded byte string or the NULL marker.
    pub fn write_lenenc_bytes_or_null(&mut self, data: Option<&[u8]>) {
        match data {
            Some(data) => self.write_lenenc_bytes(data),
            None => self.write_u8(NULL_MARKER),
        }
    }

    pub fn write_null_string(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
        self.write_u8(0);
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> BytesMut {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PacketReader;
    use proptest::prelude::*;

    #[test]
    fn test_lenenc_boundaries() {
        let cases: [(u64, usize); 8] = [
            (0, 1),
            (250, 1),
            (251, 3),
            (0xffff, 3),
            (0x1_0000, 4),
            (0xff_ffff, 4),
            (0x100_0000, 9),
            (u64::MAX, 9),
        ];
        for (value, encoded_len) in cases {
            let mut writer = PacketWriter::new();
            writer.write_lenenc_int(value);
            assert_eq!(writer.len(), encoded_len, "value {value}");

            let mut reader = PacketReader::new(writer.as_bytes());
            assert_eq!(reader.read_lenenc_int().unwrap(), value);
        }
    }

    #[test]
    fn test_null_marker_written() {
        let mut writer = PacketWriter::new();
        writer.write_lenenc_bytes_or_null(None);
        writer.write_lenenc_bytes_or_null(Some(b""));
        assert_eq!(writer.as_bytes(), &[0xfb, 0x00]);
    }

    #[test]
    fn test_null_string() {
        let mut writer = PacketWriter::new();
        writer.write_null_string("root");
        writer.write_u24(0x0a0b0c);
        assert_eq!(writer.as_bytes(), b"root\0\x0c\x0b\x0a");
    }

    proptest! {
        #[test]
        fn test_lenenc_int_roundtrip(value in any::<u64>(), tail in any::<u8>()) {
            let mut writer = PacketWriter::new();
            writer.write_lenenc_int(value);
            writer.write_u8(tail);

            let mut reader = PacketReader::new(writer.as_bytes());
            prop_assert_eq!(reader.read_lenenc_int().unwrap(), value);
            prop_assert_eq!(reader.read_u8().unwrap(), tail);
            prop_assert!(reader.is_empty());
        }
    }
}
