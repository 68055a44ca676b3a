//! Wire frame format.
//!
//! Frame layout (4 bytes header + payload):
//!
//! ```text
//! +----------------+-------------+------------------------+
//! | payload_length | sequence_id | payload                |
//! | 3 bytes (LE)   | 1 byte      | payload_length bytes   |
//! +----------------+-------------+------------------------+
//! ```
//!
//! A logical packet whose payload is `MAX_FRAME_PAYLOAD` bytes or longer is
//! split across consecutive frames; a frame shorter than the maximum ends the
//! packet, so an exact multiple is followed by an empty frame.

use crate::error::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the frame header in bytes.
pub const FRAME_HEADER_SIZE: usize = 4;

/// Largest payload a single frame can carry (2^24 - 1).
pub const MAX_FRAME_PAYLOAD: usize = 0xff_ffff;

/// One length-prefixed, sequence-numbered chunk of wire bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence_id: u8,
    pub payload: Bytes,
}

impl Frame {
    pub fn new(sequence_id: u8, payload: Bytes) -> Self {
        Self {
            sequence_id,
            payload,
        }
    }

    /// Returns whether another frame of the same packet follows this one.
    pub fn has_continuation(&self) -> bool {
        self.payload.len() == MAX_FRAME_PAYLOAD
    }

    /// Appends the encoded frame to `buf`.
    pub fn encode(&self, buf: &mut BytesMut) -> Result<(), ProtocolError> {
        if self.payload.len() > MAX_FRAME_PAYLOAD {
            return Err(ProtocolError::PacketTooLarge {
                size: self.payload.len(),
                max: MAX_FRAME_PAYLOAD,
            });
        }
        buf.reserve(FRAME_HEADER_SIZE + self.payload.len());
        buf.put_slice(&(self.payload.len() as u32).to_le_bytes()[..3]);
        buf.put_u8(self.sequence_id);
        buf.put_slice(&self.payload);
        Ok(())
    }

    /// Decodes one frame from the front of `buf`.
    ///
    /// Returns `Ok(None)` when `buf` does not yet hold a complete frame; in
    /// that case nothing is consumed.
    pub fn decode(buf: &mut BytesMut) -> Result<Option<Self>, ProtocolError> {
        if buf.len() < FRAME_HEADER_SIZE {
            return Ok(None);
        }
        let length = u32::from(buf[0]) | (u32::from(buf[1]) << 8) | (u32::from(buf[2]) << 16);
        let length = length as usize;
        let sequence_id = buf[3];

        if buf.len() < FRAME_HEADER_SIZE + length {
            return Ok(None);
        }

        buf.advance(FRAME_HEADER_SIZE);
        let payload = buf.split_to(length).freeze();
        Ok(Some(Self {
            sequence_id,
            payload,
        }))
    }
}

/// Encodes a packet payload into one or more frames starting at
/// `sequence_id`. Returns the sequence id the next frame must use.
pub fn encode_packet(payload: &[u8], sequence_id: u8, buf: &mut BytesMut) -> u8 {
    let mut seq = sequence_id;
    let mut rest = payload;
    loop {
        let chunk_len = rest.len().min(MAX_FRAME_PAYLOAD);
        let (chunk, tail) = rest.split_at(chunk_len);
        buf.reserve(FRAME_HEADER_SIZE + chunk_len);
        buf.put_slice(&(chunk_len as u32).to_le_bytes()[..3]);
        buf.put_u8(seq);
        buf.put_slice(chunk);
        seq = seq.wrapping_add(1);
        rest = tail;
        if chunk_len < MAX_FRAME_PAYLOAD {
            return seq;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_roundtrip() {
        let frame = Frame::new(3, Bytes::from_static(b"\x03SELECT 1"));
        let mut buf = BytesMut::new();
        frame.encode(&mut buf).unwrap();
        assert_eq!(&buf[..4], &[9, 0, 0, 3]);

        let decoded = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(decoded, frame);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_incomplete_header() {
        let mut buf = BytesMut::from(&[0x05, 0x00][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 2);
    }

    #[test]
    fn test_incomplete_payload_is_not_consumed() {
        let mut buf = BytesMut::from(&[0x05, 0x00, 0x00, 0x00, b'a', b'b'][..]);
        assert!(Frame::decode(&mut buf).unwrap().is_none());
        assert_eq!(buf.len(), 6);

        buf.extend_from_slice(b"cde");
        let frame = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), b"abcde");
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut buf = BytesMut::new();
        let next = encode_packet(b"", 7, &mut buf);
        assert_eq!(next, 8);
        assert_eq!(buf.as_ref(), &[0, 0, 0, 7]);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let frame = Frame::new(0, Bytes::from(vec![0u8; MAX_FRAME_PAYLOAD + 1]));
        let mut buf = BytesMut::new();
        assert!(matches!(
            frame.encode(&mut buf),
            Err(ProtocolError::PacketTooLarge { .. })
        ));
    }

    #[test]
    fn test_split_large_payload() {
        let payload = vec![0xabu8; MAX_FRAME_PAYLOAD + 10];
        let mut buf = BytesMut::new();
        let next = encode_packet(&payload, 0, &mut buf);
        assert_eq!(next, 2);

        let first = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(first.sequence_id, 0);
        assert!(first.has_continuation());
        let second = Frame::decode(&mut buf).unwrap().unwrap();
        assert_eq!(second.sequence_id, 1);
        assert_eq!(second.payload.len(), 10);
        assert!(!second.has_continuation());
    }

    #[test]
    fn test_exact_multiple_gets_trailing_empty_frame() {
        let payload = vec![1u8; MAX_FRAME_PAYLOAD];
        let mut buf = BytesMut::new();
        let next = encode_packet(&payload, 255, &mut buf);
        assert_eq!(next, 1);
        assert_eq!(buf.len(), 2 * FRAME_HEADER_SIZE + MAX_FRAME_PAYLOAD);
        assert_eq!(&buf[buf.len() - 4..], &[0, 0, 0, 0]);
    }
}
