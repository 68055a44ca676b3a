//! Incremental packet decoder and encoder.
//!
//! The transport delivers bytes in arbitrarily sized chunks. The decoder
//! buffers them, splits frames, and reassembles multi-frame packets.

use crate::error::ProtocolError;
use crate::frame::{encode_packet, Frame};
use crate::DEFAULT_MAX_PACKET_SIZE;
use bytes::{Bytes, BytesMut};

/// A reassembled packet payload together with its framing metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    /// Sequence id of the first frame.
    pub sequence_id: u8,
    /// Number of frames the payload spanned.
    pub frames: u8,
    pub payload: Bytes,
}

impl RawPacket {
    /// Sequence id expected for the frame following this packet.
    pub fn next_sequence_id(&self) -> u8 {
        self.sequence_id.wrapping_add(self.frames)
    }
}

/// Encodes payloads into frames.
pub struct Encoder;

impl Encoder {
    /// Frames `payload` starting at `sequence_id`.
    ///
    /// Returns the encoded bytes and the next sequence id.
    pub fn encode(payload: &[u8], sequence_id: u8) -> (BytesMut, u8) {
        let mut buf = BytesMut::with_capacity(payload.len() + crate::FRAME_HEADER_SIZE);
        let next = encode_packet(payload, sequence_id, &mut buf);
        (buf, next)
    }
}

struct Partial {
    sequence_id: u8,
    frames: u8,
    payload: BytesMut,
}

/// Decodes buffered bytes into packets.
pub struct Decoder {
    buffer: BytesMut,
    partial: Option<Partial>,
    max_packet_size: usize,
}

impl Decoder {
    pub fn new() -> Self {
        Self::with_max_packet_size(DEFAULT_MAX_PACKET_SIZE)
    }

    pub fn with_max_packet_size(max_packet_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8192),
            partial: None,
            max_packet_size,
        }
    }

    /// Appends data to the internal buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Mutable access to the receive buffer, for reading directly into it.
    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buffer
    }

    /// Attempts to decode the next frame without reassembly.
    pub fn decode_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        Frame::decode(&mut self.buffer)
    }

    /// Attempts to decode the next complete packet.
    ///
    /// Returns `Ok(None)` when more bytes are needed. Partially received
    /// multi-frame packets stay buffered across calls.
    pub fn decode_packet(&mut self) -> Result<Option<RawPacket>, ProtocolError> {
        while let Some(frame) = self.decode_frame()? {
            let continues = frame.has_continuation();
            let partial = match self.partial.take() {
                Some(mut partial) => {
                    let expected = partial.sequence_id.wrapping_add(partial.frames);
                    if frame.sequence_id != expected {
                        return Err(ProtocolError::PacketsOutOfOrder {
                            expected,
                            actual: frame.sequence_id,
                        });
                    }
                    partial.frames = partial.frames.wrapping_add(1);
                    partial.payload.extend_from_slice(&frame.payload);
                    partial
                }
                None if !continues => {
                    self.check_size(frame.payload.len())?;
                    return Ok(Some(RawPacket {
                        sequence_id: frame.sequence_id,
                        frames: 1,
                        payload: frame.payload,
                    }));
                }
                None => Partial {
                    sequence_id: frame.sequence_id,
                    frames: 1,
                    payload: BytesMut::from(frame.payload.as_ref()),
                },
            };
            self.check_size(partial.payload.len())?;

            if continues {
                self.partial = Some(partial);
            } else {
                return Ok(Some(RawPacket {
                    sequence_id: partial.sequence_id,
                    frames: partial.frames,
                    payload: partial.payload.freeze(),
                }));
            }
        }
        Ok(None)
    }

    fn check_size(&self, size: usize) -> Result<(), ProtocolError> {
        if size > self.max_packet_size {
            return Err(ProtocolError::PacketTooLarge {
                size,
                max: self.max_packet_size,
            });
        }
        Ok(())
    }

    /// Returns the number of bytes currently buffered.
    pub fn buffered(&self) -> usize {
        self.buffer.len() + self.partial.as_ref().map_or(0, |p| p.payload.len())
    }

    /// Clears buffered bytes and any partially reassembled packet.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.partial = None;
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Self::new()
    }
}
