//! # mywire-protocol
//!
//! Sans-IO implementation of the MySQL client/server wire protocol.
//!
//! This crate provides:
//! - Frame splitting and reassembly with sequence ids
//! - Length-coded integer and string primitives
//! - The server packet catalog with phase-aware dispatch
//! - Client command serialization and authentication scrambles
//! - A per-connection protocol state machine
//! - Charset and server error-code lookup tables

pub mod auth;
pub mod charset;
pub mod codec;
pub mod command;
pub mod constants;
pub mod error;
pub mod error_code;
pub mod frame;
pub mod machine;
pub mod packet;
pub mod phase;
pub mod reader;
pub mod writer;

pub use codec::{Decoder, Encoder, RawPacket};
pub use command::{Command, HandshakeResponse, SslRequest};
pub use error::ProtocolError;
pub use frame::{Frame, FRAME_HEADER_SIZE, MAX_FRAME_PAYLOAD};
pub use machine::{Completion, HandshakeOptions, Output, Protocol, ResultEvent};
pub use packet::{
    EofPacket, ErrorPacket, FieldPacket, HandshakePacket, OkPacket, Packet, ResultSetHeaderPacket,
    RowPacket,
};
pub use phase::Phase;
pub use reader::PacketReader;
pub use writer::PacketWriter;

/// Default server port.
pub const DEFAULT_PORT: u16 = 3306;

/// Default cap on a reassembled inbound packet (64 MiB).
pub const DEFAULT_MAX_PACKET_SIZE: usize = 64 * 1024 * 1024;
