//! Protocol error types.

use thiserror::Error;

/// Errors raised while framing, parsing, or sequencing packets.
///
/// Every variant is fatal to the connection that produced it: after a
/// protocol error the byte stream cannot be resynchronized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    #[error("truncated {what}: need {needed} bytes, {available} available")]
    Truncated {
        what: &'static str,
        needed: usize,
        available: usize,
    },

    #[error("invalid length-coded prefix: {0:#04x}")]
    InvalidLengthPrefix(u8),

    #[error("packet too large: {size} bytes (max {max})")]
    PacketTooLarge { size: usize, max: usize },

    #[error("packets out of order: expected sequence {expected}, got {actual}")]
    PacketsOutOfOrder { expected: u8, actual: u8 },

    #[error("unexpected {packet} packet while {phase}")]
    UnexpectedPacket {
        packet: &'static str,
        phase: &'static str,
    },

    #[error("empty packet while {phase}")]
    EmptyPacket { phase: &'static str },

    #[error("row has {actual} columns, expected {expected}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("unsupported authentication plugin: {0}")]
    UnsupportedAuthPlugin(String),

    #[error("server does not support secure connection")]
    NoSslSupport,

    #[error("full authentication for {0} requires a secure connection")]
    InsecureAuth(String),

    #[error("LOCAL INFILE requests are not supported")]
    LocalInfileUnsupported,

    #[error("cannot start {command}: connection is {phase}")]
    InvalidState {
        command: &'static str,
        phase: &'static str,
    },
}

impl ProtocolError {
    /// Stable symbolic code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ProtocolError::PacketsOutOfOrder { .. } => "PROTOCOL_PACKETS_OUT_OF_ORDER",
            ProtocolError::PacketTooLarge { .. } => "PROTOCOL_PACKET_TOO_LARGE",
            ProtocolError::UnexpectedPacket { .. } => "PROTOCOL_UNEXPECTED_PACKET",
            ProtocolError::NoSslSupport => "HANDSHAKE_NO_SSL_SUPPORT",
            ProtocolError::UnsupportedAuthPlugin(_) | ProtocolError::InsecureAuth(_) => {
                "HANDSHAKE_UNSUPPORTED_AUTH"
            }
            ProtocolError::InvalidState { .. } => "PROTOCOL_INVALID_STATE",
            _ => "PROTOCOL_PARSER_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = ProtocolError::PacketsOutOfOrder {
            expected: 1,
            actual: 3,
        };
        assert!(err.to_string().contains("expected sequence 1"));
        assert_eq!(err.code(), "PROTOCOL_PACKETS_OUT_OF_ORDER");

        let err = ProtocolError::InvalidLengthPrefix(0xff);
        assert!(err.to_string().contains("0xff"));
        assert_eq!(err.code(), "PROTOCOL_PARSER_ERROR");

        let err = ProtocolError::UnexpectedPacket {
            packet: "Row",
            phase: "idle",
        };
        assert_eq!(err.to_string(), "unexpected Row packet while idle");
    }

    #[test]
    fn test_handshake_codes() {
        assert_eq!(ProtocolError::NoSslSupport.code(), "HANDSHAKE_NO_SSL_SUPPORT");
        assert_eq!(
            ProtocolError::UnsupportedAuthPlugin("dialog".into()).code(),
            "HANDSHAKE_UNSUPPORTED_AUTH"
        );
    }
}
