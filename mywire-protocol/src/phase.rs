//! Connection phases tracked by the protocol state machine.

/// The protocol state machine's current position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Transport not yet connected.
    Connecting,
    /// Waiting for the server greeting.
    Handshaking,
    /// Credentials sent, waiting for the authentication verdict.
    Authenticating,
    /// Ready for the next command.
    Idle,
    /// A command was sent and its first response packet is pending.
    CommandInFlight,
    /// A result set header announced `field_count` fields; none received yet.
    ResultSetHeaderReceived { field_count: usize },
    /// Field definitions are streaming; `remaining == 0` means the
    /// field-terminating EOF is next.
    FieldsStreaming { field_count: usize, remaining: usize },
    /// Rows are streaming until an EOF packet.
    RowsStreaming { field_count: usize },
    /// COM_QUIT sent (or teardown requested); waiting for the transport to end.
    Closing,
    /// Terminal.
    Closed,
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Phase::Connecting => "connecting",
            Phase::Handshaking => "handshaking",
            Phase::Authenticating => "authenticating",
            Phase::Idle => "idle",
            Phase::CommandInFlight => "awaiting command response",
            Phase::ResultSetHeaderReceived { .. } => "awaiting field definitions",
            Phase::FieldsStreaming { .. } => "streaming fields",
            Phase::RowsStreaming { .. } => "streaming rows",
            Phase::Closing => "closing",
            Phase::Closed => "closed",
        }
    }

    /// Returns whether a command exchange is in progress.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Phase::CommandInFlight
                | Phase::ResultSetHeaderReceived { .. }
                | Phase::FieldsStreaming { .. }
                | Phase::RowsStreaming { .. }
        )
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Phase::Closed)
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
