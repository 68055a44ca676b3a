//! Client error types.

use mywire_protocol::error_code::{self, UNKNOWN_CODE};
use mywire_protocol::{ErrorPacket, ProtocolError};
use std::io;
use thiserror::Error;

/// Invalid connection or pool configuration. Raised before any network I/O.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown charset '{0}'")]
    UnknownCharset(String),

    #[error("Unknown SSL profile '{0}'")]
    UnknownSslProfile(String),

    #[error("invalid connection URL: {0}")]
    InvalidUrl(String),

    #[error("invalid value '{value}' for option '{name}'")]
    InvalidOption { name: String, value: String },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::UnknownCharset(_) => "CONFIG_UNKNOWN_CHARSET",
            ConfigError::UnknownSslProfile(_) => "CONFIG_UNKNOWN_SSL_PROFILE",
            ConfigError::InvalidUrl(_) => "CONFIG_INVALID_URL",
            ConfigError::InvalidOption { .. } => "CONFIG_INVALID_OPTION",
        }
    }
}

/// Which deadline expired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Connect,
    Acquire,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::Connect => f.write_str("connect"),
            TimeoutKind::Acquire => f.write_str("pool acquire"),
        }
    }
}

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{code}: {message}")]
    Server {
        errno: u16,
        code: &'static str,
        sql_state: Option<String>,
        message: String,
    },

    #[error("{0} timeout")]
    Timeout(TimeoutKind),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("connection lost: the server closed the connection")]
    ConnectionLost,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("connection already established")]
    AlreadyConnected,

    #[error("pool is closed")]
    PoolClosed,

    #[error("pool queue limit reached")]
    PoolQueueLimit,

    #[error("no connections available")]
    NoConnectionsAvailable,

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ClientError {
    /// Builds a server error, resolving its symbolic code.
    pub fn server(packet: ErrorPacket) -> Self {
        ClientError::Server {
            errno: packet.errno,
            code: error_code::name_of(packet.errno).unwrap_or(UNKNOWN_CODE),
            sql_state: packet.sql_state,
            message: packet.message,
        }
    }

    /// Stable symbolic code.
    pub fn code(&self) -> &'static str {
        match self {
            ClientError::Config(e) => e.code(),
            ClientError::Protocol(e) => e.code(),
            ClientError::Server { code, .. } => code,
            ClientError::Timeout(TimeoutKind::Connect) => "ETIMEDOUT",
            ClientError::Timeout(TimeoutKind::Acquire) => "POOL_ACQUIRE_TIMEOUT",
            ClientError::Io(e) => match e.kind() {
                io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
                io::ErrorKind::ConnectionReset => "ECONNRESET",
                io::ErrorKind::TimedOut => "ETIMEDOUT",
                io::ErrorKind::BrokenPipe => "EPIPE",
                _ => "EIO",
            },
            ClientError::ConnectionLost => "PROTOCOL_CONNECTION_LOST",
            ClientError::ConnectionClosed => "PROTOCOL_ENQUEUE_AFTER_QUIT",
            ClientError::AlreadyConnected => "PROTOCOL_ENQUEUE_HANDSHAKE_TWICE",
            ClientError::PoolClosed => "POOL_CLOSED",
            ClientError::PoolQueueLimit => "POOL_ENQUEUE_LIMIT",
            ClientError::NoConnectionsAvailable => "POOL_NO_CONNECTIONS",
            ClientError::TlsConfig(_) => "TLS_CONFIG_ERROR",
            ClientError::TlsHandshake(_) => "HANDSHAKE_SSL_ERROR",
        }
    }

    /// Server error number, when the server reported one.
    pub fn errno(&self) -> Option<u16> {
        match self {
            ClientError::Server { errno, .. } => Some(*errno),
            _ => None,
        }
    }

    /// Returns whether the error closed the connection it happened on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Protocol(_)
                | ClientError::Io(_)
                | ClientError::ConnectionLost
                | ClientError::TlsHandshake(_)
                | ClientError::Timeout(TimeoutKind::Connect)
        )
    }

    /// Copies the error for delivery to several waiters.
    ///
    /// `io::Error` is not `Clone`; it is re-created from its kind and message.
    pub(crate) fn duplicate(&self) -> Self {
        match self {
            ClientError::Config(e) => ClientError::Config(e.clone()),
            ClientError::Protocol(e) => ClientError::Protocol(e.clone()),
            ClientError::Server {
                errno,
                code,
                sql_state,
                message,
            } => ClientError::Server {
                errno: *errno,
                code,
                sql_state: sql_state.clone(),
                message: message.clone(),
            },
            ClientError::Timeout(kind) => ClientError::Timeout(*kind),
            ClientError::Io(e) => ClientError::Io(io::Error::new(e.kind(), e.to_string())),
            ClientError::ConnectionLost => ClientError::ConnectionLost,
            ClientError::ConnectionClosed => ClientError::ConnectionClosed,
            ClientError::AlreadyConnected => ClientError::AlreadyConnected,
            ClientError::PoolClosed => ClientError::PoolClosed,
            ClientError::PoolQueueLimit => ClientError::PoolQueueLimit,
            ClientError::NoConnectionsAvailable => ClientError::NoConnectionsAvailable,
            ClientError::TlsConfig(m) => ClientError::TlsConfig(m.clone()),
            ClientError::TlsHandshake(m) => ClientError::TlsHandshake(m.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_error_code_mapping() {
        let err = ClientError::server(ErrorPacket {
            errno: 1064,
            sql_state: Some("42000".to_string()),
            message: "You have an error in your SQL syntax".to_string(),
        });
        assert_eq!(err.code(), "ER_PARSE_ERROR");
        assert_eq!(err.errno(), Some(1064));
        assert!(!err.is_fatal());
        assert!(err.to_string().starts_with("ER_PARSE_ERROR"));
    }

    #[test]
    fn test_unknown_server_code_keeps_errno() {
        let err = ClientError::server(ErrorPacket::new(9999, "mystery"));
        assert_eq!(err.code(), UNKNOWN_CODE);
        assert_eq!(err.errno(), Some(9999));
    }

    #[test]
    fn test_fatal_errors() {
        assert!(ClientError::ConnectionLost.is_fatal());
        assert!(ClientError::Protocol(ProtocolError::NoSslSupport).is_fatal());
        assert!(!ClientError::Timeout(TimeoutKind::Acquire).is_fatal());
        assert!(!ClientError::ConnectionClosed.is_fatal());
    }

    #[test]
    fn test_config_error_messages() {
        let err = ClientError::from(ConfigError::UnknownCharset("INVALID_CHARSET".into()));
        assert_eq!(err.to_string(), "Unknown charset 'INVALID_CHARSET'");
        let err = ClientError::from(ConfigError::UnknownSslProfile("nope".into()));
        assert_eq!(err.to_string(), "Unknown SSL profile 'nope'");
        assert_eq!(err.code(), "CONFIG_UNKNOWN_SSL_PROFILE");
    }

    #[test]
    fn test_duplicate_preserves_code() {
        let err = ClientError::Io(io::Error::from(io::ErrorKind::ConnectionReset));
        assert_eq!(err.duplicate().code(), "ECONNRESET");
        assert_eq!(ClientError::PoolClosed.duplicate().code(), "POOL_CLOSED");
        let err = ClientError::Protocol(ProtocolError::PacketsOutOfOrder {
            expected: 1,
            actual: 2,
        });
        assert_eq!(err.duplicate().code(), "PROTOCOL_PACKETS_OUT_OF_ORDER");
    }
}
