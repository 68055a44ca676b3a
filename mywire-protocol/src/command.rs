//! Client-to-server packets.
//!
//! ```text
//! HandshakeResponse41:
//! +-------------+-----------------+---------+------------+
//! | caps (4)    | max packet (4)  | cs (1)  | 23 x 0x00  |
//! +-------------+-----------------+---------+------------+
//! | user NUL | lenenc auth response | db NUL | plugin NUL |
//! +----------+----------------------+--------+------------+
//! ```
//!
//! An SSLRequest is the first 32 bytes of the response alone.

use crate::constants::{capabilities, CommandByte};
use crate::writer::PacketWriter;
use bytes::BytesMut;

/// A command sent once the connection is authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Query(String),
    InitDb(String),
    Ping,
    Quit,
}

impl Command {
    pub fn byte(&self) -> CommandByte {
        match self {
            Command::Query(_) => CommandByte::Query,
            Command::InitDb(_) => CommandByte::InitDb,
            Command::Ping => CommandByte::Ping,
            Command::Quit => CommandByte::Quit,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Query(_) => "query",
            Command::InitDb(_) => "init_db",
            Command::Ping => "ping",
            Command::Quit => "quit",
        }
    }

    /// Serializes the command payload.
    pub fn to_payload(&self) -> BytesMut {
        let argument = match self {
            Command::Query(text) | Command::InitDb(text) => text.as_bytes(),
            Command::Ping | Command::Quit => &[],
        };
        let mut writer = PacketWriter::with_capacity(1 + argument.len());
        writer.write_u8(self.byte() as u8);
        writer.write_bytes(argument);
        writer.into_inner()
    }
}

/// Fixed prefix shared by SSLRequest and HandshakeResponse41.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SslRequest {
    pub client_flags: u32,
    pub max_packet_size: u32,
    pub charset: u8,
}

impl SslRequest {
    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_u32(self.client_flags | capabilities::CLIENT_SSL);
        writer.write_u32(self.max_packet_size);
        writer.write_u8(self.charset);
        writer.write_zeros(23);
    }

    pub fn to_payload(&self) -> BytesMut {
        let mut writer = PacketWriter::with_capacity(32);
        self.write_to(&mut writer);
        writer.into_inner()
    }
}

/// Credentials sent in reply to the server greeting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    pub client_flags: u32,
    pub max_packet_size: u32,
    pub charset: u8,
    pub user: String,
    pub auth_response: Vec<u8>,
    pub database: Option<String>,
    pub auth_plugin_name: String,
}

impl HandshakeResponse {
    /// Effective flags: `CLIENT_CONNECT_WITH_DB` only when a database is set.
    pub fn flags(&self) -> u32 {
        match self.database {
            Some(ref db) if !db.is_empty() => self.client_flags | capabilities::CLIENT_CONNECT_WITH_DB,
            _ => self.client_flags & !capabilities::CLIENT_CONNECT_WITH_DB,
        }
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        let flags = self.flags();
        writer.write_u32(flags);
        writer.write_u32(self.max_packet_size);
        writer.write_u8(self.charset);
        writer.write_zeros(23);
        writer.write_null_string(&self.user);
        writer.write_lenenc_bytes(&self.auth_response);
        if flags & capabilities::CLIENT_CONNECT_WITH_DB != 0 {
            writer.write_null_string(self.database.as_deref().unwrap_or_default());
        }
        if flags & capabilities::CLIENT_PLUGIN_AUTH != 0 {
            writer.write_null_string(&self.auth_plugin_name);
        }
    }

    pub fn to_payload(&self) -> BytesMut {
        let mut writer = PacketWriter::with_capacity(64 + self.user.len());
        self.write_to(&mut writer);
        writer.into_inner()
    }
}

/// Raw auth data sent after an auth switch or more-data request.
pub fn auth_data_payload(data: &[u8]) -> BytesMut {
    let mut writer = PacketWriter::with_capacity(data.len());
    writer.write_bytes(data);
    writer.into_inner()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PacketReader;

    #[test]
    fn test_query_payload() {
        let payload = Command::Query("SELECT 1".to_string()).to_payload();
        assert_eq!(&payload[..], b"\x03SELECT 1");
    }

    #[test]
    fn test_ping_and_quit_payload() {
        assert_eq!(&Command::Ping.to_payload()[..], &[0x0e]);
        assert_eq!(&Command::Quit.to_payload()[..], &[0x01]);
        assert_eq!(&Command::InitDb("test".into()).to_payload()[..], b"\x02test");
    }

    #[test]
    fn test_ssl_request_is_32_bytes() {
        let request = SslRequest {
            client_flags: capabilities::DEFAULT_CLIENT_FLAGS,
            max_packet_size: 0,
            charset: 33,
        };
        let payload = request.to_payload();
        assert_eq!(payload.len(), 32);
        let flags = PacketReader::new(&payload).read_u32().unwrap();
        assert_ne!(flags & capabilities::CLIENT_SSL, 0);
    }

    #[test]
    fn test_handshake_response_layout() {
        let response = HandshakeResponse {
            client_flags: capabilities::DEFAULT_CLIENT_FLAGS,
            max_packet_size: 0,
            charset: 33,
            user: "root".to_string(),
            auth_response: vec![1, 2, 3],
            database: Some("test".to_string()),
            auth_plugin_name: "mysql_native_password".to_string(),
        };
        let payload = response.to_payload();
        let mut reader = PacketReader::new(&payload);
        let flags = reader.read_u32().unwrap();
        assert_ne!(flags & capabilities::CLIENT_CONNECT_WITH_DB, 0);
        assert_eq!(reader.read_u32().unwrap(), 0);
        assert_eq!(reader.read_u8().unwrap(), 33);
        reader.skip(23).unwrap();
        assert_eq!(reader.read_null_string().unwrap(), "root");
        assert_eq!(reader.read_lenenc_bytes().unwrap(), &[1, 2, 3]);
        assert_eq!(reader.read_null_string().unwrap(), "test");
        assert_eq!(reader.read_null_string().unwrap(), "mysql_native_password");
        assert!(reader.is_empty());
    }

    #[test]
    fn test_handshake_response_without_database() {
        let response = HandshakeResponse {
            client_flags: capabilities::DEFAULT_CLIENT_FLAGS,
            max_packet_size: 0,
            charset: 33,
            user: String::new(),
            auth_response: Vec::new(),
            database: None,
            auth_plugin_name: "mysql_native_password".to_string(),
        };
        assert_eq!(response.flags() & capabilities::CLIENT_CONNECT_WITH_DB, 0);
        let payload = response.to_payload();
        let mut reader = PacketReader::new(&payload);
        reader.skip(32).unwrap();
        assert_eq!(reader.read_null_string().unwrap(), "");
        assert_eq!(reader.read_lenenc_bytes().unwrap(), &[] as &[u8]);
        assert_eq!(reader.read_null_string().unwrap(), "mysql_native_password");
    }
}
