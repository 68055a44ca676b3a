//! Packet catalog.
//!
//! Server packets are recognized from their first payload byte *and* the
//! current phase: `0x00` is an OK packet after a command but a length prefix
//! inside a row, `0xfe` is EOF only when the payload is shorter than 9 bytes,
//! and the greeting is only recognized as the very first server packet.
//!
//! Every packet can also be written back out, which the test servers and the
//! row round-trip property rely on.

use crate::constants::capabilities;
use crate::error::ProtocolError;
use crate::phase::Phase;
use crate::reader::PacketReader;
use crate::writer::PacketWriter;
use bytes::Bytes;

/// Payloads starting with 0xfe shorter than this are EOF packets.
pub const EOF_MAX_LEN: usize = 9;

const OK_HEADER: u8 = 0x00;
const AUTH_MORE_DATA_HEADER: u8 = 0x01;
const LOCAL_INFILE_HEADER: u8 = 0xfb;
const EOF_HEADER: u8 = 0xfe;
const ERROR_HEADER: u8 = 0xff;

/// Returns whether `payload` is an EOF packet.
pub fn is_eof(payload: &[u8]) -> bool {
    payload.first() == Some(&EOF_HEADER) && payload.len() < EOF_MAX_LEN
}

/// Command completed without a result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OkPacket {
    pub affected_rows: u64,
    pub insert_id: u64,
    pub server_status: u16,
    pub warning_count: u16,
    pub message: String,
}

impl OkPacket {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        reader.skip(1)?;
        let affected_rows = reader.read_lenenc_int()?;
        let insert_id = reader.read_lenenc_int()?;
        let server_status = if reader.remaining() >= 2 { reader.read_u16()? } else { 0 };
        let warning_count = if reader.remaining() >= 2 { reader.read_u16()? } else { 0 };
        let message = reader.read_rest_string();
        Ok(Self {
            affected_rows,
            insert_id,
            server_status,
            warning_count,
            message,
        })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_u8(OK_HEADER);
        writer.write_lenenc_int(self.affected_rows);
        writer.write_lenenc_int(self.insert_id);
        writer.write_u16(self.server_status);
        writer.write_u16(self.warning_count);
        writer.write_bytes(self.message.as_bytes());
    }
}

/// Error reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorPacket {
    pub errno: u16,
    /// Five-character SQL state; absent in pre-4.1 style greetings errors.
    pub sql_state: Option<String>,
    pub message: String,
}

impl ErrorPacket {
    pub fn new(errno: u16, message: impl Into<String>) -> Self {
        Self {
            errno,
            sql_state: None,
            message: message.into(),
        }
    }

    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        reader.skip(1)?;
        let errno = reader.read_u16()?;
        let sql_state = if reader.peek() == Some(b'#') {
            reader.skip(1)?;
            Some(reader.read_string(5)?)
        } else {
            None
        };
        let message = reader.read_rest_string();
        Ok(Self {
            errno,
            sql_state,
            message,
        })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_u8(ERROR_HEADER);
        writer.write_u16(self.errno);
        writer.write_u8(b'#');
        let state = self.sql_state.as_deref().unwrap_or("HY000");
        let mut padded = [b' '; 5];
        for (slot, byte) in padded.iter_mut().zip(state.bytes()) {
            *slot = byte;
        }
        writer.write_bytes(&padded);
        writer.write_bytes(self.message.as_bytes());
    }
}

/// Announces a result set with `field_count` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResultSetHeaderPacket {
    pub field_count: u64,
}

impl ResultSetHeaderPacket {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        let field_count = reader.read_lenenc_int()?;
        Ok(Self { field_count })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_lenenc_int(self.field_count);
    }
}

/// Column definition (protocol 4.1 layout).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPacket {
    pub catalog: String,
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset_nr: u16,
    pub length: u32,
    pub column_type: u8,
    pub flags: u16,
    pub decimals: u8,
}

impl FieldPacket {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        let catalog = reader.read_lenenc_string()?;
        let schema = reader.read_lenenc_string()?;
        let table = reader.read_lenenc_string()?;
        let org_table = reader.read_lenenc_string()?;
        let name = reader.read_lenenc_string()?;
        let org_name = reader.read_lenenc_string()?;
        // Length of the fixed-size block that follows (always 0x0c).
        reader.read_lenenc_int()?;
        let charset_nr = reader.read_u16()?;
        let length = reader.read_u32()?;
        let column_type = reader.read_u8()?;
        let flags = reader.read_u16()?;
        let decimals = reader.read_u8()?;
        Ok(Self {
            catalog,
            schema,
            table,
            org_table,
            name,
            org_name,
            charset_nr,
            length,
            column_type,
            flags,
            decimals,
        })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_lenenc_string(&self.catalog);
        writer.write_lenenc_string(&self.schema);
        writer.write_lenenc_string(&self.table);
        writer.write_lenenc_string(&self.org_table);
        writer.write_lenenc_string(&self.name);
        writer.write_lenenc_string(&self.org_name);
        writer.write_lenenc_int(0x0c);
        writer.write_u16(self.charset_nr);
        writer.write_u32(self.length);
        writer.write_u8(self.column_type);
        writer.write_u16(self.flags);
        writer.write_u8(self.decimals);
        writer.write_zeros(2);
    }
}

/// End of a field list or row stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EofPacket {
    pub warning_count: u16,
    pub server_status: u16,
}

impl EofPacket {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        reader.skip(1)?;
        if reader.remaining() < 4 {
            return Ok(Self::default());
        }
        let warning_count = reader.read_u16()?;
        let server_status = reader.read_u16()?;
        Ok(Self {
            warning_count,
            server_status,
        })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_u8(EOF_HEADER);
        writer.write_u16(self.warning_count);
        writer.write_u16(self.server_status);
    }
}

/// Initial server greeting (protocol version 10).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakePacket {
    pub protocol_version: u8,
    pub server_version: String,
    pub thread_id: u32,
    /// Auth seed (both scramble parts joined, trailing NUL removed).
    pub scramble: Vec<u8>,
    pub server_capabilities: u32,
    pub server_charset: u8,
    pub server_status: u16,
    pub auth_plugin_name: Option<String>,
}

impl HandshakePacket {
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        let protocol_version = reader.read_u8()?;
        if protocol_version != 10 {
            return Err(ProtocolError::UnsupportedVersion(protocol_version));
        }
        let server_version = reader.read_null_string()?;
        let thread_id = reader.read_u32()?;
        let mut scramble = reader.read_bytes(8)?.to_vec();
        reader.skip(1)?;
        let caps_lower = reader.read_u16()?;

        let mut handshake = Self {
            protocol_version,
            server_version,
            thread_id,
            scramble: Vec::new(),
            server_capabilities: u32::from(caps_lower),
            server_charset: 0,
            server_status: 0,
            auth_plugin_name: None,
        };
        if reader.is_empty() {
            handshake.scramble = scramble;
            return Ok(handshake);
        }

        handshake.server_charset = reader.read_u8()?;
        handshake.server_status = reader.read_u16()?;
        let caps_upper = reader.read_u16()?;
        handshake.server_capabilities |= u32::from(caps_upper) << 16;
        let auth_data_len = usize::from(reader.read_u8()?);
        reader.skip(10)?;

        if handshake.server_capabilities & capabilities::CLIENT_SECURE_CONNECTION != 0 {
            let part2_len = auth_data_len.saturating_sub(8).max(13).min(reader.remaining());
            let part2 = reader.read_bytes(part2_len)?;
            let part2 = part2.strip_suffix(&[0]).unwrap_or(part2);
            scramble.extend_from_slice(part2);
        }
        handshake.scramble = scramble;

        if handshake.server_capabilities & capabilities::CLIENT_PLUGIN_AUTH != 0
            && !reader.is_empty()
        {
            handshake.auth_plugin_name = Some(reader.read_null_string()?);
        }
        Ok(handshake)
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_u8(self.protocol_version);
        writer.write_null_string(&self.server_version);
        writer.write_u32(self.thread_id);
        let (part1, part2) = self.scramble.split_at(self.scramble.len().min(8));
        writer.write_bytes(part1);
        writer.write_zeros(8 - part1.len());
        writer.write_u8(0);
        writer.write_u16(self.server_capabilities as u16);
        writer.write_u8(self.server_charset);
        writer.write_u16(self.server_status);
        writer.write_u16((self.server_capabilities >> 16) as u16);
        let plugin_auth = self.server_capabilities & capabilities::CLIENT_PLUGIN_AUTH != 0;
        writer.write_u8(if plugin_auth { (self.scramble.len() + 1) as u8 } else { 0 });
        writer.write_zeros(10);
        if self.server_capabilities & capabilities::CLIENT_SECURE_CONNECTION != 0 {
            writer.write_bytes(part2);
            writer.write_zeros(13usize.saturating_sub(part2.len()).max(1));
        }
        if plugin_auth {
            writer.write_null_string(self.auth_plugin_name.as_deref().unwrap_or_default());
        }
    }
}

/// One row of a text result set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowPacket {
    /// Column values in field order; `None` is SQL NULL.
    pub values: Vec<Option<Bytes>>,
}

impl RowPacket {
    pub fn new(values: Vec<Option<Bytes>>) -> Self {
        Self { values }
    }

    pub fn parse(payload: &Bytes, field_count: usize) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        let mut values = Vec::with_capacity(field_count);
        while !reader.is_empty() {
            let value = reader.read_lenenc_bytes_or_null()?;
            let end = reader.position();
            values.push(value.map(|v| payload.slice(end - v.len()..end)));
        }
        if values.len() != field_count {
            return Err(ProtocolError::ColumnCountMismatch {
                expected: field_count,
                actual: values.len(),
            });
        }
        Ok(Self { values })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        for value in &self.values {
            writer.write_lenenc_bytes_or_null(value.as_deref());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Returns column `index` decoded as UTF-8, or `None` for NULL / out of range.
    pub fn get_str(&self, index: usize) -> Option<std::borrow::Cow<'_, str>> {
        self.values
            .get(index)?
            .as_ref()
            .map(|v| String::from_utf8_lossy(v))
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }
}

/// Server asks the client to re-authenticate with another plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthSwitchRequest {
    pub plugin_name: String,
    pub plugin_data: Vec<u8>,
}

impl AuthSwitchRequest {
    /// Plugin implied by a bare 0xfe switch request from old servers.
    pub const OLD_PASSWORD_PLUGIN: &'static str = "mysql_old_password";

    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = PacketReader::new(payload);
        reader.skip(1)?;
        if reader.is_empty() {
            return Ok(Self {
                plugin_name: Self::OLD_PASSWORD_PLUGIN.to_string(),
                plugin_data: Vec::new(),
            });
        }
        let plugin_name = reader.read_null_string()?;
        let data = reader.read_rest();
        let data = data.strip_suffix(&[0]).unwrap_or(data);
        Ok(Self {
            plugin_name,
            plugin_data: data.to_vec(),
        })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_u8(EOF_HEADER);
        writer.write_null_string(&self.plugin_name);
        writer.write_bytes(&self.plugin_data);
        writer.write_u8(0);
    }
}

/// Extra authentication round-trip data (`caching_sha2_password`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthMoreData {
    pub data: Bytes,
}

impl AuthMoreData {
    pub fn parse(payload: &Bytes) -> Result<Self, ProtocolError> {
        if payload.is_empty() {
            return Err(ProtocolError::EmptyPacket {
                phase: Phase::Authenticating.name(),
            });
        }
        Ok(Self {
            data: payload.slice(1..),
        })
    }

    pub fn write_to(&self, writer: &mut PacketWriter) {
        writer.write_u8(AUTH_MORE_DATA_HEADER);
        writer.write_bytes(&self.data);
    }
}

/// A fully decoded server packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    Handshake(HandshakePacket),
    Ok(OkPacket),
    Error(ErrorPacket),
    ResultSetHeader(ResultSetHeaderPacket),
    Field(FieldPacket),
    Eof(EofPacket),
    Row(RowPacket),
    AuthSwitch(AuthSwitchRequest),
    AuthMoreData(AuthMoreData),
}

impl Packet {
    /// Classifies and parses `payload` according to `phase`.
    pub fn parse(payload: &Bytes, phase: &Phase) -> Result<Self, ProtocolError> {
        let first = *payload.first().ok_or(ProtocolError::EmptyPacket {
            phase: phase.name(),
        })?;

        let unexpected = |packet: &'static str| ProtocolError::UnexpectedPacket {
            packet,
            phase: phase.name(),
        };

        match *phase {
            Phase::Handshaking => match first {
                ERROR_HEADER => ErrorPacket::parse(payload).map(Packet::Error),
                _ => HandshakePacket::parse(payload).map(Packet::Handshake),
            },
            Phase::Authenticating => match first {
                OK_HEADER => OkPacket::parse(payload).map(Packet::Ok),
                ERROR_HEADER => ErrorPacket::parse(payload).map(Packet::Error),
                EOF_HEADER => AuthSwitchRequest::parse(payload).map(Packet::AuthSwitch),
                AUTH_MORE_DATA_HEADER => AuthMoreData::parse(payload).map(Packet::AuthMoreData),
                _ => Err(unexpected("unknown")),
            },
            Phase::CommandInFlight => match first {
                OK_HEADER => OkPacket::parse(payload).map(Packet::Ok),
                ERROR_HEADER => ErrorPacket::parse(payload).map(Packet::Error),
                LOCAL_INFILE_HEADER => Err(ProtocolError::LocalInfileUnsupported),
                _ => ResultSetHeaderPacket::parse(payload).map(Packet::ResultSetHeader),
            },
            Phase::ResultSetHeaderReceived { .. } | Phase::FieldsStreaming { .. } => {
                let awaiting_eof = matches!(phase, Phase::FieldsStreaming { remaining: 0, .. });
                if first == ERROR_HEADER {
                    ErrorPacket::parse(payload).map(Packet::Error)
                } else if awaiting_eof {
                    if is_eof(payload) {
                        EofPacket::parse(payload).map(Packet::Eof)
                    } else {
                        Err(unexpected("Field"))
                    }
                } else {
                    FieldPacket::parse(payload).map(Packet::Field)
                }
            }
            Phase::RowsStreaming { field_count } => {
                if is_eof(payload) {
                    EofPacket::parse(payload).map(Packet::Eof)
                } else if first == ERROR_HEADER {
                    ErrorPacket::parse(payload).map(Packet::Error)
                } else {
                    RowPacket::parse(payload, field_count).map(Packet::Row)
                }
            }
            Phase::Connecting | Phase::Idle | Phase::Closing | Phase::Closed => {
                Err(unexpected(Self::guess_kind(payload)))
            }
        }
    }

    /// Best-effort kind name for packets arriving when none is expected.
    fn guess_kind(payload: &[u8]) -> &'static str {
        match payload.first() {
            Some(&OK_HEADER) => "OK",
            Some(&ERROR_HEADER) => "Error",
            Some(&EOF_HEADER) if payload.len() < EOF_MAX_LEN => "EOF",
            _ => "data",
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Handshake(_) => "Handshake",
            Packet::Ok(_) => "OK",
            Packet::Error(_) => "Error",
            Packet::ResultSetHeader(_) => "ResultSetHeader",
            Packet::Field(_) => "Field",
            Packet::Eof(_) => "EOF",
            Packet::Row(_) => "Row",
            Packet::AuthSwitch(_) => "AuthSwitch",
            Packet::AuthMoreData(_) => "AuthMoreData",
        }
    }

    /// Serializes the packet payload (without framing).
    pub fn to_payload(&self) -> Bytes {
        let mut writer = PacketWriter::with_capacity(64);
        match self {
            Packet::Handshake(p) => p.write_to(&mut writer),
            Packet::Ok(p) => p.write_to(&mut writer),
            Packet::Error(p) => p.write_to(&mut writer),
            Packet::ResultSetHeader(p) => p.write_to(&mut writer),
            Packet::Field(p) => p.write_to(&mut writer),
            Packet::Eof(p) => p.write_to(&mut writer),
            Packet::Row(p) => p.write_to(&mut writer),
            Packet::AuthSwitch(p) => p.write_to(&mut writer),
            Packet::AuthMoreData(p) => p.write_to(&mut writer),
        }
        writer.into_inner().freeze()
    }
}
