//! Per-connection protocol state machine.
//!
//! The machine performs no I/O. The owner feeds it reassembled packets and
//! carries out the returned [`Output`]s in order:
//!
//! ```text
//! Connecting -> Handshaking -> Authenticating -> Idle
//!                                                 |  ^
//!                                       start()   v  | OK / ERR / final EOF
//!                                          CommandInFlight
//!                                                 |
//!                        ResultSetHeaderReceived -> FieldsStreaming -> RowsStreaming
//! ```
//!
//! Every public method finishes updating the phase and sequence counter
//! before it returns its outputs, so whatever a consumer does with those
//! outputs the next command starts from a consistent state.

use crate::auth::{self, caching_sha2, plugins};
use crate::codec::{Encoder, RawPacket};
use crate::command::{auth_data_payload, Command, HandshakeResponse, SslRequest};
use crate::constants::{capabilities, status};
use crate::error::ProtocolError;
use crate::packet::{EofPacket, ErrorPacket, FieldPacket, OkPacket, Packet, RowPacket};
use crate::phase::Phase;
use bytes::BytesMut;

/// Credentials and negotiation settings for the handshake.
#[derive(Debug, Clone, Default)]
pub struct HandshakeOptions {
    pub user: String,
    pub password: String,
    pub database: Option<String>,
    pub charset: u8,
    /// Capability flags requested in addition to the defaults.
    pub extra_flags: u32,
    pub max_packet_size: u32,
    /// Negotiate TLS before sending credentials.
    pub ssl: bool,
}

/// Streamed piece of a command response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultEvent {
    Field { result_index: usize, field: FieldPacket },
    Row { result_index: usize, row: RowPacket },
    /// A statement finished without a result set.
    Ok { result_index: usize, ok: OkPacket },
    /// A result set's row stream ended.
    End { result_index: usize, eof: EofPacket },
}

/// Successful outcome of a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Connected {
        thread_id: u32,
        server_version: String,
    },
    Ok(OkPacket),
    Eof(EofPacket),
}

/// Work the owner must carry out, in order.
#[derive(Debug)]
pub enum Output {
    /// Framed bytes for the transport.
    Write(BytesMut),
    /// Upgrade the transport to TLS, then call [`Protocol::tls_established`].
    StartTls,
    Event(ResultEvent),
    /// The active command finished. Fires exactly once per command.
    Done(Result<Completion, ErrorPacket>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Active {
    Connect,
    Query,
    Simple,
}

/// Protocol state for one connection.
#[derive(Debug)]
pub struct Protocol {
    options: HandshakeOptions,
    phase: Phase,
    /// Sequence id of the next frame, in either direction.
    sequence_id: u8,
    active: Option<Active>,
    result_index: usize,
    thread_id: Option<u32>,
    server_version: String,
    server_capabilities: u32,
    scramble: Vec<u8>,
    server_plugin: Option<String>,
    awaiting_tls: bool,
    secure: bool,
}

impl Protocol {
    pub fn new(options: HandshakeOptions) -> Self {
        Self {
            options,
            phase: Phase::Connecting,
            sequence_id: 0,
            active: None,
            result_index: 0,
            thread_id: None,
            server_version: String::new(),
            server_capabilities: 0,
            scramble: Vec::new(),
            server_plugin: None,
            awaiting_tls: false,
            secure: false,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Server-assigned id, known once the greeting arrived.
    pub fn thread_id(&self) -> Option<u32> {
        self.thread_id
    }

    pub fn server_version(&self) -> &str {
        &self.server_version
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// Flags this client sends in its handshake response.
    pub fn client_flags(&self) -> u32 {
        let mut flags = capabilities::DEFAULT_CLIENT_FLAGS | self.options.extra_flags;
        if self.server_capabilities != 0 {
            flags &= self.server_capabilities | capabilities::CLIENT_CONNECT_WITH_DB;
        }
        flags
    }

    /// Transport connected; the greeting is expected next.
    pub fn start_handshake(&mut self) -> Result<(), ProtocolError> {
        if self.phase != Phase::Connecting {
            return Err(self.invalid_state("connect"));
        }
        self.phase = Phase::Handshaking;
        self.sequence_id = 0;
        self.active = Some(Active::Connect);
        Ok(())
    }

    /// Starts `command`, returning the framed bytes to send.
    ///
    /// Only one command may be active; the connection layer queues the rest.
    pub fn start(&mut self, command: &Command) -> Result<BytesMut, ProtocolError> {
        if self.phase != Phase::Idle {
            return Err(self.invalid_state(command.name()));
        }
        let (bytes, next) = Encoder::encode(&command.to_payload(), 0);
        self.sequence_id = next;
        self.result_index = 0;
        match command {
            Command::Quit => {
                self.phase = Phase::Closing;
                self.active = None;
            }
            Command::Query(_) => {
                self.phase = Phase::CommandInFlight;
                self.active = Some(Active::Query);
            }
            Command::InitDb(_) | Command::Ping => {
                self.phase = Phase::CommandInFlight;
                self.active = Some(Active::Simple);
            }
        }
        Ok(bytes)
    }

    /// The transport finished its TLS upgrade.
    pub fn tls_established(&mut self) -> Result<Vec<Output>, ProtocolError> {
        if !self.awaiting_tls {
            return Err(self.invalid_state("tls"));
        }
        self.awaiting_tls = false;
        self.secure = true;
        let write = self.handshake_response();
        self.phase = Phase::Authenticating;
        Ok(vec![write])
    }

    /// Terminal transition; any active command is abandoned.
    pub fn close(&mut self) {
        self.phase = Phase::Closed;
        self.active = None;
        self.awaiting_tls = false;
    }

    /// Interprets one inbound packet.
    ///
    /// Errors are fatal: the machine is already `Closed` when one is returned.
    pub fn receive(&mut self, packet: RawPacket) -> Result<Vec<Output>, ProtocolError> {
        let result = self.receive_inner(packet);
        if result.is_err() {
            self.close();
        }
        result
    }

    fn receive_inner(&mut self, packet: RawPacket) -> Result<Vec<Output>, ProtocolError> {
        if self.awaiting_tls {
            return Err(ProtocolError::UnexpectedPacket {
                packet: "data",
                phase: "upgrading to TLS",
            });
        }
        if packet.sequence_id != self.sequence_id {
            return Err(ProtocolError::PacketsOutOfOrder {
                expected: self.sequence_id,
                actual: packet.sequence_id,
            });
        }
        self.sequence_id = packet.next_sequence_id();

        let parsed = Packet::parse(&packet.payload, &self.phase)?;
        let mut out = Vec::new();

        match (self.phase, parsed) {
            (Phase::Handshaking, Packet::Handshake(handshake)) => {
                self.thread_id = Some(handshake.thread_id);
                self.server_version = handshake.server_version;
                self.server_capabilities = handshake.server_capabilities;
                self.scramble = handshake.scramble;
                self.server_plugin = handshake.auth_plugin_name;
                if self.options.ssl {
                    if self.server_capabilities & capabilities::CLIENT_SSL == 0 {
                        return Err(ProtocolError::NoSslSupport);
                    }
                    let request = SslRequest {
                        client_flags: self.client_flags(),
                        max_packet_size: self.options.max_packet_size,
                        charset: self.options.charset,
                    };
                    out.push(self.write(&request.to_payload()));
                    out.push(Output::StartTls);
                    self.awaiting_tls = true;
                } else {
                    out.push(self.handshake_response());
                    self.phase = Phase::Authenticating;
                }
            }
            (Phase::Handshaking | Phase::Authenticating, Packet::Error(err)) => {
                self.close();
                out.push(Output::Done(Err(err)));
            }
            (Phase::Authenticating, Packet::Ok(_)) => {
                self.phase = Phase::Idle;
                self.active = None;
                out.push(Output::Done(Ok(Completion::Connected {
                    thread_id: self.thread_id.unwrap_or_default(),
                    server_version: self.server_version.clone(),
                })));
            }
            (Phase::Authenticating, Packet::AuthSwitch(switch)) => {
                let response = auth::scramble_for(
                    &switch.plugin_name,
                    &self.options.password,
                    &switch.plugin_data,
                )
                .ok_or_else(|| ProtocolError::UnsupportedAuthPlugin(switch.plugin_name.clone()))?;
                self.scramble = switch.plugin_data;
                out.push(self.write(&auth_data_payload(&response)));
            }
            (Phase::Authenticating, Packet::AuthMoreData(more)) => match more.data.first() {
                Some(&caching_sha2::FAST_AUTH_SUCCESS) => {}
                Some(&caching_sha2::PERFORM_FULL_AUTH) => {
                    if !self.secure {
                        return Err(ProtocolError::InsecureAuth(
                            plugins::CACHING_SHA2_PASSWORD.to_string(),
                        ));
                    }
                    let mut cleartext = self.options.password.as_bytes().to_vec();
                    cleartext.push(0);
                    out.push(self.write(&auth_data_payload(&cleartext)));
                }
                _ => {
                    return Err(ProtocolError::UnexpectedPacket {
                        packet: "AuthMoreData",
                        phase: self.phase.name(),
                    })
                }
            },
            (Phase::CommandInFlight, Packet::Ok(ok)) => {
                let more = ok.server_status & status::SERVER_MORE_RESULTS_EXISTS != 0;
                self.finish_result(&mut out, more, |result_index| ResultEvent::Ok {
                    result_index,
                    ok: ok.clone(),
                });
                if !more {
                    out.push(Output::Done(Ok(Completion::Ok(ok))));
                }
            }
            (Phase::CommandInFlight, Packet::ResultSetHeader(header)) => {
                self.phase = Phase::ResultSetHeaderReceived {
                    field_count: header.field_count as usize,
                };
            }
            (Phase::ResultSetHeaderReceived { field_count }, Packet::Field(field)) => {
                self.phase = Phase::FieldsStreaming {
                    field_count,
                    remaining: field_count.saturating_sub(1),
                };
                out.push(Output::Event(ResultEvent::Field {
                    result_index: self.result_index,
                    field,
                }));
            }
            (
                Phase::FieldsStreaming {
                    field_count,
                    remaining,
                },
                Packet::Field(field),
            ) if remaining > 0 => {
                self.phase = Phase::FieldsStreaming {
                    field_count,
                    remaining: remaining - 1,
                };
                out.push(Output::Event(ResultEvent::Field {
                    result_index: self.result_index,
                    field,
                }));
            }
            (
                Phase::FieldsStreaming {
                    field_count,
                    remaining: 0,
                },
                Packet::Eof(_),
            ) => {
                self.phase = Phase::RowsStreaming { field_count };
            }
            (Phase::RowsStreaming { .. }, Packet::Row(row)) => {
                out.push(Output::Event(ResultEvent::Row {
                    result_index: self.result_index,
                    row,
                }));
            }
            (Phase::RowsStreaming { .. }, Packet::Eof(eof)) => {
                let more = eof.server_status & status::SERVER_MORE_RESULTS_EXISTS != 0;
                self.finish_result(&mut out, more, |result_index| ResultEvent::End {
                    result_index,
                    eof,
                });
                if !more {
                    out.push(Output::Done(Ok(Completion::Eof(eof))));
                }
            }
            (phase, Packet::Error(err)) if phase.is_busy() => {
                self.phase = Phase::Idle;
                self.active = None;
                out.push(Output::Done(Err(err)));
            }
            (phase, other) => {
                return Err(ProtocolError::UnexpectedPacket {
                    packet: other.kind(),
                    phase: phase.name(),
                });
            }
        }
        Ok(out)
    }

    /// Ends the current result, keeping the command open when more follow.
    fn finish_result(
        &mut self,
        out: &mut Vec<Output>,
        more: bool,
        event: impl FnOnce(usize) -> ResultEvent,
    ) {
        let event = event(self.result_index);
        let is_query = self.active == Some(Active::Query);
        if more && is_query {
            self.phase = Phase::CommandInFlight;
            self.result_index += 1;
        } else {
            self.phase = Phase::Idle;
            self.active = None;
        }
        if is_query {
            out.push(Output::Event(event));
        }
    }

    fn handshake_response(&mut self) -> Output {
        let plugin = match self.server_plugin.as_deref() {
            Some(plugins::CACHING_SHA2_PASSWORD) => plugins::CACHING_SHA2_PASSWORD,
            _ => plugins::MYSQL_NATIVE_PASSWORD,
        };
        let auth_response =
            auth::scramble_for(plugin, &self.options.password, &self.scramble).unwrap_or_default();
        let response = HandshakeResponse {
            client_flags: self.client_flags(),
            max_packet_size: self.options.max_packet_size,
            charset: self.options.charset,
            user: self.options.user.clone(),
            auth_response,
            database: self.options.database.clone(),
            auth_plugin_name: plugin.to_string(),
        };
        self.write(&response.to_payload())
    }

    fn write(&mut self, payload: &[u8]) -> Output {
        let (bytes, next) = Encoder::encode(payload, self.sequence_id);
        self.sequence_id = next;
        Output::Write(bytes)
    }

    fn invalid_state(&self, command: &'static str) -> ProtocolError {
        ProtocolError::InvalidState {
            command,
            phase: self.phase.name(),
        }
    }
}
