//! Scripted MySQL server for tests.
//!
//! Greets with an incrementing thread id, accepts any credentials and
//! answers a fixed set of statements:
//!
//! | statement            | reply                                      |
//! |----------------------|--------------------------------------------|
//! | `SELECT 1`           | one column `1`, one row `1`                |
//! | `SELECT 1; SELECT 2` | two result sets                            |
//! | `INVALID SQL`        | `ER_PARSE_ERROR`                           |
//! | `USE test`, `DO 1`   | OK                                         |
//! | `SELECT CRASH`       | closes the socket without replying         |
//! | anything else        | `ER_QUERY_INTERRUPTED`                     |

use crate::config::ConnectionConfig;
use bytes::Bytes;
use mywire_protocol::constants::{capabilities, column_type, status};
use mywire_protocol::error_code::{ER_PARSE_ERROR, ER_QUERY_INTERRUPTED};
use mywire_protocol::{
    Decoder, Encoder, EofPacket, ErrorPacket, FieldPacket, HandshakePacket, OkPacket,
    PacketWriter, RawPacket, ResultSetHeaderPacket, RowPacket,
};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinHandle;

struct ServerState {
    silent: bool,
    next_thread_id: AtomicU32,
    accepted: AtomicUsize,
    ignored_pings: AtomicUsize,
    kill: Notify,
}

pub(crate) struct TestServer {
    addr: SocketAddr,
    state: Arc<ServerState>,
    task: JoinHandle<()>,
}

impl TestServer {
    pub(crate) async fn start() -> Self {
        Self::spawn(false).await
    }

    /// Accepts connections but never sends a greeting.
    pub(crate) async fn silent() -> Self {
        Self::spawn(true).await
    }

    async fn spawn(silent: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(ServerState {
            silent,
            next_thread_id: AtomicU32::new(1),
            accepted: AtomicUsize::new(0),
            ignored_pings: AtomicUsize::new(0),
            kill: Notify::new(),
        });

        let accept_state = state.clone();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                accept_state.accepted.fetch_add(1, Ordering::SeqCst);
                let state = accept_state.clone();
                tokio::spawn(async move {
                    let _ = serve(socket, state).await;
                });
            }
        });

        Self { addr, state, task }
    }

    pub(crate) fn config(&self) -> ConnectionConfig {
        ConnectionConfig::default()
            .with_host("127.0.0.1")
            .with_port(self.addr.port())
            .with_credentials("root", "secret")
    }

    pub(crate) fn accepted(&self) -> usize {
        self.state.accepted.load(Ordering::SeqCst)
    }

    /// The next ping received is left unanswered.
    pub(crate) fn ignore_next_ping(&self) {
        self.state.ignored_pings.fetch_add(1, Ordering::SeqCst);
    }

    /// Closes every established session.
    pub(crate) fn kill_connections(&self) {
        self.state.kill.notify_waiters();
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(mut socket: TcpStream, state: Arc<ServerState>) -> io::Result<()> {
    if state.silent {
        let mut sink = [0u8; 256];
        while socket.read(&mut sink).await? > 0 {}
        return Ok(());
    }

    let thread_id = state.next_thread_id.fetch_add(1, Ordering::SeqCst);
    let handshake = HandshakePacket {
        protocol_version: 10,
        server_version: "8.0.36-test".to_string(),
        thread_id,
        scramble: (1..=20).collect(),
        server_capabilities: capabilities::DEFAULT_CLIENT_FLAGS
            | capabilities::CLIENT_MULTI_STATEMENTS,
        server_charset: 33,
        server_status: status::SERVER_STATUS_AUTOCOMMIT,
        auth_plugin_name: Some("mysql_native_password".to_string()),
    };
    let mut writer = PacketWriter::new();
    handshake.write_to(&mut writer);
    send(&mut socket, 0, writer).await?;

    let mut decoder = Decoder::new();
    let Some(response) = read_packet(&mut socket, &mut decoder).await? else {
        return Ok(());
    };
    send(&mut socket, response.next_sequence_id(), ok()).await?;

    loop {
        let packet = tokio::select! {
            _ = state.kill.notified() => return Ok(()),
            packet = read_packet(&mut socket, &mut decoder) => packet?,
        };
        let Some(packet) = packet else {
            return Ok(());
        };
        let Some((&command, argument)) = packet.payload.split_first() else {
            continue;
        };
        match command {
            0x01 => return Ok(()),
            0x0e => {
                let ignored = state
                    .ignored_pings
                    .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                    .is_ok();
                if !ignored {
                    send(&mut socket, 1, ok()).await?;
                }
            }
            0x02 => {
                send(&mut socket, 1, ok()).await?;
            }
            0x03 => {
                let sql = String::from_utf8_lossy(argument).into_owned();
                if sql == "SELECT CRASH" {
                    return Ok(());
                }
                answer(&mut socket, &sql).await?;
            }
            _ => {
                send(&mut socket, 1, error(ER_QUERY_INTERRUPTED, "Unknown command")).await?;
            }
        }
    }
}

async fn answer(socket: &mut TcpStream, sql: &str) -> io::Result<()> {
    match sql {
        "SELECT 1" => {
            result_set(socket, 1, "1", "1", 0).await?;
        }
        "SELECT 1; SELECT 2" => {
            let seq = result_set(socket, 1, "1", "1", status::SERVER_MORE_RESULTS_EXISTS).await?;
            result_set(socket, seq, "2", "2", 0).await?;
        }
        "INVALID SQL" => {
            send(socket, 1, error(ER_PARSE_ERROR, "Parse error")).await?;
        }
        "USE test" | "DO 1" => {
            send(socket, 1, ok()).await?;
        }
        _ => {
            send(socket, 1, error(ER_QUERY_INTERRUPTED, "Query execution was interrupted"))
                .await?;
        }
    }
    Ok(())
}

/// Writes one single-column result set; returns the next sequence id.
async fn result_set(
    socket: &mut TcpStream,
    mut seq: u8,
    name: &str,
    value: &'static str,
    server_status: u16,
) -> io::Result<u8> {
    let mut writer = PacketWriter::new();
    ResultSetHeaderPacket { field_count: 1 }.write_to(&mut writer);
    seq = send(socket, seq, writer).await?;

    let field = FieldPacket {
        catalog: "def".to_string(),
        name: name.to_string(),
        charset_nr: 63,
        length: 1,
        column_type: column_type::LONGLONG,
        ..Default::default()
    };
    let mut writer = PacketWriter::new();
    field.write_to(&mut writer);
    seq = send(socket, seq, writer).await?;
    seq = send(socket, seq, eof(status::SERVER_STATUS_AUTOCOMMIT)).await?;

    let mut writer = PacketWriter::new();
    RowPacket::new(vec![Some(Bytes::from_static(value.as_bytes()))]).write_to(&mut writer);
    seq = send(socket, seq, writer).await?;
    send(socket, seq, eof(status::SERVER_STATUS_AUTOCOMMIT | server_status)).await
}

fn ok() -> PacketWriter {
    let mut writer = PacketWriter::new();
    OkPacket {
        server_status: status::SERVER_STATUS_AUTOCOMMIT,
        ..Default::default()
    }
    .write_to(&mut writer);
    writer
}

fn eof(server_status: u16) -> PacketWriter {
    let mut writer = PacketWriter::new();
    EofPacket {
        warning_count: 0,
        server_status,
    }
    .write_to(&mut writer);
    writer
}

fn error(errno: u16, message: &str) -> PacketWriter {
    let mut writer = PacketWriter::new();
    ErrorPacket::new(errno, message).write_to(&mut writer);
    writer
}

async fn send(socket: &mut TcpStream, seq: u8, payload: PacketWriter) -> io::Result<u8> {
    let (bytes, next) = Encoder::encode(payload.as_bytes(), seq);
    socket.write_all(&bytes).await?;
    Ok(next)
}

async fn read_packet(socket: &mut TcpStream, decoder: &mut Decoder) -> io::Result<Option<RawPacket>> {
    loop {
        if let Some(packet) = decoder.decode_packet().map_err(io::Error::other)? {
            return Ok(Some(packet));
        }
        if socket.read_buf(decoder.buffer_mut()).await? == 0 {
            return Ok(None);
        }
    }
}
