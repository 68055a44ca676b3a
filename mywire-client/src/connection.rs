//! Connection handle and its driver task.
//!
//! A [`Connection`] queues commands; a background driver task owns the
//! socket and the protocol state machine and runs the queue strictly in
//! order, one command at a time:
//!
//! ```text
//!  query() / ping() / end()          driver task
//!  ------------------------   mpsc   ---------------------------------
//!  enqueue (sync, FIFO)  ---------->  start -> write -> read/decode
//!                                     -> Protocol::receive (commit)
//!                                     -> publish events, reply
//! ```
//!
//! The driver is spawned by the first queued command. A command queued
//! before `connect()` connects implicitly.

use crate::config::ConnectionConfig;
use crate::error::{ClientError, TimeoutKind};
use crate::query::{Pending, Query, QuerySink};
use crate::stream::ClientStream;
use bytes::BytesMut;
use mywire_protocol::{
    Command, Completion, Decoder, ErrorPacket, Output, Phase, Protocol, RawPacket,
};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Notify};

/// Identity reported by the server during the handshake.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerInfo {
    pub thread_id: u32,
    pub server_version: String,
}

type Outcome = Result<Completion, ClientError>;

enum Job {
    Connect,
    Command(Command),
}

struct Request {
    job: Job,
    sink: Option<QuerySink>,
    reply: Box<dyn FnOnce(Outcome) + Send>,
}

impl Request {
    fn new<T: Send + 'static>(
        job: Job,
        sink: Option<QuerySink>,
        map: fn(Completion) -> T,
    ) -> (Self, Pending<T>) {
        let (tx, pending) = Pending::channel();
        let reply = Box::new(move |outcome: Outcome| {
            let _ = tx.send(outcome.map(map));
        });
        (Self { job, sink, reply }, pending)
    }

    fn fail(self, error: ClientError) {
        (self.reply)(Err(error));
    }
}

fn server_info(completion: Completion) -> ServerInfo {
    match completion {
        Completion::Connected {
            thread_id,
            server_version,
        } => ServerInfo {
            thread_id,
            server_version,
        },
        _ => ServerInfo::default(),
    }
}

fn unit(_: Completion) {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Accepting {
    Open,
    /// `end()` was queued; nothing may follow it.
    Ending,
    Closed,
}

/// Handle-side queue state. Dropping the last handle drops `tx`.
struct Queue {
    tx: mpsc::UnboundedSender<Request>,
    rx: Option<mpsc::UnboundedReceiver<Request>>,
    started: bool,
}

struct Status {
    phase: Phase,
    thread_id: Option<u32>,
    server_version: String,
}

/// State shared between handles and the driver.
///
/// Lock order: `Inner::queue` before `accepting`.
struct Shared {
    config: ConnectionConfig,
    accepting: Mutex<Accepting>,
    status: Mutex<Status>,
    destroy: Notify,
    closed: watch::Sender<bool>,
}

impl Shared {
    fn mark_closed(&self) {
        self.status.lock().phase = Phase::Closed;
        self.closed.send_replace(true);
    }
}

struct Inner {
    shared: Arc<Shared>,
    queue: Mutex<Queue>,
}

/// A connection to a MySQL server.
///
/// Cloning yields another handle to the same connection. The driver task
/// stops once every handle is dropped.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<Inner>,
}

impl Connection {
    /// Creates a connection; no I/O happens until a command is queued.
    pub fn new(config: ConnectionConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (closed, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                shared: Arc::new(Shared {
                    config,
                    accepting: Mutex::new(Accepting::Open),
                    status: Mutex::new(Status {
                        phase: Phase::Connecting,
                        thread_id: None,
                        server_version: String::new(),
                    }),
                    destroy: Notify::new(),
                    closed,
                }),
                queue: Mutex::new(Queue {
                    tx,
                    rx: Some(rx),
                    started: false,
                }),
            }),
        }
    }

    /// Creates a connection and waits for its handshake.
    pub async fn open(config: ConnectionConfig) -> Result<Self, ClientError> {
        let connection = Self::new(config);
        connection.connect().await?;
        Ok(connection)
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.inner.shared.config
    }

    /// Opens the transport and performs the handshake.
    pub fn connect(&self) -> Pending<ServerInfo> {
        let (request, pending) = Request::new(Job::Connect, None, server_info);
        self.enqueue(request);
        pending
    }

    /// Queues `sql`; the returned handle streams its events.
    pub fn query(&self, sql: impl Into<String>) -> Query {
        let sql: String = sql.into();
        let text: Arc<str> = Arc::from(sql.as_str());
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (request, done) = Request::new(
            Job::Command(Command::Query(sql)),
            Some(QuerySink::new(events_tx)),
            unit,
        );
        self.enqueue(request);
        Query::new(text, events_rx, done)
    }

    pub fn ping(&self) -> Pending<()> {
        let (request, pending) = Request::new(Job::Command(Command::Ping), None, unit);
        self.enqueue(request);
        pending
    }

    /// Switches the default database.
    pub fn change_database(&self, database: impl Into<String>) -> Pending<()> {
        let (request, pending) =
            Request::new(Job::Command(Command::InitDb(database.into())), None, unit);
        self.enqueue(request);
        pending
    }

    /// Sends COM_QUIT after the queued commands and closes the transport.
    ///
    /// Commands queued afterwards fail with [`ClientError::ConnectionClosed`].
    pub fn end(&self) -> Pending<()> {
        let (request, pending) = Request::new(Job::Command(Command::Quit), None, unit);
        let queue = self.inner.queue.lock();
        let mut accepting = self.inner.shared.accepting.lock();
        if *accepting != Accepting::Open {
            drop(accepting);
            drop(queue);
            request.fail(ClientError::ConnectionClosed);
            return pending;
        }
        if !queue.started {
            // Never connected: nothing to tear down.
            *accepting = Accepting::Closed;
            drop(accepting);
            drop(queue);
            self.inner.shared.mark_closed();
            (request.reply)(Ok(Completion::Ok(Default::default())));
            return pending;
        }
        *accepting = Accepting::Ending;
        if let Err(mpsc::error::SendError(request)) = queue.tx.send(request) {
            request.fail(ClientError::ConnectionClosed);
        }
        pending
    }

    /// Closes the transport now. Queued and in-flight commands fail with
    /// [`ClientError::ConnectionClosed`].
    pub fn destroy(&self) {
        let queue = self.inner.queue.lock();
        *self.inner.shared.accepting.lock() = Accepting::Closed;
        if queue.started {
            self.inner.shared.destroy.notify_one();
        } else {
            self.inner.shared.mark_closed();
        }
    }

    /// Server-assigned id, known after the greeting.
    pub fn thread_id(&self) -> Option<u32> {
        self.inner.shared.status.lock().thread_id
    }

    pub fn server_version(&self) -> String {
        self.inner.shared.status.lock().server_version.clone()
    }

    /// Current protocol phase.
    pub fn state(&self) -> Phase {
        self.inner.shared.status.lock().phase
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.shared.closed.borrow()
    }

    /// False once `end()`, `destroy()` or a fatal error has been seen.
    pub fn is_accepting(&self) -> bool {
        *self.inner.shared.accepting.lock() == Accepting::Open
    }

    /// Resolves once the connection has reached `Closed`.
    pub async fn closed(&self) {
        let mut rx = self.inner.shared.closed.subscribe();
        let _ = rx.wait_for(|closed| *closed).await;
    }

    fn enqueue(&self, request: Request) {
        let mut queue = self.inner.queue.lock();
        let accepting = self.inner.shared.accepting.lock();
        if *accepting != Accepting::Open {
            drop(accepting);
            drop(queue);
            request.fail(ClientError::ConnectionClosed);
            return;
        }

        let explicit_connect = matches!(request.job, Job::Connect);
        if queue.started && explicit_connect {
            drop(accepting);
            drop(queue);
            request.fail(ClientError::AlreadyConnected);
            return;
        }

        if !queue.started {
            let Some(rx) = queue.rx.take() else {
                drop(accepting);
                drop(queue);
                request.fail(ClientError::ConnectionClosed);
                return;
            };
            queue.started = true;
            if !explicit_connect {
                let (connect, _) = Request::new(Job::Connect, None, unit);
                let _ = queue.tx.send(connect);
            }
            let driver = Driver::new(self.inner.shared.clone(), rx);
            tokio::spawn(driver.run());
        }

        // Sent while `accepting` is held so the driver's drain sees it.
        let sent = queue.tx.send(request);
        drop(accepting);
        drop(queue);
        if let Err(mpsc::error::SendError(request)) = sent {
            request.fail(ClientError::ConnectionClosed);
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = self.inner.shared.status.lock();
        f.debug_struct("Connection")
            .field("address", &self.inner.shared.config.address())
            .field("thread_id", &status.thread_id)
            .field("phase", &status.phase)
            .finish()
    }
}

enum Flow {
    Continue,
    Stop(ClientError),
}

/// Owns the transport and runs queued commands.
struct Driver {
    shared: Arc<Shared>,
    requests: mpsc::UnboundedReceiver<Request>,
    protocol: Protocol,
    decoder: Decoder,
    stream: Option<ClientStream>,
}

impl Driver {
    fn new(shared: Arc<Shared>, requests: mpsc::UnboundedReceiver<Request>) -> Self {
        let protocol = Protocol::new(shared.config.handshake_options());
        let decoder = Decoder::with_max_packet_size(shared.config.max_packet_size);
        Self {
            shared,
            requests,
            protocol,
            decoder,
            stream: None,
        }
    }

    async fn run(mut self) {
        let failure = loop {
            let request = tokio::select! {
                biased;
                _ = self.shared.destroy.notified() => {
                    tracing::debug!("Connection destroyed");
                    break ClientError::ConnectionClosed;
                }
                request = self.requests.recv() => match request {
                    Some(request) => request,
                    None => {
                        tracing::debug!("All connection handles dropped");
                        break ClientError::ConnectionClosed;
                    }
                },
                error = watch_idle(&mut self.stream, &mut self.decoder, &mut self.protocol) => {
                    tracing::debug!("Idle connection failed: {}", error);
                    break error;
                }
            };
            match self.execute(request).await {
                Flow::Continue => {}
                Flow::Stop(error) => break error,
            }
        };
        self.shutdown(failure).await;
    }

    async fn execute(&mut self, request: Request) -> Flow {
        let Request {
            job,
            mut sink,
            reply,
        } = request;

        let outcome = match job {
            Job::Connect => {
                if self.protocol.phase() != Phase::Connecting {
                    reply(Err(ClientError::AlreadyConnected));
                    return Flow::Continue;
                }
                let connect_timeout = self.shared.config.connect_timeout;
                match connect_timeout {
                    Some(limit) => tokio::time::timeout(limit, self.handshake())
                        .await
                        .unwrap_or(Err(ClientError::Timeout(TimeoutKind::Connect))),
                    None => self.handshake().await,
                }
            }
            Job::Command(Command::Quit) => {
                let result = self.quit().await;
                reply(result.map(|()| Completion::Ok(Default::default())));
                return Flow::Stop(ClientError::ConnectionClosed);
            }
            Job::Command(command) => match self.protocol.start(&command) {
                Ok(bytes) => {
                    tracing::trace!("Sending {}", command.name());
                    match self.write(&bytes).await {
                        Ok(()) => self.exchange(&mut sink).await,
                        Err(e) => Err(e),
                    }
                }
                Err(e) => {
                    // Not a transport failure; the connection stays as it was.
                    reply(Err(e.into()));
                    return Flow::Continue;
                }
            },
        };
        self.sync_status();
        drop(sink);

        match outcome {
            Ok(Ok(completion)) => {
                if let Completion::Connected { thread_id, .. } = &completion {
                    tracing::debug!("Handshake complete, thread id {}", thread_id);
                }
                reply(Ok(completion));
                Flow::Continue
            }
            Ok(Err(packet)) => {
                let error = ClientError::server(packet);
                if self.protocol.phase().is_closed() {
                    reply(Err(error.duplicate()));
                    Flow::Stop(error)
                } else {
                    reply(Err(error));
                    Flow::Continue
                }
            }
            Err(error) => {
                self.protocol.close();
                reply(Err(error.duplicate()));
                Flow::Stop(error)
            }
        }
    }

    async fn handshake(&mut self) -> Result<Result<Completion, ErrorPacket>, ClientError> {
        let shared = self.shared.clone();
        tracing::debug!("Connecting to {}...", shared.config.address());
        let stream = ClientStream::connect(&shared.config.host, shared.config.port).await?;
        tracing::debug!("TCP connected, waiting for greeting");
        self.stream = Some(stream);
        self.protocol.start_handshake()?;
        self.sync_status();
        self.exchange(&mut None).await
    }

    async fn quit(&mut self) -> Result<(), ClientError> {
        let bytes = self.protocol.start(&Command::Quit)?;
        self.write(&bytes).await?;
        if let Some(mut stream) = self.stream.take() {
            stream.shutdown().await?;
        }
        tracing::debug!("Connection ended");
        Ok(())
    }

    /// Feeds packets to the protocol until the active command finishes.
    async fn exchange(
        &mut self,
        sink: &mut Option<QuerySink>,
    ) -> Result<Result<Completion, ErrorPacket>, ClientError> {
        loop {
            while let Some(packet) = self.decoder.decode_packet()? {
                self.log_inbound(&packet);
                let mut outputs: VecDeque<Output> = self.protocol.receive(packet)?.into();
                self.sync_status();
                while let Some(output) = outputs.pop_front() {
                    match output {
                        Output::Write(bytes) => self.write(&bytes).await?,
                        Output::StartTls => {
                            self.upgrade().await?;
                            outputs.extend(self.protocol.tls_established()?);
                        }
                        Output::Event(event) => {
                            if let Some(sink) = sink.as_mut() {
                                sink.publish(event);
                            }
                        }
                        Output::Done(result) => return Ok(result),
                    }
                }
            }
            self.read_more().await?;
        }
    }

    async fn read_more(&mut self) -> Result<(), ClientError> {
        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionLost)?;
        tokio::select! {
            biased;
            _ = self.shared.destroy.notified() => {
                tracing::debug!("Connection destroyed during command");
                Err(ClientError::ConnectionClosed)
            }
            read = stream.read_buf(self.decoder.buffer_mut()) => match read? {
                0 => Err(ClientError::ConnectionLost),
                _ => Ok(()),
            },
        }
    }

    async fn upgrade(&mut self) -> Result<(), ClientError> {
        let ssl = self
            .shared
            .config
            .ssl
            .as_ref()
            .ok_or_else(|| ClientError::TlsConfig("no TLS settings configured".to_string()))?;
        let stream = self.stream.take().ok_or(ClientError::ConnectionLost)?;
        tracing::debug!("Upgrading connection to TLS");
        self.stream = Some(stream.upgrade(ssl, &self.shared.config.host).await?);
        Ok(())
    }

    async fn write(&mut self, bytes: &BytesMut) -> Result<(), ClientError> {
        self.log_outbound(bytes);
        let stream = self.stream.as_mut().ok_or(ClientError::ConnectionLost)?;
        stream.write_all(bytes).await?;
        stream.flush().await?;
        Ok(())
    }

    fn sync_status(&self) {
        let mut status = self.shared.status.lock();
        status.phase = self.protocol.phase();
        status.thread_id = self.protocol.thread_id();
        if status.server_version.is_empty() {
            status.server_version = self.protocol.server_version().to_string();
        }
    }

    fn log_inbound(&self, packet: &RawPacket) {
        if self.shared.config.debug {
            let head = &packet.payload[..packet.payload.len().min(32)];
            tracing::debug!(
                target: "mywire::packets",
                "<- seq={} len={} frames={} {}",
                packet.sequence_id,
                packet.payload.len(),
                packet.frames,
                hex::encode(head)
            );
        }
    }

    fn log_outbound(&self, bytes: &[u8]) {
        if self.shared.config.debug && bytes.len() >= 4 {
            let len = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
            let head = &bytes[4..bytes.len().min(36)];
            tracing::debug!(
                target: "mywire::packets",
                "-> seq={} len={} {}",
                bytes[3],
                len,
                hex::encode(head)
            );
        }
    }

    async fn shutdown(mut self, failure: ClientError) {
        self.protocol.close();
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        // Stop accepting before draining so nothing slips in afterwards.
        *self.shared.accepting.lock() = Accepting::Closed;
        self.requests.close();
        let mut failed = 0usize;
        while let Ok(request) = self.requests.try_recv() {
            request.fail(failure.duplicate());
            failed += 1;
        }
        if failed > 0 {
            tracing::debug!("Failed {} queued commands: {}", failed, failure);
        }
        self.shared.mark_closed();
        tracing::debug!("Connection closed");
    }
}

/// Waits on an idle socket; any byte or EOF there is a failure.
async fn watch_idle(
    stream: &mut Option<ClientStream>,
    decoder: &mut Decoder,
    protocol: &mut Protocol,
) -> ClientError {
    let Some(stream) = stream.as_mut() else {
        return std::future::pending().await;
    };
    loop {
        match stream.read_buf(decoder.buffer_mut()).await {
            Ok(0) => return ClientError::ConnectionLost,
            Ok(_) => {}
            Err(e) => return ClientError::Io(e),
        }
        match decoder.decode_packet() {
            Ok(Some(packet)) => {
                return match protocol.receive(packet) {
                    Ok(_) => ClientError::ConnectionLost,
                    Err(e) => ClientError::Protocol(e),
                }
            }
            Ok(None) => {}
            Err(e) => return ClientError::Protocol(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryEvent;
    use crate::test_server::TestServer;
    use std::time::Duration;

    #[tokio::test]
    async fn test_select_one() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();
        assert_eq!(connection.thread_id(), Some(1));
        assert_eq!(connection.server_version(), "8.0.36-test");
        assert_eq!(connection.state(), Phase::Idle);

        let result = connection.query("SELECT 1").await.unwrap();
        assert_eq!(result.fields()[0].name, "1");
        assert_eq!(result.rows().len(), 1);
        assert_eq!(result.rows()[0].get(0).as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_query_events_stream_in_order() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();

        let mut query = connection.query("SELECT 1");
        assert_eq!(query.sql(), "SELECT 1");
        assert!(matches!(query.next_event().await, Ok(Some(QueryEvent::Field { .. }))));
        match query.next_event().await {
            Ok(Some(QueryEvent::Row { row, .. })) => {
                assert_eq!(row.get_by_name("1").as_deref(), Some("1"));
            }
            other => panic!("expected row, got {:?}", other),
        }
        assert!(matches!(query.next_event().await, Ok(Some(QueryEvent::End { .. }))));
        assert!(matches!(query.next_event().await, Ok(None)));
    }

    #[tokio::test]
    async fn test_multiple_result_sets() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config().with_multiple_statements(true))
            .await
            .unwrap();

        let result = connection.query("SELECT 1; SELECT 2").await.unwrap();
        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[1].rows[0].get(0).as_deref(), Some("2"));
        assert_eq!(result.results[1].fields[0].name, "2");
    }

    #[tokio::test]
    async fn test_server_error_keeps_connection_usable() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();

        let err = connection.query("INVALID SQL").await.unwrap_err();
        assert_eq!(err.code(), "ER_PARSE_ERROR");
        assert_eq!(err.errno(), Some(1064));
        assert!(!err.is_fatal());

        connection.ping().await.unwrap();
        connection.query("USE test").await.unwrap();
        connection.change_database("test").await.unwrap();
        assert!(!connection.is_closed());
    }

    #[tokio::test]
    async fn test_commands_before_connect_connect_implicitly() {
        let server = TestServer::start().await;
        let connection = Connection::new(server.config());
        assert_eq!(connection.state(), Phase::Connecting);

        let select = connection.query("SELECT 1");
        let invalid = connection.query("INVALID SQL");
        let ping = connection.ping();

        // Awaited out of order; replies still follow queue order.
        ping.await.unwrap();
        assert!(invalid.await.is_err());
        assert_eq!(select.await.unwrap().rows().len(), 1);
        assert_eq!(connection.thread_id(), Some(1));
    }

    #[tokio::test]
    async fn test_connect_twice() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();
        let err = connection.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::AlreadyConnected));
        assert_eq!(err.code(), "PROTOCOL_ENQUEUE_HANDSHAKE_TWICE");
        connection.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_panicking_consumer_does_not_break_connection() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();

        // Fails on the first field; the row and end events are still queued.
        let mut query = connection.query("SELECT 1");
        let consumer = tokio::spawn(async move {
            if let Ok(Some(QueryEvent::Field { .. })) = query.next_event().await {
                panic!("field handler failed");
            }
        });
        assert!(consumer.await.unwrap_err().is_panic());

        // Fails on the OK result of a statement without rows.
        let mut query = connection.query("USE test");
        let consumer = tokio::spawn(async move {
            if let Ok(Some(QueryEvent::Ok { .. })) = query.next_event().await {
                panic!("result handler failed");
            }
        });
        assert!(consumer.await.unwrap_err().is_panic());

        // Fails after collecting the whole result.
        let query = connection.query("INVALID SQL");
        let consumer = tokio::spawn(async move {
            let _ = query.await;
            panic!("error handler failed");
        });
        assert!(consumer.await.unwrap_err().is_panic());

        let result = connection.query("SELECT 1").await.unwrap();
        assert_eq!(result.fields()[0].name, "1");
        assert_eq!(result.rows()[0].get(0).as_deref(), Some("1"));
        connection.ping().await.unwrap();
        assert_eq!(connection.state(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_dropped_query_handle_still_runs() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();
        drop(connection.query("SELECT 1"));
        connection.ping().await.unwrap();
        assert_eq!(connection.state(), Phase::Idle);
    }

    #[tokio::test]
    async fn test_enqueue_after_end() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();

        let end = connection.end();
        let err = connection.query("SELECT 1").await.unwrap_err();
        assert!(matches!(err, ClientError::ConnectionClosed));
        assert_eq!(err.code(), "PROTOCOL_ENQUEUE_AFTER_QUIT");
        assert!(!connection.is_accepting());

        end.await.unwrap();
        connection.closed().await;
        assert_eq!(connection.state(), Phase::Closed);
        assert!(connection.end().await.is_err());
    }

    #[tokio::test]
    async fn test_end_without_connecting() {
        let server = TestServer::start().await;
        let connection = Connection::new(server.config());
        connection.end().await.unwrap();
        assert!(connection.is_closed());
        assert_eq!(server.accepted(), 0);
    }

    #[tokio::test]
    async fn test_connection_lost_mid_command_fails_queue() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();

        let crash = connection.query("SELECT CRASH");
        let ping = connection.ping();
        let err = crash.await.unwrap_err();
        assert_eq!(err.code(), "PROTOCOL_CONNECTION_LOST");
        assert!(err.is_fatal());
        assert_eq!(ping.await.unwrap_err().code(), "PROTOCOL_CONNECTION_LOST");

        connection.closed().await;
        assert!(matches!(
            connection.ping().await,
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_idle_connection_closed_by_server() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();
        connection.ping().await.unwrap();

        server.kill_connections();
        tokio::time::timeout(Duration::from_secs(2), connection.closed())
            .await
            .unwrap();
        assert_eq!(connection.state(), Phase::Closed);
        assert!(!connection.is_accepting());
    }

    #[tokio::test]
    async fn test_destroy_fails_queued_commands() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config()).await.unwrap();

        let query = connection.query("SELECT 1");
        connection.destroy();
        assert!(matches!(query.await, Err(ClientError::ConnectionClosed)));
        connection.closed().await;
        assert!(matches!(
            connection.ping().await,
            Err(ClientError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn test_connect_timeout() {
        let server = TestServer::silent().await;
        let config = server
            .config()
            .with_connect_timeout(Some(Duration::from_millis(100)));
        let connection = Connection::new(config);

        let err = connection.connect().await.unwrap_err();
        assert!(matches!(err, ClientError::Timeout(TimeoutKind::Connect)));
        assert_eq!(err.code(), "ETIMEDOUT");
        assert!(err.is_fatal());
        connection.closed().await;
    }

    #[tokio::test]
    async fn test_connection_refused() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = ConnectionConfig::default()
            .with_host("127.0.0.1")
            .with_port(port);
        let err = Connection::open(config).await.unwrap_err();
        assert_eq!(err.code(), "ECONNREFUSED");
    }

    #[tokio::test]
    async fn test_debug_logging_does_not_change_results() {
        let server = TestServer::start().await;
        let connection = Connection::open(server.config().with_debug(true))
            .await
            .unwrap();
        assert_eq!(connection.query("SELECT 1").await.unwrap().rows().len(), 1);
    }
}
