//! Connection pool.
//!
//! Hands out up to `connection_limit` connections. Idle connections are
//! pinged before reuse; one that does not answer within `acquire_timeout`
//! is destroyed and replaced. Acquires beyond the limit wait in FIFO order.

use crate::config::PoolConfig;
use crate::connection::Connection;
use crate::error::{ClientError, TimeoutKind};
use crate::query::QueryResult;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::ops::Deref;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::Instant;

type Handoff = oneshot::Sender<Result<Connection, ClientError>>;

/// Absolute acquire deadline; `None` waits forever.
type Deadline = Option<Instant>;

struct Waiter {
    id: u64,
    tx: Handoff,
    deadline: Deadline,
    timer: Option<AbortHandle>,
}

impl Waiter {
    fn take(mut self) -> (Handoff, Deadline) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        (self.tx, self.deadline)
    }
}

/// Runs `future` until `deadline`, failing with an acquire timeout.
async fn until<T>(
    deadline: Deadline,
    future: impl Future<Output = Result<T, ClientError>>,
) -> Result<T, ClientError> {
    match deadline {
        Some(deadline) => tokio::time::timeout_at(deadline, future)
            .await
            .unwrap_or(Err(ClientError::Timeout(TimeoutKind::Acquire))),
        None => future.await,
    }
}

struct PoolState {
    idle: VecDeque<Connection>,
    waiters: VecDeque<Waiter>,
    /// Idle, handed out, validating or being created.
    total: usize,
    closed: bool,
    next_waiter_id: u64,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub idle: usize,
    pub in_use: usize,
    pub waiting: usize,
    pub total: usize,
}

/// A pool of connections sharing one configuration.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    waiters: VecDeque::new(),
                    total: 0,
                    closed: false,
                    next_waiter_id: 0,
                }),
            }),
        }
    }

    pub fn from_url(url: &str) -> Result<Self, ClientError> {
        Ok(Self::new(PoolConfig::from_url(url)?))
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Requests a connection.
    ///
    /// The request is registered before this returns, so acquires are served
    /// in call order regardless of when the futures are first polled.
    pub fn acquire(&self) -> Acquire {
        let (tx, rx) = oneshot::channel();
        let acquire = Acquire {
            rx,
            pool: self.clone(),
            finished: false,
        };
        let config = &self.inner.config;
        let deadline = config.acquire_timeout.map(|limit| Instant::now() + limit);
        let mut state = self.inner.state.lock();

        if state.closed {
            let _ = tx.send(Err(ClientError::PoolClosed));
            return acquire;
        }

        Self::prune_idle(&mut state);
        if let Some(connection) = state.idle.pop_front() {
            drop(state);
            tracing::trace!("Validating idle connection {:?}", connection.thread_id());
            self.spawn_validate(connection, tx, deadline);
            return acquire;
        }

        if state.total < config.connection_limit {
            state.total += 1;
            drop(state);
            self.spawn_create(tx, deadline);
            return acquire;
        }

        if !config.wait_for_connections {
            let _ = tx.send(Err(ClientError::NoConnectionsAvailable));
            return acquire;
        }

        state.waiters.retain(|w| !w.tx.is_closed());
        if config.queue_limit > 0 && state.waiters.len() >= config.queue_limit {
            let _ = tx.send(Err(ClientError::PoolQueueLimit));
            return acquire;
        }

        let id = state.next_waiter_id;
        state.next_waiter_id += 1;
        let timer = deadline.map(|deadline| {
            let pool = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                pool.expire_waiter(id);
            })
            .abort_handle()
        });
        state.waiters.push_back(Waiter {
            id,
            tx,
            deadline,
            timer,
        });
        tracing::trace!("Queued acquire {} ({} waiting)", id, state.waiters.len());
        acquire
    }

    /// Runs one query on a pooled connection.
    pub async fn query(&self, sql: impl Into<String>) -> Result<QueryResult, ClientError> {
        let connection = self.acquire().await?;
        connection.query(sql).await
    }

    /// Closes idle connections and fails queued acquires.
    ///
    /// Connections still handed out are ended on release. Later calls to
    /// [`Pool::acquire`] fail with [`ClientError::PoolClosed`].
    pub async fn end(&self) -> Result<(), ClientError> {
        let (idle, waiters) = {
            let mut state = self.inner.state.lock();
            if state.closed {
                return Err(ClientError::PoolClosed);
            }
            state.closed = true;
            state.total = state.total.saturating_sub(state.idle.len());
            (
                std::mem::take(&mut state.idle),
                std::mem::take(&mut state.waiters),
            )
        };
        tracing::debug!(
            "Ending pool: {} idle connections, {} waiters",
            idle.len(),
            waiters.len()
        );

        for waiter in waiters {
            let (tx, _) = waiter.take();
            let _ = tx.send(Err(ClientError::PoolClosed));
        }
        let ending: Vec<_> = idle.iter().map(Connection::end).collect();
        for end in ending {
            if let Err(e) = end.await {
                tracing::debug!("Error ending pooled connection: {}", e);
            }
        }
        Ok(())
    }

    pub fn stats(&self) -> PoolStats {
        let mut state = self.inner.state.lock();
        Self::prune_idle(&mut state);
        let waiting = state.waiters.iter().filter(|w| !w.tx.is_closed()).count();
        PoolStats {
            idle: state.idle.len(),
            in_use: state.total - state.idle.len(),
            waiting,
            total: state.total,
        }
    }

    /// Drops idle connections that closed while parked, freeing their slots.
    fn prune_idle(state: &mut PoolState) {
        let before = state.idle.len();
        state.idle.retain(Connection::is_accepting);
        let pruned = before - state.idle.len();
        if pruned > 0 {
            state.total = state.total.saturating_sub(pruned);
            tracing::warn!("Pruned {} closed idle connections", pruned);
        }
    }

    fn spawn_create(&self, tx: Handoff, deadline: Deadline) {
        let pool = self.clone();
        tokio::spawn(async move {
            let connection = Connection::new(pool.inner.config.connection.clone());
            let result = until(deadline, connection.connect()).await;
            match result {
                Ok(info) => {
                    tracing::debug!("Pool created connection {}", info.thread_id);
                    pool.deliver(tx, connection);
                }
                Err(e) => {
                    tracing::debug!("Pool failed to create connection: {}", e);
                    connection.destroy();
                    let next = {
                        let mut state = pool.inner.state.lock();
                        state.total = state.total.saturating_sub(1);
                        pool.reserve_for_waiter(&mut state)
                    };
                    let _ = tx.send(Err(e));
                    if let Some((next, deadline)) = next {
                        pool.spawn_create(next, deadline);
                    }
                }
            }
        });
    }

    /// Pings an idle connection; replaces it in the same slot if it lags.
    fn spawn_validate(&self, connection: Connection, tx: Handoff, deadline: Deadline) {
        let pool = self.clone();
        tokio::spawn(async move {
            // Half the remaining budget, leaving the rest for a replacement.
            let ping_deadline = deadline.map(|deadline| {
                let now = Instant::now();
                now + deadline.saturating_duration_since(now) / 2
            });
            let alive = until(ping_deadline, connection.ping()).await.is_ok();
            if alive {
                pool.deliver(tx, connection);
            } else {
                tracing::debug!(
                    "Idle connection {:?} failed validation, replacing",
                    connection.thread_id()
                );
                connection.destroy();
                pool.spawn_create(tx, deadline);
            }
        });
    }

    fn deliver(&self, tx: Handoff, connection: Connection) {
        let closed = self.inner.state.lock().closed;
        if closed {
            let _ = tx.send(Err(ClientError::PoolClosed));
            self.release(connection);
            return;
        }
        if let Err(Ok(connection)) = tx.send(Ok(connection)) {
            // Acquirer went away.
            self.release(connection);
        }
    }

    fn expire_waiter(&self, id: u64) {
        let waiter = {
            let mut state = self.inner.state.lock();
            let Some(index) = state.waiters.iter().position(|w| w.id == id) else {
                return;
            };
            state.waiters.remove(index)
        };
        if let Some(waiter) = waiter {
            tracing::debug!("Acquire {} timed out", id);
            let _ = waiter.tx.send(Err(ClientError::Timeout(TimeoutKind::Acquire)));
        }
    }

    /// Takes a slot for the oldest live waiter, if a slot is free.
    fn reserve_for_waiter(&self, state: &mut PoolState) -> Option<(Handoff, Deadline)> {
        if state.closed || state.total >= self.inner.config.connection_limit {
            return None;
        }
        while let Some(waiter) = state.waiters.pop_front() {
            let (tx, deadline) = waiter.take();
            if !tx.is_closed() {
                state.total += 1;
                return Some((tx, deadline));
            }
        }
        None
    }

    fn release(&self, connection: Connection) {
        let mut state = self.inner.state.lock();

        if !connection.is_accepting() {
            state.total = state.total.saturating_sub(1);
            let replacement = self.reserve_for_waiter(&mut state);
            drop(state);
            tracing::warn!(
                "Discarding closed pool connection {:?}",
                connection.thread_id()
            );
            connection.destroy();
            if let Some((tx, deadline)) = replacement {
                self.spawn_create(tx, deadline);
            }
            return;
        }

        if state.closed {
            state.total = state.total.saturating_sub(1);
            drop(state);
            drop(connection.end());
            return;
        }

        let mut connection = connection;
        while let Some(waiter) = state.waiters.pop_front() {
            let id = waiter.id;
            let (tx, _) = waiter.take();
            match tx.send(Ok(connection)) {
                Ok(()) => {
                    tracing::trace!("Handed connection to acquire {}", id);
                    return;
                }
                Err(Ok(returned)) => connection = returned,
                Err(Err(_)) => return,
            }
        }
        state.idle.push_back(connection);
        tracing::trace!("Connection returned to idle ({} idle)", state.idle.len());
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("address", &self.inner.config.connection.address())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Future returned by [`Pool::acquire`].
///
/// Dropping it before completion withdraws the request; a connection that
/// arrives afterwards goes back to the pool.
pub struct Acquire {
    rx: oneshot::Receiver<Result<Connection, ClientError>>,
    pool: Pool,
    finished: bool,
}

impl Future for Acquire {
    type Output = Result<PooledConnection, ClientError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let received = match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(received) => received,
            Poll::Pending => return Poll::Pending,
        };
        self.finished = true;
        Poll::Ready(match received {
            Ok(Ok(connection)) => Ok(PooledConnection {
                connection,
                pool: self.pool.clone(),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(ClientError::PoolClosed),
        })
    }
}

impl Drop for Acquire {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        self.rx.close();
        if let Ok(Ok(connection)) = self.rx.try_recv() {
            self.pool.release(connection);
        }
    }
}

/// A connection on loan from a [`Pool`]; returned to it on drop.
pub struct PooledConnection {
    connection: Connection,
    pool: Pool,
}

impl PooledConnection {
    /// Closes the connection instead of returning it.
    pub fn destroy(self) {
        self.connection.destroy();
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.connection
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.pool.release(self.connection.clone());
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("PooledConnection").field(&self.connection).finish()
    }
}
