//! Per-command result handles.
//!
//! A command's events and its terminal outcome travel over channels that are
//! filled only after the protocol state machine has committed the packet
//! they came from. Consumers never run on the connection's driver task.

use crate::error::ClientError;
use bytes::Bytes;
use mywire_protocol::{EofPacket, FieldPacket, OkPacket, RowPacket};
use pin_project_lite::pin_project;
use std::borrow::Cow;
use std::fmt;
use std::future::{Future, IntoFuture};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, oneshot};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, ClientError>>;

pin_project! {
    /// Resolves once the connection has finished a command.
    ///
    /// The command is already queued when this is created; dropping it does
    /// not cancel the command.
    pub struct Pending<T> {
        #[pin]
        rx: oneshot::Receiver<Result<T, ClientError>>,
    }
}

impl<T> Pending<T> {
    pub(crate) fn channel() -> (Reply<T>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T, ClientError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.project()
            .rx
            .poll(cx)
            .map(|received| received.unwrap_or(Err(ClientError::ConnectionClosed)))
    }
}

impl<T> fmt::Debug for Pending<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pending").finish_non_exhaustive()
    }
}

/// One result row with access by column name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    fields: Arc<[FieldPacket]>,
    values: Vec<Option<Bytes>>,
}

impl Row {
    pub(crate) fn new(fields: Arc<[FieldPacket]>, row: RowPacket) -> Self {
        Self {
            fields,
            values: row.values,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn fields(&self) -> &[FieldPacket] {
        &self.fields
    }

    /// Raw value of column `index`; `None` for NULL or out of range.
    pub fn get_bytes(&self, index: usize) -> Option<&Bytes> {
        self.values.get(index)?.as_ref()
    }

    pub fn get(&self, index: usize) -> Option<Cow<'_, str>> {
        self.get_bytes(index).map(|v| String::from_utf8_lossy(v))
    }

    pub fn get_by_name(&self, name: &str) -> Option<Cow<'_, str>> {
        let index = self.fields.iter().position(|f| f.name == name)?;
        self.get(index)
    }

    pub fn is_null(&self, index: usize) -> bool {
        matches!(self.values.get(index), Some(None))
    }

    pub fn values(&self) -> &[Option<Bytes>] {
        &self.values
    }
}

/// Streamed event of a query, in receive order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryEvent {
    Field {
        result_index: usize,
        field: FieldPacket,
    },
    Row {
        result_index: usize,
        row: Row,
    },
    /// A statement completed without a result set.
    Ok {
        result_index: usize,
        ok: OkPacket,
    },
    /// A result set's rows ended.
    End {
        result_index: usize,
        eof: EofPacket,
    },
}

impl QueryEvent {
    pub fn result_index(&self) -> usize {
        match self {
            QueryEvent::Field { result_index, .. }
            | QueryEvent::Row { result_index, .. }
            | QueryEvent::Ok { result_index, .. }
            | QueryEvent::End { result_index, .. } => *result_index,
        }
    }
}

/// One statement's outcome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    pub fields: Vec<FieldPacket>,
    pub rows: Vec<Row>,
    /// Set when the statement returned OK instead of rows.
    pub ok: Option<OkPacket>,
    pub eof: Option<EofPacket>,
}

/// Every result of a query, in statement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryResult {
    pub results: Vec<ResultSet>,
}

impl QueryResult {
    fn push(&mut self, event: QueryEvent) {
        let index = event.result_index();
        while self.results.len() <= index {
            self.results.push(ResultSet::default());
        }
        let set = &mut self.results[index];
        match event {
            QueryEvent::Field { field, .. } => set.fields.push(field),
            QueryEvent::Row { row, .. } => set.rows.push(row),
            QueryEvent::Ok { ok, .. } => set.ok = Some(ok),
            QueryEvent::End { eof, .. } => set.eof = Some(eof),
        }
    }

    pub fn first(&self) -> Option<&ResultSet> {
        self.results.first()
    }

    /// Rows of the first result.
    pub fn rows(&self) -> &[Row] {
        self.first().map(|r| r.rows.as_slice()).unwrap_or_default()
    }

    /// Fields of the first result.
    pub fn fields(&self) -> &[FieldPacket] {
        self.first().map(|r| r.fields.as_slice()).unwrap_or_default()
    }

    /// Affected rows summed over OK results.
    pub fn affected_rows(&self) -> u64 {
        self.results
            .iter()
            .filter_map(|r| r.ok.as_ref())
            .map(|ok| ok.affected_rows)
            .sum()
    }
}

/// Handle to a queued query.
///
/// Events can be read with [`Query::next_event`] or gathered with
/// [`Query::collect`] (also used when the handle is awaited directly).
/// Dropping the handle discards the events; the query still runs.
pub struct Query {
    sql: Arc<str>,
    events: mpsc::UnboundedReceiver<QueryEvent>,
    done: Option<Pending<()>>,
}

impl Query {
    pub(crate) fn new(
        sql: Arc<str>,
        events: mpsc::UnboundedReceiver<QueryEvent>,
        done: Pending<()>,
    ) -> Self {
        Self {
            sql,
            events,
            done: Some(done),
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Next event in receive order.
    ///
    /// Returns `Ok(None)` after the last event of a successful query, or the
    /// query's error once its events are exhausted.
    pub async fn next_event(&mut self) -> Result<Option<QueryEvent>, ClientError> {
        if let Some(event) = self.events.recv().await {
            return Ok(Some(event));
        }
        match self.done.take() {
            Some(done) => done.await.map(|()| None),
            None => Ok(None),
        }
    }

    /// Gathers every result set and resolves with the terminal outcome.
    pub async fn collect(mut self) -> Result<QueryResult, ClientError> {
        let mut result = QueryResult::default();
        while let Some(event) = self.next_event().await? {
            result.push(event);
        }
        Ok(result)
    }
}

impl IntoFuture for Query {
    type Output = Result<QueryResult, ClientError>;
    type IntoFuture = Pin<Box<dyn Future<Output = Self::Output> + Send>>;

    fn into_future(self) -> Self::IntoFuture {
        Box::pin(self.collect())
    }
}

impl fmt::Debug for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Query").field("sql", &self.sql).finish()
    }
}

/// Driver-side ends of a query's channels.
pub(crate) struct QuerySink {
    events: mpsc::UnboundedSender<QueryEvent>,
    fields: Vec<FieldPacket>,
    shared_fields: Option<Arc<[FieldPacket]>>,
}

impl QuerySink {
    pub(crate) fn new(events: mpsc::UnboundedSender<QueryEvent>) -> Self {
        Self {
            events,
            fields: Vec::new(),
            shared_fields: None,
        }
    }

    /// Publishes a committed protocol event. A dropped receiver is ignored.
    pub(crate) fn publish(&mut self, event: mywire_protocol::ResultEvent) {
        use mywire_protocol::ResultEvent;
        let event = match event {
            ResultEvent::Field {
                result_index,
                field,
            } => {
                if self.shared_fields.take().is_some() {
                    self.fields.clear();
                }
                self.fields.push(field.clone());
                QueryEvent::Field {
                    result_index,
                    field,
                }
            }
            ResultEvent::Row { result_index, row } => {
                let fields = self
                    .shared_fields
                    .get_or_insert_with(|| Arc::from(std::mem::take(&mut self.fields)))
                    .clone();
                QueryEvent::Row {
                    result_index,
                    row: Row::new(fields, row),
                }
            }
            ResultEvent::Ok { result_index, ok } => {
                self.reset_fields();
                QueryEvent::Ok { result_index, ok }
            }
            ResultEvent::End { result_index, eof } => {
                self.reset_fields();
                QueryEvent::End { result_index, eof }
            }
        };
        let _ = self.events.send(event);
    }

    fn reset_fields(&mut self) {
        self.fields.clear();
        self.shared_fields = None;
    }
}
