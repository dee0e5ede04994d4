// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One inbound request, from connection acquisition to resource release.
//!
//! A session performs at most one suspending operation at a time (acquire,
//! cursor read, or execute). That operation is stored as a boxed future which
//! owns the lease it works on, so the owning node can wait on its inbox and on
//! the operation together without ever cancelling a half-done read, and so
//! that dropping the session drops the operation together with its resources.
//!
//! ```text
//! streaming:  Connecting -> Streaming -> Completed | Errored | Superseded
//! single:     Connecting -> Executing -> Completed | Errored | Superseded
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::lease::{ConnectionLease, CursorLease};
use crate::errors::{DatabaseError, SessionError};
use crate::message::{Message, Parts};
use crate::traits::{ConnectionPool, ResultSet};

type StepFuture = Pin<Box<dyn Future<Output = Step> + Send>>;

/// How rows reach the downstream node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Read through a cursor and send one message per batch.
    Streaming { rows_per_msg: usize },
    /// Run the query once and send the whole result set.
    Single,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Streaming,
    Executing,
    Completed,
    Errored,
    Superseded,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Superseded
        )
    }
}

/// Result of a suspending operation, fed back through [`QuerySession::advance`].
pub enum Step {
    Connected(Result<ConnectionLease, DatabaseError>),
    Batch {
        cursor: CursorLease,
        rows: Result<Vec<Value>, DatabaseError>,
    },
    Executed {
        connection: ConnectionLease,
        result: Result<ResultSet, DatabaseError>,
    },
}

/// What the node has to send after a step.
#[derive(Debug)]
pub enum SessionEvent {
    /// Nothing to send yet.
    Quiet,
    /// One chunk of rows; more follow.
    Chunk(Message),
    /// The last message of a successful session.
    Completed(Message),
    /// The session failed; `message` tells downstream to drop the group.
    Failed { error: SessionError, message: Message },
}

/// Outcome of asking a streaming session for its next batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    /// A read is now in flight.
    Started,
    /// Downstream is not ready; the read waits for the next tick.
    Deferred,
    /// Nothing to pull: not streaming, a read is already in flight, or finished.
    Idle,
}

pub struct QuerySession {
    group_id: String,
    query: String,
    params: Vec<Value>,
    mode: QueryMode,
    /// The inbound message; outbound messages are copies of it.
    request: Message,
    chunk_index: u64,
    state: SessionState,
    connection: Option<ConnectionLease>,
    cursor: Option<CursorLease>,
    in_flight: Option<StepFuture>,
}

impl QuerySession {
    /// Starts a session in `Connecting`, with the pool acquisition in flight.
    pub fn start(
        request: Message,
        query: String,
        group_id: String,
        mode: QueryMode,
        pool: Arc<dyn ConnectionPool>,
    ) -> Self {
        let acquire: StepFuture = Box::pin(async move {
            Step::Connected(pool.acquire().await.map(ConnectionLease::new))
        });

        Self {
            group_id,
            query,
            params: request.params.clone(),
            mode,
            request,
            chunk_index: 0,
            state: SessionState::Connecting,
            connection: None,
            cursor: None,
            in_flight: Some(acquire),
        }
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Index the next chunk will carry; equals the number of chunks sent so far.
    pub fn chunk_index(&self) -> u64 {
        self.chunk_index
    }

    pub fn is_active(&self) -> bool {
        !self.state.is_terminal()
    }

    pub fn has_in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// True while streaming with an open cursor and no read in flight.
    pub fn is_awaiting_pull(&self) -> bool {
        self.state == SessionState::Streaming && self.in_flight.is_none() && self.cursor.is_some()
    }

    /// Waits for the in-flight operation. Never resolves when there is none.
    ///
    /// Dropping the returned future leaves the operation untouched; it is
    /// picked up again by the next call.
    pub async fn next_step(&mut self) -> Step {
        match self.in_flight.as_mut() {
            Some(operation) => {
                let step = operation.await;
                self.in_flight = None;
                step
            }
            None => std::future::pending().await,
        }
    }

    /// Requests the next batch when downstream is ready.
    pub fn pull(&mut self, downstream_ready: bool) -> Pull {
        if !self.is_awaiting_pull() {
            return Pull::Idle;
        }
        if !downstream_ready {
            return Pull::Deferred;
        }
        let Some(mut cursor) = self.cursor.take() else {
            return Pull::Idle;
        };

        let max_rows = self.rows_per_msg();
        self.in_flight = Some(Box::pin(async move {
            let rows = cursor.read(max_rows).await;
            Step::Batch { cursor, rows }
        }));
        Pull::Started
    }

    /// Applies the result of the in-flight operation.
    pub fn advance(&mut self, step: Step) -> SessionEvent {
        if !self.is_active() {
            return SessionEvent::Quiet;
        }

        match step {
            Step::Connected(Ok(connection)) => self.on_connected(connection),
            Step::Connected(Err(err)) => self.fail(SessionError::ConnectionAcquisition(err)),
            Step::Batch { cursor, rows: Ok(rows) } => self.on_batch(cursor, rows),
            Step::Batch { cursor, rows: Err(err) } => {
                drop(cursor);
                self.fail(SessionError::CursorRead(err))
            }
            Step::Executed {
                connection,
                result: Ok(result),
            } => {
                self.connection = Some(connection);
                self.release();
                self.state = SessionState::Completed;

                let mut message = self.request.clone();
                message.payload = serde_json::to_value(result).unwrap_or(Value::Null);
                SessionEvent::Completed(message)
            }
            Step::Executed {
                connection,
                result: Err(err),
            } => {
                self.connection = Some(connection);
                self.fail(SessionError::QueryExecution(err))
            }
        }
    }

    /// Abandons the session for a newer request. Resources are released at
    /// once and nothing further is emitted for this group.
    pub fn supersede(&mut self) {
        if self.is_active() {
            self.release();
            self.state = SessionState::Superseded;
        }
    }

    fn on_connected(&mut self, mut connection: ConnectionLease) -> SessionEvent {
        match self.mode {
            QueryMode::Streaming { .. } => {
                let opened = connection.open_cursor(&self.query, &self.params);
                self.connection = Some(connection);
                match opened {
                    Ok(cursor) => {
                        self.cursor = Some(cursor);
                        self.state = SessionState::Streaming;
                        SessionEvent::Quiet
                    }
                    Err(err) => self.fail(SessionError::QueryExecution(err)),
                }
            }
            QueryMode::Single => {
                let query = self.query.clone();
                let params = self.params.clone();
                self.state = SessionState::Executing;
                self.in_flight = Some(Box::pin(async move {
                    let result = connection.execute(&query, &params).await;
                    Step::Executed { connection, result }
                }));
                SessionEvent::Quiet
            }
        }
    }

    fn on_batch(&mut self, cursor: CursorLease, mut rows: Vec<Value>) -> SessionEvent {
        if rows.is_empty() {
            drop(cursor);
            self.release();
            self.state = SessionState::Completed;

            let mut message = self.outbound(Value::Array(Vec::new()));
            message.parts = Some(Parts::last_chunk(self.group_id.clone(), self.chunk_index));
            message.complete = true;
            return SessionEvent::Completed(message);
        }

        self.cursor = Some(cursor);
        let payload = if self.rows_per_msg() > 1 {
            Value::Array(rows)
        } else {
            rows.swap_remove(0)
        };

        let mut message = self.outbound(payload);
        message.parts = Some(Parts::chunk(self.group_id.clone(), self.chunk_index));
        self.chunk_index += 1;
        SessionEvent::Chunk(message)
    }

    fn fail(&mut self, error: SessionError) -> SessionEvent {
        self.release();
        self.state = SessionState::Errored;
        let message = abort_message(&self.request, &self.group_id, error.describe(&self.query));
        SessionEvent::Failed { error, message }
    }

    fn outbound(&self, payload: Value) -> Message {
        Message {
            payload,
            complete: false,
            ..self.request.clone()
        }
    }

    fn rows_per_msg(&self) -> usize {
        match self.mode {
            QueryMode::Streaming { rows_per_msg } => rows_per_msg.max(1),
            QueryMode::Single => 1,
        }
    }

    /// Closes the cursor, then gives the connection back.
    fn release(&mut self) {
        self.in_flight = None;
        if let Some(mut cursor) = self.cursor.take() {
            cursor.close();
        }
        if let Some(mut connection) = self.connection.take() {
            connection.release();
        }
    }
}

impl Drop for QuerySession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Copy of `request` telling downstream to discard group `group_id`.
pub(crate) fn abort_message(request: &Message, group_id: &str, text: String) -> Message {
    Message {
        payload: Value::String(text),
        parts: Some(Parts::aborted(group_id)),
        complete: false,
        ..request.clone()
    }
}
