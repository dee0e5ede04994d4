// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The query node: inbound dispatch and the node's event loop.
//!
//! Every inbound message is either a tick (downstream is ready again) or a new
//! request (supersede whatever runs and start a fresh session). The node owns
//! at most one [`QuerySession`] and is driven by [`QueryNode::run`], which
//! waits on the inbox and on the session's in-flight operation together.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::engine::session::{abort_message, Pull, QueryMode, QuerySession, SessionEvent, SessionState, Step};
use crate::engine::tick::TickCoordinator;
use crate::errors::SessionError;
use crate::graph::Graph;
use crate::message::Message;
use crate::observability::messages::dispatch::{TickReceived, UpstreamResolved, UpstreamTicked};
use crate::observability::messages::session::{
    ChunkEmitted, ConnectionAcquired, PullDeferred, SessionCompleted, SessionFailed, SessionStarted,
    SessionSuperseded,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{ConnectionPool, NodeHost, QueryRenderer};

/// Settings of a query node, read once when the node is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryNodeConfig {
    /// Display name, carried into session logs.
    pub name: Option<String>,
    /// Query template; rendered against `{ "msg": <inbound message> }`.
    pub query: String,
    /// Stream rows through a cursor instead of returning one result set.
    pub streaming: bool,
    pub rows_per_msg: usize,
}

impl QueryNodeConfig {
    fn mode(&self) -> QueryMode {
        if self.streaming {
            QueryMode::Streaming {
                rows_per_msg: self.rows_per_msg.max(1),
            }
        } else {
            QueryMode::Single
        }
    }
}

/// Everything a query node talks to.
#[derive(Clone)]
pub struct QueryNodeContext {
    pub pool: Arc<dyn ConnectionPool>,
    pub renderer: Arc<dyn QueryRenderer>,
    pub host: Arc<dyn NodeHost>,
    pub graph: Arc<Graph>,
}

pub struct QueryNode {
    id: String,
    config: QueryNodeConfig,
    context: QueryNodeContext,
    ticks: TickCoordinator,
    session: Option<QuerySession>,
}

impl QueryNode {
    pub fn new(id: impl Into<String>, config: QueryNodeConfig, context: QueryNodeContext) -> Self {
        Self {
            id: id.into(),
            config,
            context,
            ticks: TickCoordinator::new(),
            session: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_downstream_ready(&self) -> bool {
        self.ticks.is_ready()
    }

    pub fn upstream(&self) -> Option<&str> {
        self.ticks.upstream()
    }

    /// State of the current or most recent session.
    pub fn session_state(&self) -> Option<SessionState> {
        self.session.as_ref().map(QuerySession::state)
    }

    pub fn current_group(&self) -> Option<&str> {
        self.session.as_ref().map(QuerySession::group_id)
    }

    pub fn has_in_flight(&self) -> bool {
        self.session.as_ref().is_some_and(QuerySession::has_in_flight)
    }

    /// Handles one inbound message.
    pub fn on_input(&mut self, msg: Message) {
        if !self.ticks.is_upstream_resolved() {
            let upstream = self.ticks.resolve_upstream(&self.id, &self.context.graph);
            UpstreamResolved {
                node_id: &self.id,
                upstream,
            }
            .log();
        }

        if msg.tick {
            self.on_tick();
        } else {
            self.on_request(msg);
        }
    }

    /// Waits for the current session's in-flight operation; never resolves
    /// while there is none.
    pub async fn next_step(&mut self) -> Step {
        match self.session.as_mut() {
            Some(session) => session.next_step().await,
            None => std::future::pending().await,
        }
    }

    /// Applies a finished operation and sends whatever it produced.
    pub fn on_step(&mut self, step: Step) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        let was_connecting = session.state() == SessionState::Connecting;
        let event = session.advance(step);
        let group_id = session.group_id().to_string();
        let chunk_count = session.chunk_index();

        if was_connecting && session.is_active() {
            ConnectionAcquired {
                node_id: &self.id,
                group_id: &group_id,
            }
            .log();
        }

        match event {
            SessionEvent::Quiet => {}
            SessionEvent::Chunk(message) => {
                ChunkEmitted {
                    node_id: &self.id,
                    group_id: &group_id,
                    index: chunk_count - 1,
                    rows: row_count(&message),
                }
                .log();
                self.emit(message);
            }
            SessionEvent::Completed(message) => {
                SessionCompleted {
                    node_id: &self.id,
                    group_id: &group_id,
                    chunk_count: if self.config.streaming { chunk_count + 1 } else { 1 },
                }
                .log();
                self.emit(message);
                self.notify_upstream();
            }
            SessionEvent::Failed { error, message } => {
                self.report_failure(&group_id, &error, message);
            }
        }

        self.pull();
    }

    /// Runs the node until its inbox closes or `shutdown` fires.
    pub async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Message>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                inbound = inbox.recv() => match inbound {
                    Some(msg) => self.on_input(msg),
                    None => break,
                },
                step = self.next_step() => self.on_step(step),
            }
        }

        if let Some(mut session) = self.session.take() {
            session.supersede();
        }
    }

    fn on_tick(&mut self) {
        self.ticks.mark_ready();
        TickReceived {
            node_id: &self.id,
            resumed: self.session.as_ref().is_some_and(QuerySession::is_awaiting_pull),
        }
        .log();
        self.pull();
    }

    fn on_request(&mut self, msg: Message) {
        let context = json!({ "msg": msg.to_value() });
        let rendered = self.context.renderer.render(&self.config.query, &context);

        if let Some(mut previous) = self.session.take() {
            if previous.is_active() {
                SessionSuperseded {
                    node_id: &self.id,
                    group_id: previous.group_id(),
                    emitted: previous.chunk_index(),
                }
                .log();
                previous.supersede();
            }
        }

        let group_id = msg
            .group_id()
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        self.ticks.mark_ready();

        match rendered {
            Ok(query) => {
                let mode = self.config.mode();
                SessionStarted {
                    node_id: &self.id,
                    node_name: self.config.name.as_deref(),
                    group_id: &group_id,
                    streaming: self.config.streaming,
                    rows_per_msg: match mode {
                        QueryMode::Streaming { rows_per_msg } => rows_per_msg,
                        QueryMode::Single => 0,
                    },
                }
                .log();
                self.session = Some(QuerySession::start(
                    msg,
                    query,
                    group_id,
                    mode,
                    Arc::clone(&self.context.pool),
                ));
            }
            Err(err) => {
                let error = SessionError::from(err);
                let message = abort_message(&msg, &group_id, error.describe(&self.config.query));
                self.report_failure(&group_id, &error, message);
            }
        }
    }

    fn pull(&mut self) {
        let ready = self.ticks.is_ready();
        if let Some(session) = self.session.as_mut() {
            if session.pull(ready) == Pull::Deferred {
                PullDeferred {
                    node_id: &self.id,
                    group_id: session.group_id(),
                    next_index: session.chunk_index(),
                }
                .log();
            }
        }
    }

    fn report_failure(&mut self, group_id: &str, error: &SessionError, message: Message) {
        let query = self
            .session
            .as_ref()
            .filter(|session| session.group_id() == group_id)
            .map_or(self.config.query.as_str(), QuerySession::query);
        SessionFailed {
            node_id: &self.id,
            node_name: self.config.name.as_deref(),
            group_id,
            query,
            error,
        }
        .log();
        self.emit(message);
    }

    /// Sends downstream and waits for the next tick.
    fn emit(&mut self, message: Message) {
        self.ticks.mark_busy();
        self.context.host.send(&self.id, message);
    }

    fn notify_upstream(&self) {
        if let Some(upstream) = self.ticks.notify_upstream(self.context.host.as_ref()) {
            UpstreamTicked {
                node_id: &self.id,
                upstream,
            }
            .log();
        }
    }
}

fn row_count(message: &Message) -> usize {
    match &message.payload {
        serde_json::Value::Array(rows) => rows.len(),
        _ => 1,
    }
}
