// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the query session lifecycle.
//!
//! This module contains message types for logging events related to:
//! * Session start and connection acquisition
//! * Chunk emission and deferred pulls
//! * Completion, failure and supersession

use crate::errors::SessionError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A new session was started for an inbound request.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SessionStarted<'a> {
    pub node_id: &'a str,
    /// Display name from the flow file, if any.
    pub node_name: Option<&'a str>,
    pub group_id: &'a str,
    pub streaming: bool,
    pub rows_per_msg: usize,
}

impl Display for SessionStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.streaming {
            write!(
                f,
                "Node '{}' started streaming session {} ({} rows per message)",
                self.node_id, self.group_id, self.rows_per_msg
            )
        } else {
            write!(
                f,
                "Node '{}' started single-result session {}",
                self.node_id, self.group_id
            )
        }
    }
}

impl StructuredLog for SessionStarted<'_> {
    fn log(&self) {
        tracing::info!(
            node_id = self.node_id,
            node_name = self.node_name,
            group_id = self.group_id,
            streaming = self.streaming,
            rows_per_msg = self.rows_per_msg,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "session",
            span_name = name,
            node_id = self.node_id,
            group_id = self.group_id,
            streaming = self.streaming,
        )
    }
}

/// Connection obtained from the pool.
///
/// # Log Level
/// `debug!`
pub struct ConnectionAcquired<'a> {
    pub node_id: &'a str,
    pub group_id: &'a str,
}

impl Display for ConnectionAcquired<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' acquired a connection for session {}",
            self.node_id, self.group_id
        )
    }
}

impl StructuredLog for ConnectionAcquired<'_> {
    fn log(&self) {
        tracing::debug!(node_id = self.node_id, group_id = self.group_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "connection_acquired",
            span_name = name,
            node_id = self.node_id,
            group_id = self.group_id,
        )
    }
}

/// A chunk of rows was sent downstream.
///
/// # Log Level
/// `debug!` - one per chunk, too chatty for `info!`
pub struct ChunkEmitted<'a> {
    pub node_id: &'a str,
    pub group_id: &'a str,
    pub index: u64,
    pub rows: usize,
}

impl Display for ChunkEmitted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' emitted chunk {} of session {} ({} rows)",
            self.node_id, self.index, self.group_id, self.rows
        )
    }
}

impl StructuredLog for ChunkEmitted<'_> {
    fn log(&self) {
        tracing::debug!(
            node_id = self.node_id,
            group_id = self.group_id,
            index = self.index,
            rows = self.rows,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "chunk_emitted",
            span_name = name,
            node_id = self.node_id,
            group_id = self.group_id,
            index = self.index,
        )
    }
}

/// A pull was requested while downstream was not ready.
///
/// # Log Level
/// `trace!`
pub struct PullDeferred<'a> {
    pub node_id: &'a str,
    pub group_id: &'a str,
    pub next_index: u64,
}

impl Display for PullDeferred<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' waiting for downstream before reading chunk {} of session {}",
            self.node_id, self.next_index, self.group_id
        )
    }
}

impl StructuredLog for PullDeferred<'_> {
    fn log(&self) {
        tracing::trace!(
            node_id = self.node_id,
            group_id = self.group_id,
            next_index = self.next_index,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!(
            "pull_deferred",
            span_name = name,
            node_id = self.node_id,
            group_id = self.group_id,
        )
    }
}

/// The session finished successfully and released its resources.
///
/// # Log Level
/// `info!` - Important operational event
pub struct SessionCompleted<'a> {
    pub node_id: &'a str,
    pub group_id: &'a str,
    /// Messages sent for the group, the final one included.
    pub chunk_count: u64,
}

impl Display for SessionCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' completed session {} after {} messages",
            self.node_id, self.group_id, self.chunk_count
        )
    }
}

impl StructuredLog for SessionCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            node_id = self.node_id,
            group_id = self.group_id,
            chunk_count = self.chunk_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "session_completed",
            span_name = name,
            node_id = self.node_id,
            group_id = self.group_id,
            chunk_count = self.chunk_count,
        )
    }
}

/// The session failed; an abort message follows.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct SessionFailed<'a> {
    pub node_id: &'a str,
    pub node_name: Option<&'a str>,
    pub group_id: &'a str,
    pub query: &'a str,
    pub error: &'a SessionError,
}

impl Display for SessionFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' session {} failed: {} (query: {})",
            self.node_id, self.group_id, self.error, self.query
        )
    }
}

impl StructuredLog for SessionFailed<'_> {
    fn log(&self) {
        tracing::error!(
            node_id = self.node_id,
            node_name = self.node_name,
            group_id = self.group_id,
            kind = self.error.kind(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "session_failed",
            span_name = name,
            node_id = self.node_id,
            group_id = self.group_id,
            error = %self.error,
        )
    }
}

/// A newer request replaced the session before it finished.
///
/// # Log Level
/// `info!`
pub struct SessionSuperseded<'a> {
    pub node_id: &'a str,
    pub group_id: &'a str,
    /// Chunks already sent for the abandoned group.
    pub emitted: u64,
}

impl Display for SessionSuperseded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Node '{}' abandoned session {} after {} chunks: superseded by a new request",
            self.node_id, self.group_id, self.emitted
        )
    }
}

impl StructuredLog for SessionSuperseded<'_> {
    fn log(&self) {
        tracing::info!(
            node_id = self.node_id,
            group_id = self.group_id,
            emitted = self.emitted,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "session_superseded",
            span_name = name,
            node_id = self.node_id,
            group_id = self.group_id,
        )
    }
}
