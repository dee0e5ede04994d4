// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the local host runtime.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// All node tasks were spawned.
///
/// # Log Level
/// `info!`
pub struct RuntimeStarted {
    pub node_count: usize,
}

impl Display for RuntimeStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Flow runtime started with {} nodes", self.node_count)
    }
}

impl StructuredLog for RuntimeStarted {
    fn log(&self) {
        tracing::info!(node_count = self.node_count, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("runtime", span_name = name, node_count = self.node_count)
    }
}

/// A message could not be handed to its target.
///
/// # Log Level
/// `warn!` - the target is unknown or already stopped
pub struct MessageDropped<'a> {
    pub from: &'a str,
    pub to: &'a str,
}

impl Display for MessageDropped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dropped message from '{}' to '{}': target is not running",
            self.from, self.to
        )
    }
}

impl StructuredLog for MessageDropped<'_> {
    fn log(&self) {
        tracing::warn!(from = self.from, to = self.to, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("message_dropped", span_name = name, from = self.from, to = self.to)
    }
}

/// A node task ended.
///
/// # Log Level
/// `debug!`
pub struct NodeStopped<'a> {
    pub node_id: &'a str,
}

impl Display for NodeStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' stopped", self.node_id)
    }
}

impl StructuredLog for NodeStopped<'_> {
    fn log(&self) {
        tracing::debug!(node_id = self.node_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("node_stopped", span_name = name, node_id = self.node_id)
    }
}

/// A node task panicked or was aborted.
///
/// # Log Level
/// `error!`
pub struct NodeFailed<'a> {
    pub node_id: &'a str,
    pub error: &'a str,
}

impl Display for NodeFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' task failed: {}", self.node_id, self.error)
    }
}

impl StructuredLog for NodeFailed<'_> {
    fn log(&self) {
        tracing::error!(node_id = self.node_id, error = self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("node_failed", span_name = name, node_id = self.node_id)
    }
}
