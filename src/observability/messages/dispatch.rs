// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for inbound dispatch and tick bookkeeping.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// The upstream tick target was looked up. Happens once per node.
///
/// # Log Level
/// `debug!`
pub struct UpstreamResolved<'a> {
    pub node_id: &'a str,
    pub upstream: Option<&'a str>,
}

impl Display for UpstreamResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.upstream {
            Some(upstream) => write!(
                f,
                "Node '{}' will tick upstream node '{}' on completion",
                self.node_id, upstream
            ),
            None => write!(f, "Node '{}' has no upstream node accepting ticks", self.node_id),
        }
    }
}

impl StructuredLog for UpstreamResolved<'_> {
    fn log(&self) {
        tracing::debug!(node_id = self.node_id, upstream = self.upstream, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "upstream_resolved",
            span_name = name,
            node_id = self.node_id,
            upstream = self.upstream,
        )
    }
}

/// Downstream signalled it is ready for the next message.
///
/// # Log Level
/// `trace!`
pub struct TickReceived<'a> {
    pub node_id: &'a str,
    pub resumed: bool,
}

impl Display for TickReceived<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' received a tick", self.node_id)?;
        if self.resumed {
            write!(f, ", resuming its deferred read")?;
        }
        Ok(())
    }
}

impl StructuredLog for TickReceived<'_> {
    fn log(&self) {
        tracing::trace!(node_id = self.node_id, resumed = self.resumed, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("tick_received", span_name = name, node_id = self.node_id)
    }
}

/// A completion tick was sent to the upstream producer.
///
/// # Log Level
/// `debug!`
pub struct UpstreamTicked<'a> {
    pub node_id: &'a str,
    pub upstream: &'a str,
}

impl Display for UpstreamTicked<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Node '{}' ticked upstream node '{}'", self.node_id, self.upstream)
    }
}

impl StructuredLog for UpstreamTicked<'_> {
    fn log(&self) {
        tracing::debug!(node_id = self.node_id, upstream = self.upstream, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "upstream_ticked",
            span_name = name,
            node_id = self.node_id,
            upstream = self.upstream,
        )
    }
}
