// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Two-role tick bookkeeping for a query node.
//!
//! `downstream_ready` answers "may I emit?" and `upstream` answers "whom do I
//! tell when I am done?". Neither is derived from the other.

use crate::graph::{find_upstream_producer, Graph, NodeDescriptor, TickCapable};
use crate::message::Message;
use crate::traits::NodeHost;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Upstream {
    Unresolved,
    Missing,
    Node(String),
}

#[derive(Debug)]
pub struct TickCoordinator {
    downstream_ready: bool,
    upstream: Upstream,
}

impl Default for TickCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl TickCoordinator {
    pub fn new() -> Self {
        Self {
            downstream_ready: true,
            upstream: Upstream::Unresolved,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.downstream_ready
    }

    /// Downstream asked for more.
    pub fn mark_ready(&mut self) {
        self.downstream_ready = true;
    }

    /// A message went out; wait for the next tick.
    pub fn mark_busy(&mut self) {
        self.downstream_ready = false;
    }

    pub fn is_upstream_resolved(&self) -> bool {
        self.upstream != Upstream::Unresolved
    }

    /// Looks up the upstream tick target the first time it is called and
    /// returns the cached answer afterwards, even if the graph changed.
    pub fn resolve_upstream(&mut self, node_id: &str, graph: &Graph) -> Option<&str> {
        if self.upstream == Upstream::Unresolved {
            let accepts_ticks = |node: &NodeDescriptor| node.can_consume_tick();
            self.upstream = match find_upstream_producer(node_id, graph, Some(&accepts_ticks)) {
                Some(id) => Upstream::Node(id),
                None => Upstream::Missing,
            };
        }
        self.upstream()
    }

    pub fn upstream(&self) -> Option<&str> {
        match &self.upstream {
            Upstream::Node(id) => Some(id),
            Upstream::Unresolved | Upstream::Missing => None,
        }
    }

    /// Tells the upstream producer this node consumed its last unit of work.
    /// Returns the node ticked, if any.
    pub fn notify_upstream(&self, host: &dyn NodeHost) -> Option<&str> {
        let upstream = self.upstream()?;
        host.deliver(upstream, Message::tick());
        Some(upstream)
    }
}
