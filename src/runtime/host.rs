// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::graph::Graph;
use crate::message::Message;
use crate::observability::messages::runtime::MessageDropped;
use crate::observability::messages::StructuredLog;
use crate::traits::NodeHost;

/// Routes messages between node tasks along the wires of a [`Graph`].
///
/// Every node owns one unbounded inbox; the host keeps the sending halves.
/// Messages to a node whose task has ended are dropped with a warning.
pub struct LocalHost {
    graph: Arc<Graph>,
    inboxes: HashMap<String, mpsc::UnboundedSender<Message>>,
}

impl LocalHost {
    pub fn new(graph: Arc<Graph>, inboxes: HashMap<String, mpsc::UnboundedSender<Message>>) -> Self {
        Self { graph, inboxes }
    }

    pub fn graph(&self) -> &Arc<Graph> {
        &self.graph
    }

    /// Delivers to `to`, handing the message back if the node is unknown or stopped.
    pub fn try_deliver(&self, to: &str, msg: Message) -> Result<(), Message> {
        match self.inboxes.get(to) {
            Some(inbox) => inbox.send(msg).map_err(|returned| returned.0),
            None => Err(msg),
        }
    }

    pub fn has_node(&self, id: &str) -> bool {
        self.inboxes.contains_key(id)
    }
}

impl NodeHost for LocalHost {
    fn send(&self, from: &str, msg: Message) {
        let Some(node) = self.graph.get(from) else {
            MessageDropped { from, to: "<unwired>" }.log();
            return;
        };

        for target in node.downstream() {
            if self.try_deliver(target, msg.clone()).is_err() {
                MessageDropped { from, to: target }.log();
            }
        }
    }

    fn deliver(&self, to: &str, msg: Message) {
        if self.try_deliver(to, msg).is_err() {
            MessageDropped { from: "<direct>", to }.log();
        }
    }
}
