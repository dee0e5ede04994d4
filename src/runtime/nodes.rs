// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Node tasks the local runtime can spawn.
//!
//! Besides the query node, a flow needs something to feed it and something to
//! watch its output: [`InjectNode`] and [`DebugNode`].

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::engine::{QueryNode, TickCoordinator};
use crate::graph::{Graph, TickCapable};
use crate::message::Message;
use crate::observability::messages::dispatch::UpstreamTicked;
use crate::observability::messages::StructuredLog;
use crate::traits::NodeHost;

/// A node that runs as its own task, fed by one inbox.
#[async_trait]
pub trait FlowNode: Send {
    fn id(&self) -> &str;

    /// Runs until the inbox closes or `shutdown` fires.
    async fn run(self: Box<Self>, inbox: mpsc::UnboundedReceiver<Message>, shutdown: CancellationToken);
}

#[async_trait]
impl FlowNode for QueryNode {
    fn id(&self) -> &str {
        QueryNode::id(self)
    }

    async fn run(self: Box<Self>, inbox: mpsc::UnboundedReceiver<Message>, shutdown: CancellationToken) {
        QueryNode::run(*self, inbox, shutdown).await
    }
}

/// A message that reached a debug node.
#[derive(Debug, Clone, PartialEq)]
pub struct Observed {
    pub node_id: String,
    pub message: Message,
}

/// Values an inject node fills into messages that lack them.
#[derive(Debug, Clone, Default)]
pub struct InjectDefaults {
    pub payload: Option<Value>,
    pub params: Vec<Value>,
    pub topic: Option<String>,
}

impl InjectDefaults {
    fn apply(&self, mut msg: Message) -> Message {
        if msg.payload.is_null() {
            if let Some(payload) = &self.payload {
                msg.payload = payload.clone();
            }
        }
        if msg.params.is_empty() {
            msg.params = self.params.clone();
        }
        if let Some(topic) = &self.topic {
            msg.extra
                .entry("topic")
                .or_insert_with(|| Value::String(topic.clone()));
        }
        msg
    }
}

/// Entry point of a flow.
///
/// Messages injected into it are forwarded downstream. When `paced`, only one
/// message is outstanding at a time: the next one leaves after a tick arrives.
pub struct InjectNode {
    id: String,
    defaults: InjectDefaults,
    host: Arc<dyn NodeHost>,
    paced: bool,
    ready: bool,
    queue: VecDeque<Message>,
}

impl InjectNode {
    pub fn new(id: impl Into<String>, defaults: InjectDefaults, host: Arc<dyn NodeHost>, paced: bool) -> Self {
        Self {
            id: id.into(),
            defaults,
            host,
            paced,
            ready: true,
            queue: VecDeque::new(),
        }
    }

    /// Whether some node wired after `id` sends ticks back.
    pub fn has_tick_provider(id: &str, graph: &Graph) -> bool {
        graph.get(id).is_some_and(|node| {
            node.downstream()
                .filter_map(|target| graph.get(target))
                .any(|target| target.can_provide_tick())
        })
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn on_input(&mut self, msg: Message) {
        if msg.tick {
            self.ready = true;
        } else {
            self.queue.push_back(self.defaults.apply(msg));
        }
        self.release();
    }

    fn release(&mut self) {
        while self.ready || !self.paced {
            let Some(next) = self.queue.pop_front() else {
                break;
            };
            if self.paced {
                self.ready = false;
            }
            self.host.send(&self.id, next);
        }
    }
}

#[async_trait]
impl FlowNode for InjectNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(self: Box<Self>, mut inbox: mpsc::UnboundedReceiver<Message>, shutdown: CancellationToken) {
        let mut node = *self;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                inbound = inbox.recv() => match inbound {
                    Some(msg) => node.on_input(msg),
                    None => break,
                },
            }
        }
    }
}

/// End of a flow: reports every data message to the runtime's observers and,
/// when `tick` is set, tells its producer it may send the next one.
pub struct DebugNode {
    id: String,
    observer: mpsc::UnboundedSender<Observed>,
    host: Arc<dyn NodeHost>,
    graph: Arc<Graph>,
    tick: bool,
    ticks: TickCoordinator,
}

impl DebugNode {
    pub fn new(
        id: impl Into<String>,
        tick: bool,
        observer: mpsc::UnboundedSender<Observed>,
        host: Arc<dyn NodeHost>,
        graph: Arc<Graph>,
    ) -> Self {
        Self {
            id: id.into(),
            observer,
            host,
            graph,
            tick,
            ticks: TickCoordinator::new(),
        }
    }

    pub fn on_input(&mut self, msg: Message) {
        if msg.tick {
            return;
        }

        // Observers may have gone away; the flow keeps running regardless.
        let _ = self.observer.send(Observed {
            node_id: self.id.clone(),
            message: msg,
        });

        if self.tick {
            if !self.ticks.is_upstream_resolved() {
                self.ticks.resolve_upstream(&self.id, &self.graph);
            }
            if let Some(upstream) = self.ticks.notify_upstream(self.host.as_ref()) {
                UpstreamTicked {
                    node_id: &self.id,
                    upstream,
                }
                .log();
            }
        }
    }
}

#[async_trait]
impl FlowNode for DebugNode {
    fn id(&self) -> &str {
        &self.id
    }

    async fn run(self: Box<Self>, mut inbox: mpsc::UnboundedReceiver<Message>, shutdown: CancellationToken) {
        let mut node = *self;
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                inbound = inbox.recv() => match inbound {
                    Some(msg) => node.on_input(msg),
                    None => break,
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{NodeDescriptor, TickCapabilities};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingHost {
        sent: Mutex<Vec<(String, Message)>>,
        delivered: Mutex<Vec<(String, Message)>>,
    }

    impl NodeHost for RecordingHost {
        fn send(&self, from: &str, msg: Message) {
            self.sent.lock().unwrap().push((from.to_string(), msg));
        }

        fn deliver(&self, to: &str, msg: Message) {
            self.delivered.lock().unwrap().push((to.to_string(), msg));
        }
    }

    fn flow_graph() -> Graph {
        [
            NodeDescriptor::new("in", "inject")
                .with_capabilities(TickCapabilities {
                    provide: false,
                    consume: true,
                })
                .with_port(["q"]),
            NodeDescriptor::new("q", "postgresql")
                .with_capabilities(TickCapabilities::BOTH)
                .with_port(["out"]),
            NodeDescriptor::new("out", "debug").with_capabilities(TickCapabilities {
                provide: true,
                consume: false,
            }),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_paced_inject_waits_for_tick() {
        let host = Arc::new(RecordingHost::default());
        let mut node = InjectNode::new("in", InjectDefaults::default(), host.clone(), true);

        node.on_input(Message::new(json!(1)));
        node.on_input(Message::new(json!(2)));
        assert_eq!(host.sent.lock().unwrap().len(), 1);
        assert_eq!(node.queued(), 1);

        node.on_input(Message::tick());
        let sent = host.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].1.payload, json!(2));
    }

    #[test]
    fn test_unpaced_inject_forwards_immediately() {
        let host = Arc::new(RecordingHost::default());
        let mut node = InjectNode::new("in", InjectDefaults::default(), host.clone(), false);

        node.on_input(Message::new(json!(1)));
        node.on_input(Message::new(json!(2)));
        assert_eq!(host.sent.lock().unwrap().len(), 2);
        assert_eq!(node.queued(), 0);
    }

    #[test]
    fn test_inject_fills_defaults() {
        let host = Arc::new(RecordingHost::default());
        let defaults = InjectDefaults {
            payload: Some(json!({ "since": 0 })),
            params: vec![json!(7)],
            topic: Some("users".into()),
        };
        let mut node = InjectNode::new("in", defaults, host.clone(), false);

        node.on_input(Message::default());
        node.on_input(Message::new(json!("own")).with_field("topic", json!("mine")));

        let sent = host.sent.lock().unwrap();
        assert_eq!(sent[0].1.payload, json!({ "since": 0 }));
        assert_eq!(sent[0].1.params, vec![json!(7)]);
        assert_eq!(sent[0].1.extra.get("topic"), Some(&json!("users")));
        assert_eq!(sent[1].1.payload, json!("own"));
        assert_eq!(sent[1].1.extra.get("topic"), Some(&json!("mine")));
    }

    #[test]
    fn test_has_tick_provider() {
        let graph = flow_graph();
        assert!(InjectNode::has_tick_provider("in", &graph));
        assert!(InjectNode::has_tick_provider("q", &graph));
        assert!(!InjectNode::has_tick_provider("out", &graph));
    }

    #[test]
    fn test_debug_node_observes_and_ticks_producer() {
        let host = Arc::new(RecordingHost::default());
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut node = DebugNode::new("out", true, tx, host.clone(), Arc::new(flow_graph()));

        node.on_input(Message::new(json!({ "id": 1 })));
        node.on_input(Message::tick());

        let observed = rx.try_recv().unwrap();
        assert_eq!(observed.node_id, "out");
        assert_eq!(observed.message.payload, json!({ "id": 1 }));
        assert!(rx.try_recv().is_err());

        let delivered = host.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "q");
        assert!(delivered[0].1.tick);
    }

    #[test]
    fn test_debug_node_without_tick_stays_quiet() {
        let host = Arc::new(RecordingHost::default());
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut node = DebugNode::new("out", false, tx, host.clone(), Arc::new(flow_graph()));

        node.on_input(Message::new(json!(1)));
        assert!(host.delivered.lock().unwrap().is_empty());
    }
}
