// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::backends::{HandlebarsRenderer, MemoryDatabase, MemoryPool, PoolStats};
use crate::config::{validate_flow, FlowConfig, NodeConfig, NodeKind, PoolConfig};
use crate::engine::{QueryNode, QueryNodeContext};
use crate::errors::{ConfigError, RuntimeError};
use crate::graph::{Graph, NodeDescriptor};
use crate::message::Message;
use crate::observability::messages::runtime::{NodeFailed, NodeStopped, RuntimeStarted};
use crate::observability::messages::StructuredLog;
use crate::runtime::host::LocalHost;
use crate::runtime::nodes::{DebugNode, FlowNode, InjectDefaults, InjectNode, Observed};
use crate::traits::{ConnectionPool, NodeHost, QueryRenderer};

/// Builds the flow graph from node configuration.
pub fn build_graph(config: &FlowConfig) -> Graph {
    config
        .nodes
        .iter()
        .map(|node| NodeDescriptor {
            id: node.id.clone(),
            kind: node.kind.as_str().to_string(),
            capabilities: node.capabilities(),
            wires: node.wires.clone(),
        })
        .collect()
}

/// Builds an in-memory pool with the scripted results of `config`.
pub fn build_pool(config: &PoolConfig) -> MemoryPool {
    let mut database = MemoryDatabase::new();
    for fixture in &config.queries {
        database = match (&fixture.error, fixture.fail_read_at) {
            (Some(error), _) => database.with_error(&fixture.query, error),
            (None, Some(read_index)) => database.with_read_failure(&fixture.query, fixture.rows.clone(), read_index),
            (None, None) => database.with_rows(&fixture.query, fixture.rows.clone()),
        };
    }
    if let Some(latency) = config.latency() {
        database = database.with_latency(latency);
    }

    let pool = MemoryPool::new(database, config.max_connections);
    match config.connect_timeout() {
        Some(timeout) => pool.with_connect_timeout(timeout),
        None => pool,
    }
}

/// A running flow: one task per node, wired through a [`LocalHost`].
///
/// Must be started from within a tokio runtime. Dropping it stops every node.
pub struct FlowRuntime {
    host: Arc<LocalHost>,
    pools: HashMap<String, Arc<MemoryPool>>,
    observed: mpsc::UnboundedReceiver<Observed>,
    shutdown: CancellationToken,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl FlowRuntime {
    /// Validates `config`, then builds and spawns every node.
    pub fn start(config: &FlowConfig) -> Result<Self, RuntimeError> {
        validate_flow(config).map_err(|errors| RuntimeError::Config(ConfigError::Invalid(errors)))?;

        let graph = Arc::new(build_graph(config));
        let pools: HashMap<String, Arc<MemoryPool>> = config
            .pools
            .iter()
            .map(|pool| (pool.id.clone(), Arc::new(build_pool(pool))))
            .collect();

        let mut senders = HashMap::new();
        let mut inboxes = HashMap::new();
        for node in &config.nodes {
            let (tx, rx) = mpsc::unbounded_channel();
            senders.insert(node.id.clone(), tx);
            inboxes.insert(node.id.clone(), rx);
        }

        let host = Arc::new(LocalHost::new(Arc::clone(&graph), senders));
        let (observer, observed) = mpsc::unbounded_channel();
        let renderer: Arc<dyn QueryRenderer> = Arc::new(HandlebarsRenderer::new());

        let mut nodes = Vec::with_capacity(config.nodes.len());
        for node in &config.nodes {
            let built = Self::build_node(node, &pools, &renderer, &host, &graph, &observer)?;
            nodes.push(built);
        }

        let shutdown = CancellationToken::new();
        let mut tasks = Vec::with_capacity(nodes.len());
        for node in nodes {
            let id = node.id().to_string();
            let inbox = inboxes
                .remove(&id)
                .ok_or_else(|| RuntimeError::UnknownNode(id.clone()))?;
            let token = shutdown.clone();
            let task_id = id.clone();
            let task = tokio::spawn(async move {
                node.run(inbox, token).await;
                NodeStopped { node_id: &task_id }.log();
            });
            tasks.push((id, task));
        }

        RuntimeStarted {
            node_count: tasks.len(),
        }
        .log();

        Ok(Self {
            host,
            pools,
            observed,
            shutdown,
            tasks,
        })
    }

    fn build_node(
        node: &NodeConfig,
        pools: &HashMap<String, Arc<MemoryPool>>,
        renderer: &Arc<dyn QueryRenderer>,
        host: &Arc<LocalHost>,
        graph: &Arc<Graph>,
        observer: &mpsc::UnboundedSender<Observed>,
    ) -> Result<Box<dyn FlowNode>, RuntimeError> {
        let node_host: Arc<dyn NodeHost> = Arc::clone(host) as Arc<dyn NodeHost>;

        let built: Box<dyn FlowNode> = match node.kind {
            NodeKind::Postgresql => {
                let pool_id = node.pool.as_deref().unwrap_or_default();
                let pool = pools.get(pool_id).ok_or_else(|| RuntimeError::NodeCreationFailed {
                    node_id: node.id.clone(),
                    kind: node.kind.as_str().to_string(),
                    reason: format!("connection pool '{}' is not declared", pool_id),
                })?;
                let context = QueryNodeContext {
                    pool: Arc::clone(pool) as Arc<dyn ConnectionPool>,
                    renderer: Arc::clone(renderer),
                    host: node_host,
                    graph: Arc::clone(graph),
                };
                Box::new(QueryNode::new(node.id.clone(), node.query_settings(), context))
            }
            NodeKind::Inject => {
                let defaults = InjectDefaults {
                    payload: node.payload.clone(),
                    params: node.params.clone(),
                    topic: node.topic.clone(),
                };
                let paced = InjectNode::has_tick_provider(&node.id, graph);
                Box::new(InjectNode::new(node.id.clone(), defaults, node_host, paced))
            }
            NodeKind::Debug => Box::new(DebugNode::new(
                node.id.clone(),
                node.tick,
                observer.clone(),
                node_host,
                Arc::clone(graph),
            )),
        };
        Ok(built)
    }

    pub fn graph(&self) -> &Graph {
        self.host.graph()
    }

    /// Ids of the inject nodes, in flow order.
    pub fn inject_nodes(&self) -> Vec<String> {
        self.graph()
            .iter()
            .filter(|node| node.kind == NodeKind::Inject.as_str())
            .map(|node| node.id.clone())
            .collect()
    }

    /// Hands `msg` to the input of `node_id`.
    pub fn inject(&self, node_id: &str, msg: Message) -> Result<(), RuntimeError> {
        if !self.host.has_node(node_id) {
            return Err(RuntimeError::UnknownNode(node_id.to_string()));
        }
        self.host
            .try_deliver(node_id, msg)
            .map_err(|_| RuntimeError::NodeStopped(node_id.to_string()))
    }

    /// Next message seen by any debug node; `None` once all of them stopped.
    pub async fn next_observed(&mut self) -> Option<Observed> {
        self.observed.recv().await
    }

    pub fn pool_stats(&self, pool_id: &str) -> Option<PoolStats> {
        self.pools.get(pool_id).map(|pool| pool.stats())
    }

    /// Stops every node and waits for their tasks to finish.
    pub async fn shutdown(mut self) {
        self.shutdown.cancel();
        for (node_id, task) in self.tasks.drain(..) {
            if let Err(err) = task.await {
                NodeFailed {
                    node_id: &node_id,
                    error: &err.to_string(),
                }
                .log();
            }
        }
    }
}

impl Drop for FlowRuntime {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
