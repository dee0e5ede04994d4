// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_MAX_CONNECTIONS, DEFAULT_ROWS_PER_MSG, NODE_TYPE_DEBUG, NODE_TYPE_INJECT, NODE_TYPE_POSTGRESQL,
};
use crate::engine::QueryNodeConfig;
use crate::errors::ConfigError;
use crate::graph::TickCapabilities;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// A flow: connection pools plus the nodes wired between them.
///
/// # Example
/// ```yaml
/// pools:
///   - id: main
///     max_connections: 4
///     queries:
///       - query: "SELECT * FROM users"
///         rows: [{ id: 1 }, { id: 2 }]
/// nodes:
///   - id: start
///     type: inject
///     wires: [[users]]
///   - id: users
///     type: postgresql
///     pool: main
///     query: "SELECT * FROM users"
///     split: true
///     rows_per_msg: 2
///     wires: [[out]]
///   - id: out
///     type: debug
///     tick: true
/// ```
#[derive(Debug, Deserialize)]
pub struct FlowConfig {
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
    pub nodes: Vec<NodeConfig>,
}

/// A connection pool backed by the in-memory database.
///
/// # Fields
/// * `id` - Name query nodes refer to in their `pool` field
/// * `max_connections` - Connections handed out at once (defaults to 10)
/// * `connect_timeout_ms` - Give up waiting for a free connection after this long
/// * `latency_ms` - Delay added to every query execution and cursor read
/// * `queries` - Scripted results, matched on the rendered query text
#[derive(Debug, Deserialize)]
pub struct PoolConfig {
    pub id: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    pub connect_timeout_ms: Option<u64>,
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub queries: Vec<QueryFixture>,
}

/// Scripted outcome of one query.
///
/// `error` makes the query fail outright; `fail_read_at` makes the cursor read
/// with that zero-based number fail after the earlier reads succeeded.
#[derive(Debug, Deserialize)]
pub struct QueryFixture {
    pub query: String,
    #[serde(default)]
    pub rows: Vec<Value>,
    pub error: Option<String>,
    pub fail_read_at: Option<usize>,
}

/// Node types the local runtime can build.
#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Inject,
    Postgresql,
    Debug,
}

/// A single node of the flow.
///
/// Fields past `wires` only apply to some node types:
/// * postgresql: `pool`, `query`, `split`, `rows_per_msg`
/// * inject: `payload`, `params`, `topic`
/// * debug: `tick`
#[derive(Debug, Deserialize)]
pub struct NodeConfig {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    pub name: Option<String>,
    #[serde(default)]
    pub wires: Vec<Vec<String>>,

    pub pool: Option<String>,
    pub query: Option<String>,
    #[serde(default)]
    pub split: bool,
    pub rows_per_msg: Option<usize>,

    pub payload: Option<Value>,
    #[serde(default)]
    pub params: Vec<Value>,
    pub topic: Option<String>,

    #[serde(default)]
    pub tick: bool,
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Inject => NODE_TYPE_INJECT,
            NodeKind::Postgresql => NODE_TYPE_POSTGRESQL,
            NodeKind::Debug => NODE_TYPE_DEBUG,
        }
    }
}

impl NodeConfig {
    /// Flow-control abilities implied by the node type.
    ///
    /// Query nodes both pace their output on ticks and tick their producer;
    /// inject nodes release queued messages on ticks; debug nodes tick their
    /// producer only when `tick` is set.
    pub fn capabilities(&self) -> TickCapabilities {
        match self.kind {
            NodeKind::Postgresql => TickCapabilities::BOTH,
            NodeKind::Inject => TickCapabilities {
                provide: false,
                consume: true,
            },
            NodeKind::Debug => TickCapabilities {
                provide: self.tick,
                consume: false,
            },
        }
    }

    /// Query settings of a postgresql node; a zero `rows_per_msg` means the default.
    pub fn query_settings(&self) -> QueryNodeConfig {
        QueryNodeConfig {
            name: self.name.clone(),
            query: self.query.clone().unwrap_or_default(),
            streaming: self.split,
            rows_per_msg: self
                .rows_per_msg
                .filter(|rows| *rows > 0)
                .unwrap_or(DEFAULT_ROWS_PER_MSG),
        }
    }
}

impl PoolConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_ms.map(Duration::from_millis)
    }

    pub fn latency(&self) -> Option<Duration> {
        self.latency_ms.map(Duration::from_millis)
    }
}

/// Load a flow from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<FlowConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let cfg: FlowConfig = serde_yaml::from_str(&content)?;
    Ok(cfg)
}

/// Load a flow from a YAML file and check that it can be run
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<FlowConfig, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_flow(&cfg).map_err(ConfigError::Invalid)?;
    Ok(cfg)
}
