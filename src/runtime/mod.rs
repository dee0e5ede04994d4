// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Local host runtime.
//!
//! Runs a flow inside one process: each node is a tokio task with an unbounded
//! inbox, and [`LocalHost`] carries messages along the graph's wires. This is
//! the reference host for query nodes; the demo binary and the end-to-end tests
//! drive flows through [`FlowRuntime`].

mod flow;
mod host;
mod nodes;

pub use flow::{build_graph, build_pool, FlowRuntime};
pub use host::LocalHost;
pub use nodes::{DebugNode, FlowNode, InjectDefaults, InjectNode, Observed};
