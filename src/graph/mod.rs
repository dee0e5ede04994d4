// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The flow graph: nodes, their wiring, and their flow-control capabilities.
//!
//! A [`Graph`] is built once from configuration and shared by every node as an
//! `Arc<Graph>`; wiring is immutable afterwards. Only forward wires are stored.
//! Who feeds a given node is answered by scanning them, see
//! [`find_upstream_producer`].

mod inspector;

pub use inspector::find_upstream_producer;

use std::collections::HashMap;

/// Flow-control abilities a node declares to its neighbours.
///
/// * `can_provide_tick` - the node sends ticks upstream when it finished
///   consuming a unit of work
/// * `can_consume_tick` - the node paces its own output on ticks it receives
pub trait TickCapable {
    fn can_provide_tick(&self) -> bool {
        false
    }

    fn can_consume_tick(&self) -> bool {
        false
    }
}

/// Plain capability flags, as declared in a flow file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickCapabilities {
    pub provide: bool,
    pub consume: bool,
}

impl TickCapabilities {
    pub const NONE: Self = Self {
        provide: false,
        consume: false,
    };

    pub const BOTH: Self = Self {
        provide: true,
        consume: true,
    };
}

impl TickCapable for TickCapabilities {
    fn can_provide_tick(&self) -> bool {
        self.provide
    }

    fn can_consume_tick(&self) -> bool {
        self.consume
    }
}

/// A vertex of the flow graph.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDescriptor {
    pub id: String,
    /// Node type name, e.g. `postgresql`.
    pub kind: String,
    pub capabilities: TickCapabilities,
    /// Output port index -> downstream node ids, in wiring order.
    pub wires: Vec<Vec<String>>,
}

impl NodeDescriptor {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            capabilities: TickCapabilities::NONE,
            wires: Vec::new(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: TickCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Appends an output port wired to `targets`.
    pub fn with_port<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.wires.push(targets.into_iter().map(Into::into).collect());
        self
    }

    /// Every downstream id over all ports, in wiring order.
    pub fn downstream(&self) -> impl Iterator<Item = &String> {
        self.wires.iter().flatten()
    }
}

impl TickCapable for NodeDescriptor {
    fn can_provide_tick(&self) -> bool {
        self.capabilities.can_provide_tick()
    }

    fn can_consume_tick(&self) -> bool {
        self.capabilities.can_consume_tick()
    }
}

/// All nodes of a flow, in insertion order.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<NodeDescriptor>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a node; a node with the same id replaces the earlier one in place.
    pub fn insert(&mut self, node: NodeDescriptor) {
        match self.index.get(&node.id) {
            Some(&position) => self.nodes[position] = node,
            None => {
                self.index.insert(node.id.clone(), self.nodes.len());
                self.nodes.push(node);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&NodeDescriptor> {
        self.index.get(id).map(|&position| &self.nodes[position])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeDescriptor> {
        self.nodes.iter()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl FromIterator<NodeDescriptor> for Graph {
    fn from_iter<T: IntoIterator<Item = NodeDescriptor>>(iter: T) -> Self {
        let mut graph = Graph::new();
        for node in iter {
            graph.insert(node);
        }
        graph
    }
}
