// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Flow validation.
//!
//! A flow is checked in one pass and every problem found is reported, so a
//! broken flow file can be fixed in one edit:
//!
//! 1. **Uniqueness**: node ids and pool ids are unique
//! 2. **Wiring**: every wire points at a node of the flow
//! 3. **Query nodes**: each names a declared pool and has query text
//!
//! Cycles are allowed. Node-RED flows commonly loop a node back to an earlier
//! one, and nothing in the runtime walks the graph transitively.
//!
//! # Example
//! ```rust
//! use the_sluice::config::validate_flow;
//! use the_sluice::errors::ValidationError;
//!
//! let flow = serde_yaml::from_str(r#"
//! nodes:
//!   - id: a
//!     type: inject
//!     wires: [[b]]
//! "#).unwrap();
//!
//! let errors = validate_flow(&flow).unwrap_err();
//! assert!(matches!(&errors[0], ValidationError::UnresolvedWire { missing_target, .. } if missing_target == "b"));
//! ```

use std::collections::HashSet;

use crate::config::{FlowConfig, NodeKind};
use crate::errors::ValidationError;

/// Validates a flow, collecting every problem found.
pub fn validate_flow(config: &FlowConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    errors.extend(unique_ids(config));
    errors.extend(wire_targets(config));
    errors.extend(query_nodes(config));

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn unique_ids(config: &FlowConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    let mut seen_nodes = HashSet::new();
    for node in &config.nodes {
        if !seen_nodes.insert(node.id.as_str()) {
            errors.push(ValidationError::DuplicateNodeId {
                node_id: node.id.clone(),
            });
        }
    }

    let mut seen_pools = HashSet::new();
    for pool in &config.pools {
        if !seen_pools.insert(pool.id.as_str()) {
            errors.push(ValidationError::DuplicatePoolId {
                pool_id: pool.id.clone(),
            });
        }
    }

    errors
}

fn wire_targets(config: &FlowConfig) -> Vec<ValidationError> {
    let node_ids: HashSet<&str> = config.nodes.iter().map(|n| n.id.as_str()).collect();
    let mut errors = Vec::new();

    for node in &config.nodes {
        for (port, targets) in node.wires.iter().enumerate() {
            for target in targets {
                if !node_ids.contains(target.as_str()) {
                    errors.push(ValidationError::UnresolvedWire {
                        node_id: node.id.clone(),
                        port,
                        missing_target: target.clone(),
                    });
                }
            }
        }
    }

    errors
}

fn query_nodes(config: &FlowConfig) -> Vec<ValidationError> {
    let pool_ids: HashSet<&str> = config.pools.iter().map(|p| p.id.as_str()).collect();
    let mut errors = Vec::new();

    for node in config.nodes.iter().filter(|n| n.kind == NodeKind::Postgresql) {
        match node.pool.as_deref() {
            None => errors.push(ValidationError::MissingPool {
                node_id: node.id.clone(),
            }),
            Some(pool_id) if !pool_ids.contains(pool_id) => errors.push(ValidationError::UnknownPool {
                node_id: node.id.clone(),
                pool_id: pool_id.to_string(),
            }),
            Some(_) => {}
        }

        if node.query.as_deref().map_or(true, |q| q.trim().is_empty()) {
            errors.push(ValidationError::MissingQuery {
                node_id: node.id.clone(),
            });
        }
    }

    errors
}
