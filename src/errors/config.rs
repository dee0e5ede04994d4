// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use thiserror::Error;

/// Problems found while validating a flow file
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Two nodes share an id
    DuplicateNodeId {
        node_id: String,
    },
    /// A wire points at a node that is not part of the flow
    UnresolvedWire {
        /// The node owning the wire
        node_id: String,
        /// Output port index of the wire
        port: usize,
        /// The id the wire points at
        missing_target: String,
    },
    /// A query node names a pool that is not declared
    UnknownPool {
        node_id: String,
        pool_id: String,
    },
    /// Two pools share an id
    DuplicatePoolId {
        pool_id: String,
    },
    /// A query node has no query text
    MissingQuery {
        node_id: String,
    },
    /// A query node does not name a pool
    MissingPool {
        node_id: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::DuplicateNodeId { node_id } => {
                write!(f, "Duplicate node ID: '{}'", node_id)
            }
            ValidationError::UnresolvedWire {
                node_id,
                port,
                missing_target,
            } => {
                write!(
                    f,
                    "Node '{}' output {} is wired to '{}' which does not exist",
                    node_id, port, missing_target
                )
            }
            ValidationError::UnknownPool { node_id, pool_id } => {
                write!(
                    f,
                    "Node '{}' uses connection pool '{}' which is not declared",
                    node_id, pool_id
                )
            }
            ValidationError::DuplicatePoolId { pool_id } => {
                write!(f, "Duplicate connection pool ID: '{}'", pool_id)
            }
            ValidationError::MissingQuery { node_id } => {
                write!(f, "Query node '{}' has an empty query", node_id)
            }
            ValidationError::MissingPool { node_id } => {
                write!(f, "Query node '{}' does not name a connection pool", node_id)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading a flow file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read flow file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse flow file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Configuration validation failed:\n{}", join_lines(.0))]
    Invalid(Vec<ValidationError>),
}

fn join_lines(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
