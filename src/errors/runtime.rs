// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use thiserror::Error;

/// Errors raised by the local host runtime while wiring or driving a flow.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("unknown node '{0}'")]
    UnknownNode(String),

    #[error("node '{node_id}' of type '{kind}' cannot be built: {reason}")]
    NodeCreationFailed {
        node_id: String,
        kind: String,
        reason: String,
    },

    #[error("node '{0}' is no longer accepting messages")]
    NodeStopped(String),

    #[error("invalid flow configuration: {0}")]
    Config(#[from] crate::errors::ConfigError),
}
