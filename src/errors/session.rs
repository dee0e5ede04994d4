// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Errors raised while a query session runs.
//!
//! None of these ever reach the host runtime. The dispatcher turns each of them
//! into a single outbound abort message for the session's group.

use thiserror::Error;

/// Failure reported by a database collaborator (pool, connection or cursor).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct DatabaseError {
    pub message: String,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of the templating collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("template error: {0}")]
pub struct TemplateError(pub String);

/// Everything that can end a session early, short of supersession.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Pool exhausted, timed out, or rejected the request.
    #[error("error: {0}")]
    ConnectionAcquisition(#[source] DatabaseError),

    /// The database rejected the query or failed while running it.
    #[error("error: {0}")]
    QueryExecution(#[source] DatabaseError),

    /// Fetching the next batch from an open cursor failed.
    #[error("error: {0}")]
    CursorRead(#[source] DatabaseError),

    /// The query text could not be rendered from the inbound message.
    #[error("{0}")]
    Template(#[from] TemplateError),
}

impl SessionError {
    /// Short name used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SessionError::ConnectionAcquisition(_) => "connection_acquisition",
            SessionError::QueryExecution(_) => "query_execution",
            SessionError::CursorRead(_) => "cursor_read",
            SessionError::Template(_) => "template",
        }
    }

    /// Payload of the abort message: the error followed by the query text.
    pub fn describe(&self, query: &str) -> String {
        format!("{} {}", self, query)
    }
}
