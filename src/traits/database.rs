// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::DatabaseError;

/// Full outcome of a query run in one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultSet {
    /// Command tag, e.g. `SELECT`.
    pub command: String,
    pub row_count: u64,
    pub rows: Vec<Value>,
}

impl ResultSet {
    pub fn select(rows: Vec<Value>) -> Self {
        Self {
            command: "SELECT".to_string(),
            row_count: rows.len() as u64,
            rows,
        }
    }
}

/// Shared source of connections. Pools may be shared by many nodes.
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Waits until a connection is available, or fails.
    async fn acquire(&self) -> Result<Box<dyn Connection>, DatabaseError>;
}

/// One connection checked out of a pool.
#[async_trait]
pub trait Connection: Send {
    /// Runs `query` to completion and returns every row.
    async fn execute(&mut self, query: &str, params: &[Value]) -> Result<ResultSet, DatabaseError>;

    /// Opens a server-side cursor. Rows are fetched with [`Cursor::read`].
    fn open_cursor(&mut self, query: &str, params: &[Value]) -> Result<Box<dyn Cursor>, DatabaseError>;

    /// Hands the connection back. With `force` the pool discards it rather
    /// than reusing it.
    fn release(self: Box<Self>, force: bool);
}

#[async_trait]
pub trait Cursor: Send {
    /// Fetches up to `max_rows` rows; an empty batch means the cursor is exhausted.
    async fn read(&mut self, max_rows: usize) -> Result<Vec<Value>, DatabaseError>;

    fn close(self: Box<Self>);
}
