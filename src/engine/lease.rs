// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Owned handles on a pooled connection and an open cursor.
//!
//! A lease gives its resource back exactly once: either through an explicit
//! `release`/`close`, or when it is dropped. Dropping a session, or an
//! in-flight operation holding a lease, therefore always cleans up.

use serde_json::Value;

use crate::errors::DatabaseError;
use crate::traits::{Connection, Cursor, ResultSet};

fn released() -> DatabaseError {
    DatabaseError::new("connection already released")
}

pub struct ConnectionLease {
    connection: Option<Box<dyn Connection>>,
}

impl ConnectionLease {
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    pub fn is_held(&self) -> bool {
        self.connection.is_some()
    }

    pub async fn execute(&mut self, query: &str, params: &[Value]) -> Result<ResultSet, DatabaseError> {
        match self.connection.as_mut() {
            Some(connection) => connection.execute(query, params).await,
            None => Err(released()),
        }
    }

    pub fn open_cursor(&mut self, query: &str, params: &[Value]) -> Result<CursorLease, DatabaseError> {
        let connection = self.connection.as_mut().ok_or_else(released)?;
        connection.open_cursor(query, params).map(CursorLease::new)
    }

    /// Returns the connection to its pool, discarding it rather than reusing it.
    /// Later calls do nothing; returns whether this call released it.
    pub fn release(&mut self) -> bool {
        match self.connection.take() {
            Some(connection) => {
                connection.release(true);
                true
            }
            None => false,
        }
    }
}

impl Drop for ConnectionLease {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct CursorLease {
    cursor: Option<Box<dyn Cursor>>,
}

impl CursorLease {
    pub fn new(cursor: Box<dyn Cursor>) -> Self {
        Self { cursor: Some(cursor) }
    }

    pub fn is_open(&self) -> bool {
        self.cursor.is_some()
    }

    pub async fn read(&mut self, max_rows: usize) -> Result<Vec<Value>, DatabaseError> {
        match self.cursor.as_mut() {
            Some(cursor) => cursor.read(max_rows).await,
            None => Err(DatabaseError::new("cursor already closed")),
        }
    }

    pub fn close(&mut self) -> bool {
        match self.cursor.take() {
            Some(cursor) => {
                cursor.close();
                true
            }
            None => false,
        }
    }
}

impl Drop for CursorLease {
    fn drop(&mut self) {
        self.close();
    }
}
