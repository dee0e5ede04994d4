// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! In-memory database backend.
//!
//! Query text is matched verbatim against scripted results; there is no SQL
//! engine behind it. The pool bounds concurrent connections with a semaphore
//! and counts every acquire, release, cursor open and close in [`PoolStats`],
//! which makes it the backend of choice for tests and demo flows.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::errors::DatabaseError;
use crate::traits::{Connection, ConnectionPool, Cursor, ResultSet};

/// Scripted outcome for one query text.
#[derive(Debug, Clone, Default)]
struct Script {
    rows: Vec<Value>,
    error: Option<String>,
    /// Zero-based read call that fails mid-stream.
    fail_read_at: Option<usize>,
}

/// Scripted query results shared by every connection of a pool.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatabase {
    scripts: HashMap<String, Script>,
    latency: Option<Duration>,
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, query: impl Into<String>, rows: Vec<Value>) -> Self {
        self.scripts.insert(
            query.into(),
            Script {
                rows,
                ..Default::default()
            },
        );
        self
    }

    /// The query fails as soon as it runs (or on the first cursor read).
    pub fn with_error(mut self, query: impl Into<String>, error: impl Into<String>) -> Self {
        self.scripts.insert(
            query.into(),
            Script {
                error: Some(error.into()),
                ..Default::default()
            },
        );
        self
    }

    /// Cursor reads succeed until read number `read_index`, which fails.
    pub fn with_read_failure(mut self, query: impl Into<String>, rows: Vec<Value>, read_index: usize) -> Self {
        self.scripts.insert(
            query.into(),
            Script {
                rows,
                error: None,
                fail_read_at: Some(read_index),
            },
        );
        self
    }

    /// Delay applied to every execute and cursor read.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn script(&self, query: &str) -> Result<&Script, DatabaseError> {
        self.scripts
            .get(query)
            .ok_or_else(|| DatabaseError::new(format!("no result scripted for query \"{}\"", query)))
    }

    async fn wait(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

/// Counters kept by a [`MemoryPool`].
#[derive(Debug, Default)]
struct Counters {
    acquired: AtomicUsize,
    released: AtomicUsize,
    in_use: AtomicUsize,
    peak_in_use: AtomicUsize,
    cursors_opened: AtomicUsize,
    cursors_closed: AtomicUsize,
    reads: AtomicUsize,
    executions: AtomicUsize,
}

/// Point-in-time copy of a pool's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: usize,
    pub released: usize,
    pub in_use: usize,
    pub peak_in_use: usize,
    pub cursors_opened: usize,
    pub cursors_closed: usize,
    pub reads: usize,
    pub executions: usize,
}

pub struct MemoryPool {
    database: Arc<MemoryDatabase>,
    permits: Arc<Semaphore>,
    connect_timeout: Option<Duration>,
    acquire_error: Option<String>,
    counters: Arc<Counters>,
}

impl MemoryPool {
    pub fn new(database: MemoryDatabase, max_connections: usize) -> Self {
        Self {
            database: Arc::new(database),
            permits: Arc::new(Semaphore::new(max_connections.max(1))),
            connect_timeout: None,
            acquire_error: None,
            counters: Arc::new(Counters::default()),
        }
    }

    /// Fail acquisitions that wait longer than `timeout` for a free connection.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Reject every acquisition with `error`.
    pub fn with_acquire_error(mut self, error: impl Into<String>) -> Self {
        self.acquire_error = Some(error.into());
        self
    }

    pub fn stats(&self) -> PoolStats {
        let c = &self.counters;
        PoolStats {
            acquired: c.acquired.load(Ordering::SeqCst),
            released: c.released.load(Ordering::SeqCst),
            in_use: c.in_use.load(Ordering::SeqCst),
            peak_in_use: c.peak_in_use.load(Ordering::SeqCst),
            cursors_opened: c.cursors_opened.load(Ordering::SeqCst),
            cursors_closed: c.cursors_closed.load(Ordering::SeqCst),
            reads: c.reads.load(Ordering::SeqCst),
            executions: c.executions.load(Ordering::SeqCst),
        }
    }

    async fn permit(&self) -> Result<OwnedSemaphorePermit, DatabaseError> {
        let permits = Arc::clone(&self.permits);
        let acquired = match self.connect_timeout {
            Some(timeout) => tokio::time::timeout(timeout, permits.acquire_owned())
                .await
                .map_err(|_| DatabaseError::new("timeout exceeded when trying to connect"))?,
            None => permits.acquire_owned().await,
        };
        acquired.map_err(|_| DatabaseError::new("connection pool is closed"))
    }
}

#[async_trait]
impl ConnectionPool for MemoryPool {
    async fn acquire(&self) -> Result<Box<dyn Connection>, DatabaseError> {
        if let Some(error) = &self.acquire_error {
            return Err(DatabaseError::new(error.clone()));
        }

        let permit = self.permit().await?;
        let counters = Arc::clone(&self.counters);
        counters.acquired.fetch_add(1, Ordering::SeqCst);
        let in_use = counters.in_use.fetch_add(1, Ordering::SeqCst) + 1;
        counters.peak_in_use.fetch_max(in_use, Ordering::SeqCst);

        Ok(Box::new(MemoryConnection {
            database: Arc::clone(&self.database),
            counters,
            _permit: permit,
        }))
    }
}

pub struct MemoryConnection {
    database: Arc<MemoryDatabase>,
    counters: Arc<Counters>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn execute(&mut self, query: &str, _params: &[Value]) -> Result<ResultSet, DatabaseError> {
        self.database.wait().await;
        self.counters.executions.fetch_add(1, Ordering::SeqCst);

        let script = self.database.script(query)?;
        match &script.error {
            Some(error) => Err(DatabaseError::new(error.clone())),
            None => Ok(ResultSet::select(script.rows.clone())),
        }
    }

    fn open_cursor(&mut self, query: &str, _params: &[Value]) -> Result<Box<dyn Cursor>, DatabaseError> {
        self.counters.cursors_opened.fetch_add(1, Ordering::SeqCst);

        // Like a real portal, problems with the query surface on the first read.
        let script = self.database.script(query).cloned().unwrap_or_else(|err| Script {
            error: Some(err.message),
            ..Default::default()
        });

        Ok(Box::new(MemoryCursor {
            database: Arc::clone(&self.database),
            counters: Arc::clone(&self.counters),
            rows: script.rows.into(),
            error: script.error,
            fail_read_at: script.fail_read_at,
            reads: 0,
        }))
    }

    fn release(self: Box<Self>, _force: bool) {
        self.counters.released.fetch_add(1, Ordering::SeqCst);
        self.counters.in_use.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MemoryCursor {
    database: Arc<MemoryDatabase>,
    counters: Arc<Counters>,
    rows: VecDeque<Value>,
    error: Option<String>,
    fail_read_at: Option<usize>,
    reads: usize,
}

#[async_trait]
impl Cursor for MemoryCursor {
    async fn read(&mut self, max_rows: usize) -> Result<Vec<Value>, DatabaseError> {
        self.database.wait().await;
        self.counters.reads.fetch_add(1, Ordering::SeqCst);

        let read_index = self.reads;
        self.reads += 1;

        if let Some(error) = &self.error {
            return Err(DatabaseError::new(error.clone()));
        }
        if self.fail_read_at == Some(read_index) {
            return Err(DatabaseError::new("Connection terminated unexpectedly"));
        }

        let take = max_rows.min(self.rows.len());
        Ok(self.rows.drain(..take).collect())
    }

    fn close(self: Box<Self>) {
        self.counters.cursors_closed.fetch_add(1, Ordering::SeqCst);
    }
}
