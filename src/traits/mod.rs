// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Seams between a query node and its collaborators.

pub mod database;
pub mod host;
pub mod renderer;

pub use database::{Connection, ConnectionPool, Cursor, ResultSet};
pub use host::NodeHost;
pub use renderer::QueryRenderer;
