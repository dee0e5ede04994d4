// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Collaborator implementations shipped with the crate.
//!
//! # Available Backends
//!
//! ## Memory
//! A connection pool over scripted query results. Connections are bounded by
//! a semaphore, reads can be slowed down or made to fail, and every acquire,
//! release and cursor lifecycle event is counted. Used by the demo flows and
//! by the tests.
//!
//! ## Template
//! Query templating with Handlebars, rendering `{{msg.*}}` fields of the
//! inbound message into the query text.

pub mod memory;
pub mod template;

pub use memory::{MemoryDatabase, MemoryPool, PoolStats};
pub use template::HandlebarsRenderer;
