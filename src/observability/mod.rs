// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Every diagnostic line the crate emits is described by a message struct in
//! [`messages`]. Each struct implements `Display` for the human readable text
//! and [`messages::StructuredLog`] to emit it through `tracing` at the right
//! level with its fields attached.
//!
//! Messages are organized by subsystem:
//! * `messages::session` - query session lifecycle
//! * `messages::dispatch` - inbound message handling and tick bookkeeping
//! * `messages::runtime` - the local host runtime
//!
//! # Usage
//!
//! ```rust
//! use the_sluice::observability::messages::StructuredLog;
//! use the_sluice::observability::messages::session::SessionCompleted;
//!
//! SessionCompleted {
//!     node_id: "users_query",
//!     group_id: "0b5e",
//!     chunk_count: 4,
//! }
//! .log();
//! ```

pub mod messages;
