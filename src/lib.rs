// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // in-memory database, query templating
pub mod config;     // flow files + validation
pub mod engine;     // query node, sessions, tick protocol
pub mod errors;     // error handling
pub mod graph;      // flow graph + upstream lookup
pub mod message;
pub mod observability;
pub mod runtime;    // local host for running flows
pub mod traits;     // seams to pools, renderers, hosts
