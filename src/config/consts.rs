// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Rows per streamed message when a query node does not say otherwise
pub const DEFAULT_ROWS_PER_MSG: usize = 1;
/// Connections a pool hands out at most when not configured
pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
/// Node type names as they appear in flow files
pub const NODE_TYPE_INJECT: &str = "inject";
pub const NODE_TYPE_POSTGRESQL: &str = "postgresql";
pub const NODE_TYPE_DEBUG: &str = "debug";
