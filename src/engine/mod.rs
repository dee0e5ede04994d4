// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod dispatcher;
pub mod lease;
pub mod session;
pub mod tick;
#[cfg(test)]
mod integration_tests;

pub use dispatcher::{QueryNode, QueryNodeConfig, QueryNodeContext};
pub use lease::{ConnectionLease, CursorLease};
pub use session::{Pull, QueryMode, QuerySession, SessionEvent, SessionState, Step};
pub use tick::TickCoordinator;
