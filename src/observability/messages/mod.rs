// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.

use tracing::Span;

pub mod dispatch;
pub mod runtime;
pub mod session;

/// A log message that knows its level and its structured fields.
pub trait StructuredLog {
    /// Emits the message as a `tracing` event.
    fn log(&self);

    /// Opens a span carrying the same fields.
    fn span(&self, name: &str) -> Span;
}
