// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod runtime;
mod session;

pub use config::{ConfigError, ValidationError};
pub use runtime::RuntimeError;
pub use session::{DatabaseError, SessionError, TemplateError};
