// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::errors::TemplateError;

/// Substitutes message fields into query text.
pub trait QueryRenderer: Send + Sync {
    fn render(&self, template: &str, context: &Value) -> Result<String, TemplateError>;
}
