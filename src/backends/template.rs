// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Handlebars-backed query templating.
//!
//! Templates see the inbound message as `msg`, so `{{msg.payload.id}}` or
//! `{{msg.topic}}` resolve against it. Output is HTML-escaped unless the
//! triple-stash form `{{{ ... }}}` is used, and missing fields render empty.

use handlebars::Handlebars;
use serde_json::Value;

use crate::errors::TemplateError;
use crate::traits::QueryRenderer;

pub struct HandlebarsRenderer {
    registry: Handlebars<'static>,
}

impl Default for HandlebarsRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl HandlebarsRenderer {
    pub fn new() -> Self {
        Self {
            registry: Handlebars::new(),
        }
    }
}

impl QueryRenderer for HandlebarsRenderer {
    fn render(&self, template: &str, context: &Value) -> Result<String, TemplateError> {
        self.registry
            .render_template(template, context)
            .map_err(|err| TemplateError(err.to_string()))
    }
}
