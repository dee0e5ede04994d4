// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The message envelope carried along the wires of a flow.
//!
//! Messages keep the Node-RED shape so that flows written for that runtime read
//! the same here: `payload`, `params`, `parts`, `complete`, and the flow-control
//! flag `tick`. Any other top-level field (`topic`, `_msgid`, ...) is kept in
//! [`Message::extra`] and travels untouched through every node.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Value of [`Parts::kind`] for chunks produced from a row stream.
pub const PARTS_TYPE_ARRAY: &str = "array";

fn is_false(value: &bool) -> bool {
    !*value
}

/// A message travelling between nodes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Pure flow-control signal: "the receiver may now produce the next unit".
    #[serde(default, skip_serializing_if = "is_false")]
    pub tick: bool,

    #[serde(default)]
    pub payload: Value,

    /// Positional query parameters.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<Parts>,

    /// Set on the last message of a streamed group.
    #[serde(default, skip_serializing_if = "is_false")]
    pub complete: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Sequence descriptor shared by all chunks derived from one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parts {
    /// Group id.
    pub id: String,

    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u64>,

    /// Only present on the final chunk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,

    /// Only present when the producer failed; consumers discard the group.
    #[serde(default, skip_serializing_if = "is_false")]
    pub abort: bool,
}

impl Message {
    /// Creates a data message carrying `payload`.
    pub fn new(payload: Value) -> Self {
        Self {
            payload,
            ..Default::default()
        }
    }

    /// Creates a flow-control tick.
    pub fn tick() -> Self {
        Self {
            tick: true,
            ..Default::default()
        }
    }

    pub fn with_params(mut self, params: Vec<Value>) -> Self {
        self.params = params;
        self
    }

    pub fn with_parts(mut self, parts: Parts) -> Self {
        self.parts = Some(parts);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// The group id of an incoming sequence, if the message belongs to one.
    pub fn group_id(&self) -> Option<&str> {
        self.parts
            .as_ref()
            .map(|parts| parts.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn is_abort(&self) -> bool {
        self.parts.as_ref().is_some_and(|parts| parts.abort)
    }

    /// Renders the message as the JSON object handed to query templates.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Parts {
    /// Descriptor of chunk `index` in an array group.
    pub fn chunk(id: impl Into<String>, index: u64) -> Self {
        Self {
            id: id.into(),
            kind: Some(PARTS_TYPE_ARRAY.to_string()),
            index: Some(index),
            ..Default::default()
        }
    }

    /// Descriptor of the last chunk; `count` is the total number of chunks.
    pub fn last_chunk(id: impl Into<String>, index: u64) -> Self {
        Self {
            count: Some(index + 1),
            ..Self::chunk(id, index)
        }
    }

    /// Descriptor telling consumers to drop the partial group.
    pub fn aborted(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            abort: true,
            ..Default::default()
        }
    }
}
