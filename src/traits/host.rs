// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::message::Message;

/// What a node sees of the runtime hosting it.
pub trait NodeHost: Send + Sync {
    /// Sends `msg` from node `from` along all of its output wires.
    fn send(&self, from: &str, msg: Message);

    /// Hands `msg` straight to node `to`, as if it had arrived on its input.
    fn deliver(&self, to: &str, msg: Message);
}
