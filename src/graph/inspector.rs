// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::{Graph, NodeDescriptor};

/// Finds a node wired to feed `target_id`.
///
/// Nodes are visited in graph order, then each node's ports and targets in
/// wiring order; the first source that lists `target_id` and satisfies
/// `predicate` (when given) wins. A graph with several producers wired into
/// the same input yields whichever is met first.
///
/// Pure lookup: calling it twice on an unchanged graph gives the same answer.
pub fn find_upstream_producer(
    target_id: &str,
    graph: &Graph,
    predicate: Option<&dyn Fn(&NodeDescriptor) -> bool>,
) -> Option<String> {
    graph
        .iter()
        .find(|&source| {
            source.downstream().any(|id| id == target_id)
                && predicate.map_or(true, |accept| accept(source))
        })
        .map(|source| source.id.clone())
}
