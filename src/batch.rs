// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The accumulator that receives raw node/edge events between batch drains (§3, §4.2).

use crate::descriptor::VertexDescriptor;

/// A node-seeded entry: `(type, name)` of a vertex whose intrinsic state changed.
pub type NodeEntry = VertexDescriptor;

/// An edge-seeded entry: `(label, type, name)` of one interesting side of an edge
/// event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgeEntry {
    pub label: String,
    pub vertex: VertexDescriptor,
}

/// `{ NodeList, EdgeList }` from §3 — the raw material a drain walks.
///
/// Mutated only from the listener (L) domain via `push_node`/`push_edge`; read and
/// cleared only from the drain (D) domain via `DependencyTracker::propagate` (§5).
/// Duplicate node entries are preserved deliberately (§4.2, "Filtering rules") — only
/// the drain's `emitted_vertex_ids` set deduplicates, and only for edge-seeded and
/// recursive contributions (§8, P1).
#[derive(Default)]
pub struct PendingBatch {
    nodes: Vec<NodeEntry>,
    edges: Vec<EdgeEntry>,
}

impl PendingBatch {
    pub fn new() -> Self {
        PendingBatch::default()
    }

    pub fn push_node(&mut self, entry: NodeEntry) {
        self.nodes.push(entry);
    }

    pub fn push_edge(&mut self, entry: EdgeEntry) {
        self.edges.push(entry);
    }

    /// Takes ownership of the accumulated entries, leaving an empty batch behind for
    /// the listener domain to accumulate the next one into (§4.3 step 4).
    pub fn take(&mut self) -> (Vec<NodeEntry>, Vec<EdgeEntry>) {
        (std::mem::take(&mut self.nodes), std::mem::take(&mut self.edges))
    }
}
