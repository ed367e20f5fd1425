// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The external collaborator contract (§6.1): everything the core assumes about the
//! schema-aware metadata store, without knowing anything about its object models.
//!
//! This module is a pure trait boundary. Production wiring of a real IF-MAP-backed
//! store against these traits, and the transport that feeds it, are out of scope
//! (§1) — `src/tests.rs` supplies an in-memory `MockGraphStore` exercising the
//! contract for the scenarios in §8.

use std::sync::Arc;

/// An opaque, cheaply-`Clone`-able reference to a vertex owned by the `GraphStore`.
///
/// Handles are value-like: the core copies them freely into `PendingBatch` and
/// `ChangeList` entries without taking ownership of the underlying vertex (§3,
/// "VertexHandle").
pub trait VertexHandle: Clone + Send + Sync + 'static {
    fn vertex_type(&self) -> &str;
    fn name(&self) -> &str;
    fn is_deleted(&self) -> bool;

    /// The labelled far endpoints reachable by one outgoing hop from this vertex, in
    /// the GraphStore's own iteration order (§4.3's ordering guarantee rests on this
    /// being stable for the duration of a drain).
    fn outgoing_edges(&self) -> Vec<(String, Self)>;
}

/// A listener id returned by `register_listener`, opaque to the core beyond equality
/// (needed to `unregister` on `terminate()`).
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct ListenerId(pub u64);

/// Callback target for vertex-table events (§6.1, `VertexTable.register_listener`).
pub trait VertexSink<H: VertexHandle>: Send + Sync {
    fn on_vertex_event(&self, vertex: H);
}

/// Callback target for edge-table events (§6.1, `EdgeTable.register_listener`).
///
/// Either side may be `None` if the far endpoint of a link is not yet resolvable
/// (creation race, §9 open question); the core treats each side independently and
/// relies on the collaborator to redeliver once the other side resolves.
pub trait EdgeSink<H: VertexHandle>: Send + Sync {
    fn on_edge_event(&self, label: &str, left: Option<H>, right: Option<H>);
}

/// A single vertex table, keyed by type (§6.1).
pub trait VertexTable<H: VertexHandle> {
    fn register_listener(&self, sink: Arc<dyn VertexSink<H>>) -> ListenerId;
    fn unregister(&self, id: ListenerId);
    fn find(&self, name: &str) -> Option<H>;
}

/// The single, process-wide edge table (§6.1).
pub trait EdgeTable<H: VertexHandle> {
    fn register_listener(&self, sink: Arc<dyn EdgeSink<H>>) -> ListenerId;
    fn unregister(&self, id: ListenerId);
}

/// The metadata store collaborator itself: a handle to a vertex-table-per-type plus
/// one edge table.
pub trait GraphStore {
    type Handle: VertexHandle;
    type VertexTable: VertexTable<Self::Handle>;
    type EdgeTable: EdgeTable<Self::Handle>;

    fn find_vertex_table(&self, vertex_type: &str) -> Option<&Self::VertexTable>;
    fn edge_table(&self) -> &Self::EdgeTable;

    /// Resolves a `(type, name)` descriptor to a live handle, or `None` if the vertex
    /// is missing or deleted (§3, "descriptor stability"; §4.3 step 2/3, "stale skip").
    fn resolve(&self, vertex_type: &str, name: &str) -> Option<Self::Handle> {
        let handle = self.find_vertex_table(vertex_type)?.find(name)?;
        if handle.is_deleted() {
            None
        } else {
            Some(handle)
        }
    }
}
