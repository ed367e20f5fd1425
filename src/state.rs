// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The `VertexState` lifecycle (§3, §4.4): `DETACHED -> ATTACHED(ref=n>=1) -> DETACHED`.
//!
//! A vertex the core has observed at least once carries a `VertexState`: a handle to
//! keep the underlying vertex alive, and an optional consumer-owned snapshot. The
//! distilled spec describes this as attached "via the GraphStore's per-listener slot";
//! the idiomatic rendering here keeps that slot inside the core itself (see the
//! implementation note in SPEC_FULL.md §3), since a `VertexHandle` is already cheap to
//! clone and hold.

use std::sync::Arc;

use fnv::FnvHashMap as HashMap;
use parking_lot::Mutex;

use crate::descriptor::VertexDescriptor;
use crate::store::VertexHandle;

/// One vertex's observed state: the handle that keeps it resolvable, and whatever
/// consumer-opaque snapshot was captured for it at event time.
///
/// §9's design notes ask for "raw observer pointers attached to vertices" to be
/// replaced by reference counts "enforced by the language's ownership primitives"
/// rather than hand-rolled — so there is no atomic refcount field here. `_handle` is
/// held purely to satisfy the vertex-survival invariant (§3): as long as this
/// `Arc<VertexState>` exists, the handle (and whatever it keeps alive on the
/// `GraphStore` side) is not dropped. The `Arc`'s own strong count *is* the refcount;
/// `attach`/`detach` (§4.4) are just the table's `attach_or_get`/`evict`.
pub struct VertexState<H: VertexHandle, S> {
    _handle: H,
    snapshot: Mutex<Option<S>>,
}

impl<H: VertexHandle, S: Clone> VertexState<H, S> {
    fn new(handle: H) -> Arc<Self> {
        Arc::new(VertexState {
            _handle: handle,
            snapshot: Mutex::new(None),
        })
    }

    pub fn snapshot(&self) -> Option<S> {
        self.snapshot.lock().clone()
    }

    pub fn set_snapshot(&self, snapshot: S) {
        *self.snapshot.lock() = Some(snapshot);
    }
}

/// The core's keyed table of live `VertexState`s, one per `(type, name)` it has
/// observed. `attach_or_get`/`evict`/`clear` implement the `attach`/`detach`
/// transitions of §4.4.
pub struct VertexStateTable<H: VertexHandle, S> {
    states: Mutex<HashMap<VertexDescriptor, Arc<VertexState<H, S>>>>,
}

impl<H: VertexHandle, S: Clone> VertexStateTable<H, S> {
    pub fn new() -> Self {
        VertexStateTable {
            states: Mutex::new(HashMap::default()),
        }
    }

    /// Obtain-or-create the `VertexState` for `handle` (§4.2, `on_vertex_event` step 2).
    pub fn attach_or_get(&self, descriptor: VertexDescriptor, handle: H) -> Arc<VertexState<H, S>> {
        self.states
            .lock()
            .entry(descriptor)
            .or_insert_with(|| VertexState::new(handle))
            .clone()
    }

    pub fn get(&self, descriptor: &VertexDescriptor) -> Option<Arc<VertexState<H, S>>> {
        self.states.lock().get(descriptor).cloned()
    }

    /// The `detach` transition (§4.4): drops the table's own reference to
    /// `descriptor`'s state. Called once a deletion for that vertex has been
    /// reported to the consumer (§4.2, "tracked deletion") — there is nothing left
    /// for the core to track once the consumer has been told to drop it. Any copy of
    /// the `Arc` still held by an in-flight `PendingBatch`/`ChangeList` entry keeps
    /// the underlying handle alive until that copy is itself dropped.
    pub fn evict(&self, descriptor: &VertexDescriptor) {
        self.states.lock().remove(descriptor);
    }

    /// `terminate()`: detach and drop every tracked `VertexState`.
    pub fn clear(&self) {
        self.states.lock().clear();
    }

    /// Test-only diagnostic (see `Tracker::tracked_vertex_count`).
    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.states.lock().len()
    }
}

impl<H: VertexHandle, S: Clone> Default for VertexStateTable<H, S> {
    fn default() -> Self {
        Self::new()
    }
}
