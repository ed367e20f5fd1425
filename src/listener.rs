// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The event-facing adapter (§4.2): converts raw `GraphStore` events into
//! `PendingBatch` entries, captures consumer snapshots at event time, and arms a
//! single-shot drain trigger.
//!
//! `ConfigListener` is the sole inhabitant of the listener (L) concurrency domain
//! (§5): every method here may run concurrently with `DependencyTracker::propagate`
//! (the D domain) only insofar as they touch disjoint state; the `parking_lot::Mutex`
//! fields enforce the documented mutual exclusion over the shared `PendingBatch` and
//! `VertexState` table.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::batch::{EdgeEntry, PendingBatch};
use crate::change_list::ChangeListEntry;
use crate::descriptor::VertexDescriptor;
use crate::policy::{ConfigurationError, ReactionPolicy, SELF};
use crate::state::VertexStateTable;
use crate::store::{EdgeSink, EdgeTable, GraphStore, ListenerId, VertexHandle, VertexSink, VertexTable};

/// Captures a consumer-owned, opaque snapshot of a vertex at event time (§4.5). A
/// deleted vertex is never offered to this hook; callers see `None` directly from
/// `on_vertex_event`'s deletion handling instead.
pub trait SnapshotCapture<H: VertexHandle, S>: Send + Sync {
    fn capture(&self, vertex: &H) -> Option<S>;
}

impl<H, S, F> SnapshotCapture<H, S> for F
where
    H: VertexHandle,
    F: Fn(&H) -> Option<S> + Send + Sync,
{
    fn capture(&self, vertex: &H) -> Option<S> {
        self(vertex)
    }
}

pub struct ConfigListener<Store: GraphStore, S> {
    policy: Arc<ReactionPolicy>,
    states: Arc<VertexStateTable<Store::Handle, S>>,
    capture: Box<dyn SnapshotCapture<Store::Handle, S>>,
    batch: Mutex<PendingBatch>,
    pending_emits: Mutex<Vec<ChangeListEntry<S>>>,
    armed: AtomicBool,
    vertex_listeners: Mutex<Vec<(String, ListenerId)>>,
    edge_listener: Mutex<Option<ListenerId>>,
}

impl<Store: GraphStore + 'static, S: Clone + Send + Sync + 'static> ConfigListener<Store, S> {
    pub fn new(
        policy: Arc<ReactionPolicy>,
        states: Arc<VertexStateTable<Store::Handle, S>>,
        capture: impl SnapshotCapture<Store::Handle, S> + 'static,
    ) -> Self {
        ConfigListener {
            policy,
            states,
            capture: Box::new(capture),
            batch: Mutex::new(PendingBatch::new()),
            pending_emits: Mutex::new(Vec::new()),
            armed: AtomicBool::new(false),
            vertex_listeners: Mutex::new(Vec::new()),
            edge_listener: Mutex::new(None),
        }
    }

    /// `initialize(graph_store, policy, emit_callback)` (§4.2): registers a listener
    /// on the edge table and one listener on each vertex table the policy names.
    /// Idempotent would require tearing down prior registrations first; this crate's
    /// contract is that `initialize` is called exactly once per `terminate`-bounded
    /// lifetime (§6.2).
    pub fn initialize(self: &Arc<Self>, store: &Store) -> Result<(), ConfigurationError> {
        let mut vertex_listeners = Vec::new();
        for vertex_type in self.policy.vertex_types() {
            let table = store
                .find_vertex_table(vertex_type)
                .ok_or_else(|| ConfigurationError {
                    vertex_type: vertex_type.to_string(),
                })?;
            let sink: Arc<dyn VertexSink<Store::Handle>> = self.clone();
            let id = table.register_listener(sink);
            vertex_listeners.push((vertex_type.to_string(), id));
        }
        let edge_sink: Arc<dyn EdgeSink<Store::Handle>> = self.clone();
        let edge_listener_id = store.edge_table().register_listener(edge_sink);

        log::info!(
            "config listener initialized: {} vertex tables, 1 edge table",
            vertex_listeners.len()
        );
        *self.vertex_listeners.lock() = vertex_listeners;
        *self.edge_listener.lock() = Some(edge_listener_id);
        Ok(())
    }

    /// `terminate()`: unregisters all listeners, detaches every `VertexState`, and
    /// discards any unread `PendingBatch`.
    pub fn terminate(&self, store: &Store) {
        for (vertex_type, id) in self.vertex_listeners.lock().drain(..) {
            if let Some(table) = store.find_vertex_table(&vertex_type) {
                table.unregister(id);
            }
        }
        if let Some(id) = self.edge_listener.lock().take() {
            store.edge_table().unregister(id);
        }
        self.states.clear();
        *self.batch.lock() = PendingBatch::new();
        self.pending_emits.lock().clear();
        self.armed.store(false, Ordering::SeqCst);
        log::info!("config listener terminated");
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::SeqCst)
    }

    /// Drains the accumulated `PendingBatch` for the drain (D) domain to walk,
    /// disarming the trigger. Returns the node seeds, edge seeds, and the
    /// undeduplicated event-time emissions collected since the last call.
    #[allow(clippy::type_complexity)]
    pub fn take_pending(
        &self,
    ) -> (
        Vec<VertexDescriptor>,
        Vec<EdgeEntry>,
        Vec<ChangeListEntry<S>>,
    ) {
        let (nodes, edges) = self.batch.lock().take();
        let emits = std::mem::take(&mut *self.pending_emits.lock());
        self.armed.store(false, Ordering::SeqCst);
        (nodes, edges, emits)
    }
}

impl<Store: GraphStore + 'static, S: Clone + Send + Sync + 'static> VertexSink<Store::Handle> for ConfigListener<Store, S> {
    /// `on_vertex_event(vertex)` (§4.2).
    fn on_vertex_event(&self, vertex: Store::Handle) {
        let descriptor = VertexDescriptor::new(vertex.vertex_type(), vertex.name());

        // Step 1: filter untracked deletions and vertex types the policy never
        // mentions. A previously-attached VertexState still lets a deletion of an
        // otherwise-uninteresting type through, so tracked deletions are reported.
        let tracked = self.states.get(&descriptor).is_some();
        if vertex.is_deleted() && !tracked {
            log::trace!("ignoring untracked deletion of {descriptor}");
            return;
        }
        if !tracked && !self.policy.is_interesting_vertex_type(vertex.vertex_type()) {
            log::trace!("ignoring event on untracked vertex type {descriptor}");
            return;
        }

        // Step 2: obtain-or-create VertexState; capture and record a snapshot.
        let state = self.states.attach_or_get(descriptor.clone(), vertex.clone());
        let snapshot = if vertex.is_deleted() {
            None
        } else {
            self.capture.capture(&vertex)
        };
        if let Some(snapshot) = snapshot.clone() {
            state.set_snapshot(snapshot);
        }
        self.pending_emits.lock().push(ChangeListEntry {
            descriptor: descriptor.clone(),
            snapshot,
        });

        // A deletion has now been reported; nothing further will ever be resolved
        // for this vertex (§3, "descriptor stability" — the GraphStore won't resolve
        // a deleted vertex again), so the `detach` transition (§4.4) happens here.
        if vertex.is_deleted() {
            self.states.evict(&descriptor);
        }

        // Step 3: seed the node-driven walk if this vertex type reacts to its own
        // intrinsic changes.
        let is_interesting = self
            .policy
            .lookup(vertex.vertex_type(), SELF)
            .is_some_and(|propagate| !propagate.is_empty());
        if is_interesting {
            self.batch.lock().push_node(descriptor);
        }

        // Step 4: arm the drain trigger.
        self.armed.store(true, Ordering::SeqCst);
    }
}

impl<Store: GraphStore + 'static, S: Clone + Send + Sync + 'static> EdgeSink<Store::Handle> for ConfigListener<Store, S> {
    /// `on_edge_event(label, left, right)` (§4.2). Each non-null side is evaluated
    /// independently (§3, "edge symmetry"; §8, P5).
    fn on_edge_event(&self, label: &str, left: Option<Store::Handle>, right: Option<Store::Handle>) {
        let mut armed_any = false;
        for side in [left, right].into_iter().flatten() {
            let is_interesting = self
                .policy
                .lookup(side.vertex_type(), label)
                .is_some_and(|propagate| !propagate.is_empty());
            if is_interesting {
                self.batch.lock().push_edge(EdgeEntry {
                    label: label.to_string(),
                    vertex: VertexDescriptor::new(side.vertex_type(), side.name()),
                });
                armed_any = true;
            }
        }
        if armed_any {
            self.armed.store(true, Ordering::SeqCst);
        }
    }
}
