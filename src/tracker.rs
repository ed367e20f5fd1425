// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! The propagation engine (§4.3): walks the `GraphStore` guided by the
//! `ReactionPolicy`, starting from the contents of a drained `PendingBatch`, and
//! appends de-duplicated entries to a `ChangeList`.
//!
//! Recursion is kept in its natural recursive form (§9, "Recursive graph walks with
//! implicit stack... keep recursive form for clarity") — termination is guaranteed by
//! the per-drain `visited_edges` set, not by any bound on call-stack depth, since the
//! policy itself is finite even where its graph is cyclic.

use fnv::FnvHashSet as HashSet;

use crate::batch::{EdgeEntry, NodeEntry};
use crate::change_list::{ChangeList, ChangeListEntry};
use crate::descriptor::VertexDescriptor;
use crate::policy::{ReactionPolicy, SELF};
use crate::state::VertexStateTable;
use crate::store::{GraphStore, VertexHandle};

/// A per-drain `(vertex, trigger_label)` pair already walked; the sole termination
/// guarantee for a possibly-cyclic policy (§4.3, §9).
type VisitedEdges = HashSet<(VertexDescriptor, String)>;

/// A per-drain `(type, name)` set of vertices already appended to the output this
/// batch (§3, "at-most-once emission per batch"). Seeded up front from the raw
/// event-time `pending_emits` entries, then grown by `emit` as the walk proceeds, so
/// an edge-driven or recursive rediscovery of a vertex already reported this batch is
/// a no-op (§8 P1). Duplicate *event-time* entries in `pending_emits` itself are
/// still preserved verbatim — this set only governs the walk's own contributions.
type EmittedIds = HashSet<VertexDescriptor>;

/// The propagation engine itself. Borrows the collaborators it needs for the
/// duration of one `propagate` call; holds no state of its own between drains.
pub struct DependencyTracker<'a, Store: GraphStore, S> {
    store: &'a Store,
    policy: &'a ReactionPolicy,
    states: &'a VertexStateTable<Store::Handle, S>,
}

impl<'a, Store: GraphStore, S: Clone> DependencyTracker<'a, Store, S> {
    pub fn new(
        store: &'a Store,
        policy: &'a ReactionPolicy,
        states: &'a VertexStateTable<Store::Handle, S>,
    ) -> Self {
        DependencyTracker {
            store,
            policy,
            states,
        }
    }

    /// `propagate(pending_batch, change_list_out)` (§4.3).
    ///
    /// `pending_emits` are the undeduplicated, event-time-captured contributions from
    /// `ConfigListener::on_vertex_event` (§4.2 step 2); they are appended verbatim,
    /// ahead of the policy-guided walk, before `nodes`/`edges` are resolved and
    /// walked.
    pub fn propagate(
        &self,
        nodes: Vec<NodeEntry>,
        edges: Vec<EdgeEntry>,
        pending_emits: Vec<ChangeListEntry<S>>,
        out: &mut ChangeList<S>,
    ) {
        let mut visited: VisitedEdges = HashSet::default();
        let mut emitted: EmittedIds = HashSet::default();

        // Every event-time entry's identifier goes into `emitted` as it is pushed,
        // mirroring the original `NodeEvent`'s `vertex_list_.insert(identifier)`: a
        // vertex already reported this batch is never re-emitted by the walk below.
        for entry in pending_emits {
            emitted.insert(entry.descriptor.clone());
            out.push(entry);
        }

        for node in nodes {
            match self.store.resolve(node.vertex_type(), node.name()) {
                Some(handle) => self.propagate_node(&handle, &mut visited, &mut emitted, out),
                None => log::trace!("stale node entry {node} skipped at drain"),
            }
        }

        for edge in edges {
            match self
                .store
                .resolve(edge.vertex.vertex_type(), edge.vertex.name())
            {
                Some(handle) => {
                    self.propagate_edge(&handle, &edge.label, &mut visited, &mut emitted, out)
                }
                None => log::trace!("stale edge entry {}:{} skipped at drain", edge.label, edge.vertex),
            }
        }
    }

    /// `propagate_node(v, visited, out)` (§4.3). Node-seeding never re-emits `v`
    /// itself here: that emission already happened at listener time (§4.2 step 2)
    /// and `v` is already in `emitted`, preserving the duplicate-event behavior
    /// scenario 2 exercises while still blocking a later walk-driven rediscovery.
    fn propagate_node(
        &self,
        v: &Store::Handle,
        visited: &mut VisitedEdges,
        emitted: &mut EmittedIds,
        out: &mut ChangeList<S>,
    ) {
        let Some(plist) = self.policy.lookup(v.vertex_type(), SELF) else {
            debug_assert!(
                false,
                "node {}:{} was seeded without a SELF policy entry",
                v.vertex_type(),
                v.name()
            );
            return;
        };

        for (label, w) in v.outgoing_edges() {
            if plist.contains(&label) {
                self.propagate_edge(&w, &label, visited, emitted, out);
            }
        }
    }

    /// `propagate_edge(v, label, visited, out)` (§4.3).
    fn propagate_edge(
        &self,
        v: &Store::Handle,
        label: &str,
        visited: &mut VisitedEdges,
        emitted: &mut EmittedIds,
        out: &mut ChangeList<S>,
    ) {
        debug_assert!(!v.is_deleted(), "propagate_edge reached a deleted vertex");

        let Some(plist) = self.policy.lookup(v.vertex_type(), label) else {
            // PolicyInvariantViolation (§7): a branch was enqueued by an interest
            // check that this lookup should have also satisfied.
            debug_assert!(
                false,
                "PolicyInvariantViolation: {}:{} reached via {:?} with no matching policy entry",
                v.vertex_type(),
                v.name(),
                label
            );
            return;
        };

        let key = (VertexDescriptor::new(v.vertex_type(), v.name()), label.to_string());
        if !visited.insert(key) {
            return;
        }

        if plist.contains(SELF) {
            self.emit(v, emitted, out);
        }

        for (next_label, w) in v.outgoing_edges() {
            if plist.contains(&next_label) {
                self.propagate_edge(&w, &next_label, visited, emitted, out);
            }
        }
    }

    /// `emit(v, out)` (§4.3): at-most-once append, with the snapshot captured from
    /// this vertex's `VertexState` if one is attached.
    fn emit(&self, v: &Store::Handle, emitted: &mut EmittedIds, out: &mut ChangeList<S>) {
        let descriptor = VertexDescriptor::new(v.vertex_type(), v.name());
        if !emitted.insert(descriptor.clone()) {
            return;
        }
        let snapshot = self.states.get(&descriptor).and_then(|state| state.snapshot());
        log::trace!("emitting {descriptor}");
        out.push(ChangeListEntry { descriptor, snapshot });
    }
}
