// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

//! Dependency tracker and change-propagation engine for a config-graph observer.
//!
//! A schema-aware metadata store delivers a labelled directed graph of typed
//! configuration vertices; this crate listens to raw vertex/edge change events
//! (`ConfigListener`), walks the graph according to a declarative reaction policy
//! (`ReactionPolicy`, `DependencyTracker`), and produces a de-duplicated, ordered
//! change list (`ChangeList`) of vertices that downstream consumers must reprocess.
//!
//! The metadata store itself, and the consumers that act on a `ChangeList`, are
//! external collaborators specified only by the `GraphStore` trait family in
//! `store`.

#![deny(
    clippy::all,
    clippy::default_trait_access,
    clippy::expl_impl_clone_on_copy,
    clippy::if_not_else,
    clippy::needless_continue,
    clippy::unseparated_literal_suffix,
    clippy::used_underscore_binding
)]
#![allow(clippy::match_ref_pats)]
#![allow(
    clippy::len_without_is_empty,
    clippy::redundant_field_names,
    clippy::too_many_arguments
)]
#![allow(clippy::new_without_default, clippy::new_ret_no_self)]

mod batch;
mod change_list;
mod descriptor;
mod listener;
mod policy;
mod state;
mod store;
mod tracker;

pub use batch::EdgeEntry;
pub use change_list::{ChangeList, ChangeListEntry};
pub use descriptor::VertexDescriptor;
pub use listener::SnapshotCapture;
pub use policy::{ConfigurationError, PolicyEntry, PolicyFragment, PropagateSet, ReactionPolicy, SELF};
pub use store::{EdgeSink, EdgeTable, GraphStore, ListenerId, VertexHandle, VertexSink, VertexTable};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use listener::ConfigListener;
use state::VertexStateTable;
use tracker::DependencyTracker;

/// The facade gluing `ConfigListener` and `DependencyTracker` together (§6.2).
///
/// `Store` is the embedding application's `GraphStore` implementation; `S` is the
/// consumer-opaque snapshot type ferried by `ChangeListEntry`.
pub struct Tracker<Store: GraphStore, S> {
    store: Store,
    policy: Arc<ReactionPolicy>,
    states: Arc<VertexStateTable<Store::Handle, S>>,
    listener: Arc<ConfigListener<Store, S>>,
    draining: AtomicBool,
}

impl<Store: GraphStore + 'static, S: Clone + Send + Sync + 'static> Tracker<Store, S> {
    pub fn new(
        store: Store,
        snapshot_capture: impl SnapshotCapture<Store::Handle, S> + 'static,
        policy: ReactionPolicy,
    ) -> Self {
        let policy = Arc::new(policy);
        let states = Arc::new(VertexStateTable::new());
        let listener = Arc::new(ConfigListener::new(
            policy.clone(),
            states.clone(),
            snapshot_capture,
        ));
        Tracker {
            store,
            policy,
            states,
            listener,
            draining: AtomicBool::new(false),
        }
    }

    /// Registers all listeners named by the policy. Errors if a policy-referenced
    /// vertex type has no table in the `GraphStore` (§7, `ConfigurationError`).
    pub fn initialize(&self) -> Result<(), ConfigurationError> {
        self.listener.initialize(&self.store)
    }

    /// Unregisters all listeners and releases retained `VertexState`s.
    pub fn terminate(&self) {
        self.listener.terminate(&self.store);
    }

    /// Callable only in the drain (D) domain (§5): consumes the `PendingBatch`,
    /// appends to `change_list_out`, and resets the batch for the next drain.
    ///
    /// `drain` is non-reentrant: §5 requires one `propagate` to run to completion
    /// before another is considered by the host scheduler. The mutexes guarding the
    /// `PendingBatch` already make a concurrent call race-free, but a second,
    /// overlapping `drain` on the same `Tracker` is a `ConcurrencyContractViolation`
    /// (§7) the host failed to uphold — debug builds catch it here.
    pub fn drain(&self, change_list_out: &mut ChangeList<S>) {
        let already_draining = self.draining.swap(true, Ordering::SeqCst);
        debug_assert!(!already_draining, "ConcurrencyContractViolation: reentrant drain()");
        let (nodes, edges, pending_emits) = self.listener.take_pending();
        DependencyTracker::new(&self.store, &self.policy, &self.states)
            .propagate(nodes, edges, pending_emits, change_list_out);
        self.draining.store(false, Ordering::SeqCst);
    }

    /// True if an event has arrived since the last `drain`.
    pub fn is_armed(&self) -> bool {
        self.listener.is_armed()
    }

    /// Explicit injection path for tests (§6.2): equivalent to the `GraphStore`
    /// delivering a vertex-table event directly to the registered listener.
    pub fn on_demand_node(&self, vertex: Store::Handle) {
        self.listener.on_vertex_event(vertex);
    }

    /// Explicit injection path for tests (§6.2): equivalent to the `GraphStore`
    /// delivering an edge-table event directly to the registered listener.
    pub fn on_demand_edge(&self, label: &str, left: Option<Store::Handle>, right: Option<Store::Handle>) {
        self.listener.on_edge_event(label, left, right);
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Number of vertices the core currently holds a `VertexState` for. Test-only:
    /// production consumers have no use for this, and exposing it unconditionally
    /// would be exactly the sandesh-style introspection surface kept out of scope.
    #[cfg(test)]
    pub(crate) fn tracked_vertex_count(&self) -> usize {
        self.states.len()
    }
}
