// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

use fnv::{FnvHashMap as HashMap, FnvHashSet as HashSet};

/// Sentinel trigger/propagate label meaning "the intrinsic properties of this vertex
/// changed" (as a trigger) or "emit this vertex" (as a member of a propagate set).
pub const SELF: &str = "SELF";

/// The set of labels to follow out of a vertex for a given trigger, possibly
/// including [`SELF`] to request emission of the vertex itself.
pub type PropagateSet = HashSet<String>;

/// `trigger_label -> PropagateSet` for a single vertex type.
type ReactionMap = HashMap<String, PropagateSet>;

/// One `(vertex_type, trigger_label) -> PropagateSet` entry, as contributed by a
/// policy fragment. Fragments are concatenated and unioned by [`ReactionPolicy::build`].
#[derive(Clone, Debug)]
pub struct PolicyEntry {
    pub vertex_type: String,
    pub trigger_label: String,
    pub propagate: PropagateSet,
}

impl PolicyEntry {
    pub fn new(
        vertex_type: impl Into<String>,
        trigger_label: impl Into<String>,
        propagate: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        PolicyEntry {
            vertex_type: vertex_type.into(),
            trigger_label: trigger_label.into(),
            propagate: propagate.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named, reusable group of [`PolicyEntry`] values contributed by one configuration
/// domain (e.g. "bgp", "routing-instance"). Fragments compose by concatenation; the
/// same `(vertex_type, trigger_label)` key appearing in more than one fragment has its
/// propagate sets unioned rather than overwritten.
#[derive(Clone, Debug, Default)]
pub struct PolicyFragment {
    entries: Vec<PolicyEntry>,
}

impl PolicyFragment {
    pub fn new() -> Self {
        PolicyFragment::default()
    }

    pub fn react(
        mut self,
        vertex_type: impl Into<String>,
        trigger_label: impl Into<String>,
        propagate: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.entries
            .push(PolicyEntry::new(vertex_type, trigger_label, propagate));
        self
    }
}

/// An immutable, in-memory decision table keyed by `(vertex_type, trigger_label)`.
///
/// Built once at initialization from [`PolicyFragment`] values (§4.1) and consulted
/// lock-free for the remainder of the process's life: no method on this type takes
/// `&mut self`, so concurrent lookups from the listener and drain domains never race.
pub struct ReactionPolicy {
    by_vertex_type: HashMap<String, ReactionMap>,
}

impl ReactionPolicy {
    /// Concatenates the given fragments, unioning propagate sets for any
    /// `(vertex_type, trigger_label)` key contributed by more than one fragment.
    pub fn build(fragments: impl IntoIterator<Item = PolicyFragment>) -> Self {
        let mut by_vertex_type: HashMap<String, ReactionMap> = HashMap::default();
        for fragment in fragments {
            for entry in fragment.entries {
                let reaction_map = by_vertex_type.entry(entry.vertex_type).or_default();
                reaction_map
                    .entry(entry.trigger_label)
                    .or_default()
                    .extend(entry.propagate);
            }
        }
        ReactionPolicy { by_vertex_type }
    }

    /// `lookup(vertex_type, trigger_label) -> optional<PropagateSet>` from §4.1.
    ///
    /// Absence of a key means "not interesting" — callers stop walking at this vertex
    /// for this trigger rather than treating it as an error.
    pub fn lookup(&self, vertex_type: &str, trigger_label: &str) -> Option<&PropagateSet> {
        self.by_vertex_type.get(vertex_type)?.get(trigger_label)
    }

    /// True if this vertex type reacts to its own intrinsic changes (`(type, SELF)` is
    /// present), used by [`crate::listener::ConfigListener::initialize`] to decide
    /// which vertex tables need a listener registered at all.
    pub fn is_interesting_vertex_type(&self, vertex_type: &str) -> bool {
        self.by_vertex_type.contains_key(vertex_type)
    }

    /// All vertex types named as keys anywhere in the policy, in unspecified order.
    /// Used to register one listener per referenced vertex table at `initialize()`.
    pub fn vertex_types(&self) -> impl Iterator<Item = &str> {
        self.by_vertex_type.keys().map(String::as_str)
    }
}

/// A policy fragment (or the set of fragments passed to [`ReactionPolicy::build`])
/// named a vertex type for which the `GraphStore` has no table. Fatal to
/// `Tracker::initialize`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ConfigurationError {
    pub vertex_type: String,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "policy references vertex type {:?}, which has no table in the GraphStore",
            self.vertex_type
        )
    }
}

impl std::error::Error for ConfigurationError {}
