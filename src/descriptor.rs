// Copyright 2018 Pants project contributors (see CONTRIBUTORS.md).
// Licensed under the Apache License, Version 2.0 (see LICENSE).

use std::fmt;

/// A stable, copyable identity for a vertex in the observed graph: `(type, name)`.
///
/// A descriptor remains a legal lookup key even after the vertex it names has been
/// deleted; resolution against the live `GraphStore` happens lazily, at drain time.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct VertexDescriptor {
    vertex_type: String,
    name: String,
}

impl VertexDescriptor {
    pub fn new(vertex_type: impl Into<String>, name: impl Into<String>) -> Self {
        VertexDescriptor {
            vertex_type: vertex_type.into(),
            name: name.into(),
        }
    }

    pub fn vertex_type(&self) -> &str {
        &self.vertex_type
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for VertexDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.vertex_type, self.name)
    }
}
