//! Edge types for the dependency graph.
//!
//! An edge `A -> B` means unit A holds a durable reference into unit B, so
//! replacing B's representation without refreshing A leaves A stale.

use serde::{Deserialize, Serialize};

/// How the dependent came to hold its reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// `import B` at top level.
    Imports,

    /// `from B import value`: the dependent copied a plain attribute of B.
    ImportsFrom,

    /// `from Y import X` where `Y.X` is itself a unit; the edge points at `Y.X`.
    ImportsSubUnit,
}

impl std::fmt::Display for EdgeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Imports => "imports",
            Self::ImportsFrom => "imports_from",
            Self::ImportsSubUnit => "imports_sub_unit",
        };
        write!(f, "{}", s)
    }
}

/// An edge in the dependency graph.
///
/// Edges are unweighted for ordering purposes; the kind is kept for
/// diagnostics and is fixed by the first load that created the edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    /// The kind of load that produced the edge.
    pub kind: EdgeKind,
}

impl Edge {
    /// Creates a new edge.
    pub fn new(kind: EdgeKind) -> Self {
        Self { kind }
    }
}

impl std::fmt::Display for Edge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// An edge with unit names, for export and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    /// The dependent unit.
    pub source: String,
    /// The unit it depends on.
    pub target: String,
    pub kind: EdgeKind,
}

impl std::fmt::Display for GraphEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.source, self.target)
    }
}
