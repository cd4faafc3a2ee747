//! Graph error types.

use crate::edge::GraphEdge;
use thiserror::Error;

/// Errors from querying or planning over the dependency graph.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Unit '{0}' is not in the dependency graph")]
    NotInGraph(String),

    #[error("Dependency cycle among ancestors of '{unit}': {}", format_cycle(.cycle))]
    Cycle { unit: String, cycle: Vec<GraphEdge> },
}

/// Renders a cycle as `a -> b -> c -> a`.
pub fn format_cycle(cycle: &[GraphEdge]) -> String {
    let mut parts: Vec<&str> = cycle.iter().map(|e| e.source.as_str()).collect();
    if let Some(last) = cycle.last() {
        parts.push(&last.target);
    }
    parts.join(" -> ")
}

pub type Result<T> = std::result::Result<T, GraphError>;
