//! Core graph data structure.
//!
//! The DependencyGraph wraps petgraph and keeps a name index so units can be
//! addressed by their dotted names. Nodes appear the first time a unit takes
//! part in an edge and are never removed while the process runs.

use crate::edge::{Edge, GraphEdge};
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Identifier for a unit inside the graph.
pub type NodeId = NodeIndex;

/// The live graph of durable load relationships.
///
/// Edges point from dependent to dependency. Single writer at a time: hosts
/// that load or reload from several threads must serialize access
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// The underlying petgraph graph; node weights are unit names.
    pub(crate) graph: DiGraph<String, Edge>,

    /// Maps unit names to graph node indexes.
    index: HashMap<String, NodeId>,
}

impl DependencyGraph {
    /// Creates a new empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the node for `name`, creating it if needed.
    pub fn add_unit(&mut self, name: &str) -> NodeId {
        if let Some(&index) = self.index.get(name) {
            return index;
        }
        let index = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), index);
        index
    }

    /// Records that `dependent` depends on `dependency`.
    ///
    /// Idempotent: returns false and leaves the graph unchanged when the edge
    /// already exists.
    pub fn add_edge(&mut self, dependent: &str, dependency: &str, edge: Edge) -> bool {
        let from = self.add_unit(dependent);
        let to = self.add_unit(dependency);

        if self.graph.find_edge(from, to).is_some() {
            return false;
        }
        self.graph.add_edge(from, to, edge);
        true
    }

    /// Whether the unit has ever taken part in an edge.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Whether the edge `dependent -> dependency` exists.
    pub fn has_edge(&self, dependent: &str, dependency: &str) -> bool {
        self.edge(dependent, dependency).is_some()
    }

    /// Gets the edge `dependent -> dependency`.
    pub fn edge(&self, dependent: &str, dependency: &str) -> Option<&Edge> {
        let from = self.get_index(dependent)?;
        let to = self.get_index(dependency)?;
        let edge = self.graph.find_edge(from, to)?;
        self.graph.edge_weight(edge)
    }

    /// Units that directly depend on `name`, in the order they were first seen.
    pub fn dependents(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Incoming)
    }

    /// Units `name` directly depends on, in the order they were first seen.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        self.neighbors(name, Direction::Outgoing)
    }

    fn neighbors(&self, name: &str, direction: Direction) -> Vec<&str> {
        let Some(index) = self.get_index(name) else {
            return Vec::new();
        };
        self.sorted_neighbors(index, direction)
            .into_iter()
            .map(|idx| self.graph[idx].as_str())
            .collect()
    }

    /// Neighbour indexes sorted by insertion order, for deterministic walks.
    pub(crate) fn sorted_neighbors(&self, index: NodeId, direction: Direction) -> Vec<NodeId> {
        let mut neighbors: Vec<NodeId> = self.graph.neighbors_directed(index, direction).collect();
        neighbors.sort_unstable();
        neighbors.dedup();
        neighbors
    }

    /// Gets the node index for a unit name.
    pub fn get_index(&self, name: &str) -> Option<NodeId> {
        self.index.get(name).copied()
    }

    /// Returns the number of units.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns the number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Returns true if no edge was ever recorded.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Iterates over unit names in insertion order.
    pub fn units(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Forgets every unit and edge.
    pub fn clear(&mut self) {
        self.graph.clear();
        self.index.clear();
    }

    /// Returns all edges with unit names for export.
    pub fn export_edges(&self) -> Vec<GraphEdge> {
        self.graph
            .edge_references()
            .map(|edge_ref| GraphEdge {
                source: self.graph[edge_ref.source()].clone(),
                target: self.graph[edge_ref.target()].clone(),
                kind: edge_ref.weight().kind,
            })
            .collect()
    }

    /// Renders the graph in Graphviz DOT format.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]))
    }

    /// Returns graph statistics.
    pub fn stats(&self) -> GraphStats {
        GraphStats {
            unit_count: self.node_count(),
            edge_count: self.edge_count(),
        }
    }
}

/// Graph statistics for status output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub unit_count: usize,
    pub edge_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::EdgeKind;

    fn imports() -> Edge {
        Edge::new(EdgeKind::Imports)
    }

    #[test]
    fn test_add_edge_is_idempotent() {
        let mut graph = DependencyGraph::new();

        assert!(graph.add_edge("a", "b", imports()));
        assert!(!graph.add_edge("a", "b", imports()));
        assert!(!graph.add_edge("a", "b", Edge::new(EdgeKind::ImportsFrom)));

        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node_count(), 2);
        // The first kind recorded wins.
        assert_eq!(graph.edge("a", "b").unwrap().kind, EdgeKind::Imports);
    }

    #[test]
    fn test_direction() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("b", "a", imports());
        graph.add_edge("c", "a", imports());

        assert!(graph.has_edge("b", "a"));
        assert!(!graph.has_edge("a", "b"));
        assert_eq!(graph.dependents("a"), vec!["b", "c"]);
        assert_eq!(graph.dependencies("b"), vec!["a"]);
        assert!(graph.dependents("missing").is_empty());
    }

    #[test]
    fn test_export_and_dot() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("app", "lib", imports());

        let edges = graph.export_edges();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].source, "app");
        assert_eq!(edges[0].target, "lib");

        let dot = graph.to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("\"app\""));
        assert!(dot.contains("->"));
    }

    #[test]
    fn test_clear() {
        let mut graph = DependencyGraph::new();
        graph.add_edge("a", "b", imports());
        graph.clear();
        assert!(graph.is_empty());
        assert!(!graph.contains("a"));
        assert_eq!(graph.stats().edge_count, 0);
    }
}
