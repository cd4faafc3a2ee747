//! Cascade Graph - Load dependency tracking
//!
//! This crate keeps the live graph of durable load relationships between
//! units and answers ordering questions over it.
//!
//! # Architecture
//!
//! The graph uses petgraph internally with a name index so units are
//! addressed by their dotted names. Edges point from dependent to
//! dependency. The [`GraphBuilder`] plugs into a host's load hook and turns
//! load events into edges; [`DependencyGraph::plan_reload`] turns the graph
//! into a safe reload order.
//!
//! # Example
//!
//! ```
//! use cascade_graph::{DependencyGraph, Edge, EdgeKind};
//!
//! let mut graph = DependencyGraph::new();
//! graph.add_edge("app", "models", Edge::new(EdgeKind::Imports));
//! graph.add_edge("views", "models", Edge::new(EdgeKind::Imports));
//! graph.add_edge("app", "views", Edge::new(EdgeKind::Imports));
//!
//! let plan = graph.plan_reload("models").unwrap();
//! assert_eq!(plan.ancestors(), vec!["views", "app"]);
//! ```

mod ancestry;
mod builder;
mod edge;
mod error;
mod graph;

pub use ancestry::{PlanStep, ReloadPlan};
pub use builder::GraphBuilder;
pub use edge::{Edge, EdgeKind, GraphEdge};
pub use error::{format_cycle, GraphError, Result};
pub use graph::{DependencyGraph, GraphStats, NodeId};
