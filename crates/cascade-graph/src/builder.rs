//! Graph builder fed by load events.
//!
//! The builder sits behind the host's load hook. For every load it decides
//! whether the loader now holds a durable reference, and if so records the
//! edge that reference implies.

use crate::edge::{Edge, EdgeKind};
use crate::graph::DependencyGraph;
use cascade_core::{child_name, AttributeKind, LoadContext, LoadEvent, LoadObserver};
use std::collections::HashSet;
use tracing::{debug, trace};

/// Builds a DependencyGraph from intercepted loads.
///
/// Rules:
/// 1. Only durable loads produce edges. Function-scope loads are skipped,
///    unless the loader is a designated harness unit (test harnesses emulate
///    top-level imports from inside function bodies).
/// 2. `from Y import X` where `X` is a nested unit records `loader -> Y.X`
///    and not `loader -> Y`. An attribute `Y` does not have yet is assumed to
///    be a nested unit about to be bound.
/// 3. Loads with no loading unit, or whose result carries no unit name, are
///    ignored.
///
/// Recording never fails; the load being observed must always go through.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: DependencyGraph,
    /// Loaders whose function-scope loads count as durable.
    harness_units: HashSet<String>,
}

impl GraphBuilder {
    /// Creates a builder over an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Treats function-scope loads from these units as durable.
    pub fn with_harness_units<I, S>(mut self, units: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.harness_units
            .extend(units.into_iter().map(Into::into));
        self
    }

    /// The graph built so far.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Mutable access, for hosts that seed edges by hand.
    pub fn graph_mut(&mut self) -> &mut DependencyGraph {
        &mut self.graph
    }

    /// Finishes building and returns the graph.
    pub fn build(self) -> DependencyGraph {
        self.graph
    }

    fn is_durable(&self, context: &LoadContext<'_>) -> bool {
        context.scope.is_durable()
            || context
                .loader
                .map(|loader| self.harness_units.contains(loader))
                .unwrap_or(false)
    }

    /// Records one load. Returns how many new edges it produced.
    pub fn record(&mut self, event: &LoadEvent<'_>) -> usize {
        let Some(loader) = event.context.loader else {
            trace!("Host load of {} has no loader", event.target);
            return 0;
        };

        let Some(target) = event.loaded.unit_name() else {
            trace!("Load of {} produced no named unit", event.target);
            return 0;
        };

        if !self.is_durable(&event.context) {
            debug!(
                "Skipping {}-scope load {} -> {}",
                event.context.scope, loader, target
            );
            return 0;
        }

        let mut added = 0;

        if event.names.is_empty() {
            added += self.add(loader, target, EdgeKind::Imports);
            return added;
        }

        for name in event.names {
            match event.loaded.attribute(name) {
                Some(AttributeKind::Value) => {
                    added += self.add(loader, target, EdgeKind::ImportsFrom);
                }
                Some(AttributeKind::Unit) | None => {
                    let nested = child_name(target, name);
                    added += self.add(loader, &nested, EdgeKind::ImportsSubUnit);
                }
            }
        }

        added
    }

    fn add(&mut self, dependent: &str, dependency: &str, kind: EdgeKind) -> usize {
        if self.graph.add_edge(dependent, dependency, Edge::new(kind)) {
            debug!("Edge {} -> {} ({})", dependent, dependency, kind);
            1
        } else {
            0
        }
    }
}

impl LoadObserver for GraphBuilder {
    fn record_load(&mut self, event: &LoadEvent<'_>) {
        self.record(event);
    }
}
