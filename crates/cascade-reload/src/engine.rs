//! The ancestor-ordered reload engine.
//!
//! A reload request for unit `X` runs:
//! 1. Re-execute `X` itself. A failure here stops everything.
//! 2. If the graph has never seen `X`, report `NotInGraph` and stop.
//! 3. Plan the batch: every ancestor of `X`, each after its in-batch
//!    dependencies. A cycle fails the request before any ancestor runs.
//! 4. Re-execute the ancestors one at a time in plan order, stopping at the
//!    first failure. Units already re-executed stay re-executed.

use crate::diagnostics::{DiagnosticsSink, ReloadEvent, TracingSink};
use crate::outcome::{ReloadError, ReloadOutcome};
use cascade_core::{HostError, UnitRegistry};
use cascade_graph::{DependencyGraph, GraphBuilder, GraphError, ReloadPlan};
use std::path::Path;
use tracing::debug;

/// Drives reloads against a host registry, keeping the graph up to date.
///
/// The reloader owns the [`GraphBuilder`]; hosts pass [`Reloader::observer`]
/// to their loader so ordinary loads feed the same graph the engine reads.
/// Loads performed while re-executing units during a reload are recorded
/// too.
pub struct Reloader {
    builder: GraphBuilder,
    sink: Box<dyn DiagnosticsSink>,
}

impl Default for Reloader {
    fn default() -> Self {
        Self::new(GraphBuilder::new())
    }
}

impl Reloader {
    /// Creates a reloader that logs through `tracing`.
    pub fn new(builder: GraphBuilder) -> Self {
        Self {
            builder,
            sink: Box::new(TracingSink),
        }
    }

    /// Replaces the diagnostics sink.
    pub fn with_sink(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sink = Box::new(sink);
        self
    }

    /// The dependency graph learned so far.
    pub fn graph(&self) -> &DependencyGraph {
        self.builder.graph()
    }

    /// The load observer hosts should report loads to.
    pub fn observer(&mut self) -> &mut GraphBuilder {
        &mut self.builder
    }

    /// Computes the reload order for `unit` without reloading anything.
    pub fn plan(&self, unit: &str) -> Result<ReloadPlan, GraphError> {
        self.builder.graph().plan_reload(unit)
    }

    pub(crate) fn report(&self, event: ReloadEvent) {
        self.sink.report(&event);
    }

    /// Reloads `unit` and then its ancestors.
    pub fn reload<R>(&mut self, registry: &mut R, unit: &str) -> Result<ReloadOutcome, ReloadError>
    where
        R: UnitRegistry + ?Sized,
    {
        if !registry.is_loaded(unit) {
            self.report(ReloadEvent::NotLoaded {
                unit: unit.to_string(),
            });
            return Err(ReloadError::NotLoaded(unit.to_string()));
        }

        // The unit's own representation must be fresh before anything that
        // depends on it is re-executed.
        debug!("Reloading {}", unit);
        if let Err(cause) = registry.reload_unit(unit, &mut self.builder) {
            return Err(self.failed(unit, cause));
        }

        let plan = match self.builder.graph().plan_reload(unit) {
            Ok(plan) => plan,
            Err(GraphError::NotInGraph(_)) => {
                self.report(ReloadEvent::NotInGraph {
                    unit: unit.to_string(),
                });
                return Ok(ReloadOutcome::NotInGraph {
                    unit: unit.to_string(),
                });
            }
            Err(GraphError::Cycle { cycle, .. }) => {
                self.report(ReloadEvent::CycleDetected {
                    unit: unit.to_string(),
                    cycle: cycle.clone(),
                });
                return Err(ReloadError::CyclicDependency {
                    unit: unit.to_string(),
                    cycle,
                });
            }
        };

        self.report(ReloadEvent::Reloading {
            unit: unit.to_string(),
            ancestors: plan.batch().into_iter().skip(1).collect(),
        });

        for step in &plan.steps {
            if !registry.is_loaded(&step.unit) {
                let cause: HostError = format!("unit '{}' is not loaded", step.unit).into();
                return Err(self.failed(&step.unit, cause));
            }

            debug!("Reloading ancestor {} (depth {})", step.unit, step.depth);
            if let Err(cause) = registry.reload_unit(&step.unit, &mut self.builder) {
                return Err(self.failed(&step.unit, cause));
            }
        }

        let units = plan.batch();
        self.report(ReloadEvent::Reloaded {
            unit: unit.to_string(),
            units: units.clone(),
        });
        Ok(ReloadOutcome::Reloaded { units })
    }

    /// Resolves `path` to a loaded unit through the registry, then reloads it.
    pub fn reload_by_location<R>(
        &mut self,
        registry: &mut R,
        path: &Path,
    ) -> Result<ReloadOutcome, ReloadError>
    where
        R: UnitRegistry + ?Sized,
    {
        let unit = registry
            .unit_at(path)
            .ok_or_else(|| ReloadError::UnknownLocation(path.to_path_buf()))?;
        self.reload(registry, &unit)
    }

    fn failed(&self, unit: &str, cause: HostError) -> ReloadError {
        self.report(ReloadEvent::Failed {
            unit: unit.to_string(),
            cause: cause.to_string(),
        });
        ReloadError::Failed {
            unit: unit.to_string(),
            source: cause,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use cascade_core::LoadObserver;
    use cascade_graph::{Edge, EdgeKind};
    use std::collections::HashSet;
    use std::path::PathBuf;

    /// A registry that records reload calls and fails on request.
    #[derive(Default)]
    struct FakeRegistry {
        loaded: HashSet<String>,
        failing: HashSet<String>,
        reloads: Vec<String>,
    }

    impl FakeRegistry {
        fn with_units(units: &[&str]) -> Self {
            Self {
                loaded: units.iter().map(|u| u.to_string()).collect(),
                ..Default::default()
            }
        }

        fn fail_on(mut self, unit: &str) -> Self {
            self.failing.insert(unit.to_string());
            self
        }
    }

    impl UnitRegistry for FakeRegistry {
        fn is_loaded(&self, name: &str) -> bool {
            self.loaded.contains(name)
        }

        fn reload_unit(
            &mut self,
            name: &str,
            _observer: &mut dyn LoadObserver,
        ) -> Result<(), HostError> {
            self.reloads.push(name.to_string());
            if self.failing.contains(name) {
                return Err(format!("{} raised", name).into());
            }
            Ok(())
        }

        fn unit_at(&self, path: &Path) -> Option<String> {
            path.file_stem()
                .and_then(|s| s.to_str())
                .filter(|s| self.loaded.contains(*s))
                .map(str::to_string)
        }
    }

    fn reloader_with(edges: &[(&str, &str)]) -> Reloader {
        let mut reloader = Reloader::default();
        for (dependent, dependency) in edges {
            reloader.observer().graph_mut().add_edge(
                dependent,
                dependency,
                Edge::new(EdgeKind::Imports),
            );
        }
        reloader
    }

    #[test]
    fn test_not_loaded() {
        let mut reloader = reloader_with(&[("b", "a")]);
        let mut registry = FakeRegistry::with_units(&["b"]);

        let err = reloader.reload(&mut registry, "a").unwrap_err();
        assert!(matches!(err, ReloadError::NotLoaded(ref u) if u == "a"));
        assert!(registry.reloads.is_empty());
    }

    #[test]
    fn test_not_in_graph() {
        let sink = MemorySink::new();
        let mut reloader = Reloader::default().with_sink(sink.clone());
        let mut registry = FakeRegistry::with_units(&["a"]);

        let outcome = reloader.reload(&mut registry, "a").unwrap();
        assert_eq!(outcome, ReloadOutcome::NotInGraph { unit: "a".into() });
        assert_eq!(registry.reloads, vec!["a"]);
        assert_eq!(
            sink.events(),
            vec![ReloadEvent::NotInGraph { unit: "a".into() }]
        );
    }

    #[test]
    fn test_reloads_unit_then_ancestors_in_order() {
        let mut reloader = reloader_with(&[("c", "b"), ("b", "a"), ("c", "a")]);
        let mut registry = FakeRegistry::with_units(&["a", "b", "c"]);

        let outcome = reloader.reload(&mut registry, "a").unwrap();
        assert_eq!(
            outcome,
            ReloadOutcome::Reloaded {
                units: vec!["a".into(), "b".into(), "c".into()]
            }
        );
        assert_eq!(registry.reloads, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_root_failure_stops_everything() {
        let mut reloader = reloader_with(&[("b", "a")]);
        let mut registry = FakeRegistry::with_units(&["a", "b"]).fail_on("a");

        let err = reloader.reload(&mut registry, "a").unwrap_err();
        assert_eq!(err.unit(), Some("a"));
        assert_eq!(registry.reloads, vec!["a"]);
    }

    #[test]
    fn test_failure_mid_batch_stops_at_failing_unit() {
        // Order [b, c, d, e]; d fails.
        let mut reloader =
            reloader_with(&[("b", "a"), ("c", "b"), ("d", "c"), ("e", "d")]);
        let mut registry = FakeRegistry::with_units(&["a", "b", "c", "d", "e"]).fail_on("d");
        let sink = MemorySink::new();
        reloader = reloader.with_sink(sink.clone());

        let err = reloader.reload(&mut registry, "a").unwrap_err();
        match &err {
            ReloadError::Failed { unit, source } => {
                assert_eq!(unit, "d");
                assert_eq!(source.to_string(), "d raised");
            }
            other => panic!("unexpected {:?}", other),
        }
        // b and c ran, e never did.
        assert_eq!(registry.reloads, vec!["a", "b", "c", "d"]);
        assert!(matches!(
            sink.events().last(),
            Some(ReloadEvent::Failed { unit, .. }) if unit == "d"
        ));
    }

    #[test]
    fn test_cycle_reloads_only_root() {
        let mut reloader = reloader_with(&[("a", "b"), ("b", "c"), ("c", "a")]);
        let mut registry = FakeRegistry::with_units(&["a", "b", "c"]);

        let err = reloader.reload(&mut registry, "a").unwrap_err();
        match err {
            ReloadError::CyclicDependency { unit, cycle } => {
                assert_eq!(unit, "a");
                assert_eq!(cycle.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(registry.reloads, vec!["a"]);
    }

    #[test]
    fn test_unloaded_ancestor_is_a_failure() {
        let mut reloader = reloader_with(&[("b", "a"), ("c", "b")]);
        let mut registry = FakeRegistry::with_units(&["a", "c"]);

        let err = reloader.reload(&mut registry, "a").unwrap_err();
        assert_eq!(err.unit(), Some("b"));
        assert_eq!(registry.reloads, vec!["a"]);
    }

    #[test]
    fn test_reload_by_location() {
        let mut reloader = reloader_with(&[("b", "a")]);
        let mut registry = FakeRegistry::with_units(&["a", "b"]);

        let outcome = reloader
            .reload_by_location(&mut registry, &PathBuf::from("/src/a.unit"))
            .unwrap();
        assert_eq!(outcome.reloaded_units(), ["a".to_string(), "b".to_string()]);

        let err = reloader
            .reload_by_location(&mut registry, &PathBuf::from("/src/zzz.unit"))
            .unwrap_err();
        assert!(matches!(err, ReloadError::UnknownLocation(_)));
    }

    #[test]
    fn test_plan_does_not_reload() {
        let reloader = reloader_with(&[("b", "a")]);
        let plan = reloader.plan("a").unwrap();
        assert_eq!(plan.ancestors(), vec!["b"]);
    }
}
