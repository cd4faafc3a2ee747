//! Unit vocabulary shared by the graph builder, the reload engine and hosts.
//!
//! A *unit* is a named, independently loadable program component. Names are
//! hierarchical: `pkg.sub.leaf` is the nested unit `leaf` of `pkg.sub`.
//!
//! Hosts talk to Cascade through two narrow seams:
//! - [`LoadObserver`]: called once per load so the graph can learn edges.
//! - [`UnitRegistry`]: the host's table of loaded units and its
//!   "re-execute this unit" primitive.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Error type for failures raised by the host while (re)executing a unit.
pub type HostError = Box<dyn std::error::Error + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Load events
// ─────────────────────────────────────────────────────────────────────────────

/// Where in the loading unit a load happened.
///
/// Supplied explicitly by the host's loader; Cascade never inspects call
/// stacks to work this out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadScope {
    /// The load ran while the unit's own top-level body executed. The
    /// resulting reference outlives the load, so it can go stale.
    Module,
    /// The load ran inside a function invocation. The reference dies with
    /// the call.
    Function,
}

impl LoadScope {
    /// Returns true for loads whose result is retained by the loader.
    pub fn is_durable(&self) -> bool {
        matches!(self, LoadScope::Module)
    }
}

impl std::fmt::Display for LoadScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadScope::Module => write!(f, "module"),
            LoadScope::Function => write!(f, "function"),
        }
    }
}

/// The execution context performing a load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadContext<'a> {
    /// Name of the unit whose code performs the load. `None` for loads issued
    /// by the host itself (an entry point, a REPL).
    pub loader: Option<&'a str>,
    /// Whether the load happened at top level or inside a function.
    pub scope: LoadScope,
}

impl<'a> LoadContext<'a> {
    /// A top-level load performed by `loader`.
    pub fn module(loader: &'a str) -> Self {
        Self {
            loader: Some(loader),
            scope: LoadScope::Module,
        }
    }

    /// A load performed inside a function defined by `loader`.
    pub fn function(loader: &'a str) -> Self {
        Self {
            loader: Some(loader),
            scope: LoadScope::Function,
        }
    }

    /// A load issued by the host with no loading unit.
    pub fn host() -> Self {
        Self {
            loader: None,
            scope: LoadScope::Module,
        }
    }
}

/// What kind of thing an attribute of a unit is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// The attribute is itself a nested unit.
    Unit,
    /// A plain value (number, string, function, ...).
    Value,
}

/// Read-only view of a loaded unit's representation.
pub trait UnitView {
    /// The unit's canonical name, if the representation carries one.
    fn unit_name(&self) -> Option<&str>;

    /// Kind of the named attribute, or `None` if the unit has no such
    /// attribute.
    fn attribute(&self, name: &str) -> Option<AttributeKind>;
}

/// One intercepted load.
///
/// `names` is empty for a plain `import target`; for
/// `from target import x, y` it lists the requested attribute names.
pub struct LoadEvent<'a> {
    /// Who loaded, and from where.
    pub context: LoadContext<'a>,
    /// Name the loader asked for.
    pub target: &'a str,
    /// Attribute names acquired from the target.
    pub names: &'a [&'a str],
    /// The representation the load produced.
    pub loaded: &'a dyn UnitView,
}

impl<'a> LoadEvent<'a> {
    /// Builds an event for a plain `import target`.
    pub fn import(context: LoadContext<'a>, target: &'a str, loaded: &'a dyn UnitView) -> Self {
        Self {
            context,
            target,
            names: &[],
            loaded,
        }
    }

    /// Builds an event for `from target import names...`.
    pub fn from_import(
        context: LoadContext<'a>,
        target: &'a str,
        names: &'a [&'a str],
        loaded: &'a dyn UnitView,
    ) -> Self {
        Self {
            context,
            target,
            names,
            loaded,
        }
    }
}

impl std::fmt::Debug for LoadEvent<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadEvent")
            .field("context", &self.context)
            .field("target", &self.target)
            .field("names", &self.names)
            .field("loaded", &self.loaded.unit_name())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Host seams
// ─────────────────────────────────────────────────────────────────────────────

/// Receives every load the host performs.
///
/// Implementations must never fail or block the load they observe.
pub trait LoadObserver {
    fn record_load(&mut self, event: &LoadEvent<'_>);
}

/// Observer that ignores everything. Useful for hosts running without a graph.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl LoadObserver for NoopObserver {
    fn record_load(&mut self, _event: &LoadEvent<'_>) {}
}

/// The host runtime's table of loaded units.
pub trait UnitRegistry {
    /// Whether a unit of this name is currently loaded.
    fn is_loaded(&self, name: &str) -> bool;

    /// Re-executes the unit's current source in place.
    ///
    /// Loads performed while re-executing are reported to `observer`, so the
    /// graph keeps learning during a reload.
    fn reload_unit(&mut self, name: &str, observer: &mut dyn LoadObserver)
        -> Result<(), HostError>;

    /// Maps a source location back to the loaded unit it defines.
    fn unit_at(&self, path: &Path) -> Option<String>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Name helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Returns the last dot-separated segment of a unit name.
pub fn short_name(name: &str) -> &str {
    name.rsplit('.').next().unwrap_or(name)
}

/// Returns the enclosing unit's name, if `name` is nested.
pub fn parent_name(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(parent, _)| parent)
}

/// Joins a parent unit name and an attribute into a nested unit name.
pub fn child_name(parent: &str, attribute: &str) -> String {
    format!("{}.{}", parent, attribute)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_helpers() {
        assert_eq!(short_name("pkg.sub.leaf"), "leaf");
        assert_eq!(short_name("leaf"), "leaf");
        assert_eq!(parent_name("pkg.sub.leaf"), Some("pkg.sub"));
        assert_eq!(parent_name("pkg"), None);
        assert_eq!(child_name("pkg", "sub"), "pkg.sub");
    }

    #[test]
    fn test_scope_durability() {
        assert!(LoadScope::Module.is_durable());
        assert!(!LoadScope::Function.is_durable());
        assert_eq!(LoadContext::host().loader, None);
        assert_eq!(LoadContext::function("b").scope, LoadScope::Function);
    }
}
