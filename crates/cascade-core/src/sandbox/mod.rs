//! Sandbox - a small in-process unit runtime.
//!
//! The sandbox loads units from a directory tree, executes their line-oriented
//! source, and reports every load to a [`LoadObserver`]. It implements
//! [`UnitRegistry`], so the reload engine can drive it exactly as it would a
//! real interpreter's module table.
//!
//! Layout: unit `a.b` lives at `<root>/a/b.unit`. A package unit `a` is
//! `<root>/a.unit`, `<root>/a/mod.unit`, or an empty package when only the
//! directory `<root>/a/` exists.
//!
//! Binding semantics mirror a dynamic module system:
//! - `import a` binds a *reference* to unit `a`; readers see `a`'s current
//!   contents after `a` is reloaded.
//! - `from a import x` and `let y = a.x` *copy* plain values, which stay stale
//!   until the holder is reloaded.

mod parser;

pub use parser::{parse_source, Expr, ImportName, Stmt};

use crate::error::{Result, SandboxError};
use crate::unit::{
    child_name, parent_name, short_name, AttributeKind, HostError, LoadContext, LoadEvent,
    LoadObserver, LoadScope, UnitRegistry, UnitView,
};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// File extension of sandbox unit sources.
pub const UNIT_EXTENSION: &str = "unit";

/// File name holding a package unit's own source.
const PACKAGE_FILE: &str = "mod.unit";

// ─────────────────────────────────────────────────────────────────────────────
// Values and units
// ─────────────────────────────────────────────────────────────────────────────

/// A value bound in a unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Int(i64),
    Str(String),
    /// Reference to a loaded unit, by name.
    Unit(String),
    /// Function body, run on demand by [`Sandbox::call`].
    Function(Vec<Stmt>),
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::Unit(name) => write!(f, "<unit {}>", name),
            Value::Function(_) => write!(f, "<fn>"),
        }
    }
}

/// The in-memory representation of a loaded unit.
#[derive(Debug, Clone)]
pub struct UnitObject {
    name: String,
    /// Source file, or `None` for an implicit package directory.
    source: Option<PathBuf>,
    bindings: BTreeMap<String, Value>,
}

impl UnitObject {
    fn new(name: &str, source: Option<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            source,
            bindings: BTreeMap::new(),
        }
    }

    /// The unit's full name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path of the unit's source file, if it has one.
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Looks up a binding.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Iterates over the unit's bindings in name order.
    pub fn bindings(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.bindings.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl UnitView for UnitObject {
    fn unit_name(&self) -> Option<&str> {
        Some(&self.name)
    }

    fn attribute(&self, name: &str) -> Option<AttributeKind> {
        self.bindings.get(name).map(|value| match value {
            Value::Unit(_) => AttributeKind::Unit,
            _ => AttributeKind::Value,
        })
    }
}

/// Where a unit's source was found.
#[derive(Debug, Clone)]
enum Located {
    File(PathBuf),
    Package,
}

// ─────────────────────────────────────────────────────────────────────────────
// Sandbox
// ─────────────────────────────────────────────────────────────────────────────

/// A unit runtime rooted at a directory.
#[derive(Debug)]
pub struct Sandbox {
    root: PathBuf,
    units: HashMap<String, UnitObject>,
}

impl Sandbox {
    /// Creates an empty sandbox loading units from `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            units: HashMap::new(),
        }
    }

    /// The directory units are loaded from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Loads a unit on behalf of the host (no loading unit).
    pub fn import(&mut self, name: &str, observer: &mut dyn LoadObserver) -> Result<()> {
        self.ensure_loaded(name, observer)?;
        if let Some(unit) = self.units.get(name) {
            observer.record_load(&LoadEvent::import(LoadContext::host(), name, unit));
        }
        Ok(())
    }

    /// Invokes a function defined by `unit`.
    ///
    /// Loads inside the function body are reported with
    /// [`LoadScope::Function`]; whatever they bind is discarded on return.
    pub fn call(
        &mut self,
        unit: &str,
        function: &str,
        observer: &mut dyn LoadObserver,
    ) -> Result<()> {
        let body = match self.unit(unit)?.get(function) {
            Some(Value::Function(body)) => body.clone(),
            _ => {
                return Err(SandboxError::UnknownFunction {
                    unit: unit.to_string(),
                    function: function.to_string(),
                })
            }
        };

        for stmt in &body {
            self.exec(unit, LoadScope::Function, stmt, observer)?;
        }
        Ok(())
    }

    /// Re-executes a loaded unit's current source into its existing bindings.
    ///
    /// Bindings are overwritten, never cleared, so references other units hold
    /// to this unit see the new contents. A failed reload leaves the unit
    /// partially updated.
    pub fn reload(&mut self, name: &str, observer: &mut dyn LoadObserver) -> Result<()> {
        if !self.units.contains_key(name) {
            return Err(SandboxError::NotFound(name.to_string()));
        }
        debug!("Re-executing {}", name);
        self.execute(name, observer)
    }

    /// Reads a dotted path starting from `unit`'s bindings.
    ///
    /// `resolve("b", "a.x")` reads `x` from whatever unit `b` binds as `a`.
    pub fn resolve(&self, unit: &str, path: &str) -> Result<Value> {
        let segments: Vec<&str> = path.split('.').collect();
        self.resolve_segments(unit, &segments)
    }

    /// Gets a loaded unit.
    pub fn get(&self, name: &str) -> Option<&UnitObject> {
        self.units.get(name)
    }

    /// Names of all loaded units, sorted.
    pub fn loaded_units(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.units.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of loaded units.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// Returns true if nothing is loaded.
    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    // ── loading ─────────────────────────────────────────────────────────────

    fn unit(&self, name: &str) -> Result<&UnitObject> {
        self.units
            .get(name)
            .ok_or_else(|| SandboxError::NotFound(name.to_string()))
    }

    fn locate(&self, name: &str) -> Option<Located> {
        let relative: PathBuf = name.split('.').collect();

        let file = self.root.join(&relative).with_extension(UNIT_EXTENSION);
        if file.is_file() {
            return Some(Located::File(file));
        }

        let dir = self.root.join(&relative);
        let package_file = dir.join(PACKAGE_FILE);
        if package_file.is_file() {
            return Some(Located::File(package_file));
        }
        if dir.is_dir() {
            return Some(Located::Package);
        }
        None
    }

    /// Loads `name` (and its parents) unless already loaded.
    fn ensure_loaded(&mut self, name: &str, observer: &mut dyn LoadObserver) -> Result<()> {
        if self.units.contains_key(name) {
            return Ok(());
        }

        let parent = parent_name(name);
        if let Some(parent) = parent {
            self.ensure_loaded(parent, observer)?;
        }

        let source = match self.locate(name) {
            Some(Located::File(path)) => Some(path),
            Some(Located::Package) => None,
            None => return Err(SandboxError::NotFound(name.to_string())),
        };

        debug!("Loading {}", name);

        // Registered before executing so import cycles see a partial unit.
        self.units
            .insert(name.to_string(), UnitObject::new(name, source));

        if let Err(e) = self.execute(name, observer) {
            self.units.remove(name);
            return Err(e);
        }

        // A package holds its children by name, so it never sees a stale child.
        if let Some(parent_unit) = parent.and_then(|parent| self.units.get_mut(parent)) {
            parent_unit
                .bindings
                .insert(short_name(name).to_string(), Value::Unit(name.to_string()));
        }

        Ok(())
    }

    /// Executes a unit's source at module scope.
    fn execute(&mut self, name: &str, observer: &mut dyn LoadObserver) -> Result<()> {
        let stmts = match self.unit(name)?.source.clone() {
            Some(path) => {
                let text = fs::read_to_string(&path)
                    .map_err(|source| SandboxError::Io { path, source })?;
                parse_source(name, &text)?
            }
            None => Vec::new(),
        };

        for stmt in &stmts {
            let bound = self.exec(name, LoadScope::Module, stmt, observer)?;
            if let Some(unit) = self.units.get_mut(name) {
                unit.bindings.extend(bound);
            }
        }
        Ok(())
    }

    /// Executes one statement on behalf of `unit`, returning the bindings it
    /// produces.
    fn exec(
        &mut self,
        unit: &str,
        scope: LoadScope,
        stmt: &Stmt,
        observer: &mut dyn LoadObserver,
    ) -> Result<Vec<(String, Value)>> {
        let context = LoadContext {
            loader: Some(unit),
            scope,
        };

        match stmt {
            Stmt::Let { name, expr } => {
                let value = match expr {
                    Expr::Int(n) => Value::Int(*n),
                    Expr::Str(s) => Value::Str(s.clone()),
                    Expr::Path(segments) => {
                        let segments: Vec<&str> = segments.iter().map(String::as_str).collect();
                        self.resolve_segments(unit, &segments)?
                    }
                };
                Ok(vec![(name.clone(), value)])
            }

            Stmt::Import { unit: target, alias } => {
                self.ensure_loaded(target, observer)?;
                let loaded = self.unit(target)?;
                observer.record_load(&LoadEvent::import(context, target, loaded));

                let binding = alias.as_deref().unwrap_or_else(|| short_name(target));
                Ok(vec![(binding.to_string(), Value::Unit(target.clone()))])
            }

            Stmt::FromImport {
                unit: target,
                names,
            } => {
                self.ensure_loaded(target, observer)?;

                let mut bound = Vec::with_capacity(names.len());
                for entry in names {
                    let value = match self.unit(target)?.get(&entry.name) {
                        Some(value) => value.clone(),
                        None => {
                            // Not bound yet: a nested unit that nobody has loaded.
                            let child = child_name(target, &entry.name);
                            if self.locate(&child).is_none() {
                                return Err(SandboxError::UnknownAttribute {
                                    unit: target.clone(),
                                    attribute: entry.name.clone(),
                                });
                            }
                            self.ensure_loaded(&child, observer)?;
                            Value::Unit(child)
                        }
                    };
                    bound.push((entry.binding().to_string(), value));
                }

                let requested: Vec<&str> = names.iter().map(|n| n.name.as_str()).collect();
                let loaded = self.unit(target)?;
                observer.record_load(&LoadEvent::from_import(context, target, &requested, loaded));

                Ok(bound)
            }

            Stmt::Function { name, body } => {
                Ok(vec![(name.clone(), Value::Function(body.clone()))])
            }

            Stmt::Fail { message } => Err(SandboxError::Raised {
                unit: unit.to_string(),
                message: message.clone(),
            }),
        }
    }

    fn resolve_segments(&self, unit: &str, segments: &[&str]) -> Result<Value> {
        let mut current = self.unit(unit)?;

        for (i, segment) in segments.iter().enumerate() {
            let value = current.get(segment).ok_or_else(|| SandboxError::Unbound {
                unit: current.name.clone(),
                name: segment.to_string(),
            })?;

            if i + 1 == segments.len() {
                return Ok(value.clone());
            }

            current = match value {
                Value::Unit(name) => self.unit(name)?,
                _ => return Err(SandboxError::NotAUnit(segment.to_string())),
            };
        }

        Err(SandboxError::Unbound {
            unit: unit.to_string(),
            name: String::new(),
        })
    }
}

impl UnitRegistry for Sandbox {
    fn is_loaded(&self, name: &str) -> bool {
        self.units.contains_key(name)
    }

    fn reload_unit(
        &mut self,
        name: &str,
        observer: &mut dyn LoadObserver,
    ) -> std::result::Result<(), HostError> {
        self.reload(name, observer).map_err(HostError::from)
    }

    fn unit_at(&self, path: &Path) -> Option<String> {
        let wanted = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

        self.units
            .values()
            .find(|unit| match &unit.source {
                Some(source) => {
                    source == path
                        || fs::canonicalize(source)
                            .map(|p| p == wanted)
                            .unwrap_or(false)
                }
                None => false,
            })
            .map(|unit| unit.name.clone())
            .or_else(|| {
                debug!("No loaded unit defined at {}", path.display());
                None
            })
    }
}
