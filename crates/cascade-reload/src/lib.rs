//! Cascade Reload - Ancestor-ordered reloads
//!
//! When a unit changes, reloading it alone leaves every unit that copied
//! something out of it holding stale values. This crate reloads the unit and
//! then every unit that transitively depends on it, dependencies first, using
//! the graph built by [`cascade_graph::GraphBuilder`].
//!
//! - [`Reloader`] runs one reload batch against a host [`UnitRegistry`].
//! - [`ReloadPolicy`] adds a cooldown between attempts and flags batches
//!   that touched sensitive units.
//! - [`DiagnosticsSink`] receives a [`ReloadEvent`] for everything worth
//!   reporting.
//!
//! # Example
//!
//! ```no_run
//! use cascade_core::sandbox::Sandbox;
//! use cascade_reload::{ReloadPolicy, Reloader};
//!
//! let mut sandbox = Sandbox::new("units");
//! let mut reloader = Reloader::default();
//! sandbox.import("app.main", reloader.observer()).unwrap();
//!
//! let mut policy = ReloadPolicy::new(reloader);
//! let outcome = policy.reload(&mut sandbox, "app.models").unwrap();
//! println!("{:?}", outcome.reloaded_units());
//! ```
//!
//! [`UnitRegistry`]: cascade_core::UnitRegistry

pub mod config;
mod diagnostics;
mod engine;
mod outcome;
mod policy;

pub use config::{CascadeConfig, ConfigError};
pub use diagnostics::{
    CommandNotifier, DiagnosticsSink, FanoutSink, MemorySink, ReloadEvent, Severity, TracingSink,
};
pub use engine::Reloader;
pub use outcome::{ReloadError, ReloadOutcome};
pub use policy::{ReloadPolicy, DEFAULT_COOLDOWN};
