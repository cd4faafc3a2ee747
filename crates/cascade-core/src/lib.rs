//! Cascade Core - Units and the host runtime seams
//!
//! This crate defines the vocabulary every other Cascade crate speaks:
//! load events, unit views, and the two traits a host runtime implements
//! to take part in dependency tracking and ordered reloads.
//!
//! It also ships the [`sandbox`] runtime, a small directory-backed unit
//! system that the CLI and the test suites drive end to end.
//!
//! # Example
//!
//! ```no_run
//! use cascade_core::sandbox::Sandbox;
//! use cascade_core::NoopObserver;
//!
//! let mut sandbox = Sandbox::new("units");
//! sandbox.import("app.main", &mut NoopObserver).unwrap();
//! println!("{}", sandbox.resolve("app.main", "version").unwrap());
//! ```

pub mod error;
pub mod sandbox;
pub mod unit;

pub use error::{Result, SandboxError};
pub use unit::{
    child_name, parent_name, short_name, AttributeKind, HostError, LoadContext, LoadEvent,
    LoadObserver, LoadScope, NoopObserver, UnitRegistry, UnitView,
};
