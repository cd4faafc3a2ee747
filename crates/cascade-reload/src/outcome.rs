//! Reload results.
//!
//! Successful and deliberately skipped reloads are [`ReloadOutcome`]s;
//! anything that stopped a batch is a [`ReloadError`]. Nothing is retried
//! automatically.

use cascade_core::HostError;
use cascade_graph::{format_cycle, GraphEdge};
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// What a reload request achieved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ReloadOutcome {
    /// The unit and every ancestor reloaded, in this order.
    Reloaded { units: Vec<String> },
    /// The unit reloaded, but no edge mentions it, so nothing cascaded.
    NotInGraph { unit: String },
    /// Suppressed by the cooldown; nothing was looked up or reloaded.
    Debounced { unit: String, retry_in_ms: u64 },
    /// The batch ran to completion but touched sensitive units. The reloads
    /// are not undone.
    Vetoed {
        units: Vec<String>,
        sensitive: Vec<String>,
    },
}

impl ReloadOutcome {
    /// Units that were re-executed, in order.
    pub fn reloaded_units(&self) -> &[String] {
        match self {
            ReloadOutcome::Reloaded { units } | ReloadOutcome::Vetoed { units, .. } => units,
            ReloadOutcome::NotInGraph { unit } => std::slice::from_ref(unit),
            ReloadOutcome::Debounced { .. } => &[],
        }
    }

    /// Returns true for a full, unflagged cascade.
    pub fn is_success(&self) -> bool {
        matches!(self, ReloadOutcome::Reloaded { .. })
    }
}

/// Why a reload request stopped.
#[derive(Error, Debug)]
pub enum ReloadError {
    #[error("Unit '{0}' is not loaded")]
    NotLoaded(String),

    #[error("No loaded unit is defined at {}", .0.display())]
    UnknownLocation(PathBuf),

    #[error("Dependency cycle among ancestors of '{unit}': {}", format_cycle(.cycle))]
    CyclicDependency { unit: String, cycle: Vec<GraphEdge> },

    #[error("Error while reloading '{unit}': {source}")]
    Failed {
        unit: String,
        #[source]
        source: HostError,
    },
}

impl ReloadError {
    /// The unit the error is about, when there is one.
    pub fn unit(&self) -> Option<&str> {
        match self {
            ReloadError::NotLoaded(unit)
            | ReloadError::CyclicDependency { unit, .. }
            | ReloadError::Failed { unit, .. } => Some(unit),
            ReloadError::UnknownLocation(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reloaded_units() {
        let outcome = ReloadOutcome::Reloaded {
            units: vec!["a".into(), "b".into()],
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.reloaded_units(), ["a".to_string(), "b".to_string()]);

        let lonely = ReloadOutcome::NotInGraph { unit: "a".into() };
        assert!(!lonely.is_success());
        assert_eq!(lonely.reloaded_units(), ["a".to_string()]);

        let skipped = ReloadOutcome::Debounced {
            unit: "a".into(),
            retry_in_ms: 10,
        };
        assert!(skipped.reloaded_units().is_empty());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = ReloadOutcome::Vetoed {
            units: vec!["settings".into()],
            sensitive: vec!["settings".into()],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "vetoed");
        assert_eq!(json["sensitive"][0], "settings");
    }

    #[test]
    fn test_failed_keeps_source() {
        let err = ReloadError::Failed {
            unit: "d".into(),
            source: "boom".into(),
        };
        assert_eq!(err.unit(), Some("d"));
        assert_eq!(err.to_string(), "Error while reloading 'd': boom");
        assert!(std::error::Error::source(&err).is_some());
    }
}
