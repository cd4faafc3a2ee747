//! Diagnostics reporting.
//!
//! The engine and the policy describe what happened as [`ReloadEvent`]s and
//! hand them to a [`DiagnosticsSink`]. Where the events end up (the log, a
//! terminal, a desktop notification) is the sink's business.

use cascade_graph::{format_cycle, GraphEdge};
use serde::Serialize;
use std::io;
use std::process::{Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tracing::{error, info, warn};

/// How an event should be presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Success,
    Error,
}

/// Something worth telling the user about a reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReloadEvent {
    /// The requested unit is not loaded.
    NotLoaded { unit: String },
    /// The unit reloaded, but the graph knows nothing about it.
    NotInGraph { unit: String },
    /// The ancestor batch is cyclic; no ancestor was reloaded.
    CycleDetected { unit: String, cycle: Vec<GraphEdge> },
    /// About to reload the ancestors, in this order.
    Reloading { unit: String, ancestors: Vec<String> },
    /// Re-executing `unit` raised.
    Failed { unit: String, cause: String },
    /// Every unit in the batch reloaded.
    Reloaded { unit: String, units: Vec<String> },
    /// Suppressed by the cooldown.
    Debounced { unit: String, retry_in_ms: u64 },
    /// The reload ran but touched units flagged as sensitive.
    Vetoed { unit: String, sensitive: Vec<String> },
}

impl ReloadEvent {
    /// Presentation level of the event.
    pub fn severity(&self) -> Severity {
        match self {
            ReloadEvent::Reloading { .. } | ReloadEvent::Debounced { .. } => Severity::Info,
            ReloadEvent::Reloaded { .. } => Severity::Success,
            ReloadEvent::NotLoaded { .. }
            | ReloadEvent::NotInGraph { .. }
            | ReloadEvent::CycleDetected { .. }
            | ReloadEvent::Failed { .. }
            | ReloadEvent::Vetoed { .. } => Severity::Error,
        }
    }

    /// The unit the request was about.
    pub fn unit(&self) -> &str {
        match self {
            ReloadEvent::NotLoaded { unit }
            | ReloadEvent::NotInGraph { unit }
            | ReloadEvent::CycleDetected { unit, .. }
            | ReloadEvent::Reloading { unit, .. }
            | ReloadEvent::Failed { unit, .. }
            | ReloadEvent::Reloaded { unit, .. }
            | ReloadEvent::Debounced { unit, .. }
            | ReloadEvent::Vetoed { unit, .. } => unit,
        }
    }
}

impl std::fmt::Display for ReloadEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReloadEvent::NotLoaded { unit } => write!(f, "error: not loaded: {}", unit),
            ReloadEvent::NotInGraph { unit } => write!(f, "error: not in graph: {}", unit),
            ReloadEvent::CycleDetected { unit, cycle } => write!(
                f,
                "error: cycle among ancestors of {}: {}",
                unit,
                format_cycle(cycle)
            ),
            ReloadEvent::Reloading { unit, ancestors } => write!(
                f,
                "reloading {} and ancestors: [{}]",
                unit,
                ancestors.join(", ")
            ),
            ReloadEvent::Failed { unit, cause } => {
                write!(f, "error while attempting reload({}): {}", unit, cause)
            }
            ReloadEvent::Reloaded { unit, units } => write!(
                f,
                "reloaded {} and {} ancestor(s)",
                unit,
                units.len().saturating_sub(1)
            ),
            ReloadEvent::Debounced { unit, retry_in_ms } => write!(
                f,
                "skipped reload of {} (cooldown, retry in {}ms)",
                unit, retry_in_ms
            ),
            ReloadEvent::Vetoed { unit, sensitive } => write!(
                f,
                "reload of {} touched sensitive unit(s): {}",
                unit,
                sensitive.join(", ")
            ),
        }
    }
}

/// Receives reload events.
pub trait DiagnosticsSink: Send {
    fn report(&self, event: &ReloadEvent);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sinks
// ─────────────────────────────────────────────────────────────────────────────

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn report(&self, event: &ReloadEvent) {
        match event {
            ReloadEvent::Vetoed { .. } | ReloadEvent::Debounced { .. } => {
                warn!(unit = event.unit(), "{}", event)
            }
            _ => match event.severity() {
                Severity::Error => error!(unit = event.unit(), "{}", event),
                Severity::Info | Severity::Success => info!(unit = event.unit(), "{}", event),
            },
        }
    }
}

/// Runs an external command for every error-level event.
///
/// The event text is appended as the last argument, e.g.
/// `["notify-send", "cascade"]` or `["terminal-notifier", "-message"]`.
#[derive(Debug, Clone)]
pub struct CommandNotifier {
    program: String,
    args: Vec<String>,
}

impl CommandNotifier {
    /// Builds a notifier from an argv. Returns `None` for an empty argv.
    pub fn new(argv: &[String]) -> Option<Self> {
        let (program, args) = argv.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Spawns the command with `message` appended and reaps it on a
    /// background thread, so no exited child is left behind.
    pub fn notify(&self, message: &str) -> io::Result<JoinHandle<io::Result<ExitStatus>>> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(message)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        Ok(thread::spawn(move || child.wait()))
    }
}

impl DiagnosticsSink for CommandNotifier {
    fn report(&self, event: &ReloadEvent) {
        if event.severity() != Severity::Error {
            return;
        }

        if let Err(e) = self.notify(&event.to_string()) {
            warn!("Failed to run notifier '{}': {}", self.program, e);
        }
    }
}

/// Forwards each event to several sinks, in order.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn DiagnosticsSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    pub fn with(mut self, sink: impl DiagnosticsSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl DiagnosticsSink for FanoutSink {
    fn report(&self, event: &ReloadEvent) {
        for sink in &self.sinks {
            sink.report(event);
        }
    }
}

/// Keeps every event in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<ReloadEvent>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events reported so far.
    pub fn events(&self) -> Vec<ReloadEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Drops all recorded events.
    pub fn clear(&self) {
        if let Ok(mut events) = self.events.lock() {
            events.clear();
        }
    }
}

impl DiagnosticsSink for MemorySink {
    fn report(&self, event: &ReloadEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cascade_graph::EdgeKind;

    #[test]
    fn test_severity() {
        let failed = ReloadEvent::Failed {
            unit: "a".into(),
            cause: "boom".into(),
        };
        assert_eq!(failed.severity(), Severity::Error);
        assert_eq!(failed.unit(), "a");

        let done = ReloadEvent::Reloaded {
            unit: "a".into(),
            units: vec!["a".into(), "b".into()],
        };
        assert_eq!(done.severity(), Severity::Success);
        assert_eq!(done.to_string(), "reloaded a and 1 ancestor(s)");
    }

    #[test]
    fn test_cycle_message() {
        let event = ReloadEvent::CycleDetected {
            unit: "a".into(),
            cycle: vec![
                GraphEdge {
                    source: "a".into(),
                    target: "b".into(),
                    kind: EdgeKind::Imports,
                },
                GraphEdge {
                    source: "b".into(),
                    target: "a".into(),
                    kind: EdgeKind::Imports,
                },
            ],
        };
        assert_eq!(
            event.to_string(),
            "error: cycle among ancestors of a: a -> b -> a"
        );
    }

    #[test]
    fn test_fanout_and_memory() {
        let first = MemorySink::new();
        let second = MemorySink::new();
        let fanout = FanoutSink::new().with(first.clone()).with(second.clone());

        fanout.report(&ReloadEvent::NotLoaded { unit: "x".into() });

        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events(), first.events());

        first.clear();
        assert!(first.events().is_empty());
    }

    #[test]
    fn test_event_serialization() {
        let event = ReloadEvent::Debounced {
            unit: "a".into(),
            retry_in_ms: 1500,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"event\":\"debounced\""));
        assert!(json.contains("1500"));
    }

    #[test]
    fn test_notifier_needs_program() {
        assert!(CommandNotifier::new(&[]).is_none());
        assert!(CommandNotifier::new(&["notify-send".to_string()]).is_some());
    }

    #[cfg(unix)]
    #[test]
    fn test_notifier_reaps_children() {
        let notifier = CommandNotifier::new(&["true".to_string()]).unwrap();

        let handles = (0..5)
            .map(|i| notifier.notify(&format!("event {}", i)).unwrap())
            .collect::<Vec<_>>();

        for handle in handles {
            let status = handle.join().unwrap().unwrap();
            assert!(status.success());
        }
    }

    #[test]
    fn test_notifier_swallows_spawn_failure() {
        let notifier =
            CommandNotifier::new(&["cascade-no-such-notifier".to_string()]).unwrap();
        assert!(notifier.notify("boom").is_err());

        notifier.report(&ReloadEvent::NotLoaded { unit: "x".into() });
    }
}
