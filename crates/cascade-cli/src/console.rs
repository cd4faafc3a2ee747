//! Coloured terminal reports.

use cascade_reload::{DiagnosticsSink, ReloadEvent, Severity};
use colored::Colorize;

/// Log target the reload engine reports under.
const REPORT_TARGET: &str = "cascade_reload::diagnostics";

/// Whether a log record is a reload report already shown by [`ConsoleSink`].
pub fn is_report(target: &str) -> bool {
    target.starts_with(REPORT_TARGET)
}

/// Prints one line per reload event.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl DiagnosticsSink for ConsoleSink {
    fn report(&self, event: &ReloadEvent) {
        let prefix = "cascade:".bold();
        let message = event.to_string();

        match event {
            ReloadEvent::Reloading { .. } => println!("{} {}", prefix, message.blue()),
            ReloadEvent::Debounced { .. } | ReloadEvent::Vetoed { .. } => {
                eprintln!("{} {}", prefix, message.yellow())
            }
            _ => match event.severity() {
                Severity::Success => println!("{} {}", prefix, message.green()),
                Severity::Error => eprintln!("{} {}", prefix, message.red()),
                Severity::Info => println!("{} {}", prefix, message),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_report() {
        assert!(is_report("cascade_reload::diagnostics"));
        assert!(!is_report("cascade_reload::engine"));
        assert!(!is_report("cascade_watcher"));
    }
}
