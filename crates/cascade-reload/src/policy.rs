//! Rate limiting and sensitive-unit alerts around the reload engine.

use crate::config::{CascadeConfig, ConfigError};
use crate::diagnostics::ReloadEvent;
use crate::engine::Reloader;
use crate::outcome::{ReloadError, ReloadOutcome};
use cascade_core::{short_name, UnitRegistry};
use glob::Pattern;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cooldown between two reload attempts.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(15);

/// Wraps a [`Reloader`] with a cooldown and a sensitive-unit veto.
///
/// A request arriving less than `cooldown` after the previous attempt is
/// answered with [`ReloadOutcome::Debounced`] and touches nothing. Otherwise
/// the attempt time is recorded (whatever the result) and the engine runs.
/// A successful result whose units include a sensitive short name is
/// reported as [`ReloadOutcome::Vetoed`]; the reloads themselves stand.
pub struct ReloadPolicy {
    reloader: Reloader,
    cooldown: Duration,
    last_attempt: Option<Instant>,
    sensitive: Vec<Pattern>,
}

impl ReloadPolicy {
    pub fn new(reloader: Reloader) -> Self {
        Self {
            reloader,
            cooldown: DEFAULT_COOLDOWN,
            last_attempt: None,
            sensitive: Vec::new(),
        }
    }

    /// Applies the cooldown and sensitive patterns from a config.
    pub fn from_config(reloader: Reloader, config: &CascadeConfig) -> Result<Self, ConfigError> {
        Self::new(reloader)
            .with_cooldown(config.cooldown())
            .with_sensitive_units(&config.sensitive_units)
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Sets the glob patterns matched against short unit names.
    pub fn with_sensitive_units<S: AsRef<str>>(mut self, patterns: &[S]) -> Result<Self, ConfigError> {
        self.sensitive = patterns
            .iter()
            .map(|p| {
                Pattern::new(p.as_ref()).map_err(|source| ConfigError::Pattern {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(self)
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    pub fn reloader(&self) -> &Reloader {
        &self.reloader
    }

    /// Reloads `unit` and its ancestors unless the cooldown is running.
    pub fn reload<R>(&mut self, registry: &mut R, unit: &str) -> Result<ReloadOutcome, ReloadError>
    where
        R: UnitRegistry + ?Sized,
    {
        self.reload_at(Instant::now(), registry, unit)
    }

    /// Like [`ReloadPolicy::reload`], with an explicit clock reading.
    pub fn reload_at<R>(
        &mut self,
        now: Instant,
        registry: &mut R,
        unit: &str,
    ) -> Result<ReloadOutcome, ReloadError>
    where
        R: UnitRegistry + ?Sized,
    {
        if let Some(remaining) = self.remaining_cooldown(now) {
            let retry_in_ms = u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX);
            self.reloader.report(ReloadEvent::Debounced {
                unit: unit.to_string(),
                retry_in_ms,
            });
            return Ok(ReloadOutcome::Debounced {
                unit: unit.to_string(),
                retry_in_ms,
            });
        }

        self.last_attempt = Some(now);
        let outcome = self.reloader.reload(registry, unit)?;
        Ok(self.apply_veto(unit, outcome))
    }

    /// Resolves `path` to a loaded unit, then reloads it.
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
        debug!("{} resolves to {}", path.display(), unit);
        self.reload(registry, &unit)
    }

    fn remaining_cooldown(&self, now: Instant) -> Option<Duration> {
        let last = self.last_attempt?;
        let elapsed = now.saturating_duration_since(last);
        (elapsed < self.cooldown).then(|| self.cooldown - elapsed)
    }

    /// Short names of `units` matching a sensitive pattern.
    pub fn sensitive_matches(&self, units: &[String]) -> Vec<String> {
        units
            .iter()
            .filter(|unit| {
                let short = short_name(unit);
                self.sensitive.iter().any(|p| p.matches(short))
            })
            .cloned()
            .collect()
    }

    fn apply_veto(&self, unit: &str, outcome: ReloadOutcome) -> ReloadOutcome {
        if !matches!(
            outcome,
            ReloadOutcome::Reloaded { .. } | ReloadOutcome::NotInGraph { .. }
        ) {
            return outcome;
        }

        let sensitive = self.sensitive_matches(outcome.reloaded_units());
        if sensitive.is_empty() {
            return outcome;
        }

        self.reloader.report(ReloadEvent::Vetoed {
            unit: unit.to_string(),
            sensitive: sensitive.clone(),
        });
        ReloadOutcome::Vetoed {
            units: outcome.reloaded_units().to_vec(),
            sensitive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::MemorySink;
    use cascade_core::{HostError, LoadObserver};
    use cascade_graph::{Edge, EdgeKind};

    /// Counts every lookup and reload.
    #[derive(Default)]
    struct CountingRegistry {
        lookups: usize,
        reloads: Vec<String>,
        fail: bool,
    }

    impl UnitRegistry for CountingRegistry {
        fn is_loaded(&self, _name: &str) -> bool {
            true
        }

        fn reload_unit(
            &mut self,
            name: &str,
            _observer: &mut dyn LoadObserver,
        ) -> Result<(), HostError> {
            self.lookups += 1;
            self.reloads.push(name.to_string());
            if self.fail {
                return Err("boom".into());
            }
            Ok(())
        }

        fn unit_at(&self, path: &Path) -> Option<String> {
            path.file_stem().and_then(|s| s.to_str()).map(str::to_string)
        }
    }

    fn policy(sink: &MemorySink) -> ReloadPolicy {
        let mut reloader = Reloader::default().with_sink(sink.clone());
        let graph = reloader.observer().graph_mut();
        graph.add_edge("app.views", "app.models", Edge::new(EdgeKind::Imports));
        graph.add_edge("app.urls", "app.views", Edge::new(EdgeKind::Imports));
        ReloadPolicy::new(reloader)
    }

    #[test]
    fn test_second_call_within_cooldown_is_debounced() {
        let sink = MemorySink::new();
        let mut policy = policy(&sink);
        let mut registry = CountingRegistry::default();
        let start = Instant::now();

        let first = policy.reload_at(start, &mut registry, "app.models").unwrap();
        assert!(first.is_success());
        let lookups = registry.lookups;

        let second = policy
            .reload_at(start + Duration::from_secs(5), &mut registry, "app.models")
            .unwrap();
        assert_eq!(
            second,
            ReloadOutcome::Debounced {
                unit: "app.models".into(),
                retry_in_ms: 10_000
            }
        );
        assert_eq!(registry.lookups, lookups);
    }

    #[test]
    fn test_debounce_does_not_extend_cooldown() {
        let sink = MemorySink::new();
        let mut policy = policy(&sink);
        let mut registry = CountingRegistry::default();
        let start = Instant::now();

        policy.reload_at(start, &mut registry, "app.models").unwrap();
        policy
            .reload_at(start + Duration::from_secs(10), &mut registry, "app.models")
            .unwrap();
        let third = policy
            .reload_at(start + Duration::from_secs(15), &mut registry, "app.models")
            .unwrap();

        assert!(third.is_success());
    }

    #[test]
    fn test_failed_attempt_still_starts_cooldown() {
        let sink = MemorySink::new();
        let mut policy = policy(&sink);
        let mut registry = CountingRegistry {
            fail: true,
            ..Default::default()
        };
        let start = Instant::now();

        assert!(policy.reload_at(start, &mut registry, "app.models").is_err());

        let again = policy
            .reload_at(start + Duration::from_secs(1), &mut registry, "app.models")
            .unwrap();
        assert!(matches!(again, ReloadOutcome::Debounced { .. }));
        assert_eq!(registry.reloads, vec!["app.models"]);
    }

    #[test]
    fn test_sensitive_unit_vetoes_after_reloading() {
        let sink = MemorySink::new();
        let mut policy = policy(&sink).with_sensitive_units(&["url*"]).unwrap();
        let mut registry = CountingRegistry::default();

        let outcome = policy.reload(&mut registry, "app.models").unwrap();

        assert_eq!(
            outcome,
            ReloadOutcome::Vetoed {
                units: vec!["app.models".into(), "app.views".into(), "app.urls".into()],
                sensitive: vec!["app.urls".into()],
            }
        );
        // Nothing was prevented.
        assert_eq!(registry.reloads, vec!["app.models", "app.views", "app.urls"]);
        assert!(matches!(
            sink.events().last(),
            Some(ReloadEvent::Vetoed { .. })
        ));
    }

    #[test]
    fn test_patterns_match_short_names_only() {
        let sink = MemorySink::new();
        let policy = policy(&sink).with_sensitive_units(&["app"]).unwrap();
        assert!(policy
            .sensitive_matches(&["app.models".to_string(), "app.views".to_string()])
            .is_empty());
        assert_eq!(
            policy.sensitive_matches(&["app".to_string()]),
            vec!["app".to_string()]
        );
    }

    #[test]
    fn test_not_in_graph_can_be_vetoed() {
        let sink = MemorySink::new();
        let mut policy = policy(&sink).with_sensitive_units(&["settings"]).unwrap();
        let mut registry = CountingRegistry::default();

        let outcome = policy.reload(&mut registry, "project.settings").unwrap();
        assert!(matches!(
            outcome,
            ReloadOutcome::Vetoed { ref sensitive, .. } if sensitive.as_slice() == ["project.settings"]
        ));

        let mut policy = policy.with_cooldown(Duration::ZERO);
        let outcome = policy.reload(&mut registry, "other").unwrap();
        assert_eq!(outcome, ReloadOutcome::NotInGraph { unit: "other".into() });
    }

    #[test]
    fn test_invalid_pattern_is_rejected() {
        let sink = MemorySink::new();
        let err = policy(&sink).with_sensitive_units(&["[unclosed"]).err().unwrap();
        assert!(matches!(err, ConfigError::Pattern { .. }));
    }

    #[test]
    fn test_reload_by_location_resolves_first() {
        let sink = MemorySink::new();
        let mut policy = policy(&sink);
        let mut registry = CountingRegistry::default();

        let outcome = policy
            .reload_by_location(&mut registry, Path::new("/project/app/views.unit"))
            .unwrap();
        assert_eq!(outcome, ReloadOutcome::NotInGraph { unit: "views".into() });
    }
}
