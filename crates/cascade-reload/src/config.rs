//! Project configuration.
//!
//! Read from `<root>/.cascade/config.json`, then from the user config
//! directory, then defaults. Every field is optional in the file.

use crate::diagnostics::CommandNotifier;
use cascade_graph::GraphBuilder;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Directory holding the project config.
pub const CONFIG_DIR: &str = ".cascade";

/// Config file name inside [`CONFIG_DIR`].
pub const CONFIG_FILE: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to access config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid sensitive unit pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    /// Minimum time between two reload attempts.
    pub cooldown_secs: u64,

    /// Glob patterns on short unit names that flag a reload.
    pub sensitive_units: Vec<String>,

    /// Units whose function-scope loads still create edges.
    pub harness_units: Vec<String>,

    /// Quiet period before a burst of file events is handled.
    pub debounce_ms: u64,

    /// File extensions that trigger reloads.
    pub extensions: Vec<String>,

    /// Command run for failures, with the message appended.
    pub notify_command: Option<Vec<String>>,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            cooldown_secs: 15,
            sensitive_units: Vec::new(),
            harness_units: Vec::new(),
            debounce_ms: 200,
            extensions: vec![cascade_core::sandbox::UNIT_EXTENSION.to_string()],
            notify_command: None,
        }
    }
}

impl CascadeConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_secs)
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Config path for a project root.
    pub fn project_path(root: &Path) -> PathBuf {
        root.join(CONFIG_DIR).join(CONFIG_FILE)
    }

    /// Per-user fallback config path.
    pub fn user_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("cascade").join(CONFIG_FILE))
    }

    /// Reads a config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Finds the config that applies to `root`.
    pub fn discover(root: &Path) -> Result<Self, ConfigError> {
        let candidates = std::iter::once(Self::project_path(root)).chain(Self::user_path());

        for path in candidates {
            if path.is_file() {
                debug!("Using config {}", path.display());
                return Self::load(&path);
            }
        }

        debug!("No config found, using defaults");
        Ok(Self::default())
    }

    /// Writes the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?).map_err(io_err)
    }

    /// A graph builder honouring `harness_units`.
    pub fn graph_builder(&self) -> GraphBuilder {
        GraphBuilder::new().with_harness_units(self.harness_units.iter().cloned())
    }

    /// The configured failure notifier, if any.
    pub fn notifier(&self) -> Option<CommandNotifier> {
        self.notify_command
            .as_deref()
            .and_then(CommandNotifier::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CascadeConfig::default();
        assert_eq!(config.cooldown(), Duration::from_secs(15));
        assert_eq!(config.debounce(), Duration::from_millis(200));
        assert_eq!(config.extensions, vec!["unit"]);
        assert!(config.notifier().is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: CascadeConfig =
            serde_json::from_str(r#"{ "cooldown_secs": 3, "sensitive_units": ["urls"] }"#).unwrap();
        assert_eq!(config.cooldown_secs, 3);
        assert_eq!(config.sensitive_units, vec!["urls"]);
        assert_eq!(config.debounce_ms, 200);
    }

    #[test]
    fn test_save_then_discover() {
        let dir = TempDir::new().unwrap();
        let path = CascadeConfig::project_path(dir.path());

        let config = CascadeConfig {
            harness_units: vec!["tests.harness".into()],
            notify_command: Some(vec!["notify-send".into(), "cascade".into()]),
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert!(path.starts_with(dir.path().join(".cascade")));
        let found = CascadeConfig::discover(dir.path()).unwrap();
        assert_eq!(found, config);
        assert!(found.notifier().is_some());
    }

    #[test]
    fn test_invalid_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            CascadeConfig::load(&path),
            Err(ConfigError::Json(_))
        ));
        assert!(matches!(
            CascadeConfig::load(&dir.path().join("missing.json")),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_graph_builder_gets_harness_units() {
        use cascade_core::{LoadContext, LoadEvent, LoadObserver, UnitView, AttributeKind};

        struct Named;
        impl UnitView for Named {
            fn unit_name(&self) -> Option<&str> {
                Some("lib")
            }
            fn attribute(&self, _name: &str) -> Option<AttributeKind> {
                None
            }
        }

        let config = CascadeConfig {
            harness_units: vec!["harness".into()],
            ..Default::default()
        };
        let mut builder = config.graph_builder();
        builder.record_load(&LoadEvent::import(
            LoadContext::function("harness"),
            "lib",
            &Named,
        ));
        assert!(builder.graph().has_edge("harness", "lib"));
    }
}
