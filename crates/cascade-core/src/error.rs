//! Error types for the sandbox runtime.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while loading, executing or inspecting sandbox units.
#[derive(Error, Debug)]
pub enum SandboxError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{unit}:{line}: {message}")]
    Parse {
        unit: String,
        line: usize,
        message: String,
    },

    #[error("No unit named '{0}'")]
    NotFound(String),

    #[error("{unit} raised: {message}")]
    Raised { unit: String, message: String },

    #[error("Cannot import '{attribute}' from {unit}")]
    UnknownAttribute { unit: String, attribute: String },

    #[error("'{name}' is not bound in {unit}")]
    Unbound { unit: String, name: String },

    #[error("'{0}' is not a unit")]
    NotAUnit(String),

    #[error("{unit} has no function '{function}'")]
    UnknownFunction { unit: String, function: String },
}

pub type Result<T> = std::result::Result<T, SandboxError>;
