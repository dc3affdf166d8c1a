//! Error types shared by every filterhost crate.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration file could not be read.
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed configuration line.
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// `#include` nesting exceeded the supported depth.
    #[error("Include depth exceeded at {path}")]
    IncludeDepth { path: PathBuf },

    /// A required configuration key is absent.
    #[error("Missing configuration key: {0}")]
    MissingKey(String),

    /// A configuration value could not be interpreted.
    #[error("Invalid value for '{key}': {value}")]
    InvalidValue { key: String, value: String },
}

/// Core result type.
pub type Result<T> = std::result::Result<T, CoreError>;
