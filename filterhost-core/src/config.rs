//! Plain-text key/value configuration files.
//!
//! The format is line based:
//!
//! ```text
//! # comment
//! filters = 2
//! filter0 = boxblur
//! filter1 = "sharpen"
//! sharpen_strength = 0.75
//! #include "common.cfg"
//! ```
//!
//! Quoted values may contain whitespace and `#`. An `#include` splices the
//! named file in place, resolved relative to the including file. Later
//! definitions override earlier ones.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::debug;

use crate::error::{CoreError, Result};

const MAX_INCLUDE_DEPTH: usize = 16;

/// A parsed configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    path: Option<PathBuf>,
    entries: HashMap<String, String>,
}

impl ConfigFile {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and parse a configuration file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self {
            path: Some(path.to_path_buf()),
            entries: HashMap::new(),
        };
        config.load_file(path, 0)?;
        debug!(path = %path.display(), keys = config.entries.len(), "Loaded config");
        Ok(config)
    }

    /// Parse configuration text. Includes resolve against the working directory.
    pub fn parse(text: &str) -> Result<Self> {
        let mut config = Self::new();
        config.load_text(text, None, 0)?;
        Ok(config)
    }

    /// Path this configuration was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no keys are defined.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Define or replace a key.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Check whether a key is defined.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Raw value of a key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Owned string value of a key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.get(key).map(str::to_owned)
    }

    /// Parse a key's value.
    ///
    /// Returns `Ok(None)` when the key is absent and
    /// [`CoreError::InvalidValue`] when it does not parse as `T`.
    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| CoreError::InvalidValue {
                    key: key.to_string(),
                    value: raw.to_string(),
                }),
        }
    }

    /// Signed integer value; `None` if absent or malformed.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get_parsed(key).ok().flatten()
    }

    /// Unsigned integer value; `None` if absent or malformed.
    pub fn get_uint(&self, key: &str) -> Option<u64> {
        self.get_parsed(key).ok().flatten()
    }

    /// Float value; `None` if absent or malformed.
    pub fn get_float(&self, key: &str) -> Option<f32> {
        self.get_parsed(key).ok().flatten()
    }

    /// Boolean value (`true`/`false`/`1`/`0`); `None` if absent or malformed.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)?.trim() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        }
    }

    /// Value of a required key.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| CoreError::MissingKey(key.to_string()))
    }

    fn load_file(&mut self, path: &Path, depth: usize) -> Result<()> {
        if depth > MAX_INCLUDE_DEPTH {
            return Err(CoreError::IncludeDepth {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|source| CoreError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        self.load_text(&text, path.parent(), depth)
    }

    fn load_text(&mut self, text: &str, base: Option<&Path>, depth: usize) -> Result<()> {
        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix("#include") {
                let target = parse_quoted(rest.trim(), line_no)?;
                let path = match base {
                    Some(dir) => dir.join(&target),
                    None => PathBuf::from(&target),
                };
                debug!(path = %path.display(), "Including config");
                self.load_file(&path, depth + 1)?;
                continue;
            }

            if line.starts_with('#') {
                continue;
            }

            let (key, value) = line.split_once('=').ok_or_else(|| CoreError::Parse {
                line: line_no,
                message: format!("expected 'key = value', found '{line}'"),
            })?;

            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return Err(CoreError::Parse {
                    line: line_no,
                    message: format!("invalid key '{key}'"),
                });
            }

            let value = value.trim();
            let value = if value.starts_with('"') {
                parse_quoted(value, line_no)?
            } else {
                // Unquoted values end at a trailing comment
                value.split('#').next().unwrap_or("").trim().to_string()
            };

            self.entries.insert(key.to_string(), value);
        }
        Ok(())
    }
}

fn parse_quoted(text: &str, line: usize) -> Result<String> {
    let inner = text.strip_prefix('"').ok_or_else(|| CoreError::Parse {
        line,
        message: "expected opening quote".into(),
    })?;
    let end = inner.find('"').ok_or_else(|| CoreError::Parse {
        line,
        message: "unterminated string".into(),
    })?;
    Ok(inner[..end].to_string())
}
