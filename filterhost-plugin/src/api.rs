//! Plugin trait and metadata.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Common surface of every plugin descriptor.
///
/// A descriptor is the reusable, registry-held record for one
/// implementation; live stages are created from it by the engines.
pub trait Plugin: Send + Sync {
    /// Return metadata about this plugin.
    fn info(&self) -> &PluginInfo;

    /// Identifier used for stage names in configuration files.
    fn ident(&self) -> &str {
        &self.info().ident
    }
}

/// Metadata describing a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginInfo {
    /// Short identifier, matched exactly against stage names.
    pub ident: String,
    /// Human-readable name.
    pub name: String,
    pub kind: PluginKind,
    pub api_version: u32,
    pub origin: PluginOrigin,
}

impl PluginInfo {
    /// Metadata for a plugin compiled into the binary.
    pub fn builtin(ident: &str, name: &str, kind: PluginKind, api_version: u32) -> Self {
        Self {
            ident: ident.into(),
            name: name.into(),
            kind,
            api_version,
            origin: PluginOrigin::Builtin,
        }
    }
}

/// Engine a plugin belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginKind {
    /// Software video filter.
    SoftFilter,
    /// Audio DSP filter.
    Dsp,
}

/// Where a plugin came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginOrigin {
    /// Compiled into the binary.
    Builtin,
    /// Shared library (.so/.dylib/.dll) loaded at runtime.
    Native(PathBuf),
}
