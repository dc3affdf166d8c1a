//! Plugin file discovery.

use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Native shared-library extension of the target platform.
pub fn platform_extension() -> &'static str {
    if cfg!(target_os = "windows") {
        "dll"
    } else if cfg!(target_os = "macos") {
        "dylib"
    } else {
        "so"
    }
}

/// Finds candidate plugin files in a set of directories.
pub struct PluginLoader {
    search_paths: Vec<PathBuf>,
    extension: String,
}

impl PluginLoader {
    /// Loader matching the platform's shared-library extension.
    pub fn new() -> Self {
        Self::with_extension(platform_extension())
    }

    /// Loader matching a custom extension (without the leading dot).
    pub fn with_extension(extension: impl Into<String>) -> Self {
        Self {
            search_paths: Vec::new(),
            extension: extension.into(),
        }
    }

    /// Add a directory to search for plugins.
    pub fn add_search_path(&mut self, path: impl Into<PathBuf>) {
        self.search_paths.push(path.into());
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Discover all plugin files in search paths, sorted per directory.
    ///
    /// Missing or unreadable directories are skipped.
    pub fn discover(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        for dir in &self.search_paths {
            if !dir.exists() {
                debug!(path = %dir.display(), "Plugin directory does not exist, skipping");
                continue;
            }
            match std::fs::read_dir(dir) {
                Ok(entries) => {
                    let mut in_dir: Vec<PathBuf> = entries
                        .flatten()
                        .map(|entry| entry.path())
                        .filter(|path| path.is_file() && self.is_plugin_file(path))
                        .collect();
                    in_dir.sort();
                    found.extend(in_dir);
                }
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "Failed to read plugin directory");
                }
            }
        }
        found
    }

    fn is_plugin_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }
}

impl Default for PluginLoader {
    fn default() -> Self {
        Self::new()
    }
}
