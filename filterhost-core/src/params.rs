//! Per-stage parameter lookup.
//!
//! A stage reads its parameters through a [`ParamScope`], which tries an
//! ordered pair of key prefixes: the stage's slot key (for example
//! `filter1`) and then the plugin identifier (for example `sharpen`). A
//! parameter `strength` therefore resolves `filter1_strength` first, then
//! `sharpen_strength`, then the caller's default. This lets one position in
//! a chain be tuned without touching every other instance of the same
//! plugin.

use std::str::FromStr;

use crate::config::ConfigFile;

/// Two-level parameter lookup for one pipeline stage.
#[derive(Debug, Clone)]
pub struct ParamScope<'a> {
    config: &'a ConfigFile,
    prefixes: [String; 2],
}

impl<'a> ParamScope<'a> {
    /// Create a scope for the stage in slot `slot_key` running plugin `ident`.
    pub fn new(config: &'a ConfigFile, slot_key: impl Into<String>, ident: impl Into<String>) -> Self {
        Self {
            config,
            prefixes: [slot_key.into(), ident.into()],
        }
    }

    /// The prefixes in lookup order.
    pub fn prefixes(&self) -> &[String; 2] {
        &self.prefixes
    }

    /// Backing configuration.
    pub fn config(&self) -> &'a ConfigFile {
        self.config
    }

    /// Raw value of `param`, honouring prefix priority.
    pub fn lookup(&self, param: &str) -> Option<&'a str> {
        self.prefixes
            .iter()
            .find_map(|prefix| self.config.get(&format!("{prefix}_{param}")))
    }

    /// Check whether `param` is set under either prefix.
    pub fn contains(&self, param: &str) -> bool {
        self.lookup(param).is_some()
    }

    /// Float parameter.
    pub fn get_float(&self, param: &str, default: f32) -> f32 {
        self.parsed(param).unwrap_or(default)
    }

    /// Integer parameter.
    pub fn get_int(&self, param: &str, default: i32) -> i32 {
        self.parsed(param).unwrap_or(default)
    }

    /// Whitespace-separated float array.
    pub fn get_float_array(&self, param: &str, default: &[f32]) -> Vec<f32> {
        self.array(param).unwrap_or_else(|| default.to_vec())
    }

    /// Whitespace-separated integer array.
    pub fn get_int_array(&self, param: &str, default: &[i32]) -> Vec<i32> {
        self.array(param).unwrap_or_else(|| default.to_vec())
    }

    /// String parameter.
    pub fn get_string(&self, param: &str, default: &str) -> String {
        self.lookup(param).unwrap_or(default).to_string()
    }

    /// Release a value obtained from this scope.
    ///
    /// Values are owned by the caller, so this only drops them. Native
    /// plugins, which cannot drop Rust values, reach the same operation
    /// through the `free` entry of their configuration vtable.
    pub fn release<T>(&self, value: T) {
        drop(value);
    }

    fn parsed<T: FromStr>(&self, param: &str) -> Option<T> {
        self.lookup(param)?.trim().parse().ok()
    }

    /// A present but partly malformed array counts as absent.
    fn array<T: FromStr>(&self, param: &str) -> Option<Vec<T>> {
        self.lookup(param)?
            .split_whitespace()
            .map(|item| item.parse().ok())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn config() -> ConfigFile {
        ConfigFile::parse(
            "filter1_strength = 0.9\n\
             sharpen_strength = 0.4\n\
             sharpen_radius = 2\n\
             panning_left_mix = \"0.5 0.5\"\n\
             panning_bad = \"1.0 x\"\n\
             echo_name = \"hall\"\n",
        )
        .unwrap()
    }

    #[test]
    fn test_slot_key_overrides_ident() {
        let config = config();
        let slot1 = ParamScope::new(&config, "filter1", "sharpen");
        let slot0 = ParamScope::new(&config, "filter0", "sharpen");

        assert_eq!(slot1.get_float("strength", 0.0), 0.9);
        assert_eq!(slot0.get_float("strength", 0.0), 0.4);
        assert_eq!(slot0.get_int("radius", 1), 2);
    }

    #[test]
    fn test_defaults_when_absent() {
        let config = config();
        let scope = ParamScope::new(&config, "filter0", "darken");
        assert_eq!(scope.get_float("factor", 0.5), 0.5);
        assert_eq!(scope.get_int("shift", 1), 1);
        assert_eq!(scope.get_string("mode", "fast"), "fast");
        assert_eq!(scope.get_int_array("taps", &[1, 2]), vec![1, 2]);
        assert!(!scope.contains("factor"));
    }

    #[test]
    fn test_arrays() {
        let config = config();
        let scope = ParamScope::new(&config, "filter0", "panning");
        assert_eq!(scope.get_float_array("left_mix", &[1.0, 0.0]), vec![0.5, 0.5]);
        assert_eq!(scope.get_float_array("bad", &[1.0]), vec![1.0]);
    }

    #[test]
    fn test_strings() {
        let config = config();
        let scope = ParamScope::new(&config, "filter3", "echo");
        let name = scope.get_string("name", "room");
        assert_eq!(name, "hall");
        scope.release(name);
    }
}
