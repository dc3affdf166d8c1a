//! Registry of plugin descriptors available for stage selection.

use std::sync::Arc;

use filterhost_core::SimdMask;
use tracing::{info, warn};

use crate::api::{Plugin, PluginInfo};
use crate::error::{PluginError, Result};
use crate::source::PluginSource;

/// Ordered set of descriptors accepted for one engine API version.
///
/// Order is enumeration order. Dropping the registry releases its
/// descriptors, and with them any shared libraries no live stage still
/// references.
pub struct PluginRegistry<D: ?Sized> {
    api_version: u32,
    plugins: Vec<Arc<D>>,
}

impl<D: ?Sized + Plugin> PluginRegistry<D> {
    pub fn new(api_version: u32) -> Self {
        Self {
            api_version,
            plugins: Vec::new(),
        }
    }

    /// Enumerate `source` and register everything it yields.
    ///
    /// Rejected descriptors are logged and skipped; the result may be empty.
    pub fn populate(source: &dyn PluginSource<D>, simd: SimdMask, api_version: u32) -> Self {
        let mut registry = Self::new(api_version);
        for plugin in source.enumerate(simd) {
            if let Err(e) = registry.register(plugin) {
                warn!(source = %source.describe(), error = %e, "Plugin rejected");
            }
        }
        registry
    }

    /// Register a descriptor. Returns error if the identifier is duplicate or the API mismatched.
    pub fn register(&mut self, plugin: Arc<D>) -> Result<()> {
        let plugin_info = plugin.info();
        if plugin_info.api_version != self.api_version {
            return Err(PluginError::ApiVersionMismatch {
                plugin: plugin_info.api_version,
                expected: self.api_version,
            });
        }

        if self.find(&plugin_info.ident).is_some() {
            return Err(PluginError::AlreadyRegistered {
                ident: plugin_info.ident.clone(),
            });
        }

        info!(
            ident = %plugin_info.ident,
            name = %plugin_info.name,
            kind = ?plugin_info.kind,
            "Plugin registered"
        );

        self.plugins.push(plugin);
        Ok(())
    }

    /// Descriptor with exactly this identifier.
    pub fn find(&self, ident: &str) -> Option<&Arc<D>> {
        self.plugins.iter().find(|p| p.ident() == ident)
    }

    /// Descriptor with exactly this identifier, or [`PluginError::NotFound`].
    pub fn resolve(&self, ident: &str) -> Result<&Arc<D>> {
        self.find(ident).ok_or_else(|| PluginError::NotFound {
            ident: ident.into(),
        })
    }

    /// Descriptors in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<D>> {
        self.plugins.iter()
    }

    /// Metadata of every registered plugin.
    pub fn list_all(&self) -> Vec<&PluginInfo> {
        self.plugins.iter().map(|p| p.info()).collect()
    }

    pub fn api_version(&self) -> u32 {
        self.api_version
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }

    /// Drop every descriptor, in reverse registration order.
    pub fn clear(&mut self) {
        while let Some(plugin) = self.plugins.pop() {
            drop(plugin);
        }
    }
}
