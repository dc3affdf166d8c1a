//! Plugin discovery, registration and stage building for filterhost.
//!
//! Both engines host pluggable processing stages. This crate provides the
//! parts they share:
//!
//! - **Descriptors**: the [`Plugin`] trait and [`PluginInfo`] metadata
//! - **Sources**: compiled-in factory tables ([`BuiltinSource`]) and, with the
//!   `dynamic` feature, shared libraries scanned from a directory
//!   ([`DynamicSource`])
//! - **Registry**: the validated, ordered set of descriptors
//! - **Chain building**: reading the stage list from configuration and
//!   instantiating each stage with rollback on failure
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use filterhost_core::SimdMask;
//! use filterhost_plugin::{BuiltinSource, Plugin, PluginInfo, PluginKind, PluginRegistry};
//!
//! struct Passthrough(PluginInfo);
//!
//! impl Plugin for Passthrough {
//!     fn info(&self) -> &PluginInfo {
//!         &self.0
//!     }
//! }
//!
//! let source: BuiltinSource<dyn Plugin> = BuiltinSource::new().with(|_| {
//!     let info = PluginInfo::builtin("null", "Passthrough", PluginKind::Dsp, 1);
//!     Some(Arc::new(Passthrough(info)) as Arc<dyn Plugin>)
//! });
//!
//! let registry = PluginRegistry::populate(&source, SimdMask::empty(), 1);
//! assert!(registry.find("null").is_some());
//! ```

mod api;
pub mod chain;
mod error;
mod loader;
mod registry;
mod source;

#[cfg(feature = "dynamic")]
mod dynamic;
#[cfg(feature = "dynamic")]
pub mod ffi;

pub use api::{Plugin, PluginInfo, PluginKind, PluginOrigin};
pub use chain::{build_stages, StageSpec};
pub use error::{PluginError, Result};
pub use loader::{platform_extension, PluginLoader};
pub use registry::PluginRegistry;
pub use source::{BuiltinSource, Factory, PluginSource};

#[cfg(feature = "dynamic")]
pub use dynamic::{descriptor_string, DynamicSource, NativeAbi, NativeLibrary};
#[cfg(feature = "dynamic")]
pub use ffi::{ActiveBridge, ConfigBridge, RawConfig};
