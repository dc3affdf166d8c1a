use filterhost_core::{CoreError, PixelFormat};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Plugin '{ident}' already registered")]
    AlreadyRegistered { ident: String },

    #[error("Plugin '{ident}' not found")]
    NotFound { ident: String },

    #[error("API version mismatch: plugin has v{plugin}, expected v{expected}")]
    ApiVersionMismatch { plugin: u32, expected: u32 },

    #[error("Failed to load plugin from {path}: {message}")]
    LoadFailed { path: String, message: String },

    #[error("Plugin {path} does not export '{symbol}'")]
    SymbolMissing { path: String, symbol: String },

    #[error("Plugin {path} declined to provide an implementation")]
    FactoryRejected { path: String },

    #[error("Invalid plugin descriptor in {path}: {message}")]
    InvalidDescriptor { path: String, message: String },

    #[error("No plugins available")]
    EmptyRegistry,

    #[error("Pipeline has no stages")]
    EmptyPipeline,

    #[error("Stage {index} ('{ident}') shares no format with upstream {upstream}")]
    Negotiation {
        ident: String,
        index: usize,
        upstream: PixelFormat,
    },

    #[error("Stage {index} ('{ident}') failed to instantiate")]
    InstantiationFailed { ident: String, index: usize },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, PluginError>;
