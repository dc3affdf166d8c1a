//! Soft-filter error types.

use filterhost_core::CoreError;
use filterhost_plugin::PluginError;
use thiserror::Error;

/// Soft-filter error type.
#[derive(Error, Debug)]
pub enum SoftFilterError {
    /// Plugin discovery or chain construction error.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Configuration error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Frame exceeds the dimensions the chain was built for.
    #[error("Frame {width}x{height} exceeds configured maximum {max_width}x{max_height}")]
    FrameTooLarge {
        width: u32,
        height: u32,
        max_width: u32,
        max_height: u32,
    },

    /// Caller buffer cannot hold the frame.
    #[error("{buffer} buffer too small: need {needed} bytes, got {actual}")]
    BufferTooSmall {
        buffer: &'static str,
        needed: usize,
        actual: usize,
    },

    /// Row stride shorter than one row of pixels.
    #[error("{buffer} stride {stride} is shorter than a row ({min} bytes)")]
    InvalidStride {
        buffer: &'static str,
        stride: usize,
        min: usize,
    },

    /// A worker thread could not be started.
    #[error("Failed to spawn worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),

    /// A work packet panicked on a worker thread.
    #[error("Work packet panicked on worker thread")]
    WorkerPanicked,

    /// The filter chain has been destroyed.
    #[error("Soft filter has been destroyed")]
    Destroyed,
}

/// Soft-filter result type.
pub type Result<T> = std::result::Result<T, SoftFilterError>;
