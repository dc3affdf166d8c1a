//! DSP filter error types.

use filterhost_core::CoreError;
use filterhost_plugin::PluginError;
use thiserror::Error;

/// DSP filter error type.
#[derive(Error, Debug)]
pub enum DspError {
    /// Plugin discovery or chain construction error.
    #[error(transparent)]
    Plugin(#[from] PluginError),

    /// Configuration error.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Interleaved stereo input with an odd number of samples.
    #[error("Sample count {samples} is not a whole number of stereo frames")]
    InvalidSampleCount { samples: usize },

    /// The filter chain has been destroyed.
    #[error("DSP filter has been destroyed")]
    Destroyed,
}

/// DSP filter result type.
pub type Result<T> = std::result::Result<T, DspError>;
