//! DSP plugin interface.

use filterhost_core::ParamScope;
use filterhost_plugin::Plugin;

/// Interface version of DSP plugins.
pub const DSPFILTER_API_VERSION: u32 = 1;

/// Samples per frame. Audio is interleaved stereo `f32`.
pub const CHANNELS: usize = 2;

/// Stream properties handed to [`DspPlugin::create`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DspInfo {
    /// Input sample rate in Hz.
    pub input_rate: f32,
}

/// Descriptor of a DSP implementation.
pub trait DspPlugin: Plugin {
    /// Create a configured instance, or `None` if the plugin refuses its
    /// parameters.
    fn create(&self, info: &DspInfo, params: &ParamScope<'_>) -> Option<Box<dyn DspInstance>>;
}

/// A live, configured DSP stage.
///
/// Stages may keep state between calls and are always run in chain order
/// on one thread.
pub trait DspInstance: Send {
    /// Filter interleaved stereo `input` into `output`.
    ///
    /// `output` arrives cleared. Its final length sets the stage's output
    /// frame count, which may differ from the input's.
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>);
}
