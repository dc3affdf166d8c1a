//! Soft-filter plugin interface.

use filterhost_core::{FormatMask, ParamScope, PixelFormat, SimdMask};
use filterhost_plugin::Plugin;

use crate::packet::{FrameBuffers, WorkPacket};

/// Interface version of soft-filter plugins.
pub const SOFTFILTER_API_VERSION: u32 = 2;

/// Descriptor of a soft-filter implementation.
pub trait SoftFilterPlugin: Plugin {
    /// Pixel formats accepted as input.
    fn input_formats(&self) -> FormatMask;

    /// Pixel formats that can be produced from `input`.
    fn output_formats(&self, input: PixelFormat) -> FormatMask;

    /// Create a configured instance, or `None` if the plugin refuses the
    /// setup or its parameters.
    fn create(&self, setup: &StageSetup, params: &ParamScope<'_>) -> Option<Box<dyn SoftFilterInstance>>;
}

/// Negotiated settings handed to [`SoftFilterPlugin::create`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageSetup {
    pub input_format: PixelFormat,
    pub output_format: PixelFormat,
    /// Largest input frame the stage will see.
    pub max_width: u32,
    pub max_height: u32,
    /// Worker threads available to the chain.
    pub threads: usize,
    pub simd: SimdMask,
}

/// A live, configured soft-filter stage.
///
/// Instance state is shared by every work packet of a cycle, so any state a
/// packet touches must be safe under the stage's own row partitioning.
pub trait SoftFilterInstance: Send + Sync {
    /// Number of work packets this stage produces per frame.
    fn num_threads(&self) -> usize;

    /// Output dimensions for an input of `width` x `height`.
    fn output_size(&self, width: u32, height: u32) -> (u32, u32);

    /// Split one frame into independent work packets.
    fn work_packets<'a>(&'a self, frame: FrameBuffers<'a>) -> Vec<WorkPacket<'a>>;
}
