//! Filters compiled into the engine.
//!
//! Every built-in is a per-pixel kernel: it computes one output pixel from
//! the input frame. [`KernelPlugin`] and [`KernelInstance`] turn a kernel
//! into a descriptor and a row-partitioned stage.

mod boxblur;
mod darken;
mod normal2x;
mod sharpen;

use std::sync::Arc;

use filterhost_core::{FormatMask, ParamScope, PixelFormat};
use filterhost_plugin::{BuiltinSource, Plugin, PluginInfo, PluginKind};

use crate::api::{SoftFilterInstance, SoftFilterPlugin, StageSetup, SOFTFILTER_API_VERSION};
use crate::packet::{split_rows, FrameBuffers, RowSlice, WorkPacket};

/// Table of built-in filters, in enumeration order.
pub fn builtin_source() -> BuiltinSource<dyn SoftFilterPlugin> {
    BuiltinSource::new()
        .with(boxblur::descriptor)
        .with(sharpen::descriptor)
        .with(darken::descriptor)
        .with(normal2x::descriptor)
}

/// Read-only view of a stage's input frame.
pub(crate) struct Source<'a> {
    data: &'a [u8],
    stride: usize,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl Source<'_> {
    /// Pixel at `(x, y)`, clamped to the frame edges.
    #[inline]
    pub(crate) fn pixel(&self, x: i64, y: i64) -> [u8; 3] {
        let x = x.clamp(0, self.width as i64 - 1) as usize;
        let y = y.clamp(0, self.height as i64 - 1) as usize;
        self.format
            .unpack(self.data, y * self.stride + x * self.format.bytes_per_pixel())
    }
}

pub(crate) trait Kernel: Send + Sync + 'static {
    /// Output rows and columns per input row and column.
    fn scale(&self) -> u32 {
        1
    }

    /// Output pixel at output coordinates `(x, y)`.
    fn sample(&self, src: &Source<'_>, x: u32, y: u32) -> [u8; 3];
}

/// Descriptor of a kernel filter.
pub(crate) struct KernelPlugin<K> {
    info: PluginInfo,
    formats: FormatMask,
    configure: fn(&ParamScope<'_>) -> Option<K>,
}

impl<K: Kernel> KernelPlugin<K> {
    pub(crate) fn new(
        ident: &str,
        name: &str,
        formats: FormatMask,
        configure: fn(&ParamScope<'_>) -> Option<K>,
    ) -> Self {
        Self {
            info: PluginInfo::builtin(ident, name, PluginKind::SoftFilter, SOFTFILTER_API_VERSION),
            formats,
            configure,
        }
    }

    pub(crate) fn into_descriptor(self) -> Option<Arc<dyn SoftFilterPlugin>> {
        Some(Arc::new(self))
    }
}

impl<K: Kernel> Plugin for KernelPlugin<K> {
    fn info(&self) -> &PluginInfo {
        &self.info
    }
}

impl<K: Kernel> SoftFilterPlugin for KernelPlugin<K> {
    fn input_formats(&self) -> FormatMask {
        self.formats
    }

    /// Kernels write the format they read.
    fn output_formats(&self, input: PixelFormat) -> FormatMask {
        if self.formats.accepts(input) {
            input.mask()
        } else {
            FormatMask::empty()
        }
    }

    fn create(&self, setup: &StageSetup, params: &ParamScope<'_>) -> Option<Box<dyn SoftFilterInstance>> {
        let kernel = (self.configure)(params)?;
        Some(Box::new(KernelInstance {
            kernel,
            input_format: setup.input_format,
            output_format: setup.output_format,
            threads: setup.threads.max(1),
        }))
    }
}

pub(crate) struct KernelInstance<K> {
    kernel: K,
    input_format: PixelFormat,
    output_format: PixelFormat,
    threads: usize,
}

impl<K: Kernel> KernelInstance<K> {
    fn render(&self, slice: RowSlice<'_>) {
        let scale = self.kernel.scale();
        let src = Source {
            data: slice.input,
            stride: slice.input_stride,
            width: slice.width,
            height: slice.height,
            format: self.input_format,
        };
        let bpp = self.output_format.bytes_per_pixel();
        let out_width = slice.width * scale;
        let out_rows = slice.rows.start * scale..slice.rows.end * scale;
        let output = slice.output;

        for (local, y) in out_rows.enumerate() {
            let row = local * slice.output_stride;
            for x in 0..out_width {
                let rgb = self.kernel.sample(&src, x, y);
                self.output_format.pack(output, row + x as usize * bpp, rgb);
            }
        }
    }
}

impl<K: Kernel> SoftFilterInstance for KernelInstance<K> {
    fn num_threads(&self) -> usize {
        self.threads
    }

    fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = self.kernel.scale();
        (width * scale, height * scale)
    }

    fn work_packets<'a>(&'a self, frame: FrameBuffers<'a>) -> Vec<WorkPacket<'a>> {
        split_rows(frame, self.threads, self.kernel.scale())
            .into_iter()
            .map(|slice| WorkPacket::new(move || self.render(slice)))
            .collect()
    }
}

/// Round and clamp a channel value.
#[inline]
pub(crate) fn channel(value: f32) -> u8 {
    value.round().clamp(0.0, 255.0) as u8
}
