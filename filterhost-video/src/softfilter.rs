//! The soft-filter chain: construction, execution and teardown.

use std::path::Path;
use std::sync::Arc;

use filterhost_core::{
    detect_simd, negotiate, ConfigFile, LifecycleState, PixelFormat, SimdMask, Threads,
};
use filterhost_plugin::{build_stages, PluginError, PluginInfo, PluginRegistry, PluginSource};
use tracing::{debug, info};

use crate::api::{SoftFilterInstance, SoftFilterPlugin, StageSetup, SOFTFILTER_API_VERSION};
use crate::convert::convert_rows;
use crate::error::{Result, SoftFilterError};
use crate::packet::FrameBuffers;
use crate::workers::WorkerPool;

/// Options for building a [`SoftFilter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SoftFilterOptions {
    /// Worker threads offered to each stage.
    pub threads: Threads,
    /// Format of the frames passed to [`SoftFilter::process`].
    pub input_format: PixelFormat,
    /// Largest input frame the chain must handle.
    pub max_width: u32,
    pub max_height: u32,
    /// CPU features to offer plugins; detected when `None`.
    pub simd: Option<SimdMask>,
}

impl Default for SoftFilterOptions {
    fn default() -> Self {
        Self {
            threads: Threads::Auto,
            input_format: PixelFormat::Xrgb8888,
            max_width: 1920,
            max_height: 1080,
            simd: None,
        }
    }
}

impl SoftFilterOptions {
    pub fn with_threads(mut self, threads: Threads) -> Self {
        self.threads = threads;
        self
    }

    pub fn with_input_format(mut self, format: PixelFormat) -> Self {
        self.input_format = format;
        self
    }

    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_width = width;
        self.max_height = height;
        self
    }

    pub fn with_simd(mut self, simd: SimdMask) -> Self {
        self.simd = Some(simd);
        self
    }
}

/// The plugin source selected at build time.
///
/// With the `dynamic` feature and a plugin directory, shared libraries in
/// that directory are scanned; otherwise the built-in table is used.
pub fn default_source(plugin_dir: Option<&Path>) -> Box<dyn PluginSource<dyn SoftFilterPlugin>> {
    #[cfg(feature = "dynamic")]
    if let Some(dir) = plugin_dir {
        return Box::new(filterhost_plugin::DynamicSource::<crate::native::SoftFilterAbi>::new(dir));
    }
    #[cfg(not(feature = "dynamic"))]
    let _ = plugin_dir;
    Box::new(crate::builtin::builtin_source())
}

/// One live stage of the chain.
struct Stage {
    // Dropped before `descriptor`, which may own the plugin library.
    instance: Box<dyn SoftFilterInstance>,
    descriptor: Arc<dyn SoftFilterPlugin>,
    index: usize,
    input_format: PixelFormat,
    output_format: PixelFormat,
    threads: usize,
    /// Rows converted from the upstream format, when it differs.
    convert: Option<Vec<u8>>,
}

/// A linear chain of soft-filter stages driven by a worker pool.
pub struct SoftFilter {
    state: LifecycleState,
    pool: Option<WorkerPool>,
    stages: Vec<Stage>,
    registry: Option<PluginRegistry<dyn SoftFilterPlugin>>,
    config: Option<ConfigFile>,
    /// Output of stage `i`, input of stage `i + 1`.
    intermediates: Vec<Vec<u8>>,
    input_format: PixelFormat,
    max_width: u32,
    max_height: u32,
}

impl SoftFilter {
    /// Build the chain described by `config` from the plugins in `source`.
    ///
    /// Any failure releases everything built so far and returns the error;
    /// a partially built chain is never returned.
    pub fn new(
        config: ConfigFile,
        options: SoftFilterOptions,
        source: &dyn PluginSource<dyn SoftFilterPlugin>,
    ) -> Result<Self> {
        let mut filter = Self {
            state: LifecycleState::Unconstructed,
            pool: None,
            stages: Vec::new(),
            registry: None,
            config: None,
            intermediates: Vec::new(),
            input_format: options.input_format,
            max_width: options.max_width,
            max_height: options.max_height,
        };

        filter.config = Some(config);
        filter.transition(LifecycleState::ConfigLoaded);

        let simd = options.simd.unwrap_or_else(detect_simd);
        let registry = PluginRegistry::populate(source, simd, SOFTFILTER_API_VERSION);
        if registry.is_empty() {
            return Err(PluginError::EmptyRegistry.into());
        }
        debug!(source = %source.describe(), plugins = registry.len(), "Soft-filter plugins enumerated");
        filter.registry = Some(registry);
        filter.transition(LifecycleState::RegistryPopulated);

        let (stages, intermediates) = match (&filter.config, &filter.registry) {
            (Some(config), Some(registry)) => build_chain(config, registry, &options, simd)?,
            _ => return Err(SoftFilterError::Destroyed),
        };
        filter.stages = stages;
        filter.intermediates = intermediates;
        filter.transition(LifecycleState::PipelineBuilt);

        let threads = filter.stages.iter().map(|s| s.threads).max().unwrap_or(1);
        filter.pool = Some(WorkerPool::new(threads)?);
        filter.transition(LifecycleState::Ready);

        info!(
            stages = ?filter.stage_idents(),
            threads,
            input = %filter.input_format,
            output = %filter.output_format(),
            "Soft filter ready"
        );
        Ok(filter)
    }

    /// Load the configuration at `path` and build its chain.
    pub fn open(
        path: impl AsRef<Path>,
        options: SoftFilterOptions,
        source: &dyn PluginSource<dyn SoftFilterPlugin>,
    ) -> Result<Self> {
        let config = ConfigFile::open(path)?;
        Self::new(config, options, source)
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!(from = %self.state, to = %next, "Soft filter state change");
        self.state = next;
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Identifiers of the stages, in chain order.
    pub fn stage_idents(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.descriptor.ident()).collect()
    }

    /// Metadata of every plugin that was available to the chain.
    pub fn plugins(&self) -> Vec<&PluginInfo> {
        self.registry
            .as_ref()
            .map(|r| r.list_all())
            .unwrap_or_default()
    }

    /// Worker threads the chain runs on; 0 when packets run inline.
    pub fn worker_threads(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::spawned_threads)
    }

    /// Output dimensions for an input of `width` x `height`.
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        self.stages
            .iter()
            .fold((width, height), |(w, h), stage| stage.instance.output_size(w, h))
    }

    /// Output dimensions for the largest configured input.
    ///
    /// Callers size their render targets from this.
    pub fn max_output_size(&self) -> (u32, u32) {
        self.output_size(self.max_width, self.max_height)
    }

    /// Format of the frames written by [`Self::process`].
    pub fn output_format(&self) -> PixelFormat {
        self.stages
            .last()
            .map_or(self.input_format, |stage| stage.output_format)
    }

    /// Run every stage over one frame.
    ///
    /// `output` must hold [`Self::output_size`] of the frame in
    /// [`Self::output_format`]. Each stage's packets are spread over the
    /// worker pool and the call returns once all of them are done.
    pub fn process(
        &mut self,
        output: &mut [u8],
        output_stride: usize,
        input: &[u8],
        width: u32,
        height: u32,
        input_stride: usize,
    ) -> Result<()> {
        if !self.state.is_ready() {
            return Err(SoftFilterError::Destroyed);
        }
        if width > self.max_width || height > self.max_height {
            return Err(SoftFilterError::FrameTooLarge {
                width,
                height,
                max_width: self.max_width,
                max_height: self.max_height,
            });
        }
        if width == 0 || height == 0 {
            return Ok(());
        }

        check_buffer("input", input.len(), input_stride, self.input_format.row_bytes(width), height)?;
        let (out_width, out_height) = self.output_size(width, height);
        check_buffer(
            "output",
            output.len(),
            output_stride,
            self.output_format().row_bytes(out_width),
            out_height,
        )?;

        let Self {
            pool,
            stages,
            intermediates,
            input_format,
            ..
        } = self;
        let pool = pool.as_ref().ok_or(SoftFilterError::Destroyed)?;

        let last = stages.len() - 1;
        let (mut width, mut height) = (width, height);
        let mut upstream = *input_format;
        for (i, stage) in stages.iter_mut().enumerate() {
            let Stage {
                instance,
                input_format,
                output_format,
                convert,
                ..
            } = stage;

            let (before, after) = intermediates.split_at_mut(i);
            let (mut src, mut src_stride): (&[u8], usize) = match i {
                0 => (input, input_stride),
                _ => (&before[i - 1][..], upstream.row_bytes(width)),
            };
            if let Some(buffer) = convert.as_mut() {
                let stride = input_format.row_bytes(width);
                convert_rows(src, src_stride, upstream, buffer, stride, *input_format, width, height);
                src = &buffer[..];
                src_stride = stride;
            }

            let (next_width, next_height) = instance.output_size(width, height);
            let (dst, dst_stride): (&mut [u8], usize) = if i == last {
                (&mut *output, output_stride)
            } else {
                (&mut after[0][..], output_format.row_bytes(next_width))
            };

            let packets = instance.work_packets(FrameBuffers {
                output: dst,
                output_stride: dst_stride,
                input: src,
                width,
                height,
                input_stride: src_stride,
            });
            pool.run(packets)?;

            width = next_width;
            height = next_height;
            upstream = *output_format;
        }
        Ok(())
    }

    /// Tear the chain down. Safe to call more than once.
    ///
    /// Workers are joined first, then stages are destroyed in reverse order,
    /// then plugin descriptors and their libraries are released, then the
    /// configuration and buffers.
    pub fn destroy(&mut self) {
        if self.state.is_torn_down() {
            return;
        }
        self.transition(LifecycleState::Destroying);

        if let Some(mut pool) = self.pool.take() {
            pool.shutdown();
        }
        while let Some(stage) = self.stages.pop() {
            debug!(index = stage.index, ident = %stage.descriptor.ident(), "Destroying stage");
            drop(stage);
        }
        if let Some(mut registry) = self.registry.take() {
            registry.clear();
        }
        self.config = None;
        self.intermediates = Vec::new();

        self.transition(LifecycleState::Destroyed);
    }
}

impl Drop for SoftFilter {
    fn drop(&mut self) {
        self.destroy();
    }
}

fn check_buffer(buffer: &'static str, len: usize, stride: usize, row: usize, rows: u32) -> Result<()> {
    if rows == 0 {
        return Ok(());
    }
    if stride < row {
        return Err(SoftFilterError::InvalidStride {
            buffer,
            stride,
            min: row,
        });
    }
    // Saturates so an absurd stride reports as too small instead of wrapping.
    let needed = stride
        .checked_mul(rows as usize - 1)
        .and_then(|n| n.checked_add(row))
        .unwrap_or(usize::MAX);
    if len < needed {
        return Err(SoftFilterError::BufferTooSmall {
            buffer,
            needed,
            actual: len,
        });
    }
    Ok(())
}

/// Negotiate, instantiate and size every configured stage.
fn build_chain(
    config: &ConfigFile,
    registry: &PluginRegistry<dyn SoftFilterPlugin>,
    options: &SoftFilterOptions,
    simd: SimdMask,
) -> Result<(Vec<Stage>, Vec<Vec<u8>>)> {
    let threads = options.threads.resolve();
    let mut upstream = options.input_format;
    let (mut width, mut height) = (options.max_width, options.max_height);
    let mut intermediates = Vec::new();

    let stages = build_stages(config, true, registry, |spec, descriptor| {
        let negotiation = || PluginError::Negotiation {
            ident: spec.ident.clone(),
            index: spec.index,
            upstream,
        };
        let input_format = negotiate(upstream, descriptor.input_formats()).ok_or_else(negotiation)?;
        let output_format =
            negotiate(input_format, descriptor.output_formats(input_format)).ok_or_else(negotiation)?;

        let setup = StageSetup {
            input_format,
            output_format,
            max_width: width,
            max_height: height,
            threads,
            simd,
        };
        let instance = descriptor
            .create(&setup, &spec.params(config))
            .ok_or_else(|| PluginError::InstantiationFailed {
                ident: spec.ident.clone(),
                index: spec.index,
            })?;

        let convert = (input_format != upstream)
            .then(|| vec![0u8; input_format.row_bytes(width) * height as usize]);
        let stage_threads = instance.num_threads().max(1);
        let (out_width, out_height) = instance.output_size(width, height);
        debug!(
            index = spec.index,
            ident = %spec.ident,
            input = %input_format,
            output = %output_format,
            threads = stage_threads,
            converts = convert.is_some(),
            "Soft-filter stage negotiated"
        );

        if spec.index > 0 {
            // The previous stage writes here
            intermediates.push(vec![0u8; upstream.row_bytes(width) * height as usize]);
        }
        upstream = output_format;
        width = out_width;
        height = out_height;

        Ok::<_, SoftFilterError>(Stage {
            instance,
            descriptor: Arc::clone(descriptor),
            index: spec.index,
            input_format,
            output_format,
            threads: stage_threads,
            convert,
        })
    })?;

    Ok((stages, intermediates))
}
