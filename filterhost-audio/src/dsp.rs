//! The DSP chain: construction, execution and teardown.

use std::path::Path;
use std::sync::Arc;

use filterhost_core::{detect_simd, ConfigFile, LifecycleState, SimdMask};
use filterhost_plugin::{build_stages, PluginError, PluginInfo, PluginRegistry, PluginSource};
use tracing::{debug, info};

use crate::api::{DspInfo, DspInstance, DspPlugin, CHANNELS, DSPFILTER_API_VERSION};
use crate::error::{DspError, Result};

/// Options for building a [`DspFilter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DspOptions {
    /// Input sample rate in Hz.
    pub sample_rate: f32,
    /// CPU features to offer plugins; detected when `None`.
    pub simd: Option<SimdMask>,
}

impl Default for DspOptions {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            simd: None,
        }
    }
}

impl DspOptions {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_simd(mut self, simd: SimdMask) -> Self {
        self.simd = Some(simd);
        self
    }
}

/// The plugin source selected at build time.
pub fn default_source(plugin_dir: Option<&Path>) -> Box<dyn PluginSource<dyn DspPlugin>> {
    #[cfg(feature = "dynamic")]
    if let Some(dir) = plugin_dir {
        return Box::new(filterhost_plugin::DynamicSource::<crate::native::DspAbi>::new(dir));
    }
    #[cfg(not(feature = "dynamic"))]
    let _ = plugin_dir;
    Box::new(crate::builtin::builtin_source())
}

/// Result of one [`DspFilter::process`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DspOutput<'a> {
    /// Interleaved stereo samples, valid until the next call.
    pub samples: &'a [f32],
    pub frames: usize,
}

struct DspStage {
    instance: Box<dyn DspInstance>,
    descriptor: Arc<dyn DspPlugin>,
    index: usize,
}

/// A linear chain of DSP stages run in order on the calling thread.
pub struct DspFilter {
    state: LifecycleState,
    stages: Vec<DspStage>,
    registry: Option<PluginRegistry<dyn DspPlugin>>,
    config: Option<ConfigFile>,
    /// Stage outputs alternate between these.
    buffers: [Vec<f32>; 2],
}

impl DspFilter {
    /// Build the chain described by `config` from the plugins in `source`.
    pub fn new(config: ConfigFile, options: DspOptions, source: &dyn PluginSource<dyn DspPlugin>) -> Result<Self> {
        let mut filter = Self {
            state: LifecycleState::Unconstructed,
            stages: Vec::new(),
            registry: None,
            config: None,
            buffers: [Vec::new(), Vec::new()],
        };

        filter.config = Some(config);
        filter.transition(LifecycleState::ConfigLoaded);

        let simd = options.simd.unwrap_or_else(detect_simd);
        let registry = PluginRegistry::populate(source, simd, DSPFILTER_API_VERSION);
        if registry.is_empty() {
            return Err(PluginError::EmptyRegistry.into());
        }
        filter.registry = Some(registry);
        filter.transition(LifecycleState::RegistryPopulated);

        let info = DspInfo {
            input_rate: options.sample_rate,
        };
        let stages = match (&filter.config, &filter.registry) {
            (Some(config), Some(registry)) => build_stages(config, false, registry, |spec, descriptor| {
                let instance = descriptor
                    .create(&info, &spec.params(config))
                    .ok_or_else(|| PluginError::InstantiationFailed {
                        ident: spec.ident.clone(),
                        index: spec.index,
                    })?;
                Ok::<_, DspError>(DspStage {
                    instance,
                    descriptor: Arc::clone(descriptor),
                    index: spec.index,
                })
            })?,
            _ => return Err(DspError::Destroyed),
        };
        filter.stages = stages;
        filter.transition(LifecycleState::PipelineBuilt);
        filter.transition(LifecycleState::Ready);

        info!(stages = ?filter.stage_idents(), rate = info.input_rate, "DSP filter ready");
        Ok(filter)
    }

    /// Load the configuration at `path` and build its chain.
    pub fn open(path: impl AsRef<Path>, options: DspOptions, source: &dyn PluginSource<dyn DspPlugin>) -> Result<Self> {
        let config = ConfigFile::open(path)?;
        Self::new(config, options, source)
    }

    fn transition(&mut self, next: LifecycleState) {
        debug!(from = %self.state, to = %next, "DSP filter state change");
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

    /// Run interleaved stereo `input` through every stage in order.
    ///
    /// Each stage reads the previous stage's output. The returned frame
    /// count is whatever the last stage produced; it need not match the
    /// input.
    pub fn process(&mut self, input: &[f32]) -> Result<DspOutput<'_>> {
        if !self.state.is_ready() {
            return Err(DspError::Destroyed);
        }
        if input.len() % CHANNELS != 0 {
            return Err(DspError::InvalidSampleCount {
                samples: input.len(),
            });
        }

        let [even, odd] = &mut self.buffers;
        for (i, stage) in self.stages.iter_mut().enumerate() {
            let (src, dst): (&[f32], &mut Vec<f32>) = match i {
                0 => (input, &mut *even),
                _ if i % 2 == 1 => (&even[..], &mut *odd),
                _ => (&odd[..], &mut *even),
            };
            dst.clear();
            stage.instance.process(src, dst);
        }

        let last = self.stages.len().checked_sub(1).ok_or(DspError::Destroyed)?;
        let samples = &self.buffers[last % 2][..];
        Ok(DspOutput {
            samples,
            frames: samples.len() / CHANNELS,
        })
    }

    /// Tear the chain down. Safe to call more than once.
    pub fn destroy(&mut self) {
        if self.state.is_torn_down() {
            return;
        }
        self.transition(LifecycleState::Destroying);

        while let Some(stage) = self.stages.pop() {
            debug!(index = stage.index, ident = %stage.descriptor.ident(), "Destroying stage");
            drop(stage);
        }
        if let Some(mut registry) = self.registry.take() {
            registry.clear();
        }
        self.config = None;
        self.buffers = [Vec::new(), Vec::new()];

        self.transition(LifecycleState::Destroyed);
    }
}

impl Drop for DspFilter {
    fn drop(&mut self) {
        self.destroy();
    }
}
