//! DSP stages compiled into the engine.

mod echo;
mod panning;

use std::sync::Arc;

use filterhost_core::ParamScope;
use filterhost_plugin::{BuiltinSource, Plugin, PluginInfo, PluginKind};

use crate::api::{DspInfo, DspInstance, DspPlugin, DSPFILTER_API_VERSION};

/// Table of built-in DSP stages, in enumeration order.
pub fn builtin_source() -> BuiltinSource<dyn DspPlugin> {
    BuiltinSource::new()
        .with(|_| Some(panning::descriptor()))
        .with(|_| Some(echo::descriptor()))
}

type CreateFn = fn(&DspInfo, &ParamScope<'_>) -> Option<Box<dyn DspInstance>>;

/// Descriptor of a built-in stage.
pub(crate) struct BuiltinDsp {
    info: PluginInfo,
    create: CreateFn,
}

impl BuiltinDsp {
    pub(crate) fn descriptor(ident: &str, name: &str, create: CreateFn) -> Arc<dyn DspPlugin> {
        Arc::new(Self {
            info: PluginInfo::builtin(ident, name, PluginKind::Dsp, DSPFILTER_API_VERSION),
            create,
        })
    }
}

impl Plugin for BuiltinDsp {
    fn info(&self) -> &PluginInfo {
        &self.info
    }
}

impl DspPlugin for BuiltinDsp {
    fn create(&self, info: &DspInfo, params: &ParamScope<'_>) -> Option<Box<dyn DspInstance>> {
        (self.create)(info, params)
    }
}
