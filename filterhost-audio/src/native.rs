//! DSP plugins loaded from shared libraries.
//!
//! A plugin library exports `dspfilter_get_implementation`, which returns a
//! static [`RawDspImpl`] table for the given CPU feature mask. Output samples
//! stay owned by the plugin and are copied out after every call.

use std::ffi::{c_char, c_uint, c_void};
use std::slice;
use std::sync::Arc;

use filterhost_core::{ParamScope, SimdMask};
use filterhost_plugin::{
    descriptor_string, ConfigBridge, NativeAbi, NativeLibrary, Plugin, PluginError, PluginInfo, PluginKind,
    PluginOrigin, RawConfig, Result,
};
use tracing::debug;

use crate::api::{DspInfo, DspInstance, DspPlugin, CHANNELS, DSPFILTER_API_VERSION};

#[repr(C)]
pub struct RawDspInfo {
    pub input_rate: f32,
}

#[repr(C)]
pub struct RawDspInput {
    pub samples: *const f32,
    pub frames: c_uint,
}

/// Filled in by the plugin; `samples` points into plugin memory.
#[repr(C)]
pub struct RawDspOutput {
    pub samples: *mut f32,
    pub frames: c_uint,
}

/// Function table exported by a DSP plugin.
#[repr(C)]
pub struct RawDspImpl {
    pub init: Option<
        unsafe extern "C" fn(info: *const RawDspInfo, config: *const RawConfig, userdata: *mut c_void) -> *mut c_void,
    >,
    pub process: Option<unsafe extern "C" fn(data: *mut c_void, output: *mut RawDspOutput, input: *const RawDspInput)>,
    pub free: Option<unsafe extern "C" fn(data: *mut c_void)>,
    pub api_version: c_uint,
    /// Human-readable name.
    pub ident: *const c_char,
    /// Identifier used in configuration files.
    pub short_ident: *const c_char,
}

pub type GetImplementationFn = unsafe extern "C" fn(simd: u64) -> *const RawDspImpl;

#[derive(Clone, Copy)]
struct Table {
    init: unsafe extern "C" fn(*const RawDspInfo, *const RawConfig, *mut c_void) -> *mut c_void,
    process: unsafe extern "C" fn(*mut c_void, *mut RawDspOutput, *const RawDspInput),
    free: unsafe extern "C" fn(*mut c_void),
}

/// Descriptor backed by a shared library.
pub struct NativeDsp {
    info: PluginInfo,
    table: Table,
    library: Arc<NativeLibrary>,
}

/// Entry point and version of the DSP binary interface.
pub struct DspAbi;

impl NativeAbi for DspAbi {
    type Descriptor = dyn DspPlugin;
    const ENTRY_SYMBOL: &'static str = "dspfilter_get_implementation";
    const API_VERSION: u32 = DSPFILTER_API_VERSION;

    unsafe fn resolve(library: &Arc<NativeLibrary>, simd: SimdMask) -> Result<Arc<dyn DspPlugin>> {
        let path = library.path().display().to_string();
        let entry: GetImplementationFn = library.symbol(Self::ENTRY_SYMBOL)?;
        let raw = entry(simd.bits());
        if raw.is_null() {
            return Err(PluginError::FactoryRejected { path });
        }
        let raw = &*raw;

        let missing = |name: &str| PluginError::InvalidDescriptor {
            path: path.clone(),
            message: format!("missing function '{name}'"),
        };
        let table = Table {
            init: raw.init.ok_or_else(|| missing("init"))?,
            process: raw.process.ok_or_else(|| missing("process"))?,
            free: raw.free.ok_or_else(|| missing("free"))?,
        };

        let info = PluginInfo {
            ident: descriptor_string(&path, "short_ident", raw.short_ident)?,
            name: descriptor_string(&path, "ident", raw.ident)?,
            kind: PluginKind::Dsp,
            api_version: raw.api_version,
            origin: PluginOrigin::Native(library.path().to_path_buf()),
        };

        Ok(Arc::new(NativeDsp {
            info,
            table,
            library: Arc::clone(library),
        }))
    }
}

impl Plugin for NativeDsp {
    fn info(&self) -> &PluginInfo {
        &self.info
    }
}

impl DspPlugin for NativeDsp {
    fn create(&self, info: &DspInfo, params: &ParamScope<'_>) -> Option<Box<dyn DspInstance>> {
        let raw_info = RawDspInfo {
            input_rate: info.input_rate,
        };
        let bridge = ConfigBridge::new(params.clone());
        let active = bridge.activate();
        // SAFETY: `raw_info` and the bridge outlive the call.
        let state = unsafe { (self.table.init)(&raw_info, ConfigBridge::vtable(), bridge.userdata()) };
        drop(active);
        drop(bridge);
        if state.is_null() {
            return None;
        }
        Some(Box::new(NativeDspInstance {
            state,
            table: self.table,
            _library: Arc::clone(&self.library),
        }))
    }
}

struct NativeDspInstance {
    state: *mut c_void,
    table: Table,
    _library: Arc<NativeLibrary>,
}

// SAFETY: the state is only touched through `&mut self`, one call at a time.
unsafe impl Send for NativeDspInstance {}

impl DspInstance for NativeDspInstance {
    fn process(&mut self, input: &[f32], output: &mut Vec<f32>) {
        let raw_input = RawDspInput {
            samples: input.as_ptr(),
            frames: (input.len() / CHANNELS) as c_uint,
        };
        let mut raw_output = RawDspOutput {
            samples: std::ptr::null_mut(),
            frames: 0,
        };
        // SAFETY: input is valid for the call; the plugin keeps its output
        // buffer alive until the next call on this state.
        unsafe {
            (self.table.process)(self.state, &mut raw_output, &raw_input);
            if !raw_output.samples.is_null() && raw_output.frames > 0 {
                let len = raw_output.frames as usize * CHANNELS;
                output.extend_from_slice(slice::from_raw_parts(raw_output.samples, len));
            }
        }
    }
}

impl Drop for NativeDspInstance {
    fn drop(&mut self) {
        debug!("Destroying native DSP instance");
        unsafe { (self.table.free)(self.state) };
    }
}

