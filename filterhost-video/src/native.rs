//! Soft-filter plugins loaded from shared libraries.
//!
//! A plugin library exports `softfilter_get_implementation`, which returns a
//! static [`RawSoftFilterImpl`] table for the given CPU feature mask.

use std::ffi::{c_char, c_uint, c_void};
use std::ptr;
use std::sync::Arc;

use filterhost_core::{FormatMask, ParamScope, PixelFormat, SimdMask};
use filterhost_plugin::{
    descriptor_string, ConfigBridge, NativeAbi, NativeLibrary, Plugin, PluginError, PluginInfo, PluginKind,
    PluginOrigin, RawConfig, Result,
};
use tracing::debug;

use crate::api::{SoftFilterInstance, SoftFilterPlugin, StageSetup, SOFTFILTER_API_VERSION};
use crate::packet::{FrameBuffers, WorkPacket};

pub type WorkFn = unsafe extern "C" fn(data: *mut c_void, thread_data: *mut c_void);

/// One packet as filled in by the plugin.
#[repr(C)]
pub struct RawWorkPacket {
    pub work: Option<WorkFn>,
    pub thread_data: *mut c_void,
}

/// Function table exported by a soft-filter plugin.
#[repr(C)]
pub struct RawSoftFilterImpl {
    pub query_input_formats: Option<unsafe extern "C" fn() -> c_uint>,
    pub query_output_formats: Option<unsafe extern "C" fn(input_format: c_uint) -> c_uint>,
    pub create: Option<
        unsafe extern "C" fn(
            config: *const RawConfig,
            in_fmt: c_uint,
            out_fmt: c_uint,
            max_width: c_uint,
            max_height: c_uint,
            threads: c_uint,
            simd: u64,
            userdata: *mut c_void,
        ) -> *mut c_void,
    >,
    pub destroy: Option<unsafe extern "C" fn(data: *mut c_void)>,
    pub query_num_threads: Option<unsafe extern "C" fn(data: *mut c_void) -> c_uint>,
    pub query_output_size: Option<
        unsafe extern "C" fn(data: *mut c_void, out_width: *mut c_uint, out_height: *mut c_uint, width: c_uint, height: c_uint),
    >,
    pub get_work_packets: Option<
        unsafe extern "C" fn(
            data: *mut c_void,
            packets: *mut RawWorkPacket,
            output: *mut c_void,
            output_stride: usize,
            input: *const c_void,
            width: c_uint,
            height: c_uint,
            input_stride: usize,
        ),
    >,
    pub api_version: c_uint,
    /// Human-readable name.
    pub ident: *const c_char,
    /// Identifier used in configuration files.
    pub short_ident: *const c_char,
}

pub type GetImplementationFn = unsafe extern "C" fn(simd: u64) -> *const RawSoftFilterImpl;

/// Validated copy of a plugin's function table.
#[derive(Clone, Copy)]
struct Table {
    query_input_formats: unsafe extern "C" fn() -> c_uint,
    query_output_formats: unsafe extern "C" fn(c_uint) -> c_uint,
    create: unsafe extern "C" fn(
        *const RawConfig,
        c_uint,
        c_uint,
        c_uint,
        c_uint,
        c_uint,
        u64,
        *mut c_void,
    ) -> *mut c_void,
    destroy: unsafe extern "C" fn(*mut c_void),
    query_num_threads: unsafe extern "C" fn(*mut c_void) -> c_uint,
    query_output_size: unsafe extern "C" fn(*mut c_void, *mut c_uint, *mut c_uint, c_uint, c_uint),
    get_work_packets: unsafe extern "C" fn(
        *mut c_void,
        *mut RawWorkPacket,
        *mut c_void,
        usize,
        *const c_void,
        c_uint,
        c_uint,
        usize,
    ),
}

/// Descriptor backed by a shared library.
pub struct NativeSoftFilter {
    info: PluginInfo,
    table: Table,
    library: Arc<NativeLibrary>,
}

/// Entry point and version of the soft-filter binary interface.
pub struct SoftFilterAbi;

impl NativeAbi for SoftFilterAbi {
    type Descriptor = dyn SoftFilterPlugin;
    const ENTRY_SYMBOL: &'static str = "softfilter_get_implementation";
    const API_VERSION: u32 = SOFTFILTER_API_VERSION;

    unsafe fn resolve(library: &Arc<NativeLibrary>, simd: SimdMask) -> Result<Arc<dyn SoftFilterPlugin>> {
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
            query_input_formats: raw.query_input_formats.ok_or_else(|| missing("query_input_formats"))?,
            query_output_formats: raw.query_output_formats.ok_or_else(|| missing("query_output_formats"))?,
            create: raw.create.ok_or_else(|| missing("create"))?,
            destroy: raw.destroy.ok_or_else(|| missing("destroy"))?,
            query_num_threads: raw.query_num_threads.ok_or_else(|| missing("query_num_threads"))?,
            query_output_size: raw.query_output_size.ok_or_else(|| missing("query_output_size"))?,
            get_work_packets: raw.get_work_packets.ok_or_else(|| missing("get_work_packets"))?,
        };

        let info = PluginInfo {
            ident: descriptor_string(&path, "short_ident", raw.short_ident)?,
            name: descriptor_string(&path, "ident", raw.ident)?,
            kind: PluginKind::SoftFilter,
            api_version: raw.api_version,
            origin: PluginOrigin::Native(library.path().to_path_buf()),
        };

        Ok(Arc::new(NativeSoftFilter {
            info,
            table,
            library: Arc::clone(library),
        }))
    }
}

impl Plugin for NativeSoftFilter {
    fn info(&self) -> &PluginInfo {
        &self.info
    }
}

impl SoftFilterPlugin for NativeSoftFilter {
    fn input_formats(&self) -> FormatMask {
        // SAFETY: validated at resolve time; the library outlives `self`.
        FormatMask::from_bits_truncate(unsafe { (self.table.query_input_formats)() })
    }

    fn output_formats(&self, input: PixelFormat) -> FormatMask {
        FormatMask::from_bits_truncate(unsafe { (self.table.query_output_formats)(input.mask().bits()) })
    }

    fn create(&self, setup: &StageSetup, params: &ParamScope<'_>) -> Option<Box<dyn SoftFilterInstance>> {
        let bridge = ConfigBridge::new(params.clone());
        let active = bridge.activate();
        // SAFETY: the bridge outlives the call and the vtable is static.
        let state = unsafe {
            (self.table.create)(
                ConfigBridge::vtable(),
                setup.input_format.mask().bits(),
                setup.output_format.mask().bits(),
                setup.max_width,
                setup.max_height,
                setup.threads as c_uint,
                setup.simd.bits(),
                bridge.userdata(),
            )
        };
        drop(active);
        drop(bridge);
        if state.is_null() {
            return None;
        }

        let threads = unsafe { (self.table.query_num_threads)(state) }.max(1) as usize;
        Some(Box::new(NativeInstance {
            state: StatePtr(state),
            table: self.table,
            threads,
            _library: Arc::clone(&self.library),
        }))
    }
}

#[derive(Clone, Copy)]
struct StatePtr(*mut c_void);

// SAFETY: plugin state is only used through the plugin's own functions,
// and concurrently only by the work packets it produced for one cycle.
unsafe impl Send for StatePtr {}
unsafe impl Sync for StatePtr {}

/// A packet's callback and arguments.
struct NativeJob {
    work: WorkFn,
    state: StatePtr,
    thread_data: *mut c_void,
}

// SAFETY: the plugin hands out one `thread_data` per packet.
unsafe impl Send for NativeJob {}

impl NativeJob {
    fn run(self) {
        unsafe { (self.work)(self.state.0, self.thread_data) }
    }
}

struct NativeInstance {
    state: StatePtr,
    table: Table,
    threads: usize,
    _library: Arc<NativeLibrary>,
}

impl SoftFilterInstance for NativeInstance {
    fn num_threads(&self) -> usize {
        self.threads
    }

    fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        let (mut out_width, mut out_height) = (0, 0);
        unsafe { (self.table.query_output_size)(self.state.0, &mut out_width, &mut out_height, width, height) };
        (out_width, out_height)
    }

    fn work_packets<'a>(&'a self, frame: FrameBuffers<'a>) -> Vec<WorkPacket<'a>> {
        let FrameBuffers {
            output,
            output_stride,
            input,
            width,
            height,
            input_stride,
        } = frame;
        let mut raw: Vec<RawWorkPacket> = (0..self.threads)
            .map(|_| RawWorkPacket {
                work: None,
                thread_data: ptr::null_mut(),
            })
            .collect();
        // SAFETY: `raw` has one entry per reported thread and the frame
        // buffers stay borrowed for as long as the returned packets live.
        unsafe {
            (self.table.get_work_packets)(
                self.state.0,
                raw.as_mut_ptr(),
                output.as_mut_ptr() as *mut c_void,
                output_stride,
                input.as_ptr() as *const c_void,
                width,
                height,
                input_stride,
            )
        };

        raw.into_iter()
            .filter_map(|packet| {
                let job = NativeJob {
                    work: packet.work?,
                    state: self.state,
                    thread_data: packet.thread_data,
                };
                Some(WorkPacket::new(move || job.run()))
            })
            .collect()
    }
}

impl Drop for NativeInstance {
    fn drop(&mut self) {
        debug!("Destroying native soft-filter instance");
        unsafe { (self.table.destroy)(self.state.0) };
    }
}
