//! A native plugin library written against the C plugin headers.
//!
//! Exports `softfilter_get_implementation` (an XOR colour inverter,
//! `invert`) and `dspfilter_get_implementation` (a gain stage, `gain`).
//! Cargo features turn it into the broken variants that plugin discovery
//! must skip.
//!
//! Nothing here may panic: every entry point is called across the C ABI.

#![allow(clippy::missing_safety_doc)]

use std::ffi::{c_char, c_int, c_uint, c_void};
use std::ptr;

const FMT_XRGB8888: c_uint = 1 << 1;

const SOFTFILTER_API_VERSION: c_uint = if cfg!(feature = "wrong-api-version") { 99 } else { 2 };
const DSPFILTER_API_VERSION: c_uint = if cfg!(feature = "wrong-api-version") { 99 } else { 1 };

#[repr(C)]
pub struct Config {
    get_float: unsafe extern "C" fn(*mut c_void, *const c_char, *mut f32, f32) -> c_int,
    get_int: unsafe extern "C" fn(*mut c_void, *const c_char, *mut c_int, c_int) -> c_int,
    get_float_array:
        unsafe extern "C" fn(*mut c_void, *const c_char, *mut *mut f32, *mut c_uint, *const f32, c_uint) -> c_int,
    get_int_array:
        unsafe extern "C" fn(*mut c_void, *const c_char, *mut *mut c_int, *mut c_uint, *const c_int, c_uint) -> c_int,
    get_string: unsafe extern "C" fn(*mut c_void, *const c_char, *mut *mut c_char, *const c_char) -> c_int,
    free: unsafe extern "C" fn(*mut c_void),
}

unsafe fn config_int(config: *const Config, userdata: *mut c_void, key: &[u8], default: c_int) -> c_int {
    let mut value = default;
    ((*config).get_int)(userdata, key.as_ptr().cast(), &mut value, default);
    value
}

unsafe fn config_float(config: *const Config, userdata: *mut c_void, key: &[u8], default: f32) -> f32 {
    let mut value = default;
    ((*config).get_float)(userdata, key.as_ptr().cast(), &mut value, default);
    value
}

/// Read a string parameter and hand it straight back, as C plugins do
/// with labels they only log.
unsafe fn touch_label(config: *const Config, userdata: *mut c_void) {
    let mut label: *mut c_char = ptr::null_mut();
    ((*config).get_string)(userdata, b"label\0".as_ptr().cast(), &mut label, b"none\0".as_ptr().cast());
    if !label.is_null() {
        ((*config).free)(label.cast());
    }
}

// Video

#[repr(C)]
pub struct WorkPacket {
    work: Option<unsafe extern "C" fn(*mut c_void, *mut c_void)>,
    thread_data: *mut c_void,
}

#[repr(C)]
pub struct SoftFilterImplementation {
    query_input_formats: unsafe extern "C" fn() -> c_uint,
    query_output_formats: unsafe extern "C" fn(c_uint) -> c_uint,
    create: unsafe extern "C" fn(*const Config, c_uint, c_uint, c_uint, c_uint, c_uint, u64, *mut c_void) -> *mut c_void,
    destroy: unsafe extern "C" fn(*mut c_void),
    query_num_threads: unsafe extern "C" fn(*mut c_void) -> c_uint,
    query_output_size: unsafe extern "C" fn(*mut c_void, *mut c_uint, *mut c_uint, c_uint, c_uint),
    get_work_packets:
        unsafe extern "C" fn(*mut c_void, *mut WorkPacket, *mut c_void, usize, *const c_void, c_uint, c_uint, usize),
    api_version: c_uint,
    ident: *const c_char,
    short_ident: *const c_char,
}

// SAFETY: the table only holds function pointers and static strings.
unsafe impl Sync for SoftFilterImplementation {}

#[derive(Clone, Copy)]
struct Rows {
    output: *mut u8,
    output_stride: usize,
    input: *const u8,
    input_stride: usize,
    width: usize,
    first: usize,
    last: usize,
}

struct Invert {
    mask: u32,
    rows: Vec<Rows>,
}

unsafe extern "C" fn invert_input_formats() -> c_uint {
    FMT_XRGB8888
}

unsafe extern "C" fn invert_output_formats(input: c_uint) -> c_uint {
    input & FMT_XRGB8888
}

unsafe extern "C" fn invert_create(
    config: *const Config,
    in_fmt: c_uint,
    out_fmt: c_uint,
    _max_width: c_uint,
    _max_height: c_uint,
    threads: c_uint,
    _simd: u64,
    userdata: *mut c_void,
) -> *mut c_void {
    if in_fmt != FMT_XRGB8888 || out_fmt != FMT_XRGB8888 || config.is_null() {
        return ptr::null_mut();
    }
    if config_int(config, userdata, b"fail\0", 0) == 1 {
        return ptr::null_mut();
    }
    touch_label(config, userdata);
    let mask = config_int(config, userdata, b"mask\0", 0x00ff_ffff) as u32;
    let empty = Rows {
        output: ptr::null_mut(),
        output_stride: 0,
        input: ptr::null(),
        input_stride: 0,
        width: 0,
        first: 0,
        last: 0,
    };
    let rows = vec![empty; threads.max(1) as usize];
    Box::into_raw(Box::new(Invert { mask, rows })).cast()
}

unsafe extern "C" fn invert_destroy(data: *mut c_void) {
    if !data.is_null() {
        drop(Box::from_raw(data as *mut Invert));
    }
}

unsafe extern "C" fn invert_threads(data: *mut c_void) -> c_uint {
    (*(data as *const Invert)).rows.len() as c_uint
}

unsafe extern "C" fn invert_output_size(
    _data: *mut c_void,
    out_width: *mut c_uint,
    out_height: *mut c_uint,
    width: c_uint,
    height: c_uint,
) {
    *out_width = width;
    *out_height = height;
}

unsafe extern "C" fn invert_work(data: *mut c_void, thread_data: *mut c_void) {
    let mask = (*(data as *const Invert)).mask;
    let rows = *(thread_data as *const Rows);
    for y in rows.first..rows.last {
        let src = rows.input.add(y * rows.input_stride) as *const u32;
        let dst = rows.output.add(y * rows.output_stride) as *mut u32;
        for x in 0..rows.width {
            dst.add(x).write_unaligned(src.add(x).read_unaligned() ^ mask);
        }
    }
}

unsafe extern "C" fn invert_packets(
    data: *mut c_void,
    packets: *mut WorkPacket,
    output: *mut c_void,
    output_stride: usize,
    input: *const c_void,
    width: c_uint,
    height: c_uint,
    input_stride: usize,
) {
    let filter = &mut *(data as *mut Invert);
    let parts = filter.rows.len();
    let height = height as usize;
    for (i, rows) in filter.rows.iter_mut().enumerate() {
        *rows = Rows {
            output: output.cast(),
            output_stride,
            input: input.cast(),
            input_stride,
            width: width as usize,
            first: height * i / parts,
            last: height * (i + 1) / parts,
        };
        let packet = &mut *packets.add(i);
        packet.work = Some(invert_work);
        packet.thread_data = (rows as *mut Rows).cast();
    }
}

static SOFTFILTER: SoftFilterImplementation = SoftFilterImplementation {
    query_input_formats: invert_input_formats,
    query_output_formats: invert_output_formats,
    create: invert_create,
    destroy: invert_destroy,
    query_num_threads: invert_threads,
    query_output_size: invert_output_size,
    get_work_packets: invert_packets,
    api_version: SOFTFILTER_API_VERSION,
    ident: b"Invert\0".as_ptr().cast(),
    short_ident: b"invert\0".as_ptr().cast(),
};

#[cfg(not(feature = "no-entry-point"))]
#[no_mangle]
pub extern "C" fn softfilter_get_implementation(_simd: u64) -> *const SoftFilterImplementation {
    if cfg!(feature = "null-implementation") {
        ptr::null()
    } else {
        &SOFTFILTER
    }
}

// Audio

#[repr(C)]
pub struct DspInfo {
    input_rate: f32,
}

#[repr(C)]
pub struct DspInput {
    samples: *const f32,
    frames: c_uint,
}

#[repr(C)]
pub struct DspOutput {
    samples: *mut f32,
    frames: c_uint,
}

#[repr(C)]
pub struct DspImplementation {
    init: unsafe extern "C" fn(*const DspInfo, *const Config, *mut c_void) -> *mut c_void,
    process: unsafe extern "C" fn(*mut c_void, *mut DspOutput, *const DspInput),
    free: unsafe extern "C" fn(*mut c_void),
    api_version: c_uint,
    ident: *const c_char,
    short_ident: *const c_char,
}

// SAFETY: the table only holds function pointers and static strings.
unsafe impl Sync for DspImplementation {}

struct Gain {
    gain: f32,
    buffer: Vec<f32>,
}

unsafe extern "C" fn gain_init(info: *const DspInfo, config: *const Config, userdata: *mut c_void) -> *mut c_void {
    if info.is_null() || config.is_null() || (*info).input_rate <= 0.0 {
        return ptr::null_mut();
    }
    if config_int(config, userdata, b"fail\0", 0) == 1 {
        return ptr::null_mut();
    }
    touch_label(config, userdata);
    let gain = config_float(config, userdata, b"gain\0", 1.0);
    Box::into_raw(Box::new(Gain {
        gain,
        buffer: Vec::new(),
    }))
    .cast()
}

unsafe extern "C" fn gain_process(data: *mut c_void, output: *mut DspOutput, input: *const DspInput) {
    let state = &mut *(data as *mut Gain);
    let len = (*input).frames as usize * 2;
    state.buffer.clear();
    if len > 0 && !(*input).samples.is_null() {
        let samples = std::slice::from_raw_parts((*input).samples, len);
        state.buffer.extend(samples.iter().map(|s| s * state.gain));
    }
    (*output).samples = state.buffer.as_mut_ptr();
    (*output).frames = (*input).frames;
}

unsafe extern "C" fn gain_free(data: *mut c_void) {
    if !data.is_null() {
        drop(Box::from_raw(data as *mut Gain));
    }
}

static DSPFILTER: DspImplementation = DspImplementation {
    init: gain_init,
    process: gain_process,
    free: gain_free,
    api_version: DSPFILTER_API_VERSION,
    ident: b"Gain\0".as_ptr().cast(),
    short_ident: b"gain\0".as_ptr().cast(),
};

#[cfg(not(feature = "no-entry-point"))]
#[no_mangle]
pub extern "C" fn dspfilter_get_implementation(_simd: u64) -> *const DspImplementation {
    if cfg!(feature = "null-implementation") {
        ptr::null()
    } else {
        &DSPFILTER
    }
}
