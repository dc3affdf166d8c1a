//! C configuration vtable handed to native plugins.
//!
//! Native plugins read parameters through [`RawConfig`], a table of
//! function pointers whose `userdata` is a [`ConfigBridge`]. Arrays and
//! strings returned to the plugin are owned by the bridge until the plugin
//! passes them back to `free`.
//!
//! `free` receives only the pointer, as in the C headers plugins are built
//! against. It releases into the bridge made active on the calling thread
//! with [`ConfigBridge::activate`], which native `create` calls hold for
//! their whole duration.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::ffi::{c_char, c_int, c_uint, c_void, CStr, CString};
use std::marker::PhantomData;
use std::ptr;
use std::str::FromStr;

use filterhost_core::ParamScope;
use tracing::warn;

/// Parameter getters exported to native plugins.
///
/// Every getter writes the configured value, or the default when the key is
/// absent or malformed, and returns non-zero if the configured value was used.
#[repr(C)]
pub struct RawConfig {
    pub get_float: unsafe extern "C" fn(
        userdata: *mut c_void,
        key: *const c_char,
        value: *mut f32,
        default_value: f32,
    ) -> c_int,
    pub get_int: unsafe extern "C" fn(
        userdata: *mut c_void,
        key: *const c_char,
        value: *mut c_int,
        default_value: c_int,
    ) -> c_int,
    pub get_float_array: unsafe extern "C" fn(
        userdata: *mut c_void,
        key: *const c_char,
        values: *mut *mut f32,
        out_num_values: *mut c_uint,
        default_values: *const f32,
        num_default_values: c_uint,
    ) -> c_int,
    pub get_int_array: unsafe extern "C" fn(
        userdata: *mut c_void,
        key: *const c_char,
        values: *mut *mut c_int,
        out_num_values: *mut c_uint,
        default_values: *const c_int,
        num_default_values: c_uint,
    ) -> c_int,
    pub get_string: unsafe extern "C" fn(
        userdata: *mut c_void,
        key: *const c_char,
        output: *mut *mut c_char,
        default_output: *const c_char,
    ) -> c_int,
    /// Release an array or string obtained from this table.
    pub free: unsafe extern "C" fn(ptr: *mut c_void),
}

thread_local! {
    static ACTIVE: Cell<*const c_void> = const { Cell::new(ptr::null()) };
}

static VTABLE: RawConfig = RawConfig {
    get_float: bridge_get_float,
    get_int: bridge_get_int,
    get_float_array: bridge_get_float_array,
    get_int_array: bridge_get_int_array,
    get_string: bridge_get_string,
    free: bridge_free,
};

enum Allocation {
    Floats(Box<[f32]>),
    Ints(Box<[c_int]>),
    Text(CString),
}

/// Backing state for one plugin `create` call.
pub struct ConfigBridge<'a> {
    scope: ParamScope<'a>,
    allocations: RefCell<HashMap<usize, Allocation>>,
}

impl<'a> ConfigBridge<'a> {
    pub fn new(scope: ParamScope<'a>) -> Self {
        Self {
            scope,
            allocations: RefCell::new(HashMap::new()),
        }
    }

    /// The vtable to pass alongside [`Self::userdata`].
    pub fn vtable() -> *const RawConfig {
        &VTABLE
    }

    /// Opaque pointer identifying this bridge to the vtable functions.
    ///
    /// Valid while the bridge is alive and not moved.
    pub fn userdata(&self) -> *mut c_void {
        self as *const Self as *mut c_void
    }

    /// Make this bridge the target of `free` on the current thread until
    /// the guard drops.
    pub fn activate(&self) -> ActiveBridge<'_> {
        let previous = ACTIVE.with(|active| active.replace(self.userdata() as *const c_void));
        ActiveBridge {
            previous,
            _bridge: PhantomData,
        }
    }

    /// Number of values handed out and not yet freed.
    pub fn outstanding(&self) -> usize {
        self.allocations.borrow().len()
    }

    fn parsed<T: FromStr>(&self, key: &str) -> Option<T> {
        self.scope.lookup(key)?.trim().parse().ok()
    }

    fn array<T: FromStr>(&self, key: &str) -> Option<Vec<T>> {
        self.scope
            .lookup(key)?
            .split_whitespace()
            .map(|item| item.parse().ok())
            .collect()
    }

    fn keep(&self, allocation: Allocation) -> *mut c_void {
        let ptr = match &allocation {
            Allocation::Floats(values) => values.as_ptr() as *mut c_void,
            Allocation::Ints(values) => values.as_ptr() as *mut c_void,
            Allocation::Text(text) => text.as_ptr() as *mut c_void,
        };
        self.allocations.borrow_mut().insert(ptr as usize, allocation);
        ptr
    }
}

impl Drop for ConfigBridge<'_> {
    fn drop(&mut self) {
        let leaked = std::mem::take(self.allocations.get_mut());
        if !leaked.is_empty() {
            // The plugin may still hold these pointers
            warn!(
                count = leaked.len(),
                prefixes = ?self.scope.prefixes(),
                "Plugin kept configuration values without freeing them"
            );
            std::mem::forget(leaked);
        }
    }
}

/// Guard returned by [`ConfigBridge::activate`].
pub struct ActiveBridge<'b> {
    previous: *const c_void,
    _bridge: PhantomData<&'b ()>,
}

impl Drop for ActiveBridge<'_> {
    fn drop(&mut self) {
        ACTIVE.with(|active| active.set(self.previous));
    }
}

/// Recover the bridge and key from raw callback arguments.
///
/// # Safety
///
/// `userdata` must come from [`ConfigBridge::userdata`] of a live bridge and
/// `key`, when non-null, must be a NUL-terminated string.
unsafe fn bridge_args<'b>(userdata: *mut c_void, key: *const c_char) -> Option<(&'b ConfigBridge<'b>, &'b str)> {
    if userdata.is_null() || key.is_null() {
        return None;
    }
    let bridge = &*(userdata as *const ConfigBridge<'b>);
    let key = CStr::from_ptr(key).to_str().ok()?;
    Some((bridge, key))
}

unsafe extern "C" fn bridge_get_float(
    userdata: *mut c_void,
    key: *const c_char,
    value: *mut f32,
    default_value: f32,
) -> c_int {
    let found = bridge_args(userdata, key).and_then(|(bridge, key)| bridge.parsed::<f32>(key));
    if !value.is_null() {
        *value = found.unwrap_or(default_value);
    }
    found.is_some() as c_int
}

unsafe extern "C" fn bridge_get_int(
    userdata: *mut c_void,
    key: *const c_char,
    value: *mut c_int,
    default_value: c_int,
) -> c_int {
    let found = bridge_args(userdata, key).and_then(|(bridge, key)| bridge.parsed::<c_int>(key));
    if !value.is_null() {
        *value = found.unwrap_or(default_value);
    }
    found.is_some() as c_int
}

/// Shared body of the two array getters.
unsafe fn get_array<T: FromStr + Copy>(
    userdata: *mut c_void,
    key: *const c_char,
    values: *mut *mut T,
    out_num_values: *mut c_uint,
    default_values: *const T,
    num_default_values: c_uint,
    wrap: fn(Box<[T]>) -> Allocation,
) -> c_int {
    let Some((bridge, key)) = bridge_args(userdata, key) else {
        return 0;
    };
    let found = bridge.array::<T>(key);
    let is_found = found.is_some();
    let items: Vec<T> = match found {
        Some(items) => items,
        None if default_values.is_null() || num_default_values == 0 => Vec::new(),
        None => std::slice::from_raw_parts(default_values, num_default_values as usize).to_vec(),
    };

    let len = items.len() as c_uint;
    let ptr = if items.is_empty() {
        std::ptr::null_mut()
    } else {
        bridge.keep(wrap(items.into_boxed_slice())) as *mut T
    };
    if !values.is_null() {
        *values = ptr;
    }
    if !out_num_values.is_null() {
        *out_num_values = len;
    }
    is_found as c_int
}

unsafe extern "C" fn bridge_get_float_array(
    userdata: *mut c_void,
    key: *const c_char,
    values: *mut *mut f32,
    out_num_values: *mut c_uint,
    default_values: *const f32,
    num_default_values: c_uint,
) -> c_int {
    get_array(
        userdata,
        key,
        values,
        out_num_values,
        default_values,
        num_default_values,
        Allocation::Floats,
    )
}

unsafe extern "C" fn bridge_get_int_array(
    userdata: *mut c_void,
    key: *const c_char,
    values: *mut *mut c_int,
    out_num_values: *mut c_uint,
    default_values: *const c_int,
    num_default_values: c_uint,
) -> c_int {
    get_array(
        userdata,
        key,
        values,
        out_num_values,
        default_values,
        num_default_values,
        Allocation::Ints,
    )
}

unsafe extern "C" fn bridge_get_string(
    userdata: *mut c_void,
    key: *const c_char,
    output: *mut *mut c_char,
    default_output: *const c_char,
) -> c_int {
    let Some((bridge, key)) = bridge_args(userdata, key) else {
        return 0;
    };
    let found = bridge.scope.lookup(key).and_then(|v| CString::new(v).ok());
    let is_found = found.is_some();
    let text = match found {
        Some(text) => Some(text),
        None if default_output.is_null() => None,
        None => Some(CStr::from_ptr(default_output).to_owned()),
    };

    let ptr = match text {
        Some(text) => bridge.keep(Allocation::Text(text)) as *mut c_char,
        None => std::ptr::null_mut(),
    };
    if !output.is_null() {
        *output = ptr;
    }
    is_found as c_int
}

unsafe extern "C" fn bridge_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    let active = ACTIVE.with(Cell::get);
    if active.is_null() {
        warn!("Plugin freed configuration memory outside of create");
        return;
    }
    let bridge = &*(active as *const ConfigBridge<'_>);
    if bridge.allocations.borrow_mut().remove(&(ptr as usize)).is_none() {
        warn!("Plugin freed a pointer the configuration never handed out");
    }
}
