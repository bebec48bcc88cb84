//! C ABI of the plugin
//!
//! The callback signatures here are the wire contract with the host
//! framework: parameter order and widths must not change.

use crate::registrar::{register_callbacks, CallbackRegistry};
use crate::sink::{NoopSink, TraceEventSink};
use crate::types::{DeviceEvent, HostEvent, SessionHandle, TraceStr};
use std::os::raw::{c_char, c_int, c_void};

/// Babeltrace boolean (`bt_bool`)
pub type BtBool = c_int;

pub const BT_TRUE: BtBool = 1;
pub const BT_FALSE: BtBool = 0;

/// Host event callback: handle, usr_data, hostname, vpid, vtid, ts,
/// backend_id, name, dur, err
pub type HostUsrCallback = unsafe extern "C" fn(
    btx_handle: *mut c_void,
    usr_data: *mut c_void,
    hostname: *const c_char,
    vpid: i64,
    vtid: u64,
    ts: i64,
    backend_id: i64,
    name: *const c_char,
    dur: u64,
    err: BtBool,
);

/// Device event callback: handle, usr_data, hostname, vpid, vtid, ts,
/// backend_id, name, dur, did, sdid, err, metadata
pub type DeviceUsrCallback = unsafe extern "C" fn(
    btx_handle: *mut c_void,
    usr_data: *mut c_void,
    hostname: *const c_char,
    vpid: i64,
    vtid: u64,
    ts: i64,
    backend_id: i64,
    name: *const c_char,
    dur: u64,
    did: u64,
    sdid: u64,
    err: BtBool,
    metadata: *const c_char,
);

/// Registration functions a host hands to the plugin
///
/// Both entries receive the session handle first, as the metababel
/// `btx_register_callbacks_*` functions do.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct HostApi {
    pub register_host: unsafe extern "C" fn(btx_handle: *mut c_void, callback: HostUsrCallback),
    pub register_device:
        unsafe extern "C" fn(btx_handle: *mut c_void, callback: DeviceUsrCallback),
}

impl CallbackRegistry for HostApi {
    fn register_host_callback(&self, session: SessionHandle, callback: HostUsrCallback) {
        // The host vouches for its own function pointers
        unsafe { (self.register_host)(session.as_ptr(), callback) }
    }

    fn register_device_callback(&self, session: SessionHandle, callback: DeviceUsrCallback) {
        unsafe { (self.register_device)(session.as_ptr(), callback) }
    }
}

/// Build a host event view from raw callback arguments and hand it to `S`
///
/// # Safety
/// String pointers must be null or valid NUL-terminated strings for the
/// duration of the call.
#[allow(clippy::too_many_arguments)]
pub unsafe fn forward_host_event<S: TraceEventSink + Default>(
    btx_handle: *mut c_void,
    usr_data: *mut c_void,
    hostname: *const c_char,
    vpid: i64,
    vtid: u64,
    ts: i64,
    backend_id: i64,
    name: *const c_char,
    dur: u64,
    err: BtBool,
) {
    let event = HostEvent {
        usr_data,
        hostname: TraceStr::from_ptr(hostname),
        vpid,
        vtid,
        ts,
        backend_id,
        name: TraceStr::from_ptr(name),
        dur,
        err: err != BT_FALSE,
    };
    S::default().on_host_event(SessionHandle::from_raw(btx_handle), &event);
}

/// Build a device event view from raw callback arguments and hand it to `S`
///
/// # Safety
/// Same contract as [`forward_host_event`].
#[allow(clippy::too_many_arguments)]
pub unsafe fn forward_device_event<S: TraceEventSink + Default>(
    btx_handle: *mut c_void,
    usr_data: *mut c_void,
    hostname: *const c_char,
    vpid: i64,
    vtid: u64,
    ts: i64,
    backend_id: i64,
    name: *const c_char,
    dur: u64,
    did: u64,
    sdid: u64,
    err: BtBool,
    metadata: *const c_char,
) {
    let event = DeviceEvent {
        usr_data,
        hostname: TraceStr::from_ptr(hostname),
        vpid,
        vtid,
        ts,
        backend_id,
        name: TraceStr::from_ptr(name),
        dur,
        did,
        sdid,
        err: err != BT_FALSE,
        metadata: TraceStr::from_ptr(metadata),
    };
    S::default().on_device_event(SessionHandle::from_raw(btx_handle), &event);
}

/// The plugin's host event callback
///
/// # Safety
/// Called by the host with arguments matching [`HostUsrCallback`].
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn host_usr_callback(
    btx_handle: *mut c_void,
    usr_data: *mut c_void,
    hostname: *const c_char,
    vpid: i64,
    vtid: u64,
    ts: i64,
    backend_id: i64,
    name: *const c_char,
    dur: u64,
    err: BtBool,
) {
    forward_host_event::<NoopSink>(
        btx_handle, usr_data, hostname, vpid, vtid, ts, backend_id, name, dur, err,
    )
}

/// The plugin's device event callback
///
/// # Safety
/// Called by the host with arguments matching [`DeviceUsrCallback`].
#[allow(clippy::too_many_arguments)]
pub unsafe extern "C" fn device_usr_callback(
    btx_handle: *mut c_void,
    usr_data: *mut c_void,
    hostname: *const c_char,
    vpid: i64,
    vtid: u64,
    ts: i64,
    backend_id: i64,
    name: *const c_char,
    dur: u64,
    did: u64,
    sdid: u64,
    err: BtBool,
    metadata: *const c_char,
) {
    forward_device_event::<NoopSink>(
        btx_handle, usr_data, hostname, vpid, vtid, ts, backend_id, name, dur, did, sdid, err,
        metadata,
    )
}

/// Register the plugin callbacks through a host-supplied table
///
/// A null `api` is ignored.
///
/// # Safety
/// `api` must be null or point to a valid [`HostApi`] for the duration of
/// the call.
#[no_mangle]
pub unsafe extern "C" fn tracecompass_register_with(btx_handle: *mut c_void, api: *const HostApi) {
    match api.as_ref() {
        Some(api) => register_callbacks(api, SessionHandle::from_raw(btx_handle)),
        None => log::debug!("No host API table supplied, nothing registered"),
    }
}

static VERSION_CSTR: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

/// NUL-terminated plugin version string (static, never freed)
#[no_mangle]
pub extern "C" fn tracecompass_plugin_version() -> *const c_char {
    VERSION_CSTR.as_ptr() as *const c_char
}

/// Symbol names looked up by hosts that load the plugin dynamically
pub mod symbols {
    pub const REGISTER_WITH: &[u8] = b"tracecompass_register_with\0";
    pub const PLUGIN_VERSION: &[u8] = b"tracecompass_plugin_version\0";
}

/// Signature of [`tracecompass_register_with`]
pub type RegisterWithFn = unsafe extern "C" fn(btx_handle: *mut c_void, api: *const HostApi);

/// Signature of [`tracecompass_plugin_version`]
pub type PluginVersionFn = extern "C" fn() -> *const c_char;
