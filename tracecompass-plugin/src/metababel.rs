//! Binding to a metababel-generated component
//!
//! metababel generates one `btx_register_callbacks_<stream>` function per
//! dispatched event class and expects the user plugin to export
//! `btx_register_usr_callbacks`. The generated functions are linked in from
//! the component, so this module only builds with the `metababel` feature.

use crate::ffi::{DeviceUsrCallback, HostUsrCallback};
use crate::registrar::{register_callbacks, CallbackRegistry};
use crate::types::SessionHandle;
use std::os::raw::c_void;

extern "C" {
    fn btx_register_callbacks_lttng_host(btx_handle: *mut c_void, callback: HostUsrCallback);
    fn btx_register_callbacks_lttng_device(btx_handle: *mut c_void, callback: DeviceUsrCallback);
}

/// Registry backed by the component's generated registration functions
#[derive(Debug, Clone, Copy, Default)]
pub struct MetababelRegistry;

impl CallbackRegistry for MetababelRegistry {
    fn register_host_callback(&self, session: SessionHandle, callback: HostUsrCallback) {
        unsafe { btx_register_callbacks_lttng_host(session.as_ptr(), callback) }
    }

    fn register_device_callback(&self, session: SessionHandle, callback: DeviceUsrCallback) {
        unsafe { btx_register_callbacks_lttng_device(session.as_ptr(), callback) }
    }
}

/// Entry point called by the component once its handle is set up
///
/// # Safety
/// `btx_handle` must be the handle the component passes to user plugins.
#[no_mangle]
pub unsafe extern "C" fn btx_register_usr_callbacks(btx_handle: *mut c_void) {
    register_callbacks(&MetababelRegistry, SessionHandle::from_raw(btx_handle));
}

#[cfg(all(test, feature = "metababel"))]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    // Stand-ins for the component's generated functions
    static CALLS: Mutex<Vec<(&'static str, usize)>> = Mutex::new(Vec::new());

    #[no_mangle]
    extern "C" fn btx_register_callbacks_lttng_host(
        btx_handle: *mut c_void,
        _callback: HostUsrCallback,
    ) {
        CALLS.lock().push(("host", btx_handle as usize));
    }

    #[no_mangle]
    extern "C" fn btx_register_callbacks_lttng_device(
        btx_handle: *mut c_void,
        _callback: DeviceUsrCallback,
    ) {
        CALLS.lock().push(("device", btx_handle as usize));
    }

    /// Calls recorded for one handle (tests run concurrently)
    fn calls_for(handle: usize) -> Vec<&'static str> {
        CALLS
            .lock()
            .iter()
            .filter(|(_, h)| *h == handle)
            .map(|(kind, _)| *kind)
            .collect()
    }

    #[test]
    fn test_usr_callbacks_registered_host_then_device() {
        unsafe { btx_register_usr_callbacks(0xA1 as *mut c_void) };
        assert_eq!(calls_for(0xA1), vec!["host", "device"]);
    }

    #[test]
    fn test_usr_callbacks_registered_again_on_second_call() {
        unsafe {
            btx_register_usr_callbacks(0xA2 as *mut c_void);
            btx_register_usr_callbacks(0xA2 as *mut c_void);
        }
        assert_eq!(calls_for(0xA2), vec!["host", "device", "host", "device"]);
    }

    #[test]
    fn test_registry_passes_handle_through() {
        let session = SessionHandle::from_raw(0xA3 as *mut c_void);
        MetababelRegistry.register_host_callback(session, crate::ffi::host_usr_callback);
        assert_eq!(calls_for(0xA3), vec!["host"]);
        assert!(calls_for(0xA4).is_empty());
    }
}
