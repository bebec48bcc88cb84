//! Callback registration
//!
//! Binds the plugin's host and device callbacks into a host session.

use crate::ffi::{device_usr_callback, host_usr_callback, DeviceUsrCallback, HostUsrCallback};
use crate::types::SessionHandle;

/// Registration capability provided by the host framework
///
/// Failures (e.g. an invalid handle) are the host's to signal; the plugin
/// neither checks nor retries.
pub trait CallbackRegistry {
    /// Associate a host event callback with a session
    fn register_host_callback(&self, session: SessionHandle, callback: HostUsrCallback);

    /// Associate a device event callback with a session
    fn register_device_callback(&self, session: SessionHandle, callback: DeviceUsrCallback);
}

/// Register the plugin callbacks with `registry` for `session`
///
/// The host callback is registered first, the device callback second.
/// Calling this again registers both again.
pub fn register_callbacks<R: CallbackRegistry + ?Sized>(registry: &R, session: SessionHandle) {
    log::debug!("Registering trace-compass callbacks for session {:p}", session.as_ptr());

    registry.register_host_callback(session, host_usr_callback);
    registry.register_device_callback(session, device_usr_callback);
}
