//! In-process callback table
//!
//! `CallbackTable` plays the host's part of the contract for local use:
//! plugins register into it (directly or through its C [`HostApi`]) and it
//! invokes the registered callbacks with events built from owned records.

use crate::ffi::{DeviceUsrCallback, HostApi, HostUsrCallback, BT_FALSE, BT_TRUE};
use crate::registrar::CallbackRegistry;
use crate::types::{DeviceEventRecord, HostEventRecord, PluginError, Result, SessionHandle};
use parking_lot::RwLock;
use std::ffi::CString;
use std::fmt;
use std::os::raw::c_void;

/// One registration, in the order it was received
#[derive(Clone, Copy)]
pub enum Registration {
    Host {
        session: SessionHandle,
        callback: HostUsrCallback,
    },
    Device {
        session: SessionHandle,
        callback: DeviceUsrCallback,
    },
}

impl Registration {
    pub fn session(&self) -> SessionHandle {
        match self {
            Registration::Host { session, .. } => *session,
            Registration::Device { session, .. } => *session,
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, Registration::Host { .. })
    }

    pub fn is_device(&self) -> bool {
        matches!(self, Registration::Device { .. })
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_host() { "Host" } else { "Device" };
        f.debug_struct(kind)
            .field("session", &self.session())
            .finish_non_exhaustive()
    }
}

/// Registration counts by kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistrationStats {
    pub host: usize,
    pub device: usize,
}

/// Registrations behind a table; its heap address is the session handle
#[derive(Debug, Default)]
struct Registry {
    registrations: RwLock<Vec<Registration>>,
}

impl Registry {
    fn push(&self, registration: Registration) {
        self.registrations.write().push(registration);
    }
}

/// Thread-safe registry of plugin callbacks
///
/// Moving the table keeps its session handle valid. Dropping it invalidates
/// the handle.
#[derive(Debug, Default)]
pub struct CallbackTable {
    registry: Box<Registry>,
    usr_data: usize,
}

impl CallbackTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: user data pointer passed to every callback
    pub fn with_usr_data(mut self, usr_data: *mut c_void) -> Self {
        self.usr_data = usr_data as usize;
        self
    }

    /// Session handle identifying this table
    ///
    /// Registrations arriving through [`CallbackTable::c_api`] must carry this
    /// handle: it is how the C entry points find the registrations again.
    pub fn session(&self) -> SessionHandle {
        SessionHandle::from_raw(&*self.registry as *const Registry as *mut c_void)
    }

    /// C registration table that forwards into the table behind the handle
    pub fn c_api() -> HostApi {
        HostApi {
            register_host: table_register_host,
            register_device: table_register_device,
        }
    }

    /// All registrations, oldest first
    pub fn registrations(&self) -> Vec<Registration> {
        self.registry.registrations.read().clone()
    }

    pub fn stats(&self) -> RegistrationStats {
        let registrations = self.registry.registrations.read();
        RegistrationStats {
            host: registrations.iter().filter(|r| r.is_host()).count(),
            device: registrations.iter().filter(|r| r.is_device()).count(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.registry.registrations.read().is_empty()
    }

    /// Drop all registrations
    pub fn clear(&self) {
        self.registry.registrations.write().clear();
    }

    fn host_callbacks(&self, session: SessionHandle) -> Vec<HostUsrCallback> {
        self.registry
            .registrations
            .read()
            .iter()
            .filter_map(|r| match r {
                Registration::Host { session: s, callback } if *s == session => Some(*callback),
                _ => None,
            })
            .collect()
    }

    fn device_callbacks(&self, session: SessionHandle) -> Vec<DeviceUsrCallback> {
        self.registry
            .registrations
            .read()
            .iter()
            .filter_map(|r| match r {
                Registration::Device { session: s, callback } if *s == session => Some(*callback),
                _ => None,
            })
            .collect()
    }

    /// Invoke every host callback registered for `session`
    ///
    /// Returns how many callbacks ran. Callbacks run without the table lock
    /// held.
    pub fn dispatch_host(&self, session: SessionHandle, event: &HostEventRecord) -> Result<usize> {
        let hostname = c_string("hostname", &event.hostname)?;
        let name = c_string("name", &event.name)?;

        let callbacks = self.host_callbacks(session);
        for &callback in &callbacks {
            unsafe {
                callback(
                    session.as_ptr(),
                    self.usr_data as *mut c_void,
                    hostname.as_ptr(),
                    event.vpid,
                    event.vtid,
                    event.ts,
                    event.backend_id,
                    name.as_ptr(),
                    event.dur,
                    bt_bool(event.err),
                )
            };
        }

        Ok(callbacks.len())
    }

    /// Invoke every device callback registered for `session`
    pub fn dispatch_device(
        &self,
        session: SessionHandle,
        event: &DeviceEventRecord,
    ) -> Result<usize> {
        let common = &event.common;
        let hostname = c_string("hostname", &common.hostname)?;
        let name = c_string("name", &common.name)?;
        let metadata = c_string("metadata", &event.metadata)?;

        let callbacks = self.device_callbacks(session);
        for &callback in &callbacks {
            unsafe {
                callback(
                    session.as_ptr(),
                    self.usr_data as *mut c_void,
                    hostname.as_ptr(),
                    common.vpid,
                    common.vtid,
                    common.ts,
                    common.backend_id,
                    name.as_ptr(),
                    common.dur,
                    event.did,
                    event.sdid,
                    bt_bool(common.err),
                    metadata.as_ptr(),
                )
            };
        }

        Ok(callbacks.len())
    }
}

impl CallbackRegistry for CallbackTable {
    fn register_host_callback(&self, session: SessionHandle, callback: HostUsrCallback) {
        self.registry.push(Registration::Host { session, callback });
    }

    fn register_device_callback(&self, session: SessionHandle, callback: DeviceUsrCallback) {
        self.registry.push(Registration::Device { session, callback });
    }
}

fn c_string(field: &'static str, value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| PluginError::InteriorNul { field })
}

fn bt_bool(value: bool) -> crate::ffi::BtBool {
    if value {
        BT_TRUE
    } else {
        BT_FALSE
    }
}

unsafe extern "C" fn table_register_host(btx_handle: *mut c_void, callback: HostUsrCallback) {
    // Handles come from CallbackTable::session
    if let Some(registry) = (btx_handle as *const Registry).as_ref() {
        let session = SessionHandle::from_raw(btx_handle);
        registry.push(Registration::Host { session, callback });
    }
}

unsafe extern "C" fn table_register_device(btx_handle: *mut c_void, callback: DeviceUsrCallback) {
    if let Some(registry) = (btx_handle as *const Registry).as_ref() {
        let session = SessionHandle::from_raw(btx_handle);
        registry.push(Registration::Device { session, callback });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ffi::tracecompass_register_with;
    use crate::registrar::register_callbacks;
    use crate::types::Backend;
    use std::ffi::CStr;
    use std::os::raw::c_char;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static HOST_HITS: AtomicUsize = AtomicUsize::new(0);

    unsafe extern "C" fn counting_host(
        _handle: *mut c_void,
        usr_data: *mut c_void,
        hostname: *const c_char,
        vpid: i64,
        _vtid: u64,
        _ts: i64,
        backend_id: i64,
        _name: *const c_char,
        _dur: u64,
        err: crate::ffi::BtBool,
    ) {
        assert_eq!(usr_data as usize, 0xDA7A);
        assert_eq!(CStr::from_ptr(hostname).to_str().unwrap(), "node7");
        assert_eq!(vpid, 77);
        assert_eq!(backend_id, Backend::Cl.id());
        assert_eq!(err, BT_TRUE);
        HOST_HITS.fetch_add(1, Ordering::SeqCst);
    }

    fn sample_host() -> HostEventRecord {
        HostEventRecord::new("node7", "clEnqueueNDRangeKernel")
            .with_backend(Backend::Cl)
            .with_ids(77, 78)
            .with_timing(1_000, 20)
            .with_error(true)
    }

    #[test]
    fn test_register_in_process() {
        let table = CallbackTable::new();
        register_callbacks(&table, table.session());

        let regs = table.registrations();
        assert_eq!(regs.len(), 2);
        assert!(regs[0].is_host());
        assert!(regs[1].is_device());
        assert_eq!(regs[0].session(), table.session());
    }

    #[test]
    fn test_register_through_c_api_matches_in_process() {
        let direct = CallbackTable::new();
        register_callbacks(&direct, direct.session());

        let via_c = CallbackTable::new();
        let api = CallbackTable::c_api();
        unsafe { tracecompass_register_with(via_c.session().as_ptr(), &api) };

        assert_eq!(direct.stats(), via_c.stats());
        assert_eq!(via_c.stats(), RegistrationStats { host: 1, device: 1 });
        assert!(via_c.registrations()[0].is_host());
    }

    #[test]
    fn test_dispatch_counts_registered_callbacks() {
        let table = CallbackTable::new();
        let session = table.session();
        register_callbacks(&table, session);
        register_callbacks(&table, session);

        let device = DeviceEventRecord::new(sample_host(), 0, 1).with_metadata("tile 1");
        assert_eq!(table.dispatch_host(session, &sample_host()).unwrap(), 2);
        assert_eq!(table.dispatch_device(session, &device).unwrap(), 2);
    }

    #[test]
    fn test_dispatch_only_matching_session() {
        let table = CallbackTable::new();
        let other = SessionHandle::from_raw(0x5E55 as *mut c_void);
        register_callbacks(&table, other);

        assert_eq!(table.dispatch_host(table.session(), &sample_host()).unwrap(), 0);
        assert_eq!(table.dispatch_host(other, &sample_host()).unwrap(), 1);
    }

    #[test]
    fn test_dispatch_passes_fields_through() {
        let table = CallbackTable::new().with_usr_data(0xDA7A as *mut c_void);
        let session = table.session();
        table.register_host_callback(session, counting_host);

        let before = HOST_HITS.load(Ordering::SeqCst);
        assert_eq!(table.dispatch_host(session, &sample_host()).unwrap(), 1);
        assert_eq!(HOST_HITS.load(Ordering::SeqCst), before + 1);
    }

    #[test]
    fn test_interior_nul_rejected() {
        let table = CallbackTable::new();
        register_callbacks(&table, table.session());

        let bad = DeviceEventRecord::new(sample_host(), 0, 0).with_metadata("a\0b");
        let err = table.dispatch_device(table.session(), &bad).unwrap_err();
        assert!(matches!(err, PluginError::InteriorNul { field: "metadata" }));
    }

    #[test]
    fn test_session_survives_move() {
        let table = CallbackTable::new();
        let session = table.session();
        register_callbacks(&table, session);

        let moved = vec![table];
        assert_eq!(moved[0].session(), session);
        assert_eq!(moved[0].dispatch_host(moved[0].session(), &sample_host()).unwrap(), 1);

        // A handle taken before the move still registers through the C table
        let api = CallbackTable::c_api();
        unsafe { tracecompass_register_with(session.as_ptr(), &api) };
        assert_eq!(moved[0].stats(), RegistrationStats { host: 2, device: 2 });
    }

    #[test]
    fn test_clear() {
        let table = CallbackTable::new();
        register_callbacks(&table, table.session());
        assert!(!table.is_empty());
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.dispatch_host(table.session(), &sample_host()).unwrap(), 0);
    }
}
