//! Core types for the trace-compass sink plugin
//!
//! This module defines the shapes of data the host framework delivers to the
//! plugin callbacks. The plugin never creates or mutates host state; these
//! types only describe what arrives at callback time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::ffi::CStr;
use std::fmt;
use std::marker::PhantomData;
use std::os::raw::{c_char, c_void};
use std::str::Utf8Error;

/// Timestamp type used throughout the plugin
pub type Timestamp = DateTime<Utc>;

/// Result type for plugin operations
pub type Result<T> = std::result::Result<T, PluginError>;

/// Errors that can occur on the host side of the plugin boundary
#[derive(Debug, thiserror::Error)]
pub enum PluginError {
    #[error("Text field `{field}` contains an interior NUL byte")]
    InteriorNul { field: &'static str },

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Opaque reference to host-managed trace-processing state
///
/// The plugin only passes this through; it is never dereferenced on this side
/// of the boundary.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(*mut c_void);

// The handle is an opaque token. Whatever it points at is owned and
// synchronized by the host.
unsafe impl Send for SessionHandle {}
unsafe impl Sync for SessionHandle {}

impl SessionHandle {
    /// Wrap a raw host handle
    pub const fn from_raw(ptr: *mut c_void) -> Self {
        Self(ptr)
    }

    /// Get the raw pointer back for handing to the host
    pub const fn as_ptr(self) -> *mut c_void {
        self.0
    }
}

/// Compute backend an event originated from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Unknown,
    /// oneAPI Level Zero
    Ze,
    /// OpenCL
    Cl,
    Cuda,
    OmpTargetOperations,
    Omp,
    Hip,
    /// Backend id not known to this plugin (kept verbatim)
    Other(i64),
}

impl Backend {
    /// Map a raw backend identifier to a backend
    pub fn from_id(id: i64) -> Self {
        match id {
            0 => Backend::Unknown,
            1 => Backend::Ze,
            2 => Backend::Cl,
            3 => Backend::Cuda,
            4 => Backend::OmpTargetOperations,
            5 => Backend::Omp,
            6 => Backend::Hip,
            other => Backend::Other(other),
        }
    }

    /// Raw backend identifier as seen on the wire
    pub fn id(&self) -> i64 {
        match self {
            Backend::Unknown => 0,
            Backend::Ze => 1,
            Backend::Cl => 2,
            Backend::Cuda => 3,
            Backend::OmpTargetOperations => 4,
            Backend::Omp => 5,
            Backend::Hip => 6,
            Backend::Other(id) => *id,
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Unknown => write!(f, "unknown"),
            Backend::Ze => write!(f, "ze"),
            Backend::Cl => write!(f, "cl"),
            Backend::Cuda => write!(f, "cuda"),
            Backend::OmpTargetOperations => write!(f, "omp_target_operations"),
            Backend::Omp => write!(f, "omp"),
            Backend::Hip => write!(f, "hip"),
            Backend::Other(id) => write!(f, "backend#{}", id),
        }
    }
}

fn timestamp_from_ns(ts: i64) -> Timestamp {
    DateTime::from_timestamp_nanos(ts)
}

/// A NUL-terminated string owned by the host, read lazily
///
/// Holding a `TraceStr` never touches the underlying memory. The bytes are
/// only read when one of the accessors is called.
#[derive(Clone, Copy)]
pub struct TraceStr<'a> {
    ptr: *const c_char,
    _marker: PhantomData<&'a CStr>,
}

impl<'a> TraceStr<'a> {
    /// Wrap a raw C string pointer
    ///
    /// # Safety
    /// `ptr` must be null or point to a NUL-terminated string that stays valid
    /// and unmodified for `'a`.
    pub unsafe fn from_ptr(ptr: *const c_char) -> Self {
        Self {
            ptr,
            _marker: PhantomData,
        }
    }

    /// Borrow from an existing C string
    pub fn from_c_str(s: &'a CStr) -> Self {
        Self {
            ptr: s.as_ptr(),
            _marker: PhantomData,
        }
    }

    pub fn is_null(&self) -> bool {
        self.ptr.is_null()
    }

    pub fn as_ptr(&self) -> *const c_char {
        self.ptr
    }

    /// Read the string as a `CStr` (`None` for a null pointer)
    pub fn as_c_str(&self) -> Option<&'a CStr> {
        if self.ptr.is_null() {
            return None;
        }
        // Validity for 'a is the constructor's contract
        Some(unsafe { CStr::from_ptr(self.ptr) })
    }

    /// Read the string as UTF-8
    pub fn to_str(&self) -> Option<std::result::Result<&'a str, Utf8Error>> {
        self.as_c_str().map(CStr::to_str)
    }

    /// Read the string, replacing invalid UTF-8
    pub fn to_string_lossy(&self) -> Option<Cow<'a, str>> {
        self.as_c_str().map(CStr::to_string_lossy)
    }
}

impl fmt::Debug for TraceStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't read host memory just for debug output
        write!(f, "TraceStr({:p})", self.ptr)
    }
}

/// A host-side API event as delivered to the host callback
#[derive(Debug, Clone, Copy)]
pub struct HostEvent<'a> {
    /// Opaque per-registration user data owned by the host
    pub usr_data: *mut c_void,
    pub hostname: TraceStr<'a>,
    /// Virtual process id as recorded in the trace
    pub vpid: i64,
    /// Virtual thread id as recorded in the trace
    pub vtid: u64,
    /// Start time in nanoseconds since epoch
    pub ts: i64,
    pub backend_id: i64,
    pub name: TraceStr<'a>,
    /// Duration in nanoseconds
    pub dur: u64,
    pub err: bool,
}

impl HostEvent<'_> {
    pub fn backend(&self) -> Backend {
        Backend::from_id(self.backend_id)
    }

    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.ts)
    }
}

/// A device-side (accelerator) event as delivered to the device callback
#[derive(Debug, Clone, Copy)]
pub struct DeviceEvent<'a> {
    pub usr_data: *mut c_void,
    pub hostname: TraceStr<'a>,
    pub vpid: i64,
    pub vtid: u64,
    pub ts: i64,
    pub backend_id: i64,
    pub name: TraceStr<'a>,
    pub dur: u64,
    /// Device id
    pub did: u64,
    /// Sub-device id
    pub sdid: u64,
    pub err: bool,
    /// Free-form metadata attached by the backend
    pub metadata: TraceStr<'a>,
}

impl DeviceEvent<'_> {
    pub fn backend(&self) -> Backend {
        Backend::from_id(self.backend_id)
    }

    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.ts)
    }
}

/// Owned host event, used by hosts to describe what to dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostEventRecord {
    pub hostname: String,
    #[serde(default)]
    pub vpid: i64,
    #[serde(default)]
    pub vtid: u64,
    #[serde(default)]
    pub ts: i64,
    #[serde(default)]
    pub backend_id: i64,
    pub name: String,
    #[serde(default)]
    pub dur: u64,
    #[serde(default)]
    pub err: bool,
}

impl HostEventRecord {
    /// Create a record with zeroed numeric fields
    pub fn new(hostname: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            vpid: 0,
            vtid: 0,
            ts: 0,
            backend_id: Backend::Unknown.id(),
            name: name.into(),
            dur: 0,
            err: false,
        }
    }

    /// Builder method: set the backend
    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend_id = backend.id();
        self
    }

    /// Builder method: set virtual process and thread ids
    pub fn with_ids(mut self, vpid: i64, vtid: u64) -> Self {
        self.vpid = vpid;
        self.vtid = vtid;
        self
    }

    /// Builder method: set start time and duration (both in ns)
    pub fn with_timing(mut self, ts: i64, dur: u64) -> Self {
        self.ts = ts;
        self.dur = dur;
        self
    }

    /// Builder method: set the error flag
    pub fn with_error(mut self, err: bool) -> Self {
        self.err = err;
        self
    }

    pub fn backend(&self) -> Backend {
        Backend::from_id(self.backend_id)
    }

    pub fn timestamp(&self) -> Timestamp {
        timestamp_from_ns(self.ts)
    }
}

/// Owned device event: the host fields plus device identification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEventRecord {
    #[serde(flatten)]
    pub common: HostEventRecord,
    #[serde(default)]
    pub did: u64,
    #[serde(default)]
    pub sdid: u64,
    #[serde(default)]
    pub metadata: String,
}

impl DeviceEventRecord {
    pub fn new(common: HostEventRecord, did: u64, sdid: u64) -> Self {
        Self {
            common,
            did,
            sdid,
            metadata: String::new(),
        }
    }

    /// Builder method: attach metadata text
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::CString;

    #[test]
    fn test_backend_ids() {
        for id in 0..=6 {
            assert_eq!(Backend::from_id(id).id(), id);
        }
        assert_eq!(Backend::from_id(1), Backend::Ze);
        assert_eq!(Backend::from_id(6), Backend::Hip);
    }

    #[test]
    fn test_unknown_backend_preserved() {
        let backend = Backend::from_id(42);
        assert_eq!(backend, Backend::Other(42));
        assert_eq!(backend.id(), 42);
        assert_eq!(backend.to_string(), "backend#42");
    }

    #[test]
    fn test_trace_str_null() {
        let s = unsafe { TraceStr::from_ptr(std::ptr::null()) };
        assert!(s.is_null());
        assert!(s.as_c_str().is_none());
        assert!(s.to_string_lossy().is_none());
    }

    #[test]
    fn test_trace_str_reads_on_demand() {
        let owned = CString::new("zeCommandListAppendLaunchKernel").unwrap();
        let s = TraceStr::from_c_str(&owned);
        assert_eq!(
            s.to_str().unwrap().unwrap(),
            "zeCommandListAppendLaunchKernel"
        );
    }

    #[test]
    fn test_trace_str_debug_does_not_read() {
        // A dangling but non-null pointer must be safe to debug-print
        let s = unsafe { TraceStr::from_ptr(0x1 as *const c_char) };
        assert!(format!("{:?}", s).starts_with("TraceStr("));
    }

    #[test]
    fn test_timestamp_conversion() {
        let record = HostEventRecord::new("node0", "clFinish").with_timing(1_500_000_000, 10);
        let ts = record.timestamp();
        assert_eq!(ts.timestamp(), 1);
        assert_eq!(ts.timestamp_subsec_nanos(), 500_000_000);
    }

    #[test]
    fn test_device_record_flattened_json() {
        let record = DeviceEventRecord::new(
            HostEventRecord::new("node0", "kernel").with_backend(Backend::Ze),
            3,
            1,
        )
        .with_metadata("SIMD32");

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["hostname"], "node0");
        assert_eq!(json["backend_id"], 1);
        assert_eq!(json["did"], 3);
        assert_eq!(json["metadata"], "SIMD32");

        let back: DeviceEventRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }
}
