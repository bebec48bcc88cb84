//! Trace-Compass Sink Plugin Library
//!
//! A plugin for a metababel/Babeltrace-style trace-processing host. It
//! registers a host-event callback and a device-event callback into the
//! host's session; both callbacks observe nothing.
//!
//! # Architecture
//!
//! - [`types`]: session handle, event views and owned event records
//! - [`sink`]: the [`TraceEventSink`] capability the C callbacks forward to
//! - [`ffi`]: the C ABI (callback signatures, exported entry points)
//! - [`registrar`]: [`register_callbacks`] over any [`CallbackRegistry`]
//! - [`dispatch`]: [`CallbackTable`], an in-process registry that can invoke
//!   what was registered
//!
//! The library does NOT:
//! - Parse traces
//! - Correlate or time events
//! - Format output
//!
//! All of that belongs to the host framework.
//!
//! # Example Usage
//!
//! ```
//! use tracecompass_plugin::{register_callbacks, CallbackTable, HostEventRecord};
//!
//! let table = CallbackTable::new();
//! let session = table.session();
//! register_callbacks(&table, session);
//!
//! let event = HostEventRecord::new("node0", "zeInit");
//! let invoked = table.dispatch_host(session, &event).unwrap();
//! assert_eq!(invoked, 1);
//! ```

// Public modules
pub mod dispatch;
pub mod ffi;
pub mod registrar;
pub mod sink;
pub mod types;

#[cfg(feature = "metababel")]
pub mod metababel;

// Re-export main types for convenience
pub use dispatch::{CallbackTable, Registration, RegistrationStats};
pub use ffi::{BtBool, DeviceUsrCallback, HostApi, HostUsrCallback};
pub use registrar::{register_callbacks, CallbackRegistry};
pub use sink::{NoopSink, TraceEventSink};
pub use types::{
    Backend, DeviceEvent, DeviceEventRecord, HostEvent, HostEventRecord, PluginError, Result,
    SessionHandle, Timestamp, TraceStr,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh table has nothing registered
        let table = CallbackTable::new();
        assert!(table.is_empty());
        assert_eq!(table.stats(), RegistrationStats::default());
    }
}
