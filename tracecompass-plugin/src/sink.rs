//! Event sink capability
//!
//! A sink is what the exported C callbacks forward into. The plugin ships a
//! single sink, [`NoopSink`], which observes nothing.

use crate::types::{DeviceEvent, HostEvent, SessionHandle};

/// Receiver for events dispatched by the host framework
///
/// Invocation timing, threading and reentrancy are decided by the host.
/// Implementations must not block.
pub trait TraceEventSink {
    /// Called for every host-side API event
    fn on_host_event(&self, session: SessionHandle, event: &HostEvent<'_>);

    /// Called for every device-side event
    fn on_device_event(&self, session: SessionHandle, event: &DeviceEvent<'_>);
}

/// Sink that ignores every event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopSink;

impl TraceEventSink for NoopSink {
    fn on_host_event(&self, _session: SessionHandle, _event: &HostEvent<'_>) {}

    fn on_device_event(&self, _session: SessionHandle, _event: &DeviceEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TraceStr;
    use std::ffi::CString;

    #[test]
    fn test_noop_sink_is_zero_sized() {
        assert_eq!(std::mem::size_of::<NoopSink>(), 0);
    }

    #[test]
    fn test_noop_sink_accepts_events() {
        let hostname = CString::new("x1000c0s0b0n0").unwrap();
        let name = CString::new("cuLaunchKernel").unwrap();
        let event = HostEvent {
            usr_data: std::ptr::null_mut(),
            hostname: TraceStr::from_c_str(&hostname),
            vpid: 1234,
            vtid: 1235,
            ts: 1_000,
            backend_id: 3,
            name: TraceStr::from_c_str(&name),
            dur: 50,
            err: false,
        };

        let sink = NoopSink;
        sink.on_host_event(SessionHandle::from_raw(std::ptr::null_mut()), &event);
        assert_eq!(sink, NoopSink);
    }
}
