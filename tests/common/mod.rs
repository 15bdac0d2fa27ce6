//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::time::{Duration, Instant};

use makcu::transport::mock::MockEndpoint;
use makcu::Device;

/// Firmware tag the baud-rate validation probe looks for.
pub const FIRMWARE_BANNER: &str = "km.MAKCU v3.2";

/// Endpoint that answers every `km.version()` with the firmware banner,
/// which is enough to pass the connect handshake.
pub fn scripted_endpoint() -> MockEndpoint {
    let endpoint = MockEndpoint::new();
    endpoint.respond_with(|cmd| (cmd == "km.version()").then(|| FIRMWARE_BANNER.to_string()));
    endpoint
}

/// A device connected through a scripted endpoint.
pub fn connected_device() -> (MockEndpoint, Device) {
    let endpoint = scripted_endpoint();
    let device = Device::with_opener(endpoint.opener());
    assert!(device.connect(Some("MOCK0")), "mock connect should succeed");
    (endpoint, device)
}

/// Poll `pred` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, pred: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if pred() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    pred()
}

/// Bytes the host wrote in session `index` after `skip` bytes of
/// already-inspected prefix.
pub fn written_after(endpoint: &MockEndpoint, index: usize, skip: usize) -> String {
    let bytes = endpoint.written(index);
    String::from_utf8_lossy(&bytes[skip.min(bytes.len())..]).into_owned()
}
