//! Candidate-port enumeration by USB identity.
//!
//! The platform abstraction is `serialport::available_ports`, which
//! queries the OS device API where one exists and falls back to scanning
//! the serial-device namespace (sysfs on Linux) otherwise.

use serialport::{SerialPortInfo, SerialPortType, UsbPortInfo};
use tracing::{debug, trace};

use crate::device::info::DeviceInfo;
use crate::protocol::{MAKCU_PID, MAKCU_VID, TARGET_DESCRIPTIONS};

/// Return all ports whose USB descriptor matches the MAKCU VID/PID,
/// sorted by port path for stable ordering across calls.
#[must_use]
pub fn find_devices() -> Vec<DeviceInfo> {
    let ports = serialport::available_ports().unwrap_or_default();
    let mut found = collect_matches(&ports);
    found.sort_by(|a, b| a.port.cmp(&b.port));
    debug!(count = found.len(), "MAKCU enumeration complete");
    found
}

/// Port path of the first enumerated MAKCU device, if any.
#[must_use]
pub fn find_first_device() -> Option<String> {
    find_devices().into_iter().next().map(|info| info.port)
}

fn collect_matches(ports: &[SerialPortInfo]) -> Vec<DeviceInfo> {
    ports
        .iter()
        .filter_map(|port| match &port.port_type {
            SerialPortType::UsbPort(usb) if is_makcu(usb) => {
                trace!(port = %port.port_name, "USB identity match");
                Some(DeviceInfo::new(&port.port_name, describe(usb)))
            }
            _ => None,
        })
        .collect()
}

fn is_makcu(usb: &UsbPortInfo) -> bool {
    usb.vid == MAKCU_VID && usb.pid == MAKCU_PID
}

fn describe(usb: &UsbPortInfo) -> String {
    usb.product
        .clone()
        .unwrap_or_else(|| TARGET_DESCRIPTIONS[0].to_string())
}
