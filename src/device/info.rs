//! Device identity and protocol enums for the MAKCU controller.

use std::fmt;

use serde::Serialize;

use crate::protocol::{MAKCU_PID, MAKCU_VID};

/// Physical mouse buttons reported and controlled by the device.
///
/// The discriminant is the bit index in the button mask and the index
/// into the pre-computed command tables. `Unknown` exists only as the
/// string-parsing fallback and never maps to a command or mask bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
    Side1 = 3,
    Side2 = 4,
    Unknown = 255,
}

impl MouseButton {
    /// The five addressable buttons, in mask-bit order.
    pub const ALL: [Self; 5] = [Self::Left, Self::Right, Self::Middle, Self::Side1, Self::Side2];

    /// Mask-bit / command-table index, or `None` for `Unknown`.
    #[must_use]
    pub const fn index(self) -> Option<usize> {
        match self {
            Self::Left => Some(0),
            Self::Right => Some(1),
            Self::Middle => Some(2),
            Self::Side1 => Some(3),
            Self::Side2 => Some(4),
            Self::Unknown => None,
        }
    }

    /// Button for a mask-bit index.
    #[must_use]
    pub const fn from_index(index: usize) -> Self {
        match index {
            0 => Self::Left,
            1 => Self::Right,
            2 => Self::Middle,
            3 => Self::Side1,
            4 => Self::Side2,
            _ => Self::Unknown,
        }
    }

    /// Canonical upper-case name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Middle => "MIDDLE",
            Self::Side1 => "SIDE1",
            Self::Side2 => "SIDE2",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive inverse of [`MouseButton::as_str`]; anything
    /// unrecognized maps to `Unknown`.
    #[must_use]
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_uppercase().as_str() {
            "LEFT" => Self::Left,
            "RIGHT" => Self::Right,
            "MIDDLE" => Self::Middle,
            "SIDE1" => Self::Side1,
            "SIDE2" => Self::Side2,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Convert a button to its canonical name.
#[must_use]
pub fn mouse_button_to_string(button: MouseButton) -> &'static str {
    button.as_str()
}

/// Parse a button name, case-insensitively; unrecognized input yields
/// [`MouseButton::Unknown`].
#[must_use]
pub fn string_to_mouse_button(name: &str) -> MouseButton {
    MouseButton::parse(name)
}

/// Axes and buttons that can be masked off from the physical mouse while
/// still accepting software injection. The discriminant indexes the
/// lock-state bitmask and the lock command tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[repr(u8)]
pub enum LockTarget {
    X = 0,
    Y = 1,
    Left = 2,
    Right = 3,
    Middle = 4,
    Side1 = 5,
    Side2 = 6,
}

impl LockTarget {
    /// All seven lockable targets, in bitmask order.
    pub const ALL: [Self; 7] = [
        Self::X,
        Self::Y,
        Self::Left,
        Self::Right,
        Self::Middle,
        Self::Side1,
        Self::Side2,
    ];

    /// Bitmask / command-table index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Canonical name, matching the firmware's lock suffixes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::X => "X",
            Self::Y => "Y",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Middle => "MIDDLE",
            Self::Side1 => "SIDE1",
            Self::Side2 => "SIDE2",
        }
    }
}

impl fmt::Display for LockTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection lifecycle of a [`crate::device::Device`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ConnectionStatus {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Error = 3,
}

impl ConnectionStatus {
    pub(crate) const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Connecting,
            2 => Self::Connected,
            3 => Self::Error,
            _ => Self::Disconnected,
        }
    }
}

/// Information about an enumerated MAKCU device.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Platform port path (e.g. `COM3`, `/dev/ttyUSB0`)
    pub port: String,
    /// Human-readable bridge description
    pub description: String,
    /// USB vendor ID (always `0x1A86`)
    pub vid: u16,
    /// USB product ID (always `0x55D3`)
    pub pid: u16,
    /// Snapshot of the connection state at creation time
    pub is_connected: bool,
}

impl DeviceInfo {
    pub(crate) fn new(port: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            port: port.into(),
            description: description.into(),
            vid: MAKCU_VID,
            pid: MAKCU_PID,
            is_connected: false,
        }
    }
}

/// Snapshot of all five physical button states.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MouseButtonStates {
    pub left: bool,
    pub right: bool,
    pub middle: bool,
    pub side1: bool,
    pub side2: bool,
}

impl MouseButtonStates {
    /// Decode from the raw 5-bit device mask.
    #[must_use]
    pub const fn from_mask(mask: u8) -> Self {
        Self {
            left: mask & 0x01 != 0,
            right: mask & 0x02 != 0,
            middle: mask & 0x04 != 0,
            side1: mask & 0x08 != 0,
            side2: mask & 0x10 != 0,
        }
    }

    /// Encode back to the raw 5-bit mask.
    #[must_use]
    pub const fn to_mask(self) -> u8 {
        (self.left as u8)
            | ((self.right as u8) << 1)
            | ((self.middle as u8) << 2)
            | ((self.side1 as u8) << 3)
            | ((self.side2 as u8) << 4)
    }

    /// State of a single button; `Unknown` is never pressed.
    #[must_use]
    pub const fn get(self, button: MouseButton) -> bool {
        match button {
            MouseButton::Left => self.left,
            MouseButton::Right => self.right,
            MouseButton::Middle => self.middle,
            MouseButton::Side1 => self.side1,
            MouseButton::Side2 => self.side2,
            MouseButton::Unknown => false,
        }
    }
}

/// Connection retry options for [`crate::device::Device::connect_with_retry`].
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Maximum number of connection attempts (default: 3).
    pub max_retries: u32,
    /// Initial delay between retries (default: 250ms).
    pub retry_delay: std::time::Duration,
    /// Exponential backoff factor (default: 1.5).
    pub backoff_factor: f32,
    /// Maximum delay cap (default: 2000ms).
    pub max_delay: std::time::Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        use std::time::Duration;
        Self {
            max_retries: 3,
            retry_delay: Duration::from_millis(250),
            backoff_factor: 1.5,
            max_delay: Duration::from_millis(2000),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_roundtrip() {
        for button in MouseButton::ALL {
            assert_eq!(string_to_mouse_button(mouse_button_to_string(button)), button);
        }
    }

    #[test]
    fn test_button_parse_case_insensitive() {
        assert_eq!(string_to_mouse_button("left"), MouseButton::Left);
        assert_eq!(string_to_mouse_button("Side1"), MouseButton::Side1);
        assert_eq!(string_to_mouse_button(" MIDDLE "), MouseButton::Middle);
        assert_eq!(string_to_mouse_button("pinky"), MouseButton::Unknown);
        assert_eq!(string_to_mouse_button(""), MouseButton::Unknown);
    }

    #[test]
    fn test_button_indices_match_mask_bits() {
        assert_eq!(MouseButton::Left.index(), Some(0));
        assert_eq!(MouseButton::Side2.index(), Some(4));
        assert_eq!(MouseButton::Unknown.index(), None);
        for (i, button) in MouseButton::ALL.iter().enumerate() {
            assert_eq!(MouseButton::from_index(i), *button);
        }
    }

    #[test]
    fn test_button_states_mask_roundtrip() {
        let states = MouseButtonStates {
            left: true,
            right: false,
            middle: true,
            side1: false,
            side2: true,
        };
        assert_eq!(states.to_mask(), 0b10101);
        assert_eq!(MouseButtonStates::from_mask(0b10101), states);
        assert!(states.get(MouseButton::Left));
        assert!(!states.get(MouseButton::Right));
        assert!(!states.get(MouseButton::Unknown));
    }

    #[test]
    fn test_lock_target_indices() {
        assert_eq!(LockTarget::X.index(), 0);
        assert_eq!(LockTarget::Side2.index(), 6);
        for (i, target) in LockTarget::ALL.iter().enumerate() {
            assert_eq!(target.index(), i);
        }
    }
}
