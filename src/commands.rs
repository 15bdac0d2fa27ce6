//! Pre-computed command strings and dynamic command construction.
//!
//! Every fixed command the device understands is built once and indexed
//! by enum ordinal, so the hot path never allocates. Movement and wheel
//! commands carry caller arguments and are rendered into a lock-protected
//! reusable buffer after validation.

use std::fmt::Write as _;

use parking_lot::{Mutex, MutexGuard};

use crate::device::info::{LockTarget, MouseButton};
use crate::error::{MakcuError, Result};

/// Largest coordinate magnitude the wire format accepts (signed 16-bit).
pub const MAX_COORDINATE: i32 = 32_767;

/// Largest segment count accepted for smooth/bezier moves.
pub const MAX_SEGMENTS: u32 = 1_000;

/// Press commands indexed by `MouseButton` ordinal.
const PRESS: [&str; 5] = [
    "km.left(1)",
    "km.right(1)",
    "km.middle(1)",
    "km.ms1(1)",
    "km.ms2(1)",
];

/// Release commands indexed by `MouseButton` ordinal.
const RELEASE: [&str; 5] = [
    "km.left(0)",
    "km.right(0)",
    "km.middle(0)",
    "km.ms1(0)",
    "km.ms2(0)",
];

/// Lock-engage commands indexed by `LockTarget` ordinal.
const LOCK_SET: [&str; 7] = [
    "km.lock_mx(1)",
    "km.lock_my(1)",
    "km.lock_ml(1)",
    "km.lock_mr(1)",
    "km.lock_mm(1)",
    "km.lock_ms1(1)",
    "km.lock_ms2(1)",
];

/// Lock-release commands indexed by `LockTarget` ordinal.
const LOCK_CLEAR: [&str; 7] = [
    "km.lock_mx(0)",
    "km.lock_my(0)",
    "km.lock_ml(0)",
    "km.lock_mr(0)",
    "km.lock_mm(0)",
    "km.lock_ms1(0)",
    "km.lock_ms2(0)",
];

/// Lock-query commands indexed by `LockTarget` ordinal.
const LOCK_QUERY: [&str; 7] = [
    "km.lock_mx()",
    "km.lock_my()",
    "km.lock_ml()",
    "km.lock_mr()",
    "km.lock_mm()",
    "km.lock_ms1()",
    "km.lock_ms2()",
];

/// Input-catch commands indexed by `MouseButton` ordinal.
const CATCH: [&str; 5] = [
    "km.catch_ml()",
    "km.catch_mr()",
    "km.catch_mm()",
    "km.catch_ms1()",
    "km.catch_ms2()",
];

pub const VERSION: &str = "km.version()";
pub const SERIAL_GET: &str = "km.serial()";
pub const SERIAL_RESET: &str = "km.serial(0)";
pub const MONITOR_ON: &str = "km.buttons(1)";
pub const MONITOR_OFF: &str = "km.buttons(0)";

/// Immutable command tables plus a reusable buffer for dynamic commands.
pub(crate) struct CommandCache {
    scratch: Mutex<String>,
}

impl CommandCache {
    pub fn new() -> Self {
        Self {
            scratch: Mutex::new(String::with_capacity(64)),
        }
    }

    /// Press or release command for a button; `None` for `Unknown`.
    pub fn button(&self, button: MouseButton, press: bool) -> Option<&'static str> {
        let idx = button.index()?;
        Some(if press { PRESS[idx] } else { RELEASE[idx] })
    }

    /// Lock engage/release command for a target.
    pub fn lock(&self, target: LockTarget, engage: bool) -> &'static str {
        if engage {
            LOCK_SET[target.index()]
        } else {
            LOCK_CLEAR[target.index()]
        }
    }

    /// Lock state query command for a target.
    pub fn lock_query(&self, target: LockTarget) -> &'static str {
        LOCK_QUERY[target.index()]
    }

    /// Catch command for a button; `None` for `Unknown`.
    pub fn catch(&self, button: MouseButton) -> Option<&'static str> {
        Some(CATCH[button.index()?])
    }

    pub fn monitor(&self, enable: bool) -> &'static str {
        if enable {
            MONITOR_ON
        } else {
            MONITOR_OFF
        }
    }

    /// `km.move(x,y)` rendered into the shared scratch buffer.
    pub fn format_move(&self, x: i32, y: i32) -> Result<MutexGuard<'_, String>> {
        check_coordinate(x)?;
        check_coordinate(y)?;
        let mut buf = self.scratch.lock();
        buf.clear();
        let _ = write!(buf, "km.move({x},{y})");
        Ok(buf)
    }

    /// `km.move(x,y,segments)` rendered into the shared scratch buffer.
    pub fn format_move_smooth(&self, x: i32, y: i32, segments: u32) -> Result<MutexGuard<'_, String>> {
        check_coordinate(x)?;
        check_coordinate(y)?;
        check_segments(segments)?;
        let mut buf = self.scratch.lock();
        buf.clear();
        let _ = write!(buf, "km.move({x},{y},{segments})");
        Ok(buf)
    }

    /// `km.move(x,y,segments,ctrl_x,ctrl_y)` rendered into the shared
    /// scratch buffer.
    pub fn format_move_bezier(
        &self,
        x: i32,
        y: i32,
        segments: u32,
        ctrl_x: i32,
        ctrl_y: i32,
    ) -> Result<MutexGuard<'_, String>> {
        check_coordinate(x)?;
        check_coordinate(y)?;
        check_segments(segments)?;
        check_coordinate(ctrl_x)?;
        check_coordinate(ctrl_y)?;
        let mut buf = self.scratch.lock();
        buf.clear();
        let _ = write!(buf, "km.move({x},{y},{segments},{ctrl_x},{ctrl_y})");
        Ok(buf)
    }

    /// `km.wheel(delta)` rendered into the shared scratch buffer.
    pub fn format_wheel(&self, delta: i32) -> Result<MutexGuard<'_, String>> {
        check_delta(delta)?;
        let mut buf = self.scratch.lock();
        buf.clear();
        let _ = write!(buf, "km.wheel({delta})");
        Ok(buf)
    }

    /// `km.serial('<escaped>')` rendered into the shared scratch buffer.
    pub fn format_serial_set(&self, serial: &str) -> MutexGuard<'_, String> {
        let mut buf = self.scratch.lock();
        buf.clear();
        buf.push_str("km.serial('");
        escape_serial_into(serial, &mut buf);
        buf.push_str("')");
        buf
    }
}

pub(crate) fn check_coordinate(value: i32) -> Result<()> {
    if value.unsigned_abs() > MAX_COORDINATE as u32 {
        return Err(MakcuError::Validation {
            what: "coordinate",
            value: i64::from(value),
            limit: i64::from(MAX_COORDINATE),
        });
    }
    Ok(())
}

pub(crate) fn check_segments(segments: u32) -> Result<()> {
    if segments > MAX_SEGMENTS {
        return Err(MakcuError::Validation {
            what: "segment count",
            value: i64::from(segments),
            limit: i64::from(MAX_SEGMENTS),
        });
    }
    Ok(())
}

fn check_delta(delta: i32) -> Result<()> {
    if delta.unsigned_abs() > MAX_COORDINATE as u32 {
        return Err(MakcuError::Validation {
            what: "wheel delta",
            value: i64::from(delta),
            limit: i64::from(MAX_COORDINATE),
        });
    }
    Ok(())
}

/// Escape a serial-spoof argument for single-quoted transmission.
///
/// Backslash and apostrophe are backslash-escaped; control bytes become
/// `\n`, `\r`, `\t`, or `\xHH`.
fn escape_serial_into(raw: &str, out: &mut String) {
    for ch in raw.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\x{:02X}", c as u32);
            }
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_commands() {
        let cache = CommandCache::new();
        assert_eq!(cache.button(MouseButton::Left, true), Some("km.left(1)"));
        assert_eq!(cache.button(MouseButton::Left, false), Some("km.left(0)"));
        assert_eq!(cache.button(MouseButton::Side1, true), Some("km.ms1(1)"));
        assert_eq!(cache.button(MouseButton::Side2, false), Some("km.ms2(0)"));
        assert_eq!(cache.button(MouseButton::Unknown, true), None);
    }

    #[test]
    fn test_lock_commands() {
        let cache = CommandCache::new();
        assert_eq!(cache.lock(LockTarget::X, true), "km.lock_mx(1)");
        assert_eq!(cache.lock(LockTarget::Y, false), "km.lock_my(0)");
        assert_eq!(cache.lock(LockTarget::Left, true), "km.lock_ml(1)");
        assert_eq!(cache.lock_query(LockTarget::Side2), "km.lock_ms2()");
    }

    #[test]
    fn test_catch_commands() {
        let cache = CommandCache::new();
        assert_eq!(cache.catch(MouseButton::Left), Some("km.catch_ml()"));
        assert_eq!(cache.catch(MouseButton::Right), Some("km.catch_mr()"));
        assert_eq!(cache.catch(MouseButton::Middle), Some("km.catch_mm()"));
        assert_eq!(cache.catch(MouseButton::Unknown), None);
    }

    #[test]
    fn test_format_move() {
        let cache = CommandCache::new();
        assert_eq!(&*cache.format_move(50, 0).unwrap(), "km.move(50,0)");
        assert_eq!(&*cache.format_move(-120, 35).unwrap(), "km.move(-120,35)");
        assert_eq!(
            &*cache.format_move_smooth(10, -10, 20).unwrap(),
            "km.move(10,-10,20)"
        );
        assert_eq!(
            &*cache.format_move_bezier(10, 10, 20, 5, -5).unwrap(),
            "km.move(10,10,20,5,-5)"
        );
    }

    #[test]
    fn test_coordinate_boundaries() {
        let cache = CommandCache::new();
        assert!(cache.format_move(32_767, 0).is_ok());
        assert!(cache.format_move(-32_767, 0).is_ok());
        assert!(cache.format_move(32_768, 0).is_err());
        assert!(cache.format_move(0, -32_768).is_err());
        assert!(cache.format_move(i32::MIN, 0).is_err());
    }

    #[test]
    fn test_segment_boundaries() {
        let cache = CommandCache::new();
        assert!(cache.format_move_smooth(0, 0, 1_000).is_ok());
        let err = cache.format_move_smooth(0, 0, 1_001).unwrap_err();
        assert!(err.is_validation_error());
    }

    #[test]
    fn test_wheel_boundaries() {
        let cache = CommandCache::new();
        assert_eq!(&*cache.format_wheel(3).unwrap(), "km.wheel(3)");
        assert!(cache.format_wheel(-32_767).is_ok());
        assert!(cache.format_wheel(32_768).is_err());
    }

    #[test]
    fn test_serial_escaping() {
        let cache = CommandCache::new();
        assert_eq!(&*cache.format_serial_set("ABC123"), "km.serial('ABC123')");
        assert_eq!(&*cache.format_serial_set("a'b"), "km.serial('a\\'b')");
        assert_eq!(&*cache.format_serial_set("a\\b"), "km.serial('a\\\\b')");
        assert_eq!(
            &*cache.format_serial_set("a\nb\rc\td"),
            "km.serial('a\\nb\\rc\\td')"
        );
        assert_eq!(&*cache.format_serial_set("\x01"), "km.serial('\\x01')");
    }
}
