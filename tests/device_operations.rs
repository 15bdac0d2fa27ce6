//! Facade-level wire scenarios against the scripted endpoint.

mod common;

use std::time::Duration;

use common::{connected_device, scripted_endpoint, written_after};
use makcu::transport::mock::MockEndpoint;
use makcu::{ConnectionStatus, Device, LockTarget, MouseButton};

#[test]
fn test_connect_handshake_wire_sequence() {
    let endpoint = MockEndpoint::new();
    endpoint.respond_with(|cmd| (cmd == "km.version()").then(|| "3.2".to_string()));
    let device = Device::with_opener(endpoint.opener());

    assert!(device.connect(Some("P")));

    // Two opens: 115200 for the handshake, 4,000,000 afterwards.
    let opens = endpoint.opens();
    assert_eq!(opens.len(), 2);
    assert_eq!(opens[0].path, "P");
    assert_eq!(opens[0].baud, 115_200);
    assert_eq!(opens[1].path, "P");
    assert_eq!(opens[1].baud, 4_000_000);

    // The only bytes at 115200 are the 9-byte baud-change frame
    // (4,000,000 little-endian).
    assert_eq!(
        endpoint.written(0),
        [0xDE, 0xAD, 0x05, 0x00, 0xA5, 0x00, 0x09, 0x3D, 0x00]
    );

    // At high speed: monitoring on, then the version probe.
    assert_eq!(
        endpoint.written_string(1),
        "km.buttons(1)\r\nkm.version()\r\n"
    );

    assert!(device.is_connected());
    assert_eq!(device.status(), ConnectionStatus::Connected);
    assert!(device.is_button_monitoring_enabled());
    assert_eq!(device.version(), "3.2");
}

#[test]
fn test_device_info_snapshot() {
    let (_endpoint, device) = connected_device();
    let info = device.device_info().expect("info after connect");
    assert_eq!(info.port, "MOCK0");
    assert_eq!(info.vid, 0x1A86);
    assert_eq!(info.pid, 0x55D3);
    assert!(info.is_connected);

    device.disconnect();
    let info = device.device_info().expect("info survives disconnect");
    assert!(!info.is_connected);
}

#[test]
fn test_click_wire_bytes() {
    let (endpoint, device) = connected_device();
    let before = endpoint.written(1).len();

    assert!(device.click(MouseButton::Left));
    assert_eq!(
        written_after(&endpoint, 1, before),
        "km.left(1)\r\nkm.left(0)\r\n"
    );
}

#[test]
fn test_batch_order() {
    let (endpoint, device) = connected_device();
    let before = endpoint.written(1).len();

    let ok = device
        .create_batch()
        .move_rel(50, 0)
        .click(MouseButton::Left)
        .scroll(3)
        .execute();
    assert!(ok);
    assert_eq!(
        written_after(&endpoint, 1, before),
        "km.move(50,0)\r\nkm.left(1)\r\nkm.left(0)\r\nkm.wheel(3)\r\n"
    );
}

#[test]
fn test_batch_validation_poisons_whole_batch() {
    let (endpoint, device) = connected_device();
    let before = endpoint.written(1).len();

    let ok = device
        .create_batch()
        .move_rel(50, 0)
        .move_rel(40_000, 0)
        .click(MouseButton::Left)
        .execute();
    assert!(!ok);
    assert_eq!(written_after(&endpoint, 1, before), "");
}

#[test]
fn test_move_boundary_values() {
    let (endpoint, device) = connected_device();

    assert!(device.mouse_move(32_767, 0));
    assert!(device.mouse_move(-32_767, 32_767));

    let before = endpoint.written(1).len();
    assert!(!device.mouse_move(32_768, 0));
    assert!(!device.mouse_move(0, -32_768));
    assert!(!device.mouse_move_smooth(10, 10, 1_001));
    // Nothing reached the wire for the rejected calls.
    assert_eq!(endpoint.written(1).len(), before);
}

#[test]
fn test_drag_sequences() {
    let (endpoint, device) = connected_device();
    let before = endpoint.written(1).len();

    assert!(device.mouse_drag(MouseButton::Right, 10, -10));
    assert_eq!(
        written_after(&endpoint, 1, before),
        "km.right(1)\r\nkm.move(10,-10)\r\nkm.right(0)\r\n"
    );

    let before = endpoint.written(1).len();
    assert!(device.mouse_drag_smooth(MouseButton::Left, 5, 5, 10));
    assert_eq!(
        written_after(&endpoint, 1, before),
        "km.left(1)\r\nkm.move(5,5,10)\r\nkm.left(0)\r\n"
    );

    // Out-of-range coordinates emit nothing, not even the press.
    let before = endpoint.written(1).len();
    assert!(!device.mouse_drag(MouseButton::Left, 40_000, 0));
    assert_eq!(endpoint.written(1).len(), before);
}

#[test]
fn test_wheel_and_move_pattern() {
    let (endpoint, device) = connected_device();
    let before = endpoint.written(1).len();

    assert!(device.mouse_wheel(3));
    assert!(device.move_pattern(&[(1, 2), (3, 4)], false, 0));
    assert!(device.move_pattern(&[(5, 6)], true, 12));
    assert_eq!(
        written_after(&endpoint, 1, before),
        "km.wheel(3)\r\nkm.move(1,2)\r\nkm.move(3,4)\r\nkm.move(5,6,12)\r\n"
    );
}

#[test]
fn test_unknown_button_is_out_of_range() {
    let (_endpoint, device) = connected_device();
    assert!(!device.mouse_down(MouseButton::Unknown));
    assert!(!device.mouse_up(MouseButton::Unknown));
    assert!(!device.click(MouseButton::Unknown));
    assert_eq!(device.catch_button(MouseButton::Unknown), 0);
}

#[test]
fn test_operations_require_connection() {
    let device = Device::with_opener(scripted_endpoint().opener());
    assert!(!device.click(MouseButton::Left));
    assert!(!device.mouse_move(1, 1));
    assert!(!device.mouse_wheel(1));
    assert!(!device.lock_mouse_x(true));
    assert!(!device.set_mouse_serial("X"));
    assert_eq!(device.version(), "");
    assert_eq!(device.mouse_serial(), "");
    assert_eq!(device.catch_mouse_left(), 0);
    assert!(!device.create_batch().move_rel(1, 1).execute());
}

#[test]
fn test_connect_idempotent() {
    let (endpoint, device) = connected_device();
    assert_eq!(endpoint.session_count(), 2);

    // Connecting again must not re-run the handshake.
    assert!(device.connect(Some("MOCK0")));
    assert_eq!(endpoint.session_count(), 2);
}

#[test]
fn test_lock_commands_update_cache() {
    let (endpoint, device) = connected_device();

    // Fresh connection: cache invalid, reads as unlocked.
    assert!(!device.is_mouse_x_locked());
    assert!(!device.is_mouse_left_locked());

    assert!(device.lock_mouse_x(true));
    assert!(device.is_mouse_x_locked());
    assert!(!device.is_mouse_y_locked());

    assert!(device.lock_mouse_x(false));
    assert!(!device.is_mouse_x_locked());

    let before = endpoint.written(1).len();
    assert!(device.lock_mouse_side2(true));
    assert_eq!(written_after(&endpoint, 1, before), "km.lock_ms2(1)\r\n");
    assert!(device.is_mouse_side2_locked());

    let states = device.lock_states();
    assert_eq!(states[LockTarget::Side2.index()], (LockTarget::Side2, true));
    assert_eq!(states[LockTarget::X.index()], (LockTarget::X, false));
}

#[test]
fn test_failed_lock_send_preserves_cache() {
    let (endpoint, device) = connected_device();
    assert!(device.lock_mouse_y(true));
    assert!(device.is_mouse_y_locked());

    endpoint.fail_writes(true);
    assert!(!device.lock_mouse_y(false));
    // The failed command must not touch the cached value.
    assert!(device.is_mouse_y_locked());
}

#[test]
fn test_refresh_lock_state_repairs_cache() {
    let endpoint = MockEndpoint::new();
    endpoint.respond_with(|cmd| match cmd {
        "km.version()" => Some("3.2".to_string()),
        "km.lock_my()" => Some("1".to_string()),
        "km.lock_mx()" => Some("0".to_string()),
        _ => None,
    });
    let device = Device::with_opener(endpoint.opener());
    assert!(device.connect(Some("MOCK0")));

    assert!(device.refresh_lock_state(LockTarget::Y).unwrap());
    assert!(device.is_mouse_y_locked());
    assert!(!device.refresh_lock_state(LockTarget::X).unwrap());
    assert!(!device.is_mouse_x_locked());
}

#[test]
fn test_catch_parses_decimal_and_falls_back_to_zero() {
    let endpoint = MockEndpoint::new();
    endpoint.respond_with(|cmd| match cmd {
        "km.version()" => Some("3.2".to_string()),
        "km.catch_ml()" => Some("3".to_string()),
        "km.catch_mr()" => Some("not-a-number".to_string()),
        _ => None,
    });
    let device = Device::with_opener(endpoint.opener());
    assert!(device.connect(Some("MOCK0")));

    assert_eq!(device.catch_mouse_left(), 3);
    assert_eq!(device.catch_mouse_right(), 0);
    // No responder entry: times out after 50ms, yields 0.
    assert_eq!(device.catch_mouse_middle(), 0);
}

#[test]
fn test_serial_spoof_commands() {
    let endpoint = MockEndpoint::new();
    endpoint.respond_with(|cmd| match cmd {
        "km.version()" => Some("3.2".to_string()),
        "km.serial()" => Some("FAKE-123".to_string()),
        _ => None,
    });
    let device = Device::with_opener(endpoint.opener());
    assert!(device.connect(Some("MOCK0")));

    assert_eq!(device.mouse_serial(), "FAKE-123");

    let before = endpoint.written(1).len();
    assert!(device.set_mouse_serial("a'b\\c"));
    assert_eq!(
        written_after(&endpoint, 1, before),
        "km.serial('a\\'b\\\\c')\r\n"
    );

    let before = endpoint.written(1).len();
    assert!(device.reset_mouse_serial());
    assert_eq!(written_after(&endpoint, 1, before), "km.serial(0)\r\n");
}

#[test]
fn test_button_monitoring_toggle() {
    let (endpoint, device) = connected_device();
    assert!(device.is_button_monitoring_enabled());

    let before = endpoint.written(1).len();
    assert!(device.enable_button_monitoring(false));
    assert_eq!(written_after(&endpoint, 1, before), "km.buttons(0)\r\n");
    assert!(!device.is_button_monitoring_enabled());

    assert!(device.enable_button_monitoring(true));
    assert!(device.is_button_monitoring_enabled());
}

#[test]
fn test_high_performance_flag() {
    let (_endpoint, device) = connected_device();
    assert!(!device.is_high_performance_mode_enabled());
    device.enable_high_performance_mode(true);
    assert!(device.is_high_performance_mode_enabled());
    device.enable_high_performance_mode(false);
    assert!(!device.is_high_performance_mode_enabled());
}

#[test]
fn test_raw_escape_hatch() {
    let endpoint = MockEndpoint::new();
    endpoint.respond_with(|cmd| match cmd {
        "km.version()" => Some("3.2".to_string()),
        "km.lock_mx()" => Some("0".to_string()),
        _ => None,
    });
    let device = Device::with_opener(endpoint.opener());
    assert!(device.connect(Some("MOCK0")));

    assert!(device.send_raw("km.wheel(1)"));
    let response = device
        .query_raw("km.lock_mx()", Duration::from_millis(100))
        .unwrap();
    assert_eq!(response, "0");
}

#[test]
fn test_click_sequence() {
    let (endpoint, device) = connected_device();
    let before = endpoint.written(1).len();

    assert!(device.click_sequence(
        &[MouseButton::Left, MouseButton::Right],
        Duration::from_millis(1)
    ));
    assert_eq!(
        written_after(&endpoint, 1, before),
        "km.left(1)\r\nkm.left(0)\r\nkm.right(1)\r\nkm.right(0)\r\n"
    );
}
