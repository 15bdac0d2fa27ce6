//! Shared atomic state and the user-callback event plane.
//!
//! Every field is an atomic written with release ordering and read with
//! acquire ordering; the `connected` flag is the publication point for
//! all connect-time state (see [`StateCache::publish_connected`]).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU16, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{trace, warn};

use crate::device::info::{ConnectionStatus, LockTarget, MouseButton};

/// Callback invoked for each button edge as `(button, pressed)`.
pub type ButtonCallback = Arc<dyn Fn(MouseButton, bool) + Send + Sync>;

/// Callback invoked once per connection edge with the new state.
pub type ConnectionCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Atomic caches of device-observable state.
pub(crate) struct StateCache {
    button_mask: AtomicU8,
    lock_bits: AtomicU16,
    lock_valid: AtomicBool,
    status: AtomicU8,
    connected: AtomicBool,
    monitoring: AtomicBool,
    high_performance: AtomicBool,
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            button_mask: AtomicU8::new(0),
            lock_bits: AtomicU16::new(0),
            lock_valid: AtomicBool::new(false),
            status: AtomicU8::new(ConnectionStatus::Disconnected as u8),
            connected: AtomicBool::new(false),
            monitoring: AtomicBool::new(false),
            high_performance: AtomicBool::new(false),
        }
    }

    // === Button mask ===

    /// Set or clear one button bit. The mask update happens before any
    /// callback observes the edge.
    pub fn set_button(&self, button: MouseButton, pressed: bool) {
        let Some(idx) = button.index() else { return };
        let bit = 1u8 << idx;
        if pressed {
            self.button_mask.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.button_mask.fetch_and(!bit, Ordering::AcqRel);
        }
    }

    pub fn button_mask(&self) -> u8 {
        self.button_mask.load(Ordering::Acquire)
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        match button.index() {
            Some(idx) => self.button_mask() & (1 << idx) != 0,
            None => false,
        }
    }

    pub fn clear_buttons(&self) {
        self.button_mask.store(0, Ordering::Release);
    }

    // === Lock cache ===

    /// Record a confirmed lock transition and mark the cache valid.
    pub fn set_lock(&self, target: LockTarget, engaged: bool) {
        let bit = 1u16 << target.index();
        if engaged {
            self.lock_bits.fetch_or(bit, Ordering::AcqRel);
        } else {
            self.lock_bits.fetch_and(!bit, Ordering::AcqRel);
        }
        self.lock_valid.store(true, Ordering::Release);
    }

    /// Cached lock state; reads as unlocked while the cache is invalid.
    pub fn lock_engaged(&self, target: LockTarget) -> bool {
        self.lock_valid.load(Ordering::Acquire)
            && self.lock_bits.load(Ordering::Acquire) & (1 << target.index()) != 0
    }

    pub fn locks_valid(&self) -> bool {
        self.lock_valid.load(Ordering::Acquire)
    }

    pub fn invalidate_locks(&self) {
        self.lock_valid.store(false, Ordering::Release);
        self.lock_bits.store(0, Ordering::Release);
    }

    // === Connection ===

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// Publication point: every piece of connect-time state must be
    /// stored before this release-store.
    pub fn publish_connected(&self) {
        self.connected.store(true, Ordering::Release);
    }

    /// Claim the connected→disconnected edge. Returns true for exactly
    /// one caller per edge.
    pub fn begin_disconnect(&self) -> bool {
        self.connected
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Demote every cache to its disconnected value.
    pub fn teardown(&self) {
        self.set_status(ConnectionStatus::Disconnected);
        self.clear_buttons();
        self.invalidate_locks();
        self.set_monitoring(false);
    }

    // === Flags ===

    pub fn monitoring(&self) -> bool {
        self.monitoring.load(Ordering::Acquire)
    }

    pub fn set_monitoring(&self, enabled: bool) {
        self.monitoring.store(enabled, Ordering::Release);
    }

    pub fn high_performance(&self) -> bool {
        self.high_performance.load(Ordering::Acquire)
    }

    pub fn set_high_performance(&self, enabled: bool) {
        self.high_performance.store(enabled, Ordering::Release);
    }
}

/// Registered user callbacks.
///
/// Callbacks are copied out under a short read lock and invoked outside
/// it, so a callback may re-enter the device API freely. Panics raised
/// inside user callbacks are swallowed.
pub(crate) struct EventHooks {
    button: RwLock<Option<ButtonCallback>>,
    connection: RwLock<Option<ConnectionCallback>>,
}

impl EventHooks {
    pub fn new() -> Self {
        Self {
            button: RwLock::new(None),
            connection: RwLock::new(None),
        }
    }

    pub fn set_button_callback(&self, callback: Option<ButtonCallback>) {
        *self.button.write() = callback;
    }

    pub fn set_connection_callback(&self, callback: Option<ConnectionCallback>) {
        *self.connection.write() = callback;
    }

    pub fn fire_button(&self, button: MouseButton, pressed: bool) {
        let cb = self.button.read().clone();
        if let Some(cb) = cb {
            trace!(%button, pressed, "button event");
            if catch_unwind(AssertUnwindSafe(|| cb(button, pressed))).is_err() {
                warn!(%button, "button callback panicked");
            }
        }
    }

    pub fn fire_connection(&self, connected: bool) {
        let cb = self.connection.read().clone();
        if let Some(cb) = cb {
            trace!(connected, "connection event");
            if catch_unwind(AssertUnwindSafe(|| cb(connected))).is_err() {
                warn!("connection callback panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_button_mask_bits() {
        let state = StateCache::new();
        state.set_button(MouseButton::Left, true);
        state.set_button(MouseButton::Side2, true);
        assert_eq!(state.button_mask(), 0b10001);
        assert!(state.is_button_pressed(MouseButton::Left));
        assert!(!state.is_button_pressed(MouseButton::Right));

        state.set_button(MouseButton::Left, false);
        assert_eq!(state.button_mask(), 0b10000);

        state.clear_buttons();
        assert_eq!(state.button_mask(), 0);
    }

    #[test]
    fn test_unknown_button_ignored() {
        let state = StateCache::new();
        state.set_button(MouseButton::Unknown, true);
        assert_eq!(state.button_mask(), 0);
        assert!(!state.is_button_pressed(MouseButton::Unknown));
    }

    #[test]
    fn test_lock_cache_validity() {
        let state = StateCache::new();
        // Invalid cache reads as unlocked, not unknown.
        assert!(!state.lock_engaged(LockTarget::X));
        assert!(!state.locks_valid());

        state.set_lock(LockTarget::X, true);
        assert!(state.locks_valid());
        assert!(state.lock_engaged(LockTarget::X));
        assert!(!state.lock_engaged(LockTarget::Y));

        state.set_lock(LockTarget::X, false);
        assert!(!state.lock_engaged(LockTarget::X));
        assert!(state.locks_valid());

        state.invalidate_locks();
        assert!(!state.locks_valid());
        assert!(!state.lock_engaged(LockTarget::X));
    }

    #[test]
    fn test_disconnect_edge_is_exactly_once() {
        let state = StateCache::new();
        assert!(!state.begin_disconnect());
        state.publish_connected();
        assert!(state.begin_disconnect());
        assert!(!state.begin_disconnect());
    }

    #[test]
    fn test_teardown_resets_caches() {
        let state = StateCache::new();
        state.set_status(ConnectionStatus::Connected);
        state.set_button(MouseButton::Left, true);
        state.set_lock(LockTarget::Y, true);
        state.set_monitoring(true);

        state.teardown();
        assert_eq!(state.status(), ConnectionStatus::Disconnected);
        assert_eq!(state.button_mask(), 0);
        assert!(!state.locks_valid());
        assert!(!state.monitoring());
    }

    #[test]
    fn test_callback_panic_is_swallowed() {
        let hooks = EventHooks::new();
        hooks.set_button_callback(Some(Arc::new(|_: MouseButton, _: bool| panic!("user bug"))));
        // Must not propagate.
        hooks.fire_button(MouseButton::Left, true);
    }

    #[test]
    fn test_callbacks_fire_with_arguments() {
        let hooks = EventHooks::new();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        hooks.set_button_callback(Some(Arc::new(move |button: MouseButton, pressed: bool| {
            assert_eq!(button, MouseButton::Middle);
            assert!(pressed);
            seen.fetch_add(1, Ordering::SeqCst);
        })));
        hooks.fire_button(MouseButton::Middle, true);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        hooks.set_button_callback(None);
        hooks.fire_button(MouseButton::Middle, false);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
