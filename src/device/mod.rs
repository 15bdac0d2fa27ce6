//! High-level device facade for the MAKCU controller.
//!
//! [`Device`] orchestrates enumeration, the connect handshake, command
//! dispatch, state caching, and background liveness supervision. Hot-path
//! operations (move, click, lock, wheel) are fire-and-forget and map every
//! failure to `false`; tracked operations (version, serial, catch) return
//! their typed result or a sentinel and never panic across the API
//! boundary.

pub mod info;

mod batch;
mod supervisor;

pub use batch::BatchBuilder;
pub use info::{
    mouse_button_to_string, string_to_mouse_button, ConnectionOptions, ConnectionStatus,
    DeviceInfo, LockTarget, MouseButton, MouseButtonStates,
};

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::commands::{self, CommandCache};
use crate::engine::CommandEngine;
use crate::error::{MakcuError, Result};
use crate::protocol::{HIGH_SPEED_BAUD_RATE, INITIAL_BAUD_RATE, TARGET_DESCRIPTIONS};
use crate::state::{ButtonCallback, ConnectionCallback, EventHooks, StateCache};
use crate::transport::{self, PortOpener, SerialChannel, SystemOpener};

use supervisor::{Supervisor, SupervisorCtx};

/// Timeout for the `km.version()` probe that gates connect success.
const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_millis(100);

/// Timeout for short tracked queries (serial get, catch, lock refresh).
const QUERY_TIMEOUT: Duration = Duration::from_millis(50);

/// Timeout for the validation probe after a runtime baud change.
const BAUD_VALIDATE_TIMEOUT: Duration = Duration::from_millis(1000);

/// Substring a live firmware must report for baud-change validation.
const FIRMWARE_TAG: &str = "km.MAKCU";

/// Pre-waits and timeouts for the post-handshake version retries; the
/// device can be briefly unstable right after the baud switch.
const VERSION_PRE_WAIT_MS: [u64; 3] = [10, 20, 20];
const VERSION_TIMEOUT_MS: [u64; 3] = [75, 150, 300];

struct DeviceInner {
    channel: Arc<SerialChannel>,
    engine: Arc<CommandEngine>,
    commands: CommandCache,
    state: Arc<StateCache>,
    hooks: Arc<EventHooks>,
    info: Mutex<Option<DeviceInfo>>,
    /// Supervisor handle, doubling as the connect/disconnect mutex.
    lifecycle: Mutex<Option<Supervisor>>,
}

/// Handle to one MAKCU device.
///
/// Cloning is cheap and clones share all state; the device disconnects
/// when the last clone is dropped.
#[derive(Clone)]
pub struct Device {
    inner: Arc<DeviceInner>,
}

impl Default for Device {
    fn default() -> Self {
        Self::new()
    }
}

impl Device {
    /// Device using the operating system's serial stack.
    #[must_use]
    pub fn new() -> Self {
        Self::with_opener(Arc::new(SystemOpener))
    }

    /// Device over a custom transport, e.g. a mock endpoint in tests.
    #[must_use]
    pub fn with_opener(opener: Arc<dyn PortOpener>) -> Self {
        let state = Arc::new(StateCache::new());
        let hooks = Arc::new(EventHooks::new());
        let channel = Arc::new(SerialChannel::new(opener));
        let engine = Arc::new(CommandEngine::new(
            channel.clone(),
            state.clone(),
            hooks.clone(),
        ));
        Self {
            inner: Arc::new(DeviceInner {
                channel,
                engine,
                commands: CommandCache::new(),
                state,
                hooks,
                info: Mutex::new(None),
                lifecycle: Mutex::new(None),
            }),
        }
    }

    /// All MAKCU devices currently enumerable on this host.
    #[must_use]
    pub fn find_devices() -> Vec<DeviceInfo> {
        transport::find_devices()
    }

    /// Port path of the first enumerable MAKCU device.
    #[must_use]
    pub fn find_first_device() -> Option<String> {
        transport::find_first_device()
    }

    // === Connection ===

    /// Connect to `port`, or to the first enumerated device when `None`.
    ///
    /// Returns true on success. Connecting while already connected is a
    /// no-op that returns true without re-running the handshake. Detailed
    /// failure kinds are available through [`Device::try_connect`].
    pub fn connect(&self, port: Option<&str>) -> bool {
        self.try_connect(port).is_ok()
    }

    /// Connect, reporting the failure kind on error.
    ///
    /// The sequence is: open at 115200, switch to 4,000,000 baud via the
    /// binary handshake, start the listener, enable button monitoring,
    /// and probe with `km.version()`. Any failure undoes all partial
    /// state, closes the channel, and leaves the status at `Error`.
    pub fn try_connect(&self, port: Option<&str>) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        if self.inner.state.connected() {
            debug!("already connected");
            return Ok(());
        }
        self.inner.state.set_status(ConnectionStatus::Connecting);

        let result = self.connect_locked(port, &mut lifecycle);
        if let Err(ref e) = result {
            warn!(error = %e, "connect failed");
            self.inner.engine.stop_listener();
            self.inner.engine.fail_all_disconnected();
            self.inner.channel.close();
            self.inner.state.begin_disconnect();
            self.inner.state.teardown();
            self.inner.state.set_status(ConnectionStatus::Error);
        }
        drop(lifecycle);
        if result.is_ok() {
            self.inner.hooks.fire_connection(true);
        }
        result
    }

    fn connect_locked(
        &self,
        port: Option<&str>,
        supervisor: &mut Option<Supervisor>,
    ) -> Result<()> {
        let mut info = match port {
            Some(path) => DeviceInfo::new(path, TARGET_DESCRIPTIONS[0]),
            None => transport::find_devices()
                .into_iter()
                .next()
                .ok_or(MakcuError::NoDevicesFound)?,
        };

        debug!(port = %info.port, "connecting");
        self.inner.channel.open(&info.port, INITIAL_BAUD_RATE)?;
        self.inner.channel.switch_baud(HIGH_SPEED_BAUD_RATE)?;
        self.inner.engine.start_listener()?;

        // An error line in reply, if any, is ignored; monitoring is
        // confirmed by the first event byte.
        if !self.inner.engine.send(commands::MONITOR_ON) {
            return Err(MakcuError::Disconnected);
        }
        let version = self
            .inner
            .engine
            .send_tracked(commands::VERSION, true, CONNECT_PROBE_TIMEOUT)
            .wait()?;
        trace!(%version, "device probe answered");

        info.is_connected = true;
        *self.inner.info.lock() = Some(info);
        self.inner.state.set_status(ConnectionStatus::Connected);
        self.inner.state.set_monitoring(true);
        self.inner.state.publish_connected();
        *supervisor = Some(Supervisor::spawn(SupervisorCtx {
            channel: self.inner.channel.clone(),
            engine: self.inner.engine.clone(),
            state: self.inner.state.clone(),
            hooks: self.inner.hooks.clone(),
        })?);

        debug!(port = %self.inner.channel.port_name(), "device connected");
        Ok(())
    }

    /// Connect with bounded retries and exponential backoff.
    pub fn connect_with_retry(&self, port: Option<&str>, opts: &ConnectionOptions) -> Result<()> {
        let max_retries = opts.max_retries.max(1);
        let mut delay = opts.retry_delay;

        for attempt in 1..=max_retries {
            debug!(attempt, max_retries, "opening MAKCU device");
            match self.try_connect(port) {
                Ok(()) => {
                    debug!(attempt, "device connected successfully");
                    return Ok(());
                }
                Err(err) if err.is_connection_error() && attempt < max_retries => {
                    warn!(
                        attempt,
                        max_retries,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "connection failed, retrying"
                    );
                    std::thread::sleep(delay);
                    let next_delay_secs =
                        (delay.as_secs_f32() * opts.backoff_factor).min(opts.max_delay.as_secs_f32());
                    delay = Duration::from_secs_f32(next_delay_secs);
                }
                Err(err) => return Err(err),
            }
        }

        unreachable!("retry loop guarantees a return before exhaustion");
    }

    /// Tear the connection down. Idempotent; the connection callback
    /// fires at most once per connected→disconnected edge.
    pub fn disconnect(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        let won = self.teardown_locked(&mut lifecycle);
        drop(lifecycle);
        if won {
            debug!("device disconnected");
            self.inner.hooks.fire_connection(false);
        }
    }

    fn teardown_locked(&self, supervisor: &mut Option<Supervisor>) -> bool {
        // Claim the edge before joining the supervisor. A racing
        // supervisor that loses this claim breaks out of its poll loop
        // without firing the connection callback, so it can never block
        // on the lifecycle lock this caller still holds while the join
        // below waits for it. Losing the claim here means the winner is
        // already completing the same teardown.
        if !self.inner.state.begin_disconnect() {
            return false;
        }
        if let Some(sup) = supervisor.take() {
            sup.stop();
        }
        self.inner.engine.stop_listener();
        self.inner.engine.fail_all_disconnected();
        self.inner.state.teardown();
        self.inner.channel.close();
        if let Some(info) = self.inner.info.lock().as_mut() {
            info.is_connected = false;
        }
        true
    }

    /// Whether the device is live (channel open, listener running).
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner.state.connected()
    }

    #[must_use]
    pub fn status(&self) -> ConnectionStatus {
        self.inner.state.status()
    }

    /// Identity of the connected (or last connected) device, with the
    /// connection flag snapshotted at call time.
    #[must_use]
    pub fn device_info(&self) -> Option<DeviceInfo> {
        self.inner.info.lock().clone().map(|mut info| {
            info.is_connected = self.inner.state.connected();
            info
        })
    }

    // === Buttons ===

    /// Press a button. Fire-and-forget; false when disconnected or for
    /// an out-of-range button.
    pub fn mouse_down(&self, button: MouseButton) -> bool {
        self.button_command(button, true)
    }

    /// Release a button.
    pub fn mouse_up(&self, button: MouseButton) -> bool {
        self.button_command(button, false)
    }

    fn button_command(&self, button: MouseButton, press: bool) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        match self.inner.commands.button(button, press) {
            Some(cmd) => self.inner.engine.send(cmd),
            None => false,
        }
    }

    /// Press and release. No inter-command delay; the device sequences
    /// the two frames itself.
    pub fn click(&self, button: MouseButton) -> bool {
        self.mouse_down(button) && self.mouse_up(button)
    }

    /// Click each button in order with `delay` between clicks.
    pub fn click_sequence(&self, buttons: &[MouseButton], delay: Duration) -> bool {
        for (i, button) in buttons.iter().enumerate() {
            if !self.click(*button) {
                return false;
            }
            if i + 1 < buttons.len() {
                std::thread::sleep(delay);
            }
        }
        true
    }

    // === Movement ===

    /// Relative move. Coordinates are validated to the signed 16-bit
    /// range before anything reaches the wire.
    pub fn mouse_move(&self, x: i32, y: i32) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        match self.inner.commands.format_move(x, y) {
            Ok(cmd) => self.inner.engine.send(&cmd),
            Err(_) => false,
        }
    }

    /// Relative move interpolated over `segments` steps on the device.
    pub fn mouse_move_smooth(&self, x: i32, y: i32, segments: u32) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        match self.inner.commands.format_move_smooth(x, y, segments) {
            Ok(cmd) => self.inner.engine.send(&cmd),
            Err(_) => false,
        }
    }

    /// Relative move along a quadratic bezier through the control point.
    pub fn mouse_move_bezier(&self, x: i32, y: i32, segments: u32, ctrl_x: i32, ctrl_y: i32) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        match self
            .inner
            .commands
            .format_move_bezier(x, y, segments, ctrl_x, ctrl_y)
        {
            Ok(cmd) => self.inner.engine.send(&cmd),
            Err(_) => false,
        }
    }

    /// Press, move, release.
    pub fn mouse_drag(&self, button: MouseButton, x: i32, y: i32) -> bool {
        if commands::check_coordinate(x).is_err() || commands::check_coordinate(y).is_err() {
            return false;
        }
        self.mouse_down(button) && self.mouse_move(x, y) && self.mouse_up(button)
    }

    /// Press, smooth-move, release.
    pub fn mouse_drag_smooth(&self, button: MouseButton, x: i32, y: i32, segments: u32) -> bool {
        if commands::check_coordinate(x).is_err()
            || commands::check_coordinate(y).is_err()
            || commands::check_segments(segments).is_err()
        {
            return false;
        }
        self.mouse_down(button) && self.mouse_move_smooth(x, y, segments) && self.mouse_up(button)
    }

    /// Press, bezier-move, release.
    pub fn mouse_drag_bezier(
        &self,
        button: MouseButton,
        x: i32,
        y: i32,
        segments: u32,
        ctrl_x: i32,
        ctrl_y: i32,
    ) -> bool {
        if commands::check_coordinate(x).is_err()
            || commands::check_coordinate(y).is_err()
            || commands::check_segments(segments).is_err()
            || commands::check_coordinate(ctrl_x).is_err()
            || commands::check_coordinate(ctrl_y).is_err()
        {
            return false;
        }
        self.mouse_down(button)
            && self.mouse_move_bezier(x, y, segments, ctrl_x, ctrl_y)
            && self.mouse_up(button)
    }

    /// Move through each point in order, smoothly or directly.
    pub fn move_pattern(&self, points: &[(i32, i32)], smooth: bool, segments: u32) -> bool {
        for &(x, y) in points {
            let ok = if smooth {
                self.mouse_move_smooth(x, y, segments)
            } else {
                self.mouse_move(x, y)
            };
            if !ok {
                return false;
            }
        }
        true
    }

    /// Scroll the wheel by `delta` notches.
    pub fn mouse_wheel(&self, delta: i32) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        match self.inner.commands.format_wheel(delta) {
            Ok(cmd) => self.inner.engine.send(&cmd),
            Err(_) => false,
        }
    }

    // === Locking ===

    /// Engage or release a lock. On success the lock-state cache is
    /// updated; on failure the previous cached value is preserved.
    pub fn set_lock(&self, target: LockTarget, engage: bool) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        let ok = self.inner.engine.send(self.inner.commands.lock(target, engage));
        if ok {
            self.inner.state.set_lock(target, engage);
        }
        ok
    }

    pub fn lock_mouse_x(&self, lock: bool) -> bool {
        self.set_lock(LockTarget::X, lock)
    }

    pub fn lock_mouse_y(&self, lock: bool) -> bool {
        self.set_lock(LockTarget::Y, lock)
    }

    pub fn lock_mouse_left(&self, lock: bool) -> bool {
        self.set_lock(LockTarget::Left, lock)
    }

    pub fn lock_mouse_right(&self, lock: bool) -> bool {
        self.set_lock(LockTarget::Right, lock)
    }

    pub fn lock_mouse_middle(&self, lock: bool) -> bool {
        self.set_lock(LockTarget::Middle, lock)
    }

    pub fn lock_mouse_side1(&self, lock: bool) -> bool {
        self.set_lock(LockTarget::Side1, lock)
    }

    pub fn lock_mouse_side2(&self, lock: bool) -> bool {
        self.set_lock(LockTarget::Side2, lock)
    }

    /// Cached lock state. Reads as unlocked while the cache is invalid
    /// (a fresh connection boots unlocked).
    #[must_use]
    pub fn lock_state(&self, target: LockTarget) -> bool {
        self.inner.state.lock_engaged(target)
    }

    #[must_use]
    pub fn is_mouse_x_locked(&self) -> bool {
        self.lock_state(LockTarget::X)
    }

    #[must_use]
    pub fn is_mouse_y_locked(&self) -> bool {
        self.lock_state(LockTarget::Y)
    }

    #[must_use]
    pub fn is_mouse_left_locked(&self) -> bool {
        self.lock_state(LockTarget::Left)
    }

    #[must_use]
    pub fn is_mouse_right_locked(&self) -> bool {
        self.lock_state(LockTarget::Right)
    }

    #[must_use]
    pub fn is_mouse_middle_locked(&self) -> bool {
        self.lock_state(LockTarget::Middle)
    }

    #[must_use]
    pub fn is_mouse_side1_locked(&self) -> bool {
        self.lock_state(LockTarget::Side1)
    }

    #[must_use]
    pub fn is_mouse_side2_locked(&self) -> bool {
        self.lock_state(LockTarget::Side2)
    }

    /// All seven cached lock states, in [`LockTarget::ALL`] order.
    #[must_use]
    pub fn lock_states(&self) -> [(LockTarget, bool); 7] {
        LockTarget::ALL.map(|target| (target, self.lock_state(target)))
    }

    /// Query one lock state from the device and repair the cache.
    pub fn refresh_lock_state(&self, target: LockTarget) -> Result<bool> {
        if !self.inner.state.connected() {
            return Err(MakcuError::Disconnected);
        }
        let response = self
            .inner
            .engine
            .send_tracked(self.inner.commands.lock_query(target), true, QUERY_TIMEOUT)
            .wait()?;
        match response.trim() {
            "0" => {
                self.inner.state.set_lock(target, false);
                Ok(false)
            }
            "1" => {
                self.inner.state.set_lock(target, true);
                Ok(true)
            }
            _ => Err(MakcuError::Protocol { response }),
        }
    }

    // === Input catching ===

    /// Read and reset a button's catch counter. Returns 0 on any failure.
    pub fn catch_button(&self, button: MouseButton) -> u8 {
        if !self.inner.state.connected() {
            return 0;
        }
        let Some(cmd) = self.inner.commands.catch(button) else {
            return 0;
        };
        match self.inner.engine.send_tracked(cmd, true, QUERY_TIMEOUT).wait() {
            Ok(response) => response.trim().parse().unwrap_or(0),
            Err(_) => 0,
        }
    }

    pub fn catch_mouse_left(&self) -> u8 {
        self.catch_button(MouseButton::Left)
    }

    pub fn catch_mouse_right(&self) -> u8 {
        self.catch_button(MouseButton::Right)
    }

    pub fn catch_mouse_middle(&self) -> u8 {
        self.catch_button(MouseButton::Middle)
    }

    pub fn catch_mouse_side1(&self) -> u8 {
        self.catch_button(MouseButton::Side1)
    }

    pub fn catch_mouse_side2(&self) -> u8 {
        self.catch_button(MouseButton::Side2)
    }

    // === Monitoring & cached button state ===

    /// Enable or disable the device's button event stream.
    pub fn enable_button_monitoring(&self, enable: bool) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        let ok = self.inner.engine.send(self.inner.commands.monitor(enable));
        if ok {
            self.inner.state.set_monitoring(enable);
        }
        ok
    }

    #[must_use]
    pub fn is_button_monitoring_enabled(&self) -> bool {
        self.inner.state.monitoring()
    }

    /// Raw cached button mask; bit *i* is set iff button *i* is pressed.
    #[must_use]
    pub fn button_mask(&self) -> u8 {
        self.inner.state.button_mask()
    }

    /// Cached physical state of one button.
    #[must_use]
    pub fn button_state(&self, button: MouseButton) -> bool {
        self.inner.state.is_button_pressed(button)
    }

    /// Snapshot of all five cached button states.
    #[must_use]
    pub fn button_states(&self) -> MouseButtonStates {
        MouseButtonStates::from_mask(self.inner.state.button_mask())
    }

    // === Version & serial ===

    /// Firmware version string, empty if the device never answers.
    ///
    /// Retries up to three times with growing timeouts and short
    /// pre-waits: the device may be briefly unstable right after the
    /// baud-rate switch.
    pub fn version(&self) -> String {
        if !self.inner.state.connected() {
            return String::new();
        }
        for (pre_wait, timeout) in VERSION_PRE_WAIT_MS.iter().zip(VERSION_TIMEOUT_MS) {
            std::thread::sleep(Duration::from_millis(*pre_wait));
            match self
                .inner
                .engine
                .send_tracked(commands::VERSION, true, Duration::from_millis(timeout))
                .wait()
            {
                Ok(version) if !version.is_empty() => return version,
                Ok(_) => {}
                Err(e) => trace!(error = %e, "version probe attempt failed"),
            }
        }
        String::new()
    }

    /// Spoofed serial currently reported by the device, empty on failure.
    pub fn mouse_serial(&self) -> String {
        if !self.inner.state.connected() {
            return String::new();
        }
        self.inner
            .engine
            .send_tracked(commands::SERIAL_GET, true, QUERY_TIMEOUT)
            .wait()
            .unwrap_or_default()
    }

    /// Spoof the serial the device reports over USB.
    pub fn set_mouse_serial(&self, serial: &str) -> bool {
        if !self.inner.state.connected() {
            return false;
        }
        let cmd = self.inner.commands.format_serial_set(serial);
        self.inner.engine.send(&cmd)
    }

    /// Restore the device's factory serial.
    pub fn reset_mouse_serial(&self) -> bool {
        self.inner.state.connected() && self.inner.engine.send(commands::SERIAL_RESET)
    }

    // === Baud control ===

    /// Change the link speed at runtime; clamped to
    /// [115200, 4,000,000]. Not persistent across device power cycles.
    ///
    /// With `validate`, the firmware must answer a version probe at the
    /// new rate; on validation failure the link is re-negotiated back to
    /// 115200, and if that also fails the device is disconnected.
    pub fn set_baud_rate(&self, baud: u32, validate: bool) -> bool {
        self.try_set_baud_rate(baud, validate).is_ok()
    }

    /// [`Device::set_baud_rate`] with failure kinds.
    pub fn try_set_baud_rate(&self, baud: u32, validate: bool) -> Result<()> {
        let mut lifecycle = self.inner.lifecycle.lock();
        if !self.inner.state.connected() {
            return Err(MakcuError::Disconnected);
        }
        let target = baud.clamp(INITIAL_BAUD_RATE, HIGH_SPEED_BAUD_RATE);
        debug!(target, validate, "changing baud rate");

        let mut lost = false;
        let result = self.switch_baud_locked(target, validate, &mut lost);
        let fired = if lost {
            self.teardown_locked(&mut lifecycle)
        } else {
            false
        };
        drop(lifecycle);
        if fired {
            self.inner.hooks.fire_connection(false);
        }
        result
    }

    fn switch_baud_locked(&self, target: u32, validate: bool, lost: &mut bool) -> Result<()> {
        self.inner.engine.stop_listener();
        if let Err(e) = self.inner.channel.switch_baud(target) {
            *lost = true;
            return Err(e);
        }
        if let Err(e) = self.inner.engine.start_listener() {
            *lost = true;
            return Err(e);
        }
        if !validate {
            return Ok(());
        }

        let outcome = self
            .inner
            .engine
            .send_tracked(commands::VERSION, true, BAUD_VALIDATE_TIMEOUT)
            .wait();
        match outcome {
            Ok(ref version) if version.contains(FIRMWARE_TAG) => Ok(()),
            outcome => {
                warn!(target, "baud-rate validation failed, recovering to 115200");
                self.inner.engine.stop_listener();
                let recovered = self.inner.channel.switch_baud(INITIAL_BAUD_RATE).is_ok()
                    && self.inner.engine.start_listener().is_ok();
                if !recovered {
                    *lost = true;
                }
                Err(match outcome {
                    Ok(response) => MakcuError::Protocol { response },
                    Err(e) => e,
                })
            }
        }
    }

    // === Raw escape hatch ===

    /// Emit an arbitrary command, fire-and-forget.
    pub fn send_raw(&self, command: &str) -> bool {
        self.inner.state.connected() && self.inner.engine.send(command)
    }

    /// Emit an arbitrary command and wait for its response line.
    pub fn query_raw(&self, command: &str, timeout: Duration) -> Result<String> {
        if !self.inner.state.connected() {
            return Err(MakcuError::Disconnected);
        }
        self.inner.engine.send_tracked(command, true, timeout).wait()
    }

    // === Performance mode ===

    pub fn enable_high_performance_mode(&self, enable: bool) {
        self.inner.state.set_high_performance(enable);
    }

    #[must_use]
    pub fn is_high_performance_mode_enabled(&self) -> bool {
        self.inner.state.high_performance()
    }

    // === Batching ===

    /// Start accumulating a command batch.
    #[must_use]
    pub fn create_batch(&self) -> BatchBuilder<'_> {
        BatchBuilder::new(self)
    }

    // === Callbacks ===

    /// Install or clear the per-edge button callback. The callback may
    /// re-enter the device API.
    pub fn set_button_callback<F>(&self, callback: Option<F>)
    where
        F: Fn(MouseButton, bool) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .set_button_callback(callback.map(|f| Arc::new(f) as ButtonCallback));
    }

    /// Install or clear the connection-edge callback.
    pub fn set_connection_callback<F>(&self, callback: Option<F>)
    where
        F: Fn(bool) + Send + Sync + 'static,
    {
        self.inner
            .hooks
            .set_connection_callback(callback.map(|f| Arc::new(f) as ConnectionCallback));
    }
}

impl Drop for DeviceInner {
    fn drop(&mut self) {
        // Last handle gone: silent teardown, no user callbacks.
        if let Some(sup) = self.lifecycle.get_mut().take() {
            sup.stop();
        }
        self.state.begin_disconnect();
        self.engine.stop_listener();
        self.engine.fail_all_disconnected();
        self.channel.close();
    }
}
