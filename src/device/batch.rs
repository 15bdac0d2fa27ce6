//! Batch accumulation of pre-rendered commands.

use std::time::Duration;

use tracing::trace;

use super::{Device, MouseButton};
use crate::commands;

/// Accumulates pre-rendered command strings and fires them in order.
///
/// The builder borrows its [`Device`], so it cannot outlive it. A
/// validation failure while accumulating poisons the whole batch:
/// [`BatchBuilder::execute`] then returns false without emitting
/// anything.
///
/// # Example
///
/// ```rust,ignore
/// device.create_batch()
///     .move_rel(50, 0)
///     .click(MouseButton::Left)
///     .scroll(3)
///     .execute();
/// ```
pub struct BatchBuilder<'a> {
    device: &'a Device,
    commands: Vec<String>,
    poisoned: bool,
}

impl<'a> BatchBuilder<'a> {
    pub(super) fn new(device: &'a Device) -> Self {
        Self {
            device,
            commands: Vec::new(),
            poisoned: false,
        }
    }

    fn push_move(&mut self, x: i32, y: i32) {
        match self.device.inner.commands.format_move(x, y) {
            Ok(cmd) => self.commands.push(cmd.clone()),
            Err(_) => self.poisoned = true,
        }
    }

    /// Queue a relative move.
    #[must_use]
    pub fn move_rel(mut self, x: i32, y: i32) -> Self {
        self.push_move(x, y);
        self
    }

    /// Queue a smooth relative move.
    #[must_use]
    pub fn move_smooth(mut self, x: i32, y: i32, segments: u32) -> Self {
        match self.device.inner.commands.format_move_smooth(x, y, segments) {
            Ok(cmd) => self.commands.push(cmd.clone()),
            Err(_) => self.poisoned = true,
        }
        self
    }

    /// Queue a bezier relative move.
    #[must_use]
    pub fn move_bezier(mut self, x: i32, y: i32, segments: u32, ctrl_x: i32, ctrl_y: i32) -> Self {
        match self
            .device
            .inner
            .commands
            .format_move_bezier(x, y, segments, ctrl_x, ctrl_y)
        {
            Ok(cmd) => self.commands.push(cmd.clone()),
            Err(_) => self.poisoned = true,
        }
        self
    }

    fn push_button(&mut self, button: MouseButton, press: bool) {
        match self.device.inner.commands.button(button, press) {
            Some(cmd) => self.commands.push(cmd.to_string()),
            None => self.poisoned = true,
        }
    }

    /// Queue a press.
    #[must_use]
    pub fn press(mut self, button: MouseButton) -> Self {
        self.push_button(button, true);
        self
    }

    /// Queue a release.
    #[must_use]
    pub fn release(mut self, button: MouseButton) -> Self {
        self.push_button(button, false);
        self
    }

    /// Queue a press followed by a release.
    #[must_use]
    pub fn click(mut self, button: MouseButton) -> Self {
        self.push_button(button, true);
        self.push_button(button, false);
        self
    }

    /// Queue a wheel scroll.
    #[must_use]
    pub fn scroll(mut self, delta: i32) -> Self {
        match self.device.inner.commands.format_wheel(delta) {
            Ok(cmd) => self.commands.push(cmd.clone()),
            Err(_) => self.poisoned = true,
        }
        self
    }

    /// Queue press, move, release.
    #[must_use]
    pub fn drag(mut self, button: MouseButton, x: i32, y: i32) -> Self {
        if commands::check_coordinate(x).is_err() || commands::check_coordinate(y).is_err() {
            self.poisoned = true;
            return self;
        }
        self.push_button(button, true);
        self.push_move(x, y);
        self.push_button(button, false);
        self
    }

    /// Queue press, smooth move, release.
    #[must_use]
    pub fn drag_smooth(mut self, button: MouseButton, x: i32, y: i32, segments: u32) -> Self {
        match self.device.inner.commands.format_move_smooth(x, y, segments) {
            Ok(cmd) => {
                let rendered = cmd.clone();
                drop(cmd);
                self.push_button(button, true);
                self.commands.push(rendered);
                self.push_button(button, false);
            }
            Err(_) => self.poisoned = true,
        }
        self
    }

    /// Queue press, bezier move, release.
    #[must_use]
    pub fn drag_bezier(
        mut self,
        button: MouseButton,
        x: i32,
        y: i32,
        segments: u32,
        ctrl_x: i32,
        ctrl_y: i32,
    ) -> Self {
        match self
            .device
            .inner
            .commands
            .format_move_bezier(x, y, segments, ctrl_x, ctrl_y)
        {
            Ok(cmd) => {
                let rendered = cmd.clone();
                drop(cmd);
                self.push_button(button, true);
                self.commands.push(rendered);
                self.push_button(button, false);
            }
            Err(_) => self.poisoned = true,
        }
        self
    }

    /// Optional device-side pause between the surrounding commands.
    #[must_use]
    pub fn delay(mut self, duration: Duration) -> Self {
        self.commands
            .push(format!("km.delay({})", duration.as_millis()));
        self
    }

    /// Number of queued commands.
    #[must_use]
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Fire every queued command in order, stopping at the first send
    /// that fails. Returns true iff everything was emitted.
    pub fn execute(self) -> bool {
        if self.poisoned || !self.device.inner.state.connected() {
            return false;
        }
        trace!(count = self.commands.len(), "executing batch");
        for cmd in &self.commands {
            if !self.device.inner.engine.send(cmd) {
                return false;
            }
        }
        true
    }
}
