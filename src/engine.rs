//! Command emission, response correlation, and the listener loop.
//!
//! The engine owns the single reader thread. Each incoming byte is either
//! an out-of-band button event (value below 0x20, excluding CR/LF) or part
//! of a text line; complete lines are routed to the oldest pending command
//! that expects a response. The protocol carries no correlation IDs, so
//! enqueue order among expecting commands is the only legal pairing rule.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use bytes::BytesMut;
use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{trace, warn};

use crate::device::info::MouseButton;
use crate::error::{MakcuError, Result};
use crate::protocol::{self, BUTTON_MASK_BITS, CRLF};
use crate::state::{EventHooks, StateCache};
use crate::transport::{SerialChannel, SerialLink};

/// Upper bound on one listener read.
const READ_BUFFER_SIZE: usize = 512;

/// Slack past a command's own timeout before a waiting caller gives up
/// locally; the sweep normally resolves the slot well before this.
const WAIT_GRACE: Duration = Duration::from_secs(1);

/// A tracked command awaiting resolution.
struct PendingCommand {
    id: u64,
    command: String,
    expects_response: bool,
    enqueued: Instant,
    timeout: Duration,
    slot: Sender<Result<String>>,
}

/// Waitable handle on a tracked command's response slot.
///
/// The slot is resolved exactly once: with the routed response line, a
/// timeout, or a disconnect.
pub struct ResponseHandle {
    command: String,
    timeout: Duration,
    rx: Receiver<Result<String>>,
}

impl ResponseHandle {
    fn failed(command: &str, timeout: Duration, error: MakcuError) -> Self {
        let (tx, rx) = bounded(1);
        let _ = tx.send(Err(error));
        Self {
            command: command.to_string(),
            timeout,
            rx,
        }
    }

    /// Block until the command resolves.
    pub fn wait(self) -> Result<String> {
        match self.rx.recv_timeout(self.timeout + WAIT_GRACE) {
            Ok(result) => result,
            Err(_) => Err(MakcuError::Timeout {
                command: self.command,
            }),
        }
    }
}

/// Builds and emits command frames, and correlates responses.
pub(crate) struct CommandEngine {
    channel: Arc<SerialChannel>,
    state: Arc<StateCache>,
    hooks: Arc<EventHooks>,
    pending: Arc<Mutex<VecDeque<PendingCommand>>>,
    next_id: AtomicU64,
    write_buf: Mutex<Vec<u8>>,
    listener: Mutex<Option<ListenerHandle>>,
}

struct ListenerHandle {
    stop: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl ListenerHandle {
    fn is_current_thread(&self) -> bool {
        std::thread::current().id() == self.thread.thread().id()
    }
}

impl CommandEngine {
    pub fn new(channel: Arc<SerialChannel>, state: Arc<StateCache>, hooks: Arc<EventHooks>) -> Self {
        Self {
            channel,
            state,
            hooks,
            pending: Arc::new(Mutex::new(VecDeque::new())),
            next_id: AtomicU64::new(1),
            write_buf: Mutex::new(Vec::with_capacity(128)),
            listener: Mutex::new(None),
        }
    }

    /// Spawn the reader thread over a fresh clone of the channel handle.
    ///
    /// Must be called again after any destructive reopen: the previous
    /// clone would appear open but read nothing.
    pub fn start_listener(&self) -> Result<()> {
        self.stop_listener();
        let reader = self.channel.reader_handle()?;
        let stop = Arc::new(AtomicBool::new(false));
        let thread = std::thread::Builder::new()
            .name("makcu-listener".to_string())
            .spawn({
                let stop = stop.clone();
                let channel = self.channel.clone();
                let pending = self.pending.clone();
                let state = self.state.clone();
                let hooks = self.hooks.clone();
                move || listener_loop(reader, &stop, &channel, &pending, &state, &hooks)
            })?;
        *self.listener.lock() = Some(ListenerHandle { stop, thread });
        Ok(())
    }

    /// Stop and join the reader thread. The short read timeout bounds the
    /// join latency. When invoked from a button callback (listener
    /// context), the thread is detached instead of self-joined.
    pub fn stop_listener(&self) {
        if let Some(handle) = self.listener.lock().take() {
            handle.stop.store(true, Ordering::Release);
            if !handle.is_current_thread() {
                let _ = handle.thread.join();
            }
        }
    }

    /// Fire-and-forget send: frame the command with CR+LF and write it.
    /// Returns true iff the channel is open and the write succeeded.
    pub fn send(&self, command: &str) -> bool {
        if !self.channel.is_open() {
            return false;
        }
        match self.write_framed(command) {
            Ok(()) => true,
            Err(e) => {
                trace!(command, error = %e, "fire-and-forget write failed");
                false
            }
        }
    }

    /// Tracked send: enqueue a pending command, write the frame, return a
    /// waitable handle. A closed channel fails the handle immediately and
    /// enqueues nothing.
    pub fn send_tracked(
        &self,
        command: &str,
        expects_response: bool,
        timeout: Duration,
    ) -> ResponseHandle {
        if !self.channel.is_open() {
            return ResponseHandle::failed(command, timeout, MakcuError::Disconnected);
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(1);
        if expects_response {
            self.pending.lock().push_back(PendingCommand {
                id,
                command: command.to_string(),
                expects_response,
                enqueued: Instant::now(),
                timeout,
                slot: tx.clone(),
            });
        }

        match self.write_framed(command) {
            Ok(()) => {
                // Commands that expect nothing resolve on write success and
                // never absorb a response.
                if !expects_response {
                    let _ = tx.send(Ok(String::new()));
                }
            }
            Err(e) => {
                if expects_response {
                    self.pending.lock().retain(|p| p.id != id);
                }
                let _ = tx.send(Err(e));
            }
        }

        ResponseHandle {
            command: command.to_string(),
            timeout,
            rx,
        }
    }

    /// Resolve every outstanding tracked command with `Disconnected`.
    pub fn fail_all_disconnected(&self) {
        let drained: Vec<PendingCommand> = self.pending.lock().drain(..).collect();
        for cmd in drained {
            trace!(command = %cmd.command, "failing pending command on disconnect");
            let _ = cmd.slot.send(Err(MakcuError::Disconnected));
        }
    }

    fn write_framed(&self, command: &str) -> Result<()> {
        let mut buf = self.write_buf.lock();
        buf.clear();
        buf.extend_from_slice(command.as_bytes());
        buf.extend_from_slice(CRLF);
        self.channel.write(&buf)
    }
}

fn listener_loop(
    mut reader: Box<dyn SerialLink>,
    stop: &AtomicBool,
    channel: &SerialChannel,
    pending: &Mutex<VecDeque<PendingCommand>>,
    state: &StateCache,
    hooks: &EventHooks,
) {
    let mut buf = [0u8; READ_BUFFER_SIZE];
    let mut line = BytesMut::with_capacity(256);
    let mut prev_mask = 0u8;

    while !stop.load(Ordering::Acquire) {
        match reader.read(&mut buf) {
            Ok(0) => {}
            Ok(n) => {
                for &byte in &buf[..n] {
                    if protocol::is_button_event(byte) {
                        prev_mask = apply_button_byte(byte, prev_mask, state, hooks);
                    } else if protocol::is_line_terminator(byte) {
                        // Tolerates CR-only, LF-only, and CR+LF endings
                        // without producing empty lines.
                        if !line.is_empty() {
                            let text = protocol::trim_response(&line);
                            line.clear();
                            if !text.is_empty() {
                                route_line(pending, text);
                            }
                        }
                    } else {
                        line.extend_from_slice(&[byte]);
                    }
                }
            }
            Err(e) if is_benign_read_error(&e) => {}
            Err(e) => {
                warn!(error = %e, "listener read failed");
                channel.mark_lost();
                break;
            }
        }
        sweep_timeouts(pending);
    }
    trace!("listener loop exited");
}

fn is_benign_read_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// Fold one button event byte into the shared mask and fire per-edge
/// callbacks. The mask update precedes each callback.
fn apply_button_byte(byte: u8, prev_mask: u8, state: &StateCache, hooks: &EventHooks) -> u8 {
    let mask = byte & BUTTON_MASK_BITS;
    let changed = mask ^ prev_mask;
    for bit in 0..5usize {
        let flag = 1u8 << bit;
        if changed & flag != 0 {
            let pressed = mask & flag != 0;
            let button = MouseButton::from_index(bit);
            state.set_button(button, pressed);
            hooks.fire_button(button, pressed);
        }
    }
    mask
}

/// Deliver a complete response line to the oldest expecting command.
/// Lines with no expecting command are discarded.
fn route_line(pending: &Mutex<VecDeque<PendingCommand>>, line: String) {
    let resolved = {
        let mut queue = pending.lock();
        queue
            .iter()
            .position(|cmd| cmd.expects_response)
            .and_then(|idx| queue.remove(idx))
    };
    match resolved {
        Some(cmd) => {
            trace!(command = %cmd.command, response = %line, "response routed");
            let _ = cmd.slot.send(Ok(line));
        }
        None => trace!(%line, "discarding unsolicited response line"),
    }
}

/// Resolve expired commands with `Timeout`, preserving queue order for
/// the rest.
fn sweep_timeouts(pending: &Mutex<VecDeque<PendingCommand>>) {
    let mut queue = pending.lock();
    if queue.is_empty() {
        return;
    }
    let now = Instant::now();
    queue.retain(|cmd| {
        if now.duration_since(cmd.enqueued) > cmd.timeout {
            trace!(command = %cmd.command, "pending command timed out");
            let _ = cmd.slot.send(Err(MakcuError::Timeout {
                command: cmd.command.clone(),
            }));
            false
        } else {
            true
        }
    });
}
