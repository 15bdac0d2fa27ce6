//! Background liveness supervision for a connected device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{JoinHandle, ThreadId};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, warn};

use crate::engine::CommandEngine;
use crate::state::{EventHooks, StateCache};
use crate::transport::SerialChannel;

/// Poll interval after a fresh connect.
const POLL_START: Duration = Duration::from_millis(150);

/// Back-off added per idle cycle.
const POLL_STEP: Duration = Duration::from_millis(50);

/// Poll interval ceiling.
const POLL_MAX: Duration = Duration::from_millis(500);

/// Everything the supervisor needs to observe and tear down a connection.
pub(crate) struct SupervisorCtx {
    pub channel: Arc<SerialChannel>,
    pub engine: Arc<CommandEngine>,
    pub state: Arc<StateCache>,
    pub hooks: Arc<EventHooks>,
}

struct Signal {
    stop: AtomicBool,
    gate: Mutex<()>,
    wake: Condvar,
}

/// Handle on the supervisor thread.
pub(crate) struct Supervisor {
    signal: Arc<Signal>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl Supervisor {
    /// Start polling. Called only after all connect-success state is
    /// committed, so the loop observes `connected == true` from the start.
    pub fn spawn(ctx: SupervisorCtx) -> std::io::Result<Self> {
        let signal = Arc::new(Signal {
            stop: AtomicBool::new(false),
            gate: Mutex::new(()),
            wake: Condvar::new(),
        });
        let thread = std::thread::Builder::new()
            .name("makcu-supervisor".to_string())
            .spawn({
                let signal = signal.clone();
                move || supervise(&ctx, &signal)
            })?;
        let thread_id = thread.thread().id();
        Ok(Self {
            signal,
            thread: Some(thread),
            thread_id,
        })
    }

    /// Cancel the poll loop and join it.
    ///
    /// When invoked from the supervisor's own context (a connection
    /// callback may call `disconnect`), the thread is detached instead:
    /// joining itself would deadlock.
    pub fn stop(mut self) {
        self.signal.stop.store(true, Ordering::Release);
        self.signal.wake.notify_all();
        if std::thread::current().id() != self.thread_id {
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }
}

fn supervise(ctx: &SupervisorCtx, signal: &Signal) {
    let mut interval = POLL_START;
    debug!("connection supervisor started");

    loop {
        if signal.stop.load(Ordering::Acquire) || !ctx.state.connected() {
            break;
        }

        if !ctx.channel.is_actually_connected() {
            // The CAS makes the loss edge exactly-once even when a user
            // disconnect races this poll.
            if ctx.state.begin_disconnect() {
                warn!(port = %ctx.channel.port_name(), "device connection lost");
                ctx.engine.stop_listener();
                ctx.engine.fail_all_disconnected();
                ctx.state.teardown();
                ctx.channel.close();
                ctx.hooks.fire_connection(false);
            }
            break;
        }

        {
            let mut gate = signal.gate.lock();
            if !signal.stop.load(Ordering::Acquire) {
                let _ = signal.wake.wait_for(&mut gate, interval);
            }
        }
        interval = (interval + POLL_STEP).min(POLL_MAX);
    }

    debug!("connection supervisor exited");
}
