//! Real serial-port channel and the destructive baud-rate switch.

use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use serialport::{DataBits, FlowControl, Parity, SerialPort, StopBits};
use tracing::{debug, trace, warn};

use super::{PortOpener, SerialLink};
use crate::error::{MakcuError, Result};
use crate::protocol::{baud_change_frame, BAUD_SWITCH_SETTLE_MS};

/// Read/write timeout tuned for latency: reads return promptly with
/// whatever bytes are buffered.
const IO_TIMEOUT: Duration = Duration::from_millis(10);

/// [`PortOpener`] backed by the operating system's serial stack.
pub struct SystemOpener;

impl PortOpener for SystemOpener {
    fn open(&self, path: &str, baud: u32) -> Result<Box<dyn SerialLink>> {
        debug!(port = path, baud, "opening serial port");
        let port = serialport::new(path, baud)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(IO_TIMEOUT)
            .open()
            .map_err(|e| MakcuError::OpenFailed {
                port: path.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Box::new(SystemLink { port }))
    }
}

struct SystemLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink for SystemLink {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.port.read(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> std::io::Result<()> {
        self.port.write_all(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.port.flush()
    }

    fn bytes_to_read(&self) -> std::io::Result<u32> {
        self.port
            .bytes_to_read()
            .map_err(|e| std::io::Error::other(e.to_string()))
    }

    fn probe(&self) -> bool {
        // A vanished USB device invalidates the handle; the receive-queue
        // query is the cheapest ioctl that notices.
        self.port.bytes_to_read().is_ok()
    }

    fn try_clone(&self) -> std::io::Result<Box<dyn SerialLink>> {
        let port = self
            .port
            .try_clone()
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        Ok(Box::new(SystemLink { port }))
    }
}

/// Shared serial channel: the write half plus open/close lifecycle.
///
/// Writes from any thread are serialised by the internal mutex; reads
/// happen only on the listener thread through a cloned handle obtained
/// via [`SerialChannel::reader_handle`].
pub struct SerialChannel {
    opener: std::sync::Arc<dyn PortOpener>,
    link: Mutex<Option<Box<dyn SerialLink>>>,
    port_name: Mutex<String>,
    baud: AtomicU32,
    /// Set across the closed window of a baud switch so liveness polls
    /// do not mistake the reopen gap for a vanished device.
    switching: AtomicBool,
}

impl SerialChannel {
    pub fn new(opener: std::sync::Arc<dyn PortOpener>) -> Self {
        Self {
            opener,
            link: Mutex::new(None),
            port_name: Mutex::new(String::new()),
            baud: AtomicU32::new(0),
            switching: AtomicBool::new(false),
        }
    }

    /// Open `path` at `baud`, closing any previous link first.
    pub fn open(&self, path: &str, baud: u32) -> Result<()> {
        let fresh = self.opener.open(path, baud)?;
        let mut guard = self.link.lock();
        *guard = Some(fresh);
        drop(guard);
        *self.port_name.lock() = path.to_string();
        self.baud.store(baud, Ordering::Release);
        Ok(())
    }

    /// Release the OS handle. Idempotent.
    pub fn close(&self) {
        if self.link.lock().take().is_some() {
            debug!(port = %self.port_name(), "serial channel closed");
        }
    }

    pub fn is_open(&self) -> bool {
        self.link.lock().is_some()
    }

    /// Probe the OS for a vanished device, independent of software state.
    pub fn is_actually_connected(&self) -> bool {
        if self.switching.load(Ordering::Acquire) {
            return true;
        }
        match &*self.link.lock() {
            Some(link) => link.probe(),
            None => false,
        }
    }

    /// Write the full buffer through the shared write half.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut guard = self.link.lock();
        let link = guard.as_mut().ok_or(MakcuError::Disconnected)?;
        link.write_all(bytes)?;
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        let mut guard = self.link.lock();
        let link = guard.as_mut().ok_or(MakcuError::Disconnected)?;
        link.flush()?;
        Ok(())
    }

    /// Bytes waiting in the receive buffer; 0 when closed.
    pub fn available(&self) -> usize {
        match &*self.link.lock() {
            Some(link) => link.bytes_to_read().unwrap_or(0) as usize,
            None => 0,
        }
    }

    pub fn port_name(&self) -> String {
        self.port_name.lock().clone()
    }

    pub fn baud(&self) -> u32 {
        self.baud.load(Ordering::Acquire)
    }

    /// Clone the underlying handle for the listener thread.
    pub(crate) fn reader_handle(&self) -> Result<Box<dyn SerialLink>> {
        let guard = self.link.lock();
        let link = guard.as_ref().ok_or(MakcuError::Disconnected)?;
        Ok(link.try_clone()?)
    }

    /// Listener-side notification that a hard I/O error killed the link.
    pub(crate) fn mark_lost(&self) {
        if self.link.lock().take().is_some() {
            warn!(port = %self.port_name(), "serial link lost");
        }
    }

    /// Perform the destructive baud-rate switch: emit the binary frame,
    /// flush, close, wait for the bridge to settle, reopen at `target`.
    ///
    /// On failure at any step the channel is left closed and the caller
    /// must treat the connection as dead.
    pub(crate) fn switch_baud(&self, target: u32) -> Result<()> {
        let path = self.port_name();
        self.switching.store(true, Ordering::Release);
        let result = self.switch_baud_inner(&path, target);
        self.switching.store(false, Ordering::Release);
        result
    }

    fn switch_baud_inner(&self, path: &str, target: u32) -> Result<()> {
        let mut guard = self.link.lock();
        let link = guard.as_mut().ok_or(MakcuError::Disconnected)?;

        let frame = baud_change_frame(target);
        trace!(target, "sending baud-rate change frame");
        if let Err(e) = link.write_all(&frame).and_then(|()| link.flush()) {
            *guard = None;
            return Err(e.into());
        }

        // The old handle is unusable past this point.
        *guard = None;
        std::thread::sleep(Duration::from_millis(BAUD_SWITCH_SETTLE_MS));

        match self.opener.open(path, target) {
            Ok(fresh) => {
                *guard = Some(fresh);
                self.baud.store(target, Ordering::Release);
                debug!(port = %path, baud = target, "reopened after baud switch");
                Ok(())
            }
            Err(e) => {
                warn!(port = %path, baud = target, error = %e, "reopen after baud switch failed");
                Err(e)
            }
        }
    }
}
