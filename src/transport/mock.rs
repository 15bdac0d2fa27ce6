//! Scripted in-memory serial endpoint for unit testing.
//!
//! The endpoint records every open and every byte written, and feeds
//! scripted bytes back to the reader, so the full connect handshake and
//! command traffic can be exercised without hardware.
//!
//! # Example
//!
//! ```rust,ignore
//! use makcu::transport::mock::MockEndpoint;
//! use makcu::Device;
//!
//! let endpoint = MockEndpoint::new();
//! endpoint.respond_with(|cmd| (cmd == "km.version()").then(|| "3.2".to_string()));
//!
//! let device = Device::with_opener(endpoint.opener());
//! assert!(device.connect(Some("MOCK0")));
//! ```

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use memchr::memchr;
use parking_lot::Mutex;
use tracing::trace;

use super::{PortOpener, SerialLink};
use crate::error::{MakcuError, Result};

/// How long a mock read blocks when nothing is buffered, emulating the
/// short total-read timeout of a real port.
const MOCK_READ_TIMEOUT: Duration = Duration::from_millis(3);

/// Responder invoked once per complete CR/LF-terminated line the host
/// writes; a returned string is queued back to the host with CR+LF.
pub type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

/// One `open()` call observed by the endpoint.
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub path: String,
    pub baud: u32,
}

struct Session {
    record: OpenRecord,
    written: Vec<u8>,
}

struct Shared {
    sessions: Mutex<Vec<Session>>,
    inbound: Mutex<VecDeque<u8>>,
    line_acc: Mutex<Vec<u8>>,
    responder: Mutex<Option<Responder>>,
    alive: AtomicBool,
    refuse_open: AtomicBool,
    fail_writes: AtomicBool,
}

/// Test-side handle to the scripted endpoint.
#[derive(Clone)]
pub struct MockEndpoint {
    shared: Arc<Shared>,
}

impl Default for MockEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEndpoint {
    #[must_use]
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                sessions: Mutex::new(Vec::new()),
                inbound: Mutex::new(VecDeque::new()),
                line_acc: Mutex::new(Vec::new()),
                responder: Mutex::new(None),
                alive: AtomicBool::new(true),
                refuse_open: AtomicBool::new(false),
                fail_writes: AtomicBool::new(false),
            }),
        }
    }

    /// [`PortOpener`] that hands out links onto this endpoint.
    #[must_use]
    pub fn opener(&self) -> Arc<dyn PortOpener> {
        Arc::new(MockOpener {
            shared: self.shared.clone(),
        })
    }

    // === Scripting ===

    /// Install a per-line responder for host-written commands.
    pub fn respond_with<F>(&self, responder: F)
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        *self.shared.responder.lock() = Some(Box::new(responder));
    }

    /// Queue raw device→host bytes (e.g. button event bytes).
    pub fn push_bytes(&self, bytes: &[u8]) {
        self.shared.inbound.lock().extend(bytes.iter().copied());
    }

    /// Queue a device→host response line, CR+LF terminated.
    pub fn push_line(&self, line: &str) {
        let mut inbound = self.shared.inbound.lock();
        inbound.extend(line.bytes());
        inbound.extend(*b"\r\n");
    }

    /// Make the liveness probe report the device as vanished (or back).
    pub fn set_alive(&self, alive: bool) {
        self.shared.alive.store(alive, Ordering::SeqCst);
    }

    /// Make subsequent `open()` calls fail.
    pub fn refuse_opens(&self, refuse: bool) {
        self.shared.refuse_open.store(refuse, Ordering::SeqCst);
    }

    /// Make subsequent writes fail with an I/O error.
    pub fn fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    // === Inspection ===

    /// All `open()` calls seen so far, in order.
    #[must_use]
    pub fn opens(&self) -> Vec<OpenRecord> {
        self.shared
            .sessions
            .lock()
            .iter()
            .map(|s| s.record.clone())
            .collect()
    }

    #[must_use]
    pub fn session_count(&self) -> usize {
        self.shared.sessions.lock().len()
    }

    /// Bytes the host wrote during session `index`.
    #[must_use]
    pub fn written(&self, index: usize) -> Vec<u8> {
        self.shared
            .sessions
            .lock()
            .get(index)
            .map(|s| s.written.clone())
            .unwrap_or_default()
    }

    /// Bytes the host wrote during session `index`, lossily decoded.
    #[must_use]
    pub fn written_string(&self, index: usize) -> String {
        String::from_utf8_lossy(&self.written(index)).into_owned()
    }
}

struct MockOpener {
    shared: Arc<Shared>,
}

impl PortOpener for MockOpener {
    fn open(&self, path: &str, baud: u32) -> Result<Box<dyn SerialLink>> {
        if self.shared.refuse_open.load(Ordering::SeqCst) {
            return Err(MakcuError::OpenFailed {
                port: path.to_string(),
                reason: "mock endpoint refused open".to_string(),
            });
        }
        trace!(path, baud, "mock open");
        self.shared.sessions.lock().push(Session {
            record: OpenRecord {
                path: path.to_string(),
                baud,
            },
            written: Vec::new(),
        });
        // A reopen starts a fresh command stream.
        self.shared.line_acc.lock().clear();
        Ok(Box::new(MockLink {
            shared: self.shared.clone(),
        }))
    }
}

struct MockLink {
    shared: Arc<Shared>,
}

impl MockLink {
    /// Split newly written bytes into lines and run the responder.
    fn feed_responder(&self, bytes: &[u8]) {
        let mut lines = Vec::new();
        {
            let mut acc = self.shared.line_acc.lock();
            acc.extend_from_slice(bytes);
            while let Some(pos) = memchr(b'\n', &acc) {
                let mut line: Vec<u8> = acc.drain(..=pos).collect();
                line.pop();
                if line.last() == Some(&b'\r') {
                    line.pop();
                }
                if !line.is_empty() {
                    lines.push(String::from_utf8_lossy(&line).into_owned());
                }
            }
        }
        if lines.is_empty() {
            return;
        }
        let mut responder = self.shared.responder.lock();
        if let Some(respond) = responder.as_mut() {
            for line in lines {
                if let Some(reply) = respond(&line) {
                    let mut inbound = self.shared.inbound.lock();
                    inbound.extend(reply.bytes());
                    inbound.extend(*b"\r\n");
                }
            }
        }
    }
}

impl SerialLink for MockLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        for _ in 0..2 {
            {
                let mut inbound = self.shared.inbound.lock();
                if !inbound.is_empty() {
                    let n = inbound.len().min(buf.len());
                    for slot in buf.iter_mut().take(n) {
                        *slot = inbound.pop_front().unwrap_or_default();
                    }
                    return Ok(n);
                }
            }
            std::thread::sleep(MOCK_READ_TIMEOUT);
        }
        Err(io::Error::new(io::ErrorKind::TimedOut, "mock read timeout"))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.shared.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure"));
        }
        {
            let mut sessions = self.shared.sessions.lock();
            if let Some(session) = sessions.last_mut() {
                session.written.extend_from_slice(buf);
            }
        }
        self.feed_responder(buf);
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn bytes_to_read(&self) -> io::Result<u32> {
        Ok(self.shared.inbound.lock().len() as u32)
    }

    fn probe(&self) -> bool {
        self.shared.alive.load(Ordering::SeqCst)
    }

    fn try_clone(&self) -> io::Result<Box<dyn SerialLink>> {
        Ok(Box::new(MockLink {
            shared: self.shared.clone(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_records_sessions() {
        let endpoint = MockEndpoint::new();
        let opener = endpoint.opener();
        let _a = opener.open("MOCK0", 115_200).unwrap();
        let _b = opener.open("MOCK0", 4_000_000).unwrap();

        let opens = endpoint.opens();
        assert_eq!(opens.len(), 2);
        assert_eq!(opens[0].baud, 115_200);
        assert_eq!(opens[1].baud, 4_000_000);
    }

    #[test]
    fn test_writes_land_in_current_session() {
        let endpoint = MockEndpoint::new();
        let opener = endpoint.opener();
        let mut link = opener.open("MOCK0", 115_200).unwrap();
        link.write_all(b"hello").unwrap();
        let mut link2 = opener.open("MOCK0", 4_000_000).unwrap();
        link2.write_all(b"world").unwrap();

        assert_eq!(endpoint.written(0), b"hello");
        assert_eq!(endpoint.written(1), b"world");
    }

    #[test]
    fn test_responder_sees_complete_lines() {
        let endpoint = MockEndpoint::new();
        endpoint.respond_with(|cmd| (cmd == "km.version()").then(|| "3.2".to_string()));
        let opener = endpoint.opener();
        let mut link = opener.open("MOCK0", 115_200).unwrap();

        link.write_all(b"km.vers").unwrap();
        assert_eq!(link.bytes_to_read().unwrap(), 0);
        link.write_all(b"ion()\r\n").unwrap();

        let mut buf = [0u8; 16];
        let n = link.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], b"3.2\r\n");
    }

    #[test]
    fn test_read_times_out_when_idle() {
        let endpoint = MockEndpoint::new();
        let mut link = endpoint.opener().open("MOCK0", 115_200).unwrap();
        let mut buf = [0u8; 4];
        let err = link.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn test_refused_open() {
        let endpoint = MockEndpoint::new();
        endpoint.refuse_opens(true);
        assert!(endpoint.opener().open("MOCK0", 115_200).is_err());
    }
}
