//! Test helpers for the transport module.

use std::io::{self, Cursor, Read, Write};
use std::net::TcpStream;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::thread;
use std::time::{Duration, Instant};

use crate::queue::{QueueSink, SinkError};
use crate::request::PushRequest;

use super::ConnectionHandler;

/// Handler that counts connections and closes them immediately.
pub(crate) struct CountingHandler {
    count: Arc<AtomicUsize>,
}

impl CountingHandler {
    pub(crate) fn new() -> (Arc<AtomicUsize>, Arc<Self>) {
        let count = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(Self {
            count: Arc::clone(&count),
        });
        (count, handler)
    }
}

impl ConnectionHandler for CountingHandler {
    fn handle(&self, _stream: TcpStream) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }
}

/// Sink that keeps every submitted request in memory.
#[derive(Default)]
pub(crate) struct RecordingSink {
    requests: Mutex<Vec<PushRequest>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingSink {
    /// Sink that rejects every submission as if the queue were closed.
    pub(crate) fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub(crate) fn requests(&self) -> Vec<PushRequest> {
        self.requests.lock().expect("sink mutex poisoned").clone()
    }

    pub(crate) fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl QueueSink for RecordingSink {
    fn submit(&self, request: PushRequest) -> Result<(), SinkError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(SinkError::Closed);
        }
        self.requests
            .lock()
            .expect("sink mutex poisoned")
            .push(request);
        Ok(())
    }
}

/// In-memory duplex stream: reads from a fixed input, records writes.
pub(crate) struct MemoryStream {
    input: Cursor<Vec<u8>>,
    written: Vec<u8>,
    fail_reads: bool,
}

impl MemoryStream {
    pub(crate) fn new(input: &[u8]) -> Self {
        Self {
            input: Cursor::new(input.to_vec()),
            written: Vec::new(),
            fail_reads: false,
        }
    }

    /// Stream whose reads fail as if the peer reset the connection.
    pub(crate) fn failing_reads() -> Self {
        Self {
            fail_reads: true,
            ..Self::new(&[])
        }
    }

    pub(crate) fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }
}

impl Read for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_reads {
            return Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ));
        }
        self.input.read(buf)
    }
}

impl Write for MemoryStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Handler that blocks each connection until released (or a five second
/// safety deadline passes).
pub(crate) struct GatedHandler {
    entered: AtomicUsize,
    finished: AtomicUsize,
    release: AtomicBool,
}

impl GatedHandler {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            entered: AtomicUsize::new(0),
            finished: AtomicUsize::new(0),
            release: AtomicBool::new(false),
        })
    }

    pub(crate) fn entered(&self) -> usize {
        self.entered.load(Ordering::SeqCst)
    }

    pub(crate) fn finished(&self) -> usize {
        self.finished.load(Ordering::SeqCst)
    }

    pub(crate) fn release(&self) {
        self.release.store(true, Ordering::SeqCst);
    }
}

impl ConnectionHandler for GatedHandler {
    fn handle(&self, _stream: TcpStream) {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.release.load(Ordering::SeqCst) && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        self.finished.fetch_add(1, Ordering::SeqCst);
    }
}

/// Polls `condition` every 10ms for up to two seconds.
pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}
