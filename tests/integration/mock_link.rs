//! Mock link adapters for integration tests.
//!
//! A scripted connector that can refuse connections, feed canned bytes and
//! drop the link, plus recording command and event sinks.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use comfortlink::app::events::AppEvent;
use comfortlink::app::ports::{CommandPort, EventSink};
use comfortlink::error::ConnectionError;
use comfortlink::link::{Connector, RelayCommand, Transport};

// ── Scripted serial peer ──────────────────────────────────────

/// Shared view of what the mock peer saw and should say.
#[derive(Clone, Default)]
pub struct PeerScript {
    /// Chunks handed out by successive reads, per connection.
    pub incoming: Arc<Mutex<VecDeque<Vec<u8>>>>,
    /// Every byte the host wrote, across connections.
    pub written: Arc<Mutex<Vec<u8>>>,
    pub connects: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl PeerScript {
    pub fn push(&self, bytes: &[u8]) {
        self.incoming.lock().unwrap().push_back(bytes.to_vec());
    }

    pub fn written_text(&self) -> String {
        String::from_utf8_lossy(&self.written.lock().unwrap()).into_owned()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Poll until `pred` holds or `timeout` passes.
    pub fn wait_for(&self, timeout: Duration, pred: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if pred(self) {
                return true;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        pred(self)
    }
}

pub struct ScriptedConnector {
    pub script: PeerScript,
    /// Refuse this many connection attempts before accepting.
    pub refuse_first: usize,
    /// Report link loss once the scripted input runs dry.
    pub drop_when_drained: bool,
}

impl ScriptedConnector {
    pub fn new(script: PeerScript) -> Self {
        Self {
            script,
            refuse_first: 0,
            drop_when_drained: false,
        }
    }
}

impl Connector for ScriptedConnector {
    type Transport = ScriptedTransport;

    fn connect(&mut self) -> Result<ScriptedTransport, ConnectionError> {
        let n = self.script.connects.fetch_add(1, Ordering::SeqCst);
        if n < self.refuse_first {
            return Err(ConnectionError::OpenFailed {
                port: "mock".into(),
                reason: "refused".into(),
            });
        }
        Ok(ScriptedTransport {
            script: self.script.clone(),
            drop_when_drained: self.drop_when_drained,
        })
    }

    fn endpoint(&self) -> &str {
        "mock"
    }
}

pub struct ScriptedTransport {
    script: PeerScript,
    drop_when_drained: bool,
}

impl Transport for ScriptedTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, ConnectionError> {
        let next = self.script.incoming.lock().unwrap().pop_front();
        match next {
            Some(chunk) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                Ok(n)
            }
            None if self.drop_when_drained => Err(ConnectionError::Lost(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "unplugged",
            ))),
            None => {
                std::thread::sleep(Duration::from_millis(5));
                Ok(0)
            }
        }
    }

    fn write_all(&mut self, data: &[u8]) -> Result<(), ConnectionError> {
        self.script.written.lock().unwrap().extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), ConnectionError> {
        Ok(())
    }
}

// ── Recording ports ───────────────────────────────────────────

#[derive(Debug, Default)]
pub struct RecordingRelay {
    pub sent: Vec<RelayCommand>,
}

impl CommandPort for RecordingRelay {
    fn send(&mut self, command: RelayCommand) -> Result<(), ConnectionError> {
        self.sent.push(command);
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
