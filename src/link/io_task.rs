//! Link I/O thread: owns the port and bridges it to the control loop.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────────┐
//!  │  link-io thread                                              │
//!  │                                                              │
//!  │   connect ──ok──▶ serve ──lost──▶ backoff wait ──▶ connect   │
//!  │      │                │                 │                    │
//!  │     err──▶ backoff wait                 └─ Shutdown ─▶ exit  │
//!  │                       │                                      │
//!  │        ┌──────────────┴──────────────┐                       │
//!  │        │ drain Outbound → write      │                       │
//!  │        │ read (timeout) → LineDecoder│──▶ LinkEvent queue    │
//!  │        └─────────────────────────────┘                       │
//!  └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads block for at most the transport's read timeout, so queued
//! commands and shutdown requests are picked up within one timeout.
//! Backoff waits block on the outbound channel with a deadline instead of
//! sleeping, so shutdown interrupts them immediately.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};
use log::{debug, error, info, warn};

use super::backoff::Backoff;
use super::codec::{LineDecoder, RelayCommand};
use super::transport::{Connector, Transport};
use crate::config::SystemConfig;
use crate::diagnostics::{ConnectionStatus, LinkStats};
use crate::error::ConnectionError;
use crate::events::LinkEvent;

const READ_BUF_SIZE: usize = 256;

#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub reconnect_initial: Duration,
    pub reconnect_max: Duration,
}

impl LinkSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            reconnect_initial: Duration::from_millis(config.reconnect_initial_ms),
            reconnect_max: Duration::from_millis(config.reconnect_max_ms),
        }
    }
}

#[derive(Debug)]
enum Outbound {
    Command(RelayCommand),
    Shutdown,
}

// ── Control-loop side ────────────────────────────────────────

/// Queue relay commands for the I/O thread.
#[derive(Debug, Clone)]
pub struct CommandSender {
    tx: Sender<Outbound>,
}

impl CommandSender {
    pub fn send(&self, command: RelayCommand) -> Result<(), ConnectionError> {
        self.tx
            .send(Outbound::Command(command))
            .map_err(|_| ConnectionError::NotConnected)
    }
}

/// Owner of the running I/O thread.  Dropping it shuts the link down.
pub struct LinkHandle {
    tx: Sender<Outbound>,
    thread: Option<JoinHandle<()>>,
}

impl LinkHandle {
    pub fn commands(&self) -> CommandSender {
        CommandSender {
            tx: self.tx.clone(),
        }
    }

    /// Flush queued commands, close the port and join the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Queued after any pending command, so those are written first.
        let _ = self.tx.send(Outbound::Shutdown);
        if thread.join().is_err() {
            error!("IO: link thread panicked");
        }
    }
}

impl Drop for LinkHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn the I/O thread.
pub fn spawn<C>(
    connector: C,
    events: Sender<LinkEvent>,
    stats: Arc<LinkStats>,
    settings: LinkSettings,
) -> std::io::Result<LinkHandle>
where
    C: Connector + 'static,
{
    let (tx, rx) = crossbeam_channel::unbounded();
    let worker = LinkWorker {
        connector,
        events,
        outbound: rx,
        stats,
        backoff: Backoff::new(settings.reconnect_initial, settings.reconnect_max),
        decoder: LineDecoder::new(),
        pending: None,
        last_sent: None,
    };
    let thread = std::thread::Builder::new()
        .name("link-io".into())
        .spawn(move || worker.run())?;
    Ok(LinkHandle {
        tx,
        thread: Some(thread),
    })
}

// ── I/O thread side ──────────────────────────────────────────

enum Exit {
    Shutdown,
    Lost(ConnectionError),
}

struct LinkWorker<C: Connector> {
    connector: C,
    events: Sender<LinkEvent>,
    outbound: Receiver<Outbound>,
    stats: Arc<LinkStats>,
    backoff: Backoff,
    decoder: LineDecoder,
    /// Latest command that could not be written; retried on reconnect.
    pending: Option<RelayCommand>,
    last_sent: Option<RelayCommand>,
}

impl<C: Connector> LinkWorker<C> {
    fn run(mut self) {
        info!("IO: link task started for {}", self.connector.endpoint());
        loop {
            self.set_status(ConnectionStatus::Connecting);
            match self.connector.connect() {
                Ok(mut transport) => {
                    info!("IO: connected to {}", self.connector.endpoint());
                    self.backoff.reset();
                    self.decoder.reset();
                    self.set_status(ConnectionStatus::Connected);
                    match self.serve(&mut transport) {
                        Exit::Shutdown => break,
                        Exit::Lost(e) => warn!("IO: {}: {e}", self.connector.endpoint()),
                    }
                }
                Err(e) => warn!("IO: {e}"),
            }
            self.set_status(ConnectionStatus::Disconnected);

            let delay = self.backoff.next_delay();
            self.stats.record_reconnect();
            info!(
                "IO: reconnect attempt {} in {:?}",
                self.backoff.attempts(),
                delay
            );
            if self.wait(delay) {
                break;
            }
        }

        if let Some(cmd) = self.pending {
            warn!("IO: shutting down with unsent command '{cmd}'");
        }
        self.set_status(ConnectionStatus::Disconnected);
        info!("IO: link task stopped");
    }

    /// Pump the connected transport until shutdown or link loss.
    fn serve(&mut self, transport: &mut C::Transport) -> Exit {
        if let Some(cmd) = self.pending.take() {
            info!("IO: resending '{cmd}' after reconnect");
            if let Err(e) = self.write(transport, cmd) {
                return Exit::Lost(e);
            }
        }

        let mut buf = [0u8; READ_BUF_SIZE];
        loop {
            loop {
                match self.outbound.try_recv() {
                    Ok(Outbound::Command(cmd)) => {
                        if let Err(e) = self.write(transport, cmd) {
                            return Exit::Lost(e);
                        }
                    }
                    Ok(Outbound::Shutdown) | Err(TryRecvError::Disconnected) => {
                        if let Err(e) = transport.flush() {
                            warn!("IO: flush on shutdown failed: {e}");
                        }
                        return Exit::Shutdown;
                    }
                    Err(TryRecvError::Empty) => break,
                }
            }

            match transport.read(&mut buf) {
                Ok(0) => {}
                Ok(n) => self.ingest(&buf[..n]),
                Err(e) => return Exit::Lost(e),
            }
        }
    }

    fn ingest(&mut self, data: &[u8]) {
        let events = &self.events;
        self.decoder.feed(data, |line| {
            let event = match line {
                Ok(text) => LinkEvent::Line(text.to_string()),
                Err(e) => LinkEvent::Rejected(e),
            };
            if events.send(event).is_err() {
                debug!("IO: control loop gone, dropping line");
            }
        });
    }

    fn write(
        &mut self,
        transport: &mut C::Transport,
        cmd: RelayCommand,
    ) -> Result<(), ConnectionError> {
        let result = transport
            .write_all(cmd.encode().as_bytes())
            .and_then(|()| transport.flush());
        if result.is_err() {
            self.pending = Some(cmd);
            return result;
        }
        self.stats.record_command();
        if self.last_sent != Some(cmd) {
            info!("IO: -> {cmd}");
        }
        self.last_sent = Some(cmd);
        Ok(())
    }

    /// Wait out a backoff delay.  Returns `true` if shutdown was requested.
    fn wait(&mut self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        loop {
            match self.outbound.recv_deadline(deadline) {
                Ok(Outbound::Command(cmd)) => {
                    debug!("IO: holding '{cmd}' until reconnected");
                    self.pending = Some(cmd);
                }
                Ok(Outbound::Shutdown) | Err(RecvTimeoutError::Disconnected) => return true,
                Err(RecvTimeoutError::Timeout) => return false,
            }
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        if self.stats.status() == status {
            return;
        }
        self.stats.set_status(status);
        let _ = self.events.send(LinkEvent::Connection(status));
    }
}
