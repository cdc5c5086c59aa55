//! Link diagnostics.
//!
//! Counters are plain atomics shared between the I/O thread, the control
//! loop and any snapshot reader; nothing here ever blocks the link.

use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum ConnectionStatus {
    Connecting = 0,
    Connected = 1,
    Disconnected = 2,
}

impl ConnectionStatus {
    fn from_u8(raw: u8) -> Self {
        match raw {
            0 => Self::Connecting,
            1 => Self::Connected,
            _ => Self::Disconnected,
        }
    }
}

/// Live link counters.
#[derive(Debug)]
pub struct LinkStats {
    lines_received: AtomicU64,
    telemetry_accepted: AtomicU64,
    feedback_accepted: AtomicU64,
    lines_discarded: AtomicU64,
    commands_sent: AtomicU64,
    reconnect_attempts: AtomicU64,
    status: AtomicU8,
    connected_since: Mutex<Option<DateTime<Utc>>>,
}

impl Default for LinkStats {
    fn default() -> Self {
        Self {
            lines_received: AtomicU64::new(0),
            telemetry_accepted: AtomicU64::new(0),
            feedback_accepted: AtomicU64::new(0),
            lines_discarded: AtomicU64::new(0),
            commands_sent: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            status: AtomicU8::new(ConnectionStatus::Disconnected as u8),
            connected_since: Mutex::new(None),
        }
    }
}

/// Point-in-time copy of [`LinkStats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkStatsSnapshot {
    pub status: ConnectionStatus,
    pub lines_received: u64,
    pub telemetry_accepted: u64,
    pub feedback_accepted: u64,
    pub lines_discarded: u64,
    pub commands_sent: u64,
    pub reconnect_attempts: u64,
    pub connected_since: Option<DateTime<Utc>>,
}

impl LinkStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_line(&self) {
        self.lines_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_telemetry(&self) {
        self.telemetry_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feedback(&self) {
        self.feedback_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discard(&self) {
        self.lines_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reconnect(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        let prev = ConnectionStatus::from_u8(self.status.swap(status as u8, Ordering::AcqRel));
        if prev == status {
            return;
        }
        *self.connected_since.lock() = match status {
            ConnectionStatus::Connected => Some(Utc::now()),
            _ => None,
        };
    }

    pub fn status(&self) -> ConnectionStatus {
        ConnectionStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> LinkStatsSnapshot {
        LinkStatsSnapshot {
            status: self.status(),
            lines_received: self.lines_received.load(Ordering::Relaxed),
            telemetry_accepted: self.telemetry_accepted.load(Ordering::Relaxed),
            feedback_accepted: self.feedback_accepted.load(Ordering::Relaxed),
            lines_discarded: self.lines_discarded.load(Ordering::Relaxed),
            commands_sent: self.commands_sent.load(Ordering::Relaxed),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            connected_since: *self.connected_since.lock(),
        }
    }
}
