//! Ordered link-event queue.
//!
//! Events are produced by:
//! - the link I/O thread (decoded lines, decoder rejects, connection changes)
//! - an [`EventInjector`] (replay mode, tests, a front-end)
//!
//! and consumed one at a time, in arrival order, by the control loop.
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │ I/O thread  │────▶│              │     │              │
//! │             │     │  LinkEvent   │────▶│ Control loop │
//! │ Injector    │────▶│  queue (FIFO)│     │  (consumer)  │
//! └─────────────┘     └──────────────┘     └──────────────┘
//! ```
//!
//! Raw lines are parsed by the consumer, not the producer, so an injected
//! line goes through exactly the same path as one read from the port.

use crossbeam_channel::{Receiver, Sender};

use crate::comfort::FeedbackEvent;
use crate::diagnostics::ConnectionStatus;
use crate::error::ParseError;

#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    /// One complete line, terminator stripped.
    Line(String),
    /// The decoder could not produce a line (too long, bad encoding).
    Rejected(ParseError),
    /// Feedback injected directly, bypassing the wire grammar.
    Feedback(FeedbackEvent),
    /// The I/O thread's connection status changed.
    Connection(ConnectionStatus),
}

/// Create the queue.  Unbounded: the control loop drains it continuously
/// and a telemetry line is tiny.
pub fn link_queue() -> (Sender<LinkEvent>, Receiver<LinkEvent>) {
    crossbeam_channel::unbounded()
}

/// Write path for replaying or injecting events without hardware.
#[derive(Debug, Clone)]
pub struct EventInjector {
    tx: Sender<LinkEvent>,
}

impl EventInjector {
    pub fn new(tx: Sender<LinkEvent>) -> Self {
        Self { tx }
    }

    /// Queue a feedback event.  Returns `false` if the loop has stopped.
    pub fn inject_feedback(&self, event: FeedbackEvent) -> bool {
        self.tx.send(LinkEvent::Feedback(event)).is_ok()
    }

    /// Queue raw wire text.  Multi-line input is split; blank lines are
    /// skipped.  Returns `false` if the loop has stopped.
    pub fn inject_line(&self, text: &str) -> bool {
        text.lines()
            .map(|l| l.trim_end_matches('\r'))
            .filter(|l| !l.is_empty())
            .all(|l| self.tx.send(LinkEvent::Line(l.to_string())).is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comfort::ComfortLabel;

    #[test]
    fn injected_events_keep_order() {
        let (tx, rx) = link_queue();
        let inj = EventInjector::new(tx);
        assert!(inj.inject_line("T:20.0,H:50.0\r\n\nUSER_FEEDBACK:19.0,55.0,cold\n"));
        assert!(inj.inject_feedback(FeedbackEvent::new(21.0, 45.0, ComfortLabel::Hot)));

        let got: Vec<LinkEvent> = rx.try_iter().collect();
        assert_eq!(got.len(), 3);
        assert_eq!(got[0], LinkEvent::Line("T:20.0,H:50.0".into()));
        assert_eq!(got[1], LinkEvent::Line("USER_FEEDBACK:19.0,55.0,cold".into()));
        assert!(matches!(got[2], LinkEvent::Feedback(_)));
    }

    #[test]
    fn injector_reports_closed_queue() {
        let (tx, rx) = link_queue();
        drop(rx);
        assert!(!EventInjector::new(tx).inject_line("T:1.0,H:1.0"));
    }
}
