//! Replay adapters: drive the full pipeline from a recorded session.
//!
//! [`feed`] pushes each line of a capture through an [`EventInjector`],
//! exactly as the I/O thread would, and [`ReplayCommands`] stands in for
//! the relay link on the way out.

use std::io::BufRead;
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};

use crate::app::ports::CommandPort;
use crate::diagnostics::LinkStats;
use crate::error::ConnectionError;
use crate::events::EventInjector;
use crate::link::RelayCommand;

/// Feed every line of `input` into the queue, pausing `pace` between
/// lines.  Returns the number of lines queued.
pub fn feed(
    input: impl BufRead,
    injector: &EventInjector,
    pace: Duration,
) -> std::io::Result<usize> {
    let mut queued = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        if !injector.inject_line(&line) {
            warn!("REPLAY: control loop stopped after {queued} lines");
            break;
        }
        queued += 1;
        if !pace.is_zero() {
            std::thread::sleep(pace);
        }
    }
    info!("REPLAY: queued {queued} lines");
    Ok(queued)
}

/// Records relay commands instead of writing them to a port.
#[derive(Debug)]
pub struct ReplayCommands {
    stats: Arc<LinkStats>,
    sent: Vec<RelayCommand>,
}

impl ReplayCommands {
    pub fn new(stats: Arc<LinkStats>) -> Self {
        Self {
            stats,
            sent: Vec::new(),
        }
    }

    pub fn sent(&self) -> &[RelayCommand] {
        &self.sent
    }
}

impl CommandPort for ReplayCommands {
    fn send(&mut self, command: RelayCommand) -> Result<(), ConnectionError> {
        if self.sent.last() != Some(&command) {
            info!("REPLAY: -> {command}");
        }
        self.stats.record_command();
        self.sent.push(command);
        Ok(())
    }
}
