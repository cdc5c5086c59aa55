//! Shared mutable context threaded through every FSM handler.
//!
//! The "blackboard": the control loop writes the clock, the desired target
//! and the fault mask before a tick; state handlers read them and queue the
//! relay command the transition requires.

use std::time::{Duration, Instant};

use crate::config::SystemConfig;
use crate::link::codec::RelayCommand;
use crate::safety::SafetyFault;

pub struct FsmContext {
    // -- Timing --
    /// Clock for this tick.  Set by the caller before `tick()`.
    pub now: Instant,
    /// When the last transition (forced or not) was applied.
    /// `None` until the first one, so the first transition needs no dwell.
    pub last_transition: Option<Instant>,
    pub min_dwell: Duration,

    // -- Inputs --
    /// Desired state from the latest prediction, if this tick carries one.
    pub target: Option<super::ControlState>,
    /// Safety fault bitmask (see [`SafetyFault::mask`]).
    pub fault_flags: u8,

    // -- Output --
    /// Relay command queued by `on_enter`, taken by the control loop.
    command: Option<RelayCommand>,
}

impl FsmContext {
    pub fn new(config: &SystemConfig, now: Instant) -> Self {
        Self {
            now,
            last_transition: None,
            min_dwell: config.min_dwell(),
            target: None,
            fault_flags: 0,
            command: None,
        }
    }

    pub fn has_faults(&self) -> bool {
        self.fault_flags != 0
    }

    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.fault_flags & fault.mask() != 0
    }

    /// True if an unforced transition is allowed now.
    pub fn dwell_elapsed(&self) -> bool {
        self.last_transition
            .is_none_or(|at| self.now.saturating_duration_since(at) >= self.min_dwell)
    }

    pub(super) fn queue_command(&mut self, command: RelayCommand) {
        self.command = Some(command);
    }

    /// Take the queued relay command, if any.
    pub fn take_command(&mut self) -> Option<RelayCommand> {
        self.command.take()
    }
}
