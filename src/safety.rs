//! Safety supervisor.
//!
//! Runs before every FSM tick and maintains a fault bitmask in
//! `FsmContext.fault_flags`.  Any set bit makes the heating and cooling
//! states fall back to `Idle` immediately, ignoring dwell time.
//!
//! ## Fault lifecycle
//!
//! 1. Telemetry goes stale, or the ensemble fails to produce a result.
//! 2. The supervisor sets the corresponding bit.
//! 3. The FSM forces `Idle`; `idle_enter` queues the `comfortable` command.
//! 4. A fresh reading clears `SensorStale`; a successful prediction clears
//!    `PredictionUnavailable`.
//! 5. With `fault_flags == 0`, predictions steer the FSM again.

use core::fmt;
use std::time::Instant;

use log::{error, info};

use crate::telemetry::TelemetryCache;

/// Conditions under which the controller must not actuate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SafetyFault {
    /// No telemetry within the stale window.
    SensorStale = 0,
    /// The ensemble is missing or failed on the latest reading.
    PredictionUnavailable = 1,
}

impl SafetyFault {
    pub const fn mask(self) -> u8 {
        1 << self as u8
    }
}

impl fmt::Display for SafetyFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SensorStale => "sensor stale",
            Self::PredictionUnavailable => "prediction unavailable",
        })
    }
}

#[derive(Debug, Default)]
pub struct SafetySupervisor {
    /// Latched fault bitmask.
    faults: u8,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-check telemetry age.  Returns the updated fault bitmask.
    pub fn evaluate(&mut self, telemetry: &TelemetryCache, now: Instant) -> u8 {
        self.eval_fault(SafetyFault::SensorStale, telemetry.is_stale(now));
        self.faults
    }

    /// Record the outcome of the latest prediction attempt.
    pub fn record_prediction(&mut self, ok: bool) -> u8 {
        self.eval_fault(SafetyFault::PredictionUnavailable, !ok);
        self.faults
    }

    pub fn faults(&self) -> u8 {
        self.faults
    }

    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    pub fn has_fault(&self, fault: SafetyFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    fn eval_fault(&mut self, fault: SafetyFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("SAFETY FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("SAFETY FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
