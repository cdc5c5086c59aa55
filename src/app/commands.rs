//! Inbound commands to the application service.
//!
//! These are requests from the consumer side (CLI, a front-end, tests)
//! that the control loop interprets and acts upon.  Feedback and raw
//! lines do not travel here; they go through the ordered link-event queue
//! so they interleave correctly with telemetry.

use crate::comfort::profile::ComfortProfile;

/// Commands that external adapters can send into the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppCommand {
    /// Retrain on the current dataset now, regardless of how much feedback
    /// has accumulated.  Ignored while a retrain is already running.
    Retrain,

    /// Re-seed the dataset from another comfort profile, keeping occupant
    /// feedback, and retrain in the background.
    SwitchProfile(ComfortProfile),

    /// Stop consuming events, join any running retrain and return.
    Shutdown,
}
