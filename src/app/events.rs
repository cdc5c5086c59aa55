//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log them, feed a UI, record them in
//! a test.

use crate::comfort::profile::ComfortProfile;
use crate::comfort::{ComfortLabel, PredictionResult};
use crate::diagnostics::ConnectionStatus;
use crate::error::{ParseError, TrainingError};
use crate::fsm::ControlState;
use crate::link::RelayCommand;
use crate::link::codec::NoticeKind;
use crate::telemetry::SensorReading;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started (carries initial state).
    Started(ControlState),

    /// A plausible reading was accepted into the telemetry cache.
    Reading(SensorReading),

    /// The ensemble produced a result for the latest reading.
    Prediction(PredictionResult),

    /// The FSM transitioned between states.
    StateChanged {
        from: ControlState,
        to: ControlState,
        forced: bool,
    },

    /// A relay command was handed to the link.
    CommandSent(RelayCommand),

    /// One or more safety faults were raised (new bitmask).
    FaultDetected(u8),

    /// All safety faults have been cleared.
    FaultCleared,

    /// A feedback event was appended to the dataset.
    FeedbackRecorded {
        label: ComfortLabel,
        dataset_len: usize,
        retrain_started: bool,
    },

    /// The dataset was re-seeded from another profile.  The retrain result
    /// follows as `ModelSwapped` or `RetrainRejected`.
    ProfileSwitched {
        profile: ComfortProfile,
        dataset_len: usize,
        retrain_started: bool,
    },

    /// A retrained ensemble passed validation and is now live.
    ModelSwapped { version: u64, accuracy: f32 },

    /// A retrain finished without replacing the live model.
    RetrainRejected(TrainingError),

    /// A line was dropped without touching any state.
    LineDiscarded {
        line: Option<String>,
        reason: ParseError,
    },

    /// A `Status:` / `Action:` line that differs from the previous one.
    Notice { kind: NoticeKind, text: String },

    ConnectionChanged(ConnectionStatus),

    /// The service stopped (carries final state).
    Stopped(ControlState),
}
