//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing application events to the `log`
//! facade.  High-rate events (readings, predictions, commands) go to
//! `debug`; everything that changes the controller's situation goes to
//! `info`.  A UI adapter would implement the same trait.

use log::{debug, info};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
            AppEvent::Reading(r) => {
                debug!("TELEM | T={:.1}\u{00b0}C H={:.1}%", r.temperature, r.humidity);
            }
            AppEvent::Prediction(p) => {
                debug!(
                    "PREDICT | {} ({:.0}% of votes, v{}) | members={:?}",
                    p.label,
                    p.vote_fraction * 100.0,
                    p.model_version,
                    p.per_model
                );
            }
            AppEvent::StateChanged { from, to, forced } => {
                if *forced {
                    info!("STATE | {:?} -> {:?} (forced)", from, to);
                } else {
                    info!("STATE | {:?} -> {:?}", from, to);
                }
            }
            AppEvent::CommandSent(cmd) => {
                debug!("CMD | {}", cmd);
            }
            AppEvent::FaultDetected(flags) => {
                info!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::FeedbackRecorded {
                label,
                dataset_len,
                retrain_started,
            } => {
                debug!(
                    "FEEDBACK | {} | dataset={} | retrain={}",
                    label, dataset_len, retrain_started
                );
            }
            AppEvent::ProfileSwitched {
                profile,
                dataset_len,
                retrain_started,
            } => {
                info!(
                    "PROFILE | {:?} | dataset={} | retrain={}",
                    profile, dataset_len, retrain_started
                );
            }
            AppEvent::ModelSwapped { version, accuracy } => {
                info!("MODEL | v{} live, hold-out accuracy {:.3}", version, accuracy);
            }
            AppEvent::RetrainRejected(reason) => {
                info!("MODEL | candidate rejected: {}", reason);
            }
            AppEvent::LineDiscarded { reason, .. } => {
                debug!("DISCARD | {}", reason);
            }
            AppEvent::Notice { kind, text } => {
                debug!("PEER | {:?}: {}", kind, text);
            }
            AppEvent::ConnectionChanged(status) => {
                info!("LINK | {:?}", status);
            }
            AppEvent::Stopped(state) => {
                info!("STOP | final_state={:?}", state);
            }
        }
    }
}
