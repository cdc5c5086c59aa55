//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM, safety supervisor, telemetry cache,
//! predictor and trainer.  It exposes a clean, I/O-agnostic API.  All I/O
//! flows through port traits injected at call sites, making the entire
//! service testable with mock adapters and a synthetic clock.
//!
//! ```text
//!   LinkEvent ──▶ ┌──────────────────────────────────┐ ──▶ EventSink
//!                 │            AppService             │
//!  CommandPort ◀──│  Cache · Safety · Ensemble · FSM  │◀──▶ TrainingStore
//!                 │            · Trainer              │
//!                 └──────────────────────────────────┘
//! ```
//!
//! Every operation takes `now` from the caller.  The service never reads
//! the clock itself, so tests can step time explicitly.

use std::sync::Arc;
use std::time::Instant;

use log::{info, warn};
use parking_lot::RwLock;
use serde::Serialize;

use crate::comfort::{
    ComfortPredictor, FeedbackEvent, ModelHandle, PredictionResult, TrainingDataset,
};
use crate::config::SystemConfig;
use crate::diagnostics::{ConnectionStatus, LinkStats, LinkStatsSnapshot};
use crate::error::ParseError;
use crate::events::LinkEvent;
use crate::fsm::context::FsmContext;
use crate::fsm::states::build_state_table;
use crate::fsm::{ControlState, Fsm};
use crate::link::codec::{Inbound, NoticeKind};
use crate::link::parse_line;
use crate::safety::SafetySupervisor;
use crate::telemetry::{SensorReading, TelemetryCache};
use crate::trainer::{FeedbackTrainer, ProfileSwitch, RetrainOutcome, TrainerSettings};

use super::commands::AppCommand;
use super::events::AppEvent;
use super::ports::{CommandPort, EventSink, TrainingStore};

// ───────────────────────────────────────────────────────────────
// Consumer snapshot
// ───────────────────────────────────────────────────────────────

/// What the service publishes after every event and tick.
#[derive(Debug, Clone, Default)]
struct Published {
    reading: Option<SensorReading>,
    state: Option<ControlState>,
    prediction: Option<PredictionResult>,
    fault_flags: u8,
    dataset_len: usize,
    retraining: bool,
}

/// Point-in-time view of the whole controller.
#[derive(Debug, Clone, Serialize)]
pub struct ControllerSnapshot {
    pub reading: Option<SensorReading>,
    pub state: ControlState,
    pub prediction: Option<PredictionResult>,
    pub fault_flags: u8,
    pub connection: ConnectionStatus,
    pub model_version: u64,
    pub dataset_len: usize,
    pub retraining: bool,
    pub link: LinkStatsSnapshot,
}

/// Cloneable read-only window onto a running service.
#[derive(Debug, Clone)]
pub struct SnapshotHandle {
    published: Arc<RwLock<Published>>,
    stats: Arc<LinkStats>,
    model: ModelHandle,
}

impl SnapshotHandle {
    pub fn get(&self) -> ControllerSnapshot {
        let p = self.published.read().clone();
        let link = self.stats.snapshot();
        ControllerSnapshot {
            reading: p.reading,
            state: p.state.unwrap_or(ControlState::Idle),
            prediction: p.prediction,
            fault_flags: p.fault_flags,
            connection: link.status,
            model_version: self.model.version(),
            dataset_len: p.dataset_len,
            retraining: p.retraining,
            link,
        }
    }
}

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    config: SystemConfig,
    fsm: Fsm,
    ctx: FsmContext,
    safety: SafetySupervisor,
    telemetry: TelemetryCache,
    predictor: ComfortPredictor,
    trainer: FeedbackTrainer,
    stats: Arc<LinkStats>,
    published: Arc<RwLock<Published>>,
    prediction: Option<PredictionResult>,
    /// Fault mask last reported through the sink.
    reported_faults: u8,
    last_status: Option<String>,
    last_action: Option<String>,
}

impl AppService {
    /// Construct the service around a bootstrapped dataset and model.
    ///
    /// Does **not** start the FSM; call [`start`](Self::start) next.
    pub fn new(
        config: SystemConfig,
        dataset: TrainingDataset,
        model: ModelHandle,
        stats: Arc<LinkStats>,
        now: Instant,
    ) -> Self {
        let ctx = FsmContext::new(&config, now);
        let telemetry = TelemetryCache::new(config.stale_after(), now);
        let trainer =
            FeedbackTrainer::new(dataset, model.clone(), TrainerSettings::from_config(&config));
        Self {
            fsm: Fsm::new(build_state_table(), ControlState::Idle),
            ctx,
            safety: SafetySupervisor::new(),
            telemetry,
            predictor: ComfortPredictor::new(model),
            trainer,
            stats,
            published: Arc::new(RwLock::new(Published::default())),
            prediction: None,
            reported_faults: 0,
            last_status: None,
            last_action: None,
            config,
        }
    }

    pub fn snapshot_handle(&self) -> SnapshotHandle {
        SnapshotHandle {
            published: Arc::clone(&self.published),
            stats: Arc::clone(&self.stats),
            model: self.predictor.handle().clone(),
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in Idle.
    pub fn start(&mut self, sink: &mut impl EventSink) {
        self.fsm.start(&mut self.ctx);
        // The peer boots with its relays released; no command until the
        // first real transition.
        let _ = self.ctx.take_command();
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!(
            "AppService started in {:?} with model v{} ({} samples)",
            self.fsm.current_state(),
            self.predictor.handle().version(),
            self.trainer.dataset().len()
        );
        self.publish();
    }

    /// Join any running retrain and report its outcome.
    pub fn stop(&mut self, store: &mut impl TrainingStore, sink: &mut impl EventSink) {
        if self.trainer.is_retraining() {
            info!("Waiting for in-flight retrain to finish");
        }
        let outcomes = self.trainer.join_pending(store);
        self.report_outcomes(outcomes, sink);
        sink.emit(&AppEvent::Stopped(self.fsm.current_state()));
        info!("AppService stopped in {:?}", self.fsm.current_state());
        self.publish();
    }

    // ── Event handling ────────────────────────────────────────

    /// Consume one event from the link queue.
    pub fn handle_event(
        &mut self,
        event: LinkEvent,
        now: Instant,
        store: &mut impl TrainingStore,
        out: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        match event {
            LinkEvent::Line(line) => {
                self.stats.record_line();
                self.handle_line(line, now, store, out, sink);
            }
            LinkEvent::Rejected(reason) => {
                self.stats.record_line();
                self.discard(None, reason, sink);
            }
            LinkEvent::Feedback(event) => self.on_feedback(event, store, sink),
            LinkEvent::Connection(status) => sink.emit(&AppEvent::ConnectionChanged(status)),
        }
        self.publish();
    }

    fn handle_line(
        &mut self,
        line: String,
        now: Instant,
        store: &mut impl TrainingStore,
        out: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        let inbound = match parse_line(&line) {
            Ok(inbound) => inbound,
            Err(reason) => return self.discard(Some(line), reason, sink),
        };
        match inbound {
            Inbound::Telemetry {
                temperature,
                humidity,
            } => {
                if !self.config.is_plausible(temperature, humidity) {
                    return self.discard(
                        Some(line),
                        ParseError::OutOfRange {
                            temperature,
                            humidity,
                        },
                        sink,
                    );
                }
                self.on_reading(SensorReading::new(temperature, humidity), now, out, sink);
            }
            Inbound::Feedback {
                temperature,
                humidity,
                label,
            } => self.on_feedback(FeedbackEvent::new(temperature, humidity, label), store, sink),
            Inbound::Notice { kind, text } => self.on_notice(kind, text, sink),
        }
    }

    /// Run the full pipeline for one accepted reading:
    /// cache → safety → ensemble → FSM → command.
    fn on_reading(
        &mut self,
        reading: SensorReading,
        now: Instant,
        out: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        self.telemetry.update(reading, now);
        self.stats.record_telemetry();
        sink.emit(&AppEvent::Reading(reading));
        self.safety.evaluate(&self.telemetry, now);

        self.ctx.target = match self.predict(&reading) {
            Some(result) => {
                let target = ControlState::target_for(result.label);
                sink.emit(&AppEvent::Prediction(result.clone()));
                self.prediction = Some(result);
                Some(target)
            }
            None => None,
        };
        self.step_fsm(now, out, sink);
        self.ctx.target = None;
    }

    /// Predict with the live model.  A result the model moved away from
    /// twice is dropped without touching the fault state.
    fn predict(&mut self, reading: &SensorReading) -> Option<PredictionResult> {
        match self.predictor.predict_current(reading) {
            Ok(Some(result)) => {
                self.safety.record_prediction(true);
                Some(result)
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Prediction failed: {e}");
                self.safety.record_prediction(false);
                self.prediction = None;
                None
            }
        }
    }

    fn on_feedback(
        &mut self,
        event: FeedbackEvent,
        store: &mut impl TrainingStore,
        sink: &mut impl EventSink,
    ) {
        if !self.config.is_plausible(event.temperature, event.humidity) {
            let reason = ParseError::OutOfRange {
                temperature: event.temperature,
                humidity: event.humidity,
            };
            return self.discard(None, reason, sink);
        }
        self.stats.record_feedback();
        let label = event.label;
        let retrain_started = self.trainer.record(event, store);
        sink.emit(&AppEvent::FeedbackRecorded {
            label,
            dataset_len: self.trainer.dataset().len(),
            retrain_started,
        });
    }

    fn on_notice(&mut self, kind: NoticeKind, text: String, sink: &mut impl EventSink) {
        let last = match kind {
            NoticeKind::Status => &mut self.last_status,
            NoticeKind::Action => &mut self.last_action,
        };
        if last.as_deref() == Some(text.as_str()) {
            return;
        }
        info!("PEER {kind:?}: {text}");
        *last = Some(text.clone());
        sink.emit(&AppEvent::Notice { kind, text });
    }

    fn discard(&mut self, line: Option<String>, reason: ParseError, sink: &mut impl EventSink) {
        self.stats.record_discard();
        match &line {
            Some(raw) => warn!("Discarded line {raw:?}: {reason}"),
            None => warn!("Discarded input: {reason}"),
        }
        sink.emit(&AppEvent::LineDiscarded { line, reason });
    }

    // ── Periodic work ─────────────────────────────────────────

    /// Staleness check and retrain collection.  Never sets a target, so a
    /// tick can only force Idle, never steer.
    pub fn tick(
        &mut self,
        now: Instant,
        store: &mut impl TrainingStore,
        out: &mut impl CommandPort,
        sink: &mut impl EventSink,
    ) {
        self.safety.evaluate(&self.telemetry, now);
        self.step_fsm(now, out, sink);

        let outcomes = self.trainer.poll(store);
        self.report_outcomes(outcomes, sink);
        self.publish();
    }

    // ── Command handling ──────────────────────────────────────

    /// Process a consumer command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        store: &mut impl TrainingStore,
        sink: &mut impl EventSink,
    ) {
        match cmd {
            AppCommand::Retrain => {
                if !self.trainer.retrain_now() {
                    info!("Retrain request ignored, one is already running");
                }
            }
            AppCommand::SwitchProfile(profile) => {
                match self.trainer.switch_profile(profile, store) {
                    Ok(ProfileSwitch::Unchanged) => {
                        info!("Already seeded from the {profile:?} profile")
                    }
                    Ok(ProfileSwitch::Reseeded {
                        retrain_started, ..
                    }) => {
                        sink.emit(&AppEvent::ProfileSwitched {
                            profile,
                            dataset_len: self.trainer.dataset().len(),
                            retrain_started,
                        })
                    }
                    Err(e) => {
                        warn!("Profile switch to {profile:?} failed, dataset unchanged: {e}")
                    }
                }
            }
            AppCommand::Shutdown => self.stop(store, sink),
        }
        self.publish();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> ControlState {
        self.fsm.current_state()
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.safety.faults()
    }

    pub fn latest_reading(&self) -> Option<&SensorReading> {
        self.telemetry.latest()
    }

    pub fn latest_prediction(&self) -> Option<&PredictionResult> {
        self.prediction.as_ref()
    }

    pub fn model_version(&self) -> u64 {
        self.predictor.handle().version()
    }

    pub fn trainer(&self) -> &FeedbackTrainer {
        &self.trainer
    }

    pub fn transition_count(&self) -> u64 {
        self.fsm.transition_count()
    }

    // ── Internal ──────────────────────────────────────────────

    /// Tick the FSM against the current faults and forward the command
    /// a transition queued.
    fn step_fsm(&mut self, now: Instant, out: &mut impl CommandPort, sink: &mut impl EventSink) {
        let faults = self.safety.faults();
        self.ctx.now = now;
        self.ctx.fault_flags = faults;

        if faults != self.reported_faults {
            if faults == 0 {
                sink.emit(&AppEvent::FaultCleared);
            } else if faults & !self.reported_faults != 0 {
                sink.emit(&AppEvent::FaultDetected(faults));
            }
            self.reported_faults = faults;
        }

        if let Some(t) = self.fsm.tick(&mut self.ctx) {
            sink.emit(&AppEvent::StateChanged {
                from: t.from,
                to: t.to,
                forced: t.forced,
            });
        }
        if let Some(command) = self.ctx.take_command() {
            match out.send(command) {
                Ok(()) => sink.emit(&AppEvent::CommandSent(command)),
                Err(e) => warn!("Command '{command}' not queued: {e}"),
            }
        }
    }

    fn report_outcomes(&mut self, outcomes: Vec<RetrainOutcome>, sink: &mut impl EventSink) {
        for outcome in outcomes {
            match outcome {
                RetrainOutcome::Accepted {
                    model, accuracy, ..
                } => {
                    sink.emit(&AppEvent::ModelSwapped {
                        version: model.version(),
                        accuracy,
                    })
                }
                RetrainOutcome::Rejected(e) => sink.emit(&AppEvent::RetrainRejected(e)),
            }
        }
    }

    fn publish(&self) {
        let mut p = self.published.write();
        p.reading = self.telemetry.latest().copied();
        p.state = Some(self.fsm.current_state());
        p.prediction.clone_from(&self.prediction);
        p.fault_flags = self.safety.faults();
        p.dataset_len = self.trainer.dataset().len();
        p.retraining = self.trainer.is_retraining();
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::adapters::store::MemoryStore;
    use crate::comfort::profile::ComfortProfile;
    use crate::comfort::{EnsembleModel, Member};
    use crate::link::RelayCommand;

    #[derive(Default)]
    struct Sent(Vec<RelayCommand>);

    impl CommandPort for Sent {
        fn send(&mut self, command: RelayCommand) -> Result<(), crate::error::ConnectionError> {
            self.0.push(command);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Events(Vec<AppEvent>);

    impl EventSink for Events {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    fn fixed(profile: ComfortProfile) -> ModelHandle {
        ModelHandle::new(EnsembleModel::from_members(vec![Member::Profile(profile); 4], 1))
    }

    fn service(model: ModelHandle, now: Instant) -> AppService {
        AppService::new(
            SystemConfig::default(),
            TrainingDataset::new(),
            model,
            Arc::new(LinkStats::new()),
            now,
        )
    }

    #[test]
    fn start_sends_nothing() {
        let t0 = Instant::now();
        let mut app = service(fixed(ComfortProfile::Normal), t0);
        let mut sink = Events::default();
        app.start(&mut sink);
        assert_eq!(app.state(), ControlState::Idle);
        assert_eq!(sink.0, vec![AppEvent::Started(ControlState::Idle)]);
    }

    #[test]
    fn implausible_reading_leaves_cache_untouched() {
        let t0 = Instant::now();
        let mut app = service(fixed(ComfortProfile::Normal), t0);
        let (mut store, mut out, mut sink) =
            (MemoryStore::default(), Sent::default(), Events::default());
        app.start(&mut sink);
        app.handle_event(
            LinkEvent::Line("T:120.0,H:50.0".into()),
            t0,
            &mut store,
            &mut out,
            &mut sink,
        );
        assert!(app.latest_reading().is_none());
        assert!(out.0.is_empty());
        assert!(matches!(
            sink.0.last(),
            Some(AppEvent::LineDiscarded {
                reason: ParseError::OutOfRange { .. },
                ..
            })
        ));
    }

    #[test]
    fn repeated_notice_reported_once() {
        let t0 = Instant::now();
        let mut app = service(fixed(ComfortProfile::Normal), t0);
        let (mut store, mut out, mut sink) =
            (MemoryStore::default(), Sent::default(), Events::default());
        for _ in 0..3 {
            app.handle_event(
                LinkEvent::Line("Status: fan on".into()),
                t0,
                &mut store,
                &mut out,
                &mut sink,
            );
        }
        let notices = sink.0.iter().filter(|e| matches!(e, AppEvent::Notice { .. })).count();
        assert_eq!(notices, 1);
    }

    #[test]
    fn tick_without_readings_faults_but_stays_idle() {
        let t0 = Instant::now();
        let mut app = service(fixed(ComfortProfile::Normal), t0);
        let (mut store, mut out, mut sink) =
            (MemoryStore::default(), Sent::default(), Events::default());
        app.start(&mut sink);
        app.tick(t0 + Duration::from_secs(4), &mut store, &mut out, &mut sink);
        assert_eq!(app.fault_flags(), 1);
        assert_eq!(app.state(), ControlState::Idle);
        assert!(out.0.is_empty());
    }

    #[test]
    fn snapshot_reflects_latest_reading() {
        let t0 = Instant::now();
        let mut app = service(fixed(ComfortProfile::ColdSensitive), t0);
        let handle = app.snapshot_handle();
        let (mut store, mut out, mut sink) =
            (MemoryStore::default(), Sent::default(), Events::default());
        app.start(&mut sink);
        app.handle_event(
            LinkEvent::Line("T:22.5,H:40.0".into()),
            t0,
            &mut store,
            &mut out,
            &mut sink,
        );

        let snap = handle.get();
        assert_eq!(snap.state, ControlState::Heating);
        assert_eq!(snap.reading.map(|r| r.temperature), Some(22.5));
        assert_eq!(snap.model_version, 1);
        assert_eq!(snap.link.telemetry_accepted, 1);
        assert_eq!(out.0, vec![RelayCommand::Cold]);
    }
}
