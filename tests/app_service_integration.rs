//! Integration tests: line → AppService → ensemble → FSM → relay command.

use std::sync::Arc;
use std::time::{Duration, Instant};

use comfortlink::adapters::store::MemoryStore;
use comfortlink::app::commands::AppCommand;
use comfortlink::app::events::AppEvent;
use comfortlink::app::ports::{CommandPort, EventSink, TrainingStore};
use comfortlink::app::service::AppService;
use comfortlink::comfort::profile::ComfortProfile;
use comfortlink::comfort::{
    ComfortLabel, EnsembleModel, FeedbackEvent, Member, ModelHandle, TrainingDataset,
};
use comfortlink::config::SystemConfig;
use comfortlink::diagnostics::LinkStats;
use comfortlink::error::{ConnectionError, TrainingError};
use comfortlink::events::LinkEvent;
use comfortlink::fsm::ControlState;
use comfortlink::link::RelayCommand;

// ── Mock implementations ──────────────────────────────────────

#[derive(Default)]
struct MockRelay {
    sent: Vec<RelayCommand>,
}

impl CommandPort for MockRelay {
    fn send(&mut self, command: RelayCommand) -> Result<(), ConnectionError> {
        self.sent.push(command);
        Ok(())
    }
}

#[derive(Default)]
struct RecordingSink {
    events: Vec<AppEvent>,
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

impl RecordingSink {
    fn transitions(&self) -> Vec<(ControlState, ControlState, bool)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                AppEvent::StateChanged { from, to, forced } => Some((*from, *to, *forced)),
                _ => None,
            })
            .collect()
    }
}

struct Rig {
    app: AppService,
    store: MemoryStore,
    relay: MockRelay,
    sink: RecordingSink,
    t0: Instant,
}

impl Rig {
    fn new(model: EnsembleModel, dataset: TrainingDataset) -> Self {
        Self::with_handle(ModelHandle::new(model), dataset)
    }

    fn with_handle(model: ModelHandle, dataset: TrainingDataset) -> Self {
        let t0 = Instant::now();
        let mut app = AppService::new(
            SystemConfig::default(),
            dataset,
            model,
            Arc::new(LinkStats::new()),
            t0,
        );
        let mut sink = RecordingSink::default();
        app.start(&mut sink);
        Self {
            app,
            store: MemoryStore::default(),
            relay: MockRelay::default(),
            sink,
            t0,
        }
    }

    /// Three cold-sensitive voters and one normal voter.
    fn scenario_a() -> Self {
        let mut members = vec![Member::Profile(ComfortProfile::ColdSensitive); 3];
        members.push(Member::Profile(ComfortProfile::Normal));
        Self::new(EnsembleModel::from_members(members, 1), TrainingDataset::new())
    }

    fn line(&mut self, text: &str, at: Duration) {
        self.app.handle_event(
            LinkEvent::Line(text.to_string()),
            self.t0 + at,
            &mut self.store,
            &mut self.relay,
            &mut self.sink,
        );
    }

    fn tick(&mut self, at: Duration) {
        self.app
            .tick(self.t0 + at, &mut self.store, &mut self.relay, &mut self.sink);
    }
}

fn secs(s: f32) -> Duration {
    Duration::from_secs_f32(s)
}

fn seeded() -> TrainingDataset {
    TrainingDataset::from_events(ComfortProfile::Normal.seed_samples(chrono::Utc::now()))
}

// ── Scenario A: cold majority heats ───────────────────────────

#[test]
fn cold_majority_enters_heating_and_sends_cold() {
    let mut rig = Rig::scenario_a();
    rig.line("T:22.5,H:40.0", secs(0.0));

    let p = rig.app.latest_prediction().unwrap();
    assert_eq!(p.label, ComfortLabel::Cold);
    assert!((p.vote_fraction - 0.75).abs() < f32::EPSILON);
    assert_eq!(rig.app.state(), ControlState::Heating);
    assert_eq!(rig.relay.sent, vec![RelayCommand::Cold]);
    assert_eq!(
        rig.sink.transitions(),
        vec![(ControlState::Idle, ControlState::Heating, false)]
    );
}

#[test]
fn repeated_prediction_sends_no_duplicate_command() {
    let mut rig = Rig::scenario_a();
    for i in 0..5 {
        rig.line("T:22.5,H:40.0", secs(i as f32));
    }
    assert_eq!(rig.relay.sent, vec![RelayCommand::Cold]);
    assert_eq!(rig.app.transition_count(), 1);
}

// ── Dwell ─────────────────────────────────────────────────────

#[test]
fn unforced_transition_waits_for_dwell() {
    let mut rig = Rig::scenario_a();
    rig.line("T:22.5,H:40.0", secs(0.0));
    assert_eq!(rig.app.state(), ControlState::Heating);

    // Every voter calls 35 °C / 70 % hot, but dwell has not elapsed.
    for s in 1..30 {
        rig.line("T:35.0,H:70.0", secs(s as f32));
    }
    assert_eq!(rig.app.state(), ControlState::Heating);

    rig.line("T:35.0,H:70.0", secs(30.0));
    assert_eq!(rig.app.state(), ControlState::Cooling);
    assert_eq!(rig.relay.sent, vec![RelayCommand::Cold, RelayCommand::Hot]);
}

// ── Scenario B: staleness forces Idle ─────────────────────────

#[test]
fn stale_telemetry_forces_idle_inside_dwell() {
    let mut rig = Rig::scenario_a();
    rig.line("T:22.5,H:40.0", secs(0.0));
    assert_eq!(rig.app.state(), ControlState::Heating);

    rig.tick(secs(2.9));
    assert_eq!(rig.app.state(), ControlState::Heating, "not stale yet");

    rig.tick(secs(3.1));
    assert_eq!(rig.app.state(), ControlState::Idle);
    assert_eq!(rig.relay.sent, vec![RelayCommand::Cold, RelayCommand::Comfortable]);
    assert_eq!(
        rig.sink.transitions().last(),
        Some(&(ControlState::Heating, ControlState::Idle, true))
    );
    assert!(rig.sink.events.contains(&AppEvent::FaultDetected(1)));
}

#[test]
fn recovery_after_staleness_respects_dwell_from_forced_idle() {
    let mut rig = Rig::scenario_a();
    rig.line("T:22.5,H:40.0", secs(0.0));
    rig.tick(secs(3.5));
    assert_eq!(rig.app.state(), ControlState::Idle);

    // Fresh reading clears the fault but the forced transition reset dwell.
    rig.line("T:22.5,H:40.0", secs(4.0));
    assert_eq!(rig.app.fault_flags(), 0);
    assert_eq!(rig.app.state(), ControlState::Idle);
    assert!(rig.sink.events.contains(&AppEvent::FaultCleared));

    rig.line("T:22.5,H:40.0", secs(33.5));
    assert_eq!(rig.app.state(), ControlState::Heating);
}

#[test]
fn prediction_failure_forces_idle() {
    let handle = ModelHandle::new(EnsembleModel::from_members(
        vec![Member::Profile(ComfortProfile::ColdSensitive); 4],
        1,
    ));
    let mut rig = Rig::with_handle(handle.clone(), TrainingDataset::new());
    rig.line("T:22.5,H:40.0", secs(0.0));
    assert_eq!(rig.app.state(), ControlState::Heating);

    // A one-member ensemble breaks the voting contract.
    let broken =
        EnsembleModel::from_members(vec![Member::Profile(ComfortProfile::ColdSensitive)], 2);
    assert!(handle.swap(broken).is_some());

    rig.line("T:22.5,H:40.0", secs(1.0));
    assert_eq!(rig.app.state(), ControlState::Idle);
    assert_eq!(rig.app.fault_flags(), 2);
    assert!(rig.app.latest_prediction().is_none());
    assert_eq!(rig.relay.sent, vec![RelayCommand::Cold, RelayCommand::Comfortable]);
}

// ── Idempotence of discarded lines ────────────────────────────

#[test]
fn malformed_lines_change_nothing() {
    let mut rig = Rig::scenario_a();
    rig.line("T:22.5,H:40.0", secs(0.0));
    let reading = rig.app.latest_reading().copied();
    let dataset_len = rig.app.trainer().dataset().len();

    for bad in [
        "T:abc,H:50",
        "garbage",
        "T:22.5",
        "USER_FEEDBACK:19.0,55.0,lukewarm",
        "T:900.0,H:50.0",
    ] {
        rig.line(bad, secs(1.0));
        rig.line(bad, secs(1.5));
    }

    assert_eq!(rig.app.latest_reading().copied(), reading);
    assert_eq!(rig.app.state(), ControlState::Heating);
    assert_eq!(rig.app.trainer().dataset().len(), dataset_len);
    assert_eq!(rig.relay.sent.len(), 1);
    let discarded = rig
        .sink
        .events
        .iter()
        .filter(|e| matches!(e, AppEvent::LineDiscarded { .. }))
        .count();
    assert_eq!(discarded, 10);
}

// ── Scenario D: feedback appended verbatim ────────────────────

#[test]
fn feedback_line_appends_exactly_one_event() {
    let mut rig = Rig::new(
        EnsembleModel::from_members(vec![Member::Profile(ComfortProfile::Normal); 4], 1),
        seeded(),
    );
    let before = rig.app.trainer().dataset().len();
    rig.line("USER_FEEDBACK:19.0,55.0,cold", secs(0.0));

    let events = rig.app.trainer().dataset().events();
    assert_eq!(events.len(), before + 1);
    let last = events.last().unwrap();
    assert_eq!((last.temperature, last.humidity, last.label), (19.0, 55.0, ComfortLabel::Cold));
    assert_eq!(rig.store.feedback_appended(), 1);
    assert_eq!(rig.app.state(), ControlState::Idle, "feedback never actuates");
}

// ── Scenario C: retrain after ten feedback events ─────────────

#[test]
fn tenth_feedback_retrains_and_swaps_version() {
    let dataset = seeded();
    let model = EnsembleModel::train(dataset.events(), 1, 42).unwrap();
    let mut rig = Rig::new(model, dataset);

    for i in 0..10 {
        rig.line(&format!("USER_FEEDBACK:{:.1},40.0,cold", 5.0 + i as f32 * 0.5), secs(i as f32));
    }
    assert!(matches!(
        rig.sink.events.last(),
        Some(AppEvent::FeedbackRecorded {
            retrain_started: true,
            ..
        })
    ));

    rig.app.stop(&mut rig.store, &mut rig.sink);
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::ModelSwapped { version: 2, .. })));
    assert_eq!(rig.app.model_version(), 2);
    assert!(rig.store.load_model().is_ok());

    rig.line("T:20.0,H:50.0", secs(11.0));
    assert_eq!(rig.app.latest_prediction().unwrap().model_version, 2);
}

#[test]
fn failed_validation_keeps_live_version() {
    let scrambled: Vec<FeedbackEvent> = seeded()
        .events()
        .iter()
        .enumerate()
        .map(|(i, e)| {
            FeedbackEvent::at(e.temperature, e.humidity, ComfortLabel::ALL[i % 3], e.observed_at)
        })
        .collect();
    let mut rig = Rig::new(
        EnsembleModel::from_members(vec![Member::Profile(ComfortProfile::Normal); 4], 1),
        TrainingDataset::from_events(scrambled),
    );

    for i in 0..10 {
        let label = ComfortLabel::ALL[i % 3];
        rig.line(&format!("USER_FEEDBACK:{}.0,50.0,{label}", 10 + i), secs(i as f32));
    }
    rig.app.stop(&mut rig.store, &mut rig.sink);

    assert_eq!(rig.app.model_version(), 1);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::RetrainRejected(TrainingError::ValidationFailed { .. })
    )));
    assert_eq!(rig.store.models_saved(), 0);
}

// ── Runtime profile switch ────────────────────────────────────

#[test]
fn profile_switch_keeps_feedback_and_retrains() {
    let dataset = seeded();
    let model = EnsembleModel::train(dataset.events(), 1, 42).unwrap();
    let mut rig = Rig::new(model, dataset);
    rig.line("USER_FEEDBACK:19.0,55.0,cold", secs(0.0));
    rig.line("USER_FEEDBACK:31.0,70.0,hot", secs(1.0));

    rig.app.handle_command(
        AppCommand::SwitchProfile(ComfortProfile::HeatSensitive),
        &mut rig.store,
        &mut rig.sink,
    );
    assert_eq!(
        rig.sink.events.last(),
        Some(&AppEvent::ProfileSwitched {
            profile: ComfortProfile::HeatSensitive,
            dataset_len: 502,
            retrain_started: true,
        })
    );
    let stored = rig.store.load_dataset().unwrap();
    assert_eq!(stored.len(), 502);
    let feedback: Vec<ComfortLabel> = stored
        .iter()
        .filter(|e| e.is_feedback())
        .map(|e| e.label)
        .collect();
    assert_eq!(feedback, vec![ComfortLabel::Cold, ComfortLabel::Hot]);

    rig.app.stop(&mut rig.store, &mut rig.sink);
    assert!(rig
        .sink
        .events
        .iter()
        .any(|e| matches!(e, AppEvent::ModelSwapped { version: 2, .. })));

    // 20 °C / 50 % reads comfortable under Normal, hot under HeatSensitive.
    rig.line("T:20.0,H:50.0", secs(2.0));
    let p = rig.app.latest_prediction().unwrap();
    assert_eq!((p.label, p.model_version), (ComfortLabel::Hot, 2));
}

#[test]
fn switching_to_the_seeded_profile_changes_nothing() {
    let dataset = seeded();
    let model = EnsembleModel::train(dataset.events(), 1, 42).unwrap();
    let mut rig = Rig::new(model, dataset);
    let before = rig.sink.events.len();

    rig.app.handle_command(
        AppCommand::SwitchProfile(ComfortProfile::Normal),
        &mut rig.store,
        &mut rig.sink,
    );
    assert_eq!(rig.sink.events.len(), before);
    assert!(!rig.app.trainer().is_retraining());
    assert_eq!(rig.app.model_version(), 1);
}
