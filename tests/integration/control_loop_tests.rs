//! Control loop end to end: injected lines → service → recorded commands.

use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use comfortlink::adapters::replay;
use comfortlink::adapters::store::MemoryStore;
use comfortlink::app::control_loop::{ControlHandle, ControlLoop, StopReason};
use comfortlink::app::events::AppEvent;
use comfortlink::app::service::AppService;
use comfortlink::comfort::profile::ComfortProfile;
use comfortlink::comfort::{
    ComfortLabel, EnsembleModel, FeedbackEvent, Member, ModelHandle, TrainingDataset,
};
use comfortlink::config::SystemConfig;
use comfortlink::diagnostics::{ConnectionStatus, LinkStats};
use comfortlink::events::{EventInjector, LinkEvent, link_queue};
use comfortlink::fsm::ControlState;
use comfortlink::link::RelayCommand;

use crate::mock_link::{RecordingRelay, RecordingSink};

type Loop = ControlLoop<MemoryStore, RecordingRelay, RecordingSink>;

fn build(profile: ComfortProfile) -> (Loop, Sender<LinkEvent>, ControlHandle) {
    let config = SystemConfig::default();
    let model = EnsembleModel::from_members(vec![Member::Profile(profile); 4], 1);
    let service = AppService::new(
        config.clone(),
        TrainingDataset::new(),
        ModelHandle::new(model),
        Arc::new(LinkStats::new()),
        Instant::now(),
    );
    let (tx, rx) = link_queue();
    let (control, handle) = ControlLoop::new(
        service,
        rx,
        config.staleness_check_interval(),
        MemoryStore::default(),
        RecordingRelay::default(),
        RecordingSink::default(),
    );
    (control, tx, handle)
}

#[test]
fn replay_capture_runs_to_completion() {
    let (mut control, tx, _handle) = build(ComfortProfile::ColdSensitive);
    let injector = EventInjector::new(tx);
    let capture = "\
Status: booting
T:22.5,H:40.0
garbage line
T:22.6,H:40.0
Action: relay A on
USER_FEEDBACK:22.6,40.0,cold
";
    let fed = replay::feed(capture.as_bytes(), &injector, Duration::ZERO).unwrap();
    assert_eq!(fed, 6);
    drop(injector);

    assert_eq!(control.run(None), StopReason::QueueClosed);
    let snapshot = control.snapshot_handle().get();
    let (service, store, relay, sink) = control.into_parts();

    assert_eq!(service.state(), ControlState::Heating);
    assert_eq!(relay.sent, vec![RelayCommand::Cold]);
    assert_eq!(store.feedback_appended(), 1);
    assert_eq!(snapshot.link.lines_received, 6);
    assert_eq!(snapshot.link.lines_discarded, 1);
    assert_eq!(snapshot.link.telemetry_accepted, 2);
    assert_eq!(snapshot.dataset_len, 1);
    assert!(matches!(sink.events.first(), Some(AppEvent::Started(ControlState::Idle))));
    assert!(matches!(sink.events.last(), Some(AppEvent::Stopped(ControlState::Heating))));
}

#[test]
fn injected_feedback_shares_the_queue() {
    let (mut control, tx, _handle) = build(ComfortProfile::Normal);
    let injector = EventInjector::new(tx);
    assert!(injector.inject_feedback(FeedbackEvent::new(30.0, 60.0, ComfortLabel::Hot)));
    assert!(injector.inject_line("USER_FEEDBACK:18.0,45.0,cold"));
    drop(injector);

    control.run(None);
    let labels: Vec<ComfortLabel> = control
        .service()
        .trainer()
        .dataset()
        .events()
        .iter()
        .map(|e| e.label)
        .collect();
    assert_eq!(labels, vec![ComfortLabel::Hot, ComfortLabel::Cold]);
}

#[test]
fn handle_stops_a_running_loop() {
    let (control, tx, handle) = build(ComfortProfile::Normal);
    let injector = EventInjector::new(tx);
    let runner = std::thread::spawn(move || {
        let mut control = control;
        control.run(None)
    });

    assert!(injector.inject_line("T:22.0,H:45.0"));
    std::thread::sleep(Duration::from_millis(50));
    assert!(handle.shutdown());
    assert_eq!(runner.join().unwrap(), StopReason::Requested);
    // The loop is gone; further injection reports it.
    assert!(!injector.inject_line("T:22.0,H:45.0"));
}

#[test]
fn deadline_bounds_the_run() {
    let (mut control, _tx, _handle) = build(ComfortProfile::Normal);
    let started = Instant::now();
    let reason = control.run(Some(Instant::now() + Duration::from_millis(300)));
    assert_eq!(reason, StopReason::Deadline);
    assert!(started.elapsed() >= Duration::from_millis(300));

    let (service, _, relay, _) = control.into_parts();
    assert_eq!(service.state(), ControlState::Idle);
    assert!(relay.sent.is_empty());
}

#[test]
fn connection_changes_reach_the_sink() {
    let (mut control, tx, _handle) = build(ComfortProfile::Normal);
    tx.send(LinkEvent::Connection(ConnectionStatus::Connecting)).unwrap();
    tx.send(LinkEvent::Connection(ConnectionStatus::Connected)).unwrap();
    drop(tx);

    control.run(None);
    let (_, _, _, sink) = control.into_parts();
    let seen: Vec<ConnectionStatus> = sink
        .events
        .iter()
        .filter_map(|e| match e {
            AppEvent::ConnectionChanged(s) => Some(*s),
            _ => None,
        })
        .collect();
    assert_eq!(seen, vec![ConnectionStatus::Connecting, ConnectionStatus::Connected]);
}

#[test]
fn handle_switches_profile_through_the_loop() {
    // The link side stays open so only the deadline ends the run.
    let (mut control, _tx, handle) = build(ComfortProfile::Normal);
    assert!(handle.switch_profile(ComfortProfile::ColdSensitive));

    let deadline = Instant::now() + Duration::from_millis(200);
    assert_eq!(control.run(Some(deadline)), StopReason::Deadline);
    let (service, _, _, sink) = control.into_parts();
    assert_eq!(service.trainer().dataset().seed_profile(), Some(ComfortProfile::ColdSensitive));
    assert!(sink.events.iter().any(|e| matches!(
        e,
        AppEvent::ProfileSwitched {
            profile: ComfortProfile::ColdSensitive,
            dataset_len: 500,
            ..
        }
    )));
}

#[cfg(unix)]
#[test]
fn termination_signal_stops_the_loop_cleanly() {
    let (control, tx, handle) = build(ComfortProfile::ColdSensitive);
    handle.shutdown_on_signal().unwrap();
    let injector = EventInjector::new(tx);
    let snapshot = control.snapshot_handle();
    let runner = std::thread::spawn(move || {
        let mut control = control;
        let reason = control.run(None);
        (reason, control.into_parts())
    });

    assert!(injector.inject_line("T:22.5,H:40.0"));
    let deadline = Instant::now() + Duration::from_secs(2);
    while snapshot.get().state != ControlState::Heating && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }

    let pid = std::process::id().to_string();
    let status = std::process::Command::new("kill")
        .args(["-TERM", &pid])
        .status()
        .unwrap();
    assert!(status.success());

    let (reason, (_, _, relay, sink)) = runner.join().unwrap();
    assert_eq!(reason, StopReason::Requested);
    assert_eq!(relay.sent, vec![RelayCommand::Cold]);
    assert!(matches!(sink.events.last(), Some(AppEvent::Stopped(ControlState::Heating))));
}
