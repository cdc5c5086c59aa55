//! Link I/O thread against a scripted peer: framing, writes, reconnects.

use std::sync::Arc;
use std::time::{Duration, Instant};

use comfortlink::diagnostics::{ConnectionStatus, LinkStats};
use comfortlink::error::ParseError;
use comfortlink::events::{LinkEvent, link_queue};
use comfortlink::link::codec::MAX_LINE_LEN;
use comfortlink::link::{LinkSettings, RelayCommand, io_task};

use crate::mock_link::{PeerScript, ScriptedConnector};

const WAIT: Duration = Duration::from_secs(2);

fn fast() -> LinkSettings {
    LinkSettings {
        reconnect_initial: Duration::from_millis(10),
        reconnect_max: Duration::from_millis(40),
    }
}

fn lines(rx: &crossbeam_channel::Receiver<LinkEvent>, n: usize) -> Vec<LinkEvent> {
    let deadline = Instant::now() + WAIT;
    let mut got = Vec::new();
    while got.len() < n {
        match rx.recv_deadline(deadline) {
            Ok(LinkEvent::Connection(_)) => {}
            Ok(event) => got.push(event),
            Err(_) => break,
        }
    }
    got
}

#[test]
fn split_chunks_are_reassembled_in_order() {
    let script = PeerScript::default();
    script.push(b"T:21.");
    script.push(b"5,H:45.0\r\nStatus: re");
    script.push(b"ady\nUSER_FEEDBACK:19.0,55.0,cold\n");

    let (tx, rx) = link_queue();
    let stats = Arc::new(LinkStats::new());
    let link = io_task::spawn(ScriptedConnector::new(script), tx, stats, fast()).unwrap();

    assert_eq!(
        lines(&rx, 3),
        vec![
            LinkEvent::Line("T:21.5,H:45.0".into()),
            LinkEvent::Line("Status: ready".into()),
            LinkEvent::Line("USER_FEEDBACK:19.0,55.0,cold".into()),
        ]
    );
    link.shutdown();
}

#[test]
fn overlong_line_is_rejected_once() {
    let script = PeerScript::default();
    let mut noise = vec![b'x'; MAX_LINE_LEN + 50];
    noise.push(b'\n');
    script.push(&noise);
    script.push(b"T:20.0,H:50.0\n");

    let (tx, rx) = link_queue();
    let stats = Arc::new(LinkStats::new());
    let link = io_task::spawn(ScriptedConnector::new(script), tx, stats, fast()).unwrap();

    let got = lines(&rx, 2);
    assert!(matches!(got[0], LinkEvent::Rejected(ParseError::TooLong(_))));
    assert_eq!(got[1], LinkEvent::Line("T:20.0,H:50.0".into()));
    link.shutdown();
}

#[test]
fn commands_are_written_and_flushed_on_shutdown() {
    let script = PeerScript::default();
    let (tx, _rx) = link_queue();
    let stats = Arc::new(LinkStats::new());
    let connector = ScriptedConnector::new(script.clone());
    let link = io_task::spawn(connector, tx, Arc::clone(&stats), fast()).unwrap();

    let commands = link.commands();
    commands.send(RelayCommand::Cold).unwrap();
    commands.send(RelayCommand::Comfortable).unwrap();
    link.shutdown();

    assert_eq!(script.written_text(), "cold\ncomfortable\n");
    assert_eq!(stats.snapshot().commands_sent, 2);
    assert_eq!(stats.status(), ConnectionStatus::Disconnected);
}

#[test]
fn refused_connections_back_off_then_connect() {
    let script = PeerScript::default();
    let mut connector = ScriptedConnector::new(script.clone());
    connector.refuse_first = 3;

    let (tx, rx) = link_queue();
    let stats = Arc::new(LinkStats::new());
    let link = io_task::spawn(connector, tx, Arc::clone(&stats), fast()).unwrap();

    assert!(script.wait_for(WAIT, |s| s.connects() >= 4));
    assert!(script.wait_for(WAIT, |_| stats.status() == ConnectionStatus::Connected));
    assert_eq!(stats.snapshot().reconnect_attempts, 3);
    assert!(stats.snapshot().connected_since.is_some());

    let deadline = Instant::now() + WAIT;
    let mut statuses = Vec::new();
    while statuses.last() != Some(&ConnectionStatus::Connected) {
        match rx.recv_deadline(deadline) {
            Ok(LinkEvent::Connection(s)) => statuses.push(s),
            Ok(_) => {}
            Err(_) => break,
        }
    }
    assert_eq!(statuses.last(), Some(&ConnectionStatus::Connected));
    assert!(statuses.contains(&ConnectionStatus::Disconnected));
    link.shutdown();
}

#[test]
fn command_during_outage_is_sent_after_reconnect() {
    let script = PeerScript::default();
    let mut connector = ScriptedConnector::new(script.clone());
    connector.refuse_first = 1;

    let (tx, _rx) = link_queue();
    let settings = LinkSettings {
        reconnect_initial: Duration::from_millis(150),
        reconnect_max: Duration::from_millis(150),
    };
    let link = io_task::spawn(connector, tx, Arc::new(LinkStats::new()), settings).unwrap();
    link.commands().send(RelayCommand::Hot).unwrap();

    assert!(script.wait_for(WAIT, |s| s.written_text() == "hot\n"));
    link.shutdown();
}

#[test]
fn lost_link_reconnects() {
    let script = PeerScript::default();
    script.push(b"T:20.0,H:50.0\n");
    let mut connector = ScriptedConnector::new(script.clone());
    connector.drop_when_drained = true;

    let (tx, rx) = link_queue();
    let link = io_task::spawn(connector, tx, Arc::new(LinkStats::new()), fast()).unwrap();

    assert_eq!(lines(&rx, 1), vec![LinkEvent::Line("T:20.0,H:50.0".into())]);
    assert!(script.wait_for(WAIT, |s| s.connects() >= 3));
    link.shutdown();
}

#[test]
fn shutdown_interrupts_backoff() {
    let script = PeerScript::default();
    let mut connector = ScriptedConnector::new(script.clone());
    connector.refuse_first = usize::MAX;

    let (tx, _rx) = link_queue();
    let settings = LinkSettings {
        reconnect_initial: Duration::from_secs(30),
        reconnect_max: Duration::from_secs(30),
    };
    let link = io_task::spawn(connector, tx, Arc::new(LinkStats::new()), settings).unwrap();
    assert!(script.wait_for(WAIT, |s| s.connects() == 1));

    let started = Instant::now();
    link.shutdown();
    assert!(started.elapsed() < Duration::from_secs(1));
}
