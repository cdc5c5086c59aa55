//! Control loop: drives [`AppService`] from the link-event queue.
//!
//! ```text
//!  LinkEvent queue ──┐
//!                    ├──▶ select ──▶ AppService::handle_event
//!  AppCommand chan ──┤               AppService::handle_command
//!                    └── timeout ──▶ AppService::tick (staleness, retrains)
//! ```
//!
//! Events are consumed one at a time, in arrival order.  The loop ends
//! when a [`ControlHandle`] asks it to, when the deadline passes, or when
//! every event producer has gone away (end of replay).

use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, select};
use log::{debug, info, warn};

use crate::comfort::profile::ComfortProfile;
use crate::events::LinkEvent;

use super::commands::AppCommand;
use super::ports::{CommandPort, EventSink, TrainingStore};
use super::service::{AppService, SnapshotHandle};

/// Why [`ControlLoop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Requested,
    Deadline,
    /// Every event producer disconnected and the queue is drained.
    QueueClosed,
}

/// Cloneable remote for a running [`ControlLoop`].
#[derive(Debug, Clone)]
pub struct ControlHandle {
    tx: Sender<AppCommand>,
}

impl ControlHandle {
    /// Ask the loop to stop.  Returns `false` if it already has.
    pub fn shutdown(&self) -> bool {
        self.tx.send(AppCommand::Shutdown).is_ok()
    }

    /// Ask for an immediate retrain.
    pub fn retrain(&self) -> bool {
        self.tx.send(AppCommand::Retrain).is_ok()
    }

    /// Re-seed from `profile` and retrain.
    pub fn switch_profile(&self, profile: ComfortProfile) -> bool {
        self.tx.send(AppCommand::SwitchProfile(profile)).is_ok()
    }

    /// Turn SIGINT and SIGTERM (Ctrl-C on Windows) into [`shutdown`](Self::shutdown).
    ///
    /// Only one handler can be installed per process.
    pub fn shutdown_on_signal(&self) -> Result<(), ctrlc::Error> {
        let handle = self.clone();
        ctrlc::set_handler(move || {
            info!("Signal received, shutting down");
            if !handle.shutdown() {
                warn!("Control loop already stopped");
            }
        })
    }
}

pub struct ControlLoop<S, O, K> {
    service: AppService,
    store: S,
    out: O,
    sink: K,
    events: Receiver<LinkEvent>,
    commands: Receiver<AppCommand>,
    /// Held so the command channel never reads as disconnected.
    _commands_tx: Sender<AppCommand>,
    check_interval: Duration,
}

impl<S, O, K> ControlLoop<S, O, K>
where
    S: TrainingStore,
    O: CommandPort,
    K: EventSink,
{
    pub fn new(
        service: AppService,
        events: Receiver<LinkEvent>,
        check_interval: Duration,
        store: S,
        out: O,
        sink: K,
    ) -> (Self, ControlHandle) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let handle = ControlHandle { tx: tx.clone() };
        let this = Self {
            service,
            store,
            out,
            sink,
            events,
            commands: rx,
            _commands_tx: tx,
            check_interval,
        };
        (this, handle)
    }

    pub fn snapshot_handle(&self) -> SnapshotHandle {
        self.service.snapshot_handle()
    }

    /// Run until stopped.  `deadline` bounds the run (`run --duration`).
    pub fn run(&mut self, deadline: Option<Instant>) -> StopReason {
        self.service.start(&mut self.sink);
        let mut next_check = Instant::now() + self.check_interval;

        let reason = loop {
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                break StopReason::Deadline;
            }
            let wake = deadline.map_or(next_check, |d| d.min(next_check));
            let timeout = wake.saturating_duration_since(now);

            select! {
                recv(self.commands) -> cmd => match cmd {
                    Ok(AppCommand::Shutdown) | Err(_) => break StopReason::Requested,
                    Ok(cmd) => self.service.handle_command(cmd, &mut self.store, &mut self.sink),
                },
                recv(self.events) -> event => match event {
                    Ok(event) => self.service.handle_event(
                        event,
                        Instant::now(),
                        &mut self.store,
                        &mut self.out,
                        &mut self.sink,
                    ),
                    Err(_) => break StopReason::QueueClosed,
                },
                default(timeout) => {}
            }

            let now = Instant::now();
            if now >= next_check {
                self.service
                    .tick(now, &mut self.store, &mut self.out, &mut self.sink);
                next_check = now + self.check_interval;
            }
        };

        debug!("Control loop leaving: {reason:?}");
        self.service.stop(&mut self.store, &mut self.sink);
        info!("Control loop stopped ({reason:?})");
        reason
    }

    pub fn service(&self) -> &AppService {
        &self.service
    }

    /// Hand back the adapters, e.g. to inspect a recording sink.
    pub fn into_parts(self) -> (AppService, S, O, K) {
        (self.service, self.store, self.out, self.sink)
    }
}
