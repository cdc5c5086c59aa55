//! Function-pointer finite state machine engine for relay actuation.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  StateTable                                              │
//! │  ┌─────────┬───────────┬──────────┬───────────────────┐  │
//! │  │ State   │ on_enter  │ on_exit  │ on_update         │  │
//! │  ├─────────┼───────────┼──────────┼───────────────────┤  │
//! │  │ Idle    │ fn(ctx)   │ none     │ fn(ctx)->Option<> │  │
//! │  │ Heating │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  │ Cooling │ fn(ctx)   │ fn(ctx)  │ fn(ctx)->Option<> │  │
//! │  └─────────┴───────────┴──────────┴───────────────────┘  │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each tick the engine calls `on_update` for the **current** state.  If
//! it returns `Some(next)`, the engine runs `on_exit` for the current
//! state, then `on_enter` for the next, stamps the transition time, and
//! reports a [`Transition`].  `on_enter` queues exactly one relay command
//! in the context, so every accepted transition emits exactly one command.

pub mod context;
pub mod states;

use std::time::Instant;

use context::FsmContext;
use log::{info, warn};
use serde::Serialize;

use crate::comfort::ComfortLabel;
use crate::link::codec::RelayCommand;

// ---------------------------------------------------------------------------
// State identity
// ---------------------------------------------------------------------------

/// Actuation state.  Must stay in sync with [`states::build_state_table`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u8)]
pub enum ControlState {
    Idle = 0,
    Heating = 1,
    Cooling = 2,
}

impl ControlState {
    pub const COUNT: usize = 3;

    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::Idle,
            1 => Self::Heating,
            2 => Self::Cooling,
            _ => {
                debug_assert!(false, "invalid state index: {idx}");
                Self::Idle
            }
        }
    }

    /// Where a predicted label steers the relays.
    pub const fn target_for(label: ComfortLabel) -> Self {
        match label {
            ComfortLabel::Cold => Self::Heating,
            ComfortLabel::Hot => Self::Cooling,
            ComfortLabel::Comfortable => Self::Idle,
        }
    }

    /// Command the peer expects on entering this state.
    ///
    /// The peer names commands after the complaint being answered, so
    /// heating is requested with `cold`.
    pub const fn command(self) -> RelayCommand {
        match self {
            Self::Idle => RelayCommand::Comfortable,
            Self::Heating => RelayCommand::Cold,
            Self::Cooling => RelayCommand::Hot,
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Signature for `on_enter` and `on_exit` actions.
pub type StateActionFn = fn(&mut FsmContext);

/// Per-tick update handler.  Returns `Some(next)` to transition.
pub type StateUpdateFn = fn(&mut FsmContext) -> Option<ControlState>;

/// One row in the state table.
pub struct StateDescriptor {
    pub id: ControlState,
    pub name: &'static str,
    pub on_enter: Option<StateActionFn>,
    pub on_exit: Option<StateActionFn>,
    pub on_update: StateUpdateFn,
}

/// An accepted state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ControlState,
    pub to: ControlState,
    pub at: Instant,
    /// Taken because of a safety fault, bypassing dwell time.
    pub forced: bool,
}

// ---------------------------------------------------------------------------
// FSM engine
// ---------------------------------------------------------------------------

pub struct Fsm {
    table: [StateDescriptor; ControlState::COUNT],
    current: usize,
    transitions: u64,
}

impl Fsm {
    pub fn new(table: [StateDescriptor; ControlState::COUNT], initial: ControlState) -> Self {
        Self {
            table,
            current: initial as usize,
            transitions: 0,
        }
    }

    /// Run the initial `on_enter`.  Call once before the first `tick()`.
    pub fn start(&mut self, ctx: &mut FsmContext) {
        info!("FSM starting in state: {}", self.table[self.current].name);
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Evaluate the current state against `ctx` and apply at most one
    /// transition.
    pub fn tick(&mut self, ctx: &mut FsmContext) -> Option<Transition> {
        let next = (self.table[self.current].on_update)(ctx)?;
        if next as usize == self.current {
            return None;
        }
        Some(self.transition(next, ctx))
    }

    pub fn current_state(&self) -> ControlState {
        ControlState::from_index(self.current)
    }

    /// Number of transitions applied since start.
    pub fn transition_count(&self) -> u64 {
        self.transitions
    }

    // -----------------------------------------------------------------------
    // Internal
    // -----------------------------------------------------------------------

    fn transition(&mut self, next: ControlState, ctx: &mut FsmContext) -> Transition {
        let from = self.current_state();
        let forced = ctx.has_faults();
        if forced {
            warn!(
                "FSM transition (forced, faults=0b{:02b}): {} -> {}",
                ctx.fault_flags, self.table[self.current].name, self.table[next as usize].name
            );
        } else {
            info!(
                "FSM transition: {} -> {}",
                self.table[self.current].name, self.table[next as usize].name
            );
        }

        if let Some(exit) = self.table[self.current].on_exit {
            exit(ctx);
        }

        self.current = next as usize;
        self.transitions += 1;
        ctx.last_transition = Some(ctx.now);

        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }

        Transition {
            from,
            to: next,
            at: ctx.now,
            forced,
        }
    }
}
