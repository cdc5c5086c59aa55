//! Concrete state handler functions and table builder.
//!
//! ```text
//!            [cold, dwell ok]           [hot, dwell ok]
//!   HEATING ◀──────────────── IDLE ────────────────▶ COOLING
//!      │  ▲                   ▲  ▲                    ▲  │
//!      │  └──[cold, dwell ok]─┼──┼──[hot, dwell ok]───┘  │
//!      │                      │  │                       │
//!      └──[comfortable, dwell ok | any fault]────────────┘
//! ```
//!
//! A fault sends HEATING or COOLING straight to IDLE without waiting for
//! dwell time.  IDLE ignores targets while faults are active.

use log::{debug, info};

use super::context::FsmContext;
use super::{ControlState, StateDescriptor};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

pub fn build_state_table() -> [StateDescriptor; ControlState::COUNT] {
    [
        // Index 0: Idle
        StateDescriptor {
            id: ControlState::Idle,
            name: "Idle",
            on_enter: Some(idle_enter),
            on_exit: None,
            on_update: idle_update,
        },
        // Index 1: Heating
        StateDescriptor {
            id: ControlState::Heating,
            name: "Heating",
            on_enter: Some(heating_enter),
            on_exit: Some(heating_exit),
            on_update: heating_update,
        },
        // Index 2: Cooling
        StateDescriptor {
            id: ControlState::Cooling,
            name: "Cooling",
            on_enter: Some(cooling_enter),
            on_exit: Some(cooling_exit),
            on_update: cooling_update,
        },
    ]
}

/// Shared steering rule: move to a different target once dwell allows.
fn steer(ctx: &FsmContext, current: ControlState) -> Option<ControlState> {
    let target = ctx.target?;
    if target == current {
        return None;
    }
    if !ctx.dwell_elapsed() {
        debug!("{current:?} -> {target:?} held back by dwell time");
        return None;
    }
    Some(target)
}

// ═══════════════════════════════════════════════════════════════════════════
//  IDLE (both relays released)
// ═══════════════════════════════════════════════════════════════════════════

fn idle_enter(ctx: &mut FsmContext) {
    ctx.queue_command(ControlState::Idle.command());
    info!("IDLE: relays released");
}

fn idle_update(ctx: &mut FsmContext) -> Option<ControlState> {
    if ctx.has_faults() {
        return None;
    }
    steer(ctx, ControlState::Idle)
}

// ═══════════════════════════════════════════════════════════════════════════
//  HEATING
// ═══════════════════════════════════════════════════════════════════════════

fn heating_enter(ctx: &mut FsmContext) {
    ctx.queue_command(ControlState::Heating.command());
    info!("HEATING: heater relay on");
}

fn heating_exit(_ctx: &mut FsmContext) {
    info!("HEATING: heater relay off");
}

fn heating_update(ctx: &mut FsmContext) -> Option<ControlState> {
    if ctx.has_faults() {
        return Some(ControlState::Idle);
    }
    steer(ctx, ControlState::Heating)
}

// ═══════════════════════════════════════════════════════════════════════════
//  COOLING
// ═══════════════════════════════════════════════════════════════════════════

fn cooling_enter(ctx: &mut FsmContext) {
    ctx.queue_command(ControlState::Cooling.command());
    info!("COOLING: cooler relay on");
}

fn cooling_exit(_ctx: &mut FsmContext) {
    info!("COOLING: cooler relay off");
}

fn cooling_update(ctx: &mut FsmContext) -> Option<ControlState> {
    if ctx.has_faults() {
        return Some(ControlState::Idle);
    }
    steer(ctx, ControlState::Cooling)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_state() {
        for (i, row) in build_state_table().iter().enumerate() {
            assert_eq!(row.id as usize, i, "{} out of place", row.name);
        }
    }
}
