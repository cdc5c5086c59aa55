//! Application core: domain orchestration, zero direct I/O.
//!
//! Ties the link events to the telemetry cache, safety supervisor,
//! comfort ensemble, actuation FSM and feedback trainer.  All interaction
//! with the serial link, the disk and the log happens through **port
//! traits** defined in [`ports`], keeping this layer fully testable
//! without a peer attached.

pub mod commands;
pub mod control_loop;
pub mod events;
pub mod ports;
pub mod service;
