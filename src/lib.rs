//! ComfortLink host controller library.
//!
//! Exposes the link layer, comfort ensemble, actuation FSM, trainer and
//! application core so the binary, the integration tests and the fuzz
//! targets all drive the same code.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod comfort;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod fsm;
pub mod link;
pub mod safety;
pub mod telemetry;
pub mod trainer;
