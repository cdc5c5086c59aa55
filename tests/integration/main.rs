//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises a specific subsystem
//! against mock adapters.  No serial device is required.

mod control_loop_tests;
mod link_tests;
mod mock_link;
