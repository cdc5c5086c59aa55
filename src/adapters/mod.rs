//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements              | Connects to                 |
//! |------------|-------------------------|-----------------------------|
//! | `serial`   | Connector, Transport    | USB / UART serial device    |
//! | `store`    | TrainingStore           | data directory / memory     |
//! | `log_sink` | EventSink               | `log` facade                |
//! | `replay`   | CommandPort             | recorded session (no port)  |

pub mod log_sink;
pub mod replay;
pub mod serial;
pub mod store;
