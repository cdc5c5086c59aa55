//! Link layer: serial line protocol with the embedded peer.
//!
//! ```text
//!  ┌────────────────────┐    bytes    ┌────────────┐  lines  ┌─────────────┐
//!  │ Connector/Transport│────────────▶│LineDecoder │────────▶│ LinkEvent   │
//!  │ (serialport, mock) │◀──────┐     └────────────┘         │ queue       │
//!  └────────────────────┘       │                            └─────────────┘
//!                               │ "hot\n" / "cold\n" / "comfortable\n"
//!                        ┌──────┴───────┐
//!                        │ Outbound     │◀── control loop
//!                        │ channel      │
//!                        └──────────────┘
//! ```
//!
//! All port I/O lives on one dedicated thread ([`io_task`]), so a slow
//! retrain or prediction never delays telemetry ingestion.

pub mod backoff;
pub mod codec;
pub mod io_task;
pub mod transport;

pub use codec::{Inbound, LineDecoder, RelayCommand, parse_line};
pub use io_task::{CommandSender, LinkHandle, LinkSettings};
pub use transport::{Connector, Transport};
