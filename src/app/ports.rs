//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (relay link, event sinks, persistence) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches a port or a file directly.

use crate::comfort::{EnsembleModel, FeedbackEvent};
use crate::error::{ConnectionError, StorageError};
use crate::link::{CommandSender, RelayCommand};

// ───────────────────────────────────────────────────────────────
// Command port (driven adapter: domain → peer relays)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain hands relay commands to the link.
pub trait CommandPort {
    /// Queue one command for the peer.  Delivery is the adapter's job;
    /// an error means the link is gone for good, not merely disconnected.
    fn send(&mut self, command: RelayCommand) -> Result<(), ConnectionError>;
}

impl CommandPort for CommandSender {
    fn send(&mut self, command: RelayCommand) -> Result<(), ConnectionError> {
        CommandSender::send(self, command)
    }
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / front-end)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Training store (driven adapter: domain ↔ disk)
// ───────────────────────────────────────────────────────────────

/// Persistence for the feedback dataset and the live ensemble.
///
/// Writes MUST be all-or-nothing: a crash mid-write may lose the newest
/// feedback line or model, never corrupt what was stored before.
pub trait TrainingStore: Send {
    /// Every stored feedback event, oldest first.
    /// [`StorageError::NotFound`] on a fresh install.
    fn load_dataset(&mut self) -> Result<Vec<FeedbackEvent>, StorageError>;

    /// Append one event to the stored dataset.
    fn append_feedback(&mut self, event: &FeedbackEvent) -> Result<(), StorageError>;

    /// Replace the stored dataset (seeding and profile switches).
    fn save_dataset(&mut self, events: &[FeedbackEvent]) -> Result<(), StorageError>;

    fn load_model(&mut self) -> Result<EnsembleModel, StorageError>;

    fn save_model(&mut self, model: &EnsembleModel) -> Result<(), StorageError>;
}
