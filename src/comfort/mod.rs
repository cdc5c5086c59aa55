//! Comfort prediction: labels, the classifier contract and the voting ensemble.
//!
//! ```text
//!   (temperature, humidity)
//!            │
//!   ┌────────┼─────────┬─────────────┬──────────────┐
//!   ▼        ▼         ▼             ▼              │
//! Linear   Bayes    Forest      Neighbors          │  one label each
//!   └────────┴─────────┴─────────────┘              │
//!            │ plurality vote (tie → Comfortable)   │
//!            ▼                                      │
//!     PredictionResult ◀── model version ───────────┘
//! ```
//!
//! Every member is trained from the same [`dataset::TrainingDataset`] and
//! is immutable afterwards.  A retrain produces a whole new
//! [`ensemble::EnsembleModel`] which is swapped in through the
//! [`ensemble::ModelHandle`].

pub mod bayes;
pub mod dataset;
pub mod ensemble;
pub mod forest;
pub mod linear;
pub mod neighbors;
pub mod profile;

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseError;

pub use dataset::{FeedbackEvent, TrainingDataset};
pub use ensemble::{ComfortPredictor, EnsembleModel, Member, ModelHandle, PredictionResult};

// ---------------------------------------------------------------------------
// Comfort label
// ---------------------------------------------------------------------------

/// Occupant comfort as reported by feedback and predicted by the ensemble.
///
/// The discriminants are the ordinal encoding used by the regression
/// member, so their order matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum ComfortLabel {
    Cold = 0,
    Comfortable = 1,
    Hot = 2,
}

impl ComfortLabel {
    pub const COUNT: usize = 3;
    pub const ALL: [ComfortLabel; Self::COUNT] = [Self::Cold, Self::Comfortable, Self::Hot];

    /// Wire spelling, shared by feedback lines and outbound commands.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cold => "cold",
            Self::Comfortable => "comfortable",
            Self::Hot => "hot",
        }
    }

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Clamp an ordinal back to a label.
    pub fn from_ordinal(value: i64) -> Self {
        match value {
            i64::MIN..=0 => Self::Cold,
            1 => Self::Comfortable,
            _ => Self::Hot,
        }
    }
}

impl fmt::Display for ComfortLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ComfortLabel {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cold" => Ok(Self::Cold),
            "comfortable" => Ok(Self::Comfortable),
            "hot" => Ok(Self::Hot),
            other => Err(ParseError::BadLabel(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Classifier contract
// ---------------------------------------------------------------------------

/// A trained, immutable comfort classifier.
pub trait Classifier {
    /// Short name for logs and diagnostics.
    fn name(&self) -> &'static str;

    /// Predict a label.  Never mutates model state.
    fn predict(&self, temperature: f32, humidity: f32) -> ComfortLabel;
}

// ---------------------------------------------------------------------------
// Vote counting
// ---------------------------------------------------------------------------

/// Count votes per label.
pub fn tally(labels: impl IntoIterator<Item = ComfortLabel>) -> [usize; ComfortLabel::COUNT] {
    let mut counts = [0usize; ComfortLabel::COUNT];
    for label in labels {
        counts[label.index()] += 1;
    }
    counts
}

/// The label holding a strict plurality, if any.
///
/// Returns `None` when the top count is shared (or there are no votes);
/// callers decide the fallback.
pub fn strict_plurality(counts: &[usize; ComfortLabel::COUNT]) -> Option<ComfortLabel> {
    let max = counts.iter().copied().max().unwrap_or(0);
    if max == 0 {
        return None;
    }
    let mut winners = ComfortLabel::ALL.iter().filter(|l| counts[l.index()] == max);
    let first = winners.next().copied();
    if winners.next().is_some() { None } else { first }
}
