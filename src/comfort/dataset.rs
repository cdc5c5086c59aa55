//! Training dataset: append-only feedback history.

use chrono::{DateTime, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::ComfortLabel;
use super::profile::ComfortProfile;

/// One labelled sample reported by the occupant (or seeded from a profile).
///
/// Never mutated once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEvent {
    pub temperature: f32,
    pub humidity: f32,
    pub label: ComfortLabel,
    pub observed_at: DateTime<Utc>,
    /// Profile whose grid produced this sample; `None` for occupant feedback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seeded_from: Option<ComfortProfile>,
}

impl FeedbackEvent {
    pub fn new(temperature: f32, humidity: f32, label: ComfortLabel) -> Self {
        Self::at(temperature, humidity, label, Utc::now())
    }

    pub const fn at(
        temperature: f32,
        humidity: f32,
        label: ComfortLabel,
        observed_at: DateTime<Utc>,
    ) -> Self {
        Self {
            temperature,
            humidity,
            label,
            observed_at,
            seeded_from: None,
        }
    }

    #[must_use]
    pub fn seeded(mut self, profile: ComfortProfile) -> Self {
        self.seeded_from = Some(profile);
        self
    }

    pub fn is_feedback(&self) -> bool {
        self.seeded_from.is_none()
    }
}

/// Ordered, append-only sequence of [`FeedbackEvent`]s.
#[derive(Debug, Clone, Default)]
pub struct TrainingDataset {
    events: Vec<FeedbackEvent>,
}

impl TrainingDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_events(events: Vec<FeedbackEvent>) -> Self {
        Self { events }
    }

    pub fn append(&mut self, event: FeedbackEvent) {
        self.events.push(event);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events(&self) -> &[FeedbackEvent] {
        &self.events
    }

    /// Profile of the seed samples, if the dataset carries any.
    pub fn seed_profile(&self) -> Option<ComfortProfile> {
        self.events.iter().find_map(|e| e.seeded_from)
    }

    /// Occupant feedback only, in recording order.
    pub fn feedback(&self) -> impl Iterator<Item = &FeedbackEvent> {
        self.events.iter().filter(|e| e.is_feedback())
    }

    /// Dataset with `seeds` in place of the current seed samples.  Occupant
    /// feedback follows them, in its original order.
    #[must_use]
    pub fn reseeded(&self, seeds: Vec<FeedbackEvent>) -> Self {
        let mut events = seeds;
        events.extend(self.feedback().cloned());
        Self { events }
    }

    /// Deterministic shuffle-and-split into `(train, holdout)`.
    ///
    /// The hold-out side gets `ceil(len × fraction)` samples, at least one,
    /// and the training side always keeps at least one.
    pub fn split(
        &self,
        holdout_fraction: f32,
        seed: u64,
    ) -> (Vec<FeedbackEvent>, Vec<FeedbackEvent>) {
        let n = self.events.len();
        if n < 2 {
            return (self.events.clone(), Vec::new());
        }
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let holdout = ((n as f32 * holdout_fraction).ceil() as usize).clamp(1, n - 1);
        let (test_idx, train_idx) = order.split_at(holdout);
        let pick = |idx: &[usize]| idx.iter().map(|&i| self.events[i].clone()).collect();
        (pick(train_idx), pick(test_idx))
    }
}
