//! Ensemble model, live-model handle and the predictor façade.
//!
//! The control loop only ever sees an `Arc<EnsembleModel>` snapshot taken at
//! the start of a prediction, so a concurrent [`ModelHandle::swap`] never
//! tears a prediction in half.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, info};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::bayes::GaussianBayes;
use super::dataset::FeedbackEvent;
use super::forest::RandomForest;
use super::linear::LinearModel;
use super::neighbors::NearestNeighbors;
use super::profile::ComfortProfile;
use super::{Classifier, ComfortLabel, strict_plurality, tally};
use crate::error::{PredictionError, StorageError, TrainingError};
use crate::telemetry::SensorReading;

/// Number of members a usable ensemble carries.
pub const ENSEMBLE_SIZE: usize = 4;

// ---------------------------------------------------------------------------
// Members
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Member {
    Linear(LinearModel),
    Bayes(GaussianBayes),
    Forest(RandomForest),
    Neighbors(NearestNeighbors),
    /// Deterministic heat-index rule member.  Never produced by training;
    /// used to inject a known voter, e.g. a fixed ensemble for replays and
    /// tests.
    Profile(ComfortProfile),
}

impl Classifier for Member {
    fn name(&self) -> &'static str {
        match self {
            Self::Linear(m) => m.name(),
            Self::Bayes(m) => m.name(),
            Self::Forest(m) => m.name(),
            Self::Neighbors(m) => m.name(),
            Self::Profile(m) => m.name(),
        }
    }

    fn predict(&self, temperature: f32, humidity: f32) -> ComfortLabel {
        match self {
            Self::Linear(m) => m.predict(temperature, humidity),
            Self::Bayes(m) => m.predict(temperature, humidity),
            Self::Forest(m) => m.predict(temperature, humidity),
            Self::Neighbors(m) => m.predict(temperature, humidity),
            Self::Profile(m) => m.predict(temperature, humidity),
        }
    }
}

// ---------------------------------------------------------------------------
// Prediction result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: ComfortLabel,
    /// Votes for `label` over total members, 0.0–1.0.
    pub vote_fraction: f32,
    /// One vote per member, in member order.
    pub per_model: Vec<ComfortLabel>,
    /// Version of the model that produced this result.
    pub model_version: u64,
}

impl PredictionResult {
    /// Combine member votes: strict plurality wins, anything else is
    /// Comfortable.
    pub fn from_votes(per_model: Vec<ComfortLabel>, model_version: u64) -> Self {
        let counts = tally(per_model.iter().copied());
        let label = strict_plurality(&counts).unwrap_or(ComfortLabel::Comfortable);
        let vote_fraction = if per_model.is_empty() {
            0.0
        } else {
            counts[label.index()] as f32 / per_model.len() as f32
        };
        Self {
            label,
            vote_fraction,
            per_model,
            model_version,
        }
    }
}

// ---------------------------------------------------------------------------
// Ensemble model
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleModel {
    members: Vec<Member>,
    version: u64,
    trained_at: DateTime<Utc>,
}

impl EnsembleModel {
    /// Train all four learned members on `samples`.
    pub fn train(
        samples: &[FeedbackEvent],
        version: u64,
        seed: u64,
    ) -> Result<Self, TrainingError> {
        let members = vec![
            Member::Linear(LinearModel::fit(samples)?),
            Member::Bayes(GaussianBayes::fit(samples)?),
            Member::Forest(RandomForest::fit(samples, seed)?),
            Member::Neighbors(NearestNeighbors::fit(samples)?),
        ];
        Ok(Self::from_members(members, version))
    }

    pub fn from_members(members: Vec<Member>, version: u64) -> Self {
        Self {
            members,
            version,
            trained_at: Utc::now(),
        }
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn predict(
        &self,
        temperature: f32,
        humidity: f32,
    ) -> Result<PredictionResult, PredictionError> {
        if !temperature.is_finite() || !humidity.is_finite() {
            return Err(PredictionError::NonFiniteInput);
        }
        if self.members.len() != ENSEMBLE_SIZE {
            return Err(PredictionError::MemberCount {
                found: self.members.len(),
                expected: ENSEMBLE_SIZE,
            });
        }
        let votes = self
            .members
            .iter()
            .map(|m| m.predict(temperature, humidity))
            .collect();
        Ok(PredictionResult::from_votes(votes, self.version))
    }

    /// Fraction of `samples` the ensemble labels correctly.
    pub fn accuracy(&self, samples: &[FeedbackEvent]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let correct = samples
            .iter()
            .filter(|s| {
                self.predict(s.temperature, s.humidity)
                    .is_ok_and(|r| r.label == s.label)
            })
            .count();
        correct as f32 / samples.len() as f32
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, StorageError> {
        postcard::to_allocvec(self).map_err(|e| StorageError::Corrupted(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StorageError> {
        postcard::from_bytes(bytes).map_err(|e| StorageError::Corrupted(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Live model handle
// ---------------------------------------------------------------------------

/// Shared slot holding the live ensemble.
///
/// Readers clone the inner `Arc` and drop the lock immediately; the writer
/// replaces the whole `Arc`.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    live: Arc<RwLock<Arc<EnsembleModel>>>,
}

impl ModelHandle {
    pub fn new(model: EnsembleModel) -> Self {
        Self {
            live: Arc::new(RwLock::new(Arc::new(model))),
        }
    }

    pub fn current(&self) -> Arc<EnsembleModel> {
        Arc::clone(&*self.live.read())
    }

    pub fn version(&self) -> u64 {
        self.live.read().version()
    }

    /// Install `model` if its version is newer than the live one.
    ///
    /// Returns the replaced model, or `None` if `model` was stale and
    /// dropped.
    pub fn swap(&self, model: EnsembleModel) -> Option<Arc<EnsembleModel>> {
        let mut slot = self.live.write();
        if model.version() <= slot.version() {
            return None;
        }
        info!(
            "model: v{} -> v{} ({} members)",
            slot.version(),
            model.version(),
            model.members().len()
        );
        Some(core::mem::replace(&mut *slot, Arc::new(model)))
    }
}

// ---------------------------------------------------------------------------
// Predictor
// ---------------------------------------------------------------------------

/// Stateless predictor bound to the live model.
#[derive(Debug, Clone)]
pub struct ComfortPredictor {
    model: ModelHandle,
}

impl ComfortPredictor {
    pub fn new(model: ModelHandle) -> Self {
        Self { model }
    }

    pub fn predict(&self, reading: &SensorReading) -> Result<PredictionResult, PredictionError> {
        self.model
            .current()
            .predict(reading.temperature, reading.humidity)
    }

    /// Predict against the live model.  A result computed against a model
    /// that was swapped out meanwhile is recomputed once; `Ok(None)` if the
    /// model moved again.
    pub fn predict_current(
        &self,
        reading: &SensorReading,
    ) -> Result<Option<PredictionResult>, PredictionError> {
        settle(|| self.predict(reading), |r| self.is_current(r))
    }

    /// True if `result` came from the model that is live right now.
    pub fn is_current(&self, result: &PredictionResult) -> bool {
        result.model_version == self.model.version()
    }

    pub fn handle(&self) -> &ModelHandle {
        &self.model
    }
}

/// Run `predict` until `is_current` accepts its result, at most twice.
fn settle(
    mut predict: impl FnMut() -> Result<PredictionResult, PredictionError>,
    is_current: impl Fn(&PredictionResult) -> bool,
) -> Result<Option<PredictionResult>, PredictionError> {
    for _ in 0..2 {
        let result = predict()?;
        if is_current(&result) {
            return Ok(Some(result));
        }
        debug!("Discarding prediction from superseded model v{}", result.model_version);
    }
    Ok(None)
}
