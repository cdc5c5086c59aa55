//! Feedback trainer: grows the dataset and swaps in retrained models.
//!
//! ```text
//!  record(event) ──▶ store.append ──▶ dataset ──▶ pending += 1
//!                                                     │ ≥ threshold
//!                                                     ▼
//!                     ┌──────── retrain thread ───────────────────┐
//!                     │ split(holdout) → train v+1 → accuracy     │
//!                     │   ≥ floor: ModelHandle::swap              │
//!                     │   < floor: discard, live model untouched  │
//!                     └──────────────┬────────────────────────────┘
//!                                    │ RetrainOutcome (channel)
//!  poll() ◀──────────────────────────┘ persist accepted model, log
//! ```
//!
//! At most one retrain runs at a time.  Feedback arriving meanwhile keeps
//! counting and triggers the next retrain once the current one finishes.

use std::sync::Arc;
use std::thread::JoinHandle;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender};
use log::{debug, error, info, warn};

use crate::app::ports::TrainingStore;
use crate::comfort::profile::ComfortProfile;
use crate::comfort::{EnsembleModel, FeedbackEvent, ModelHandle, TrainingDataset};
use crate::config::SystemConfig;
use crate::error::{Error, StorageError, TrainingError};

#[derive(Debug, Clone, Copy)]
pub struct TrainerSettings {
    pub retrain_threshold: usize,
    pub min_validation_accuracy: f32,
    pub holdout_fraction: f32,
    pub min_training_samples: usize,
    pub seed: u64,
}

impl TrainerSettings {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            retrain_threshold: config.retrain_threshold,
            min_validation_accuracy: config.min_validation_accuracy,
            holdout_fraction: config.holdout_fraction,
            min_training_samples: config.min_training_samples,
            seed: config.training_seed,
        }
    }
}

#[derive(Debug, Clone)]
pub enum RetrainOutcome {
    /// Candidate passed validation and is now live.
    Accepted {
        model: Arc<EnsembleModel>,
        accuracy: f32,
        samples: usize,
    },
    /// Candidate failed; the previous model stays live.
    Rejected(TrainingError),
}

/// Result of [`FeedbackTrainer::switch_profile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSwitch {
    /// The dataset is already seeded from the requested profile.
    Unchanged,
    /// Seed samples replaced.  `retrain_started` is `false` while an
    /// earlier retrain is still running; the switch retrain follows it.
    Reseeded {
        kept_feedback: usize,
        retrain_started: bool,
    },
}

/// Train a candidate of `version` on `dataset` and validate it on a
/// hold-out split.  Pure CPU work; touches no shared state.
pub fn build_candidate(
    dataset: &TrainingDataset,
    version: u64,
    settings: &TrainerSettings,
) -> Result<(EnsembleModel, f32), TrainingError> {
    if dataset.len() < settings.min_training_samples {
        return Err(TrainingError::InsufficientData {
            needed: settings.min_training_samples,
            have: dataset.len(),
        });
    }
    let (train, holdout) = dataset.split(settings.holdout_fraction, settings.seed);
    let candidate = EnsembleModel::train(&train, version, settings.seed)?;
    let accuracy = candidate.accuracy(&holdout);
    if accuracy < settings.min_validation_accuracy {
        return Err(TrainingError::ValidationFailed {
            accuracy,
            floor: settings.min_validation_accuracy,
        });
    }
    Ok((candidate, accuracy))
}

/// Swap a built candidate into `handle`, or say why the live model stays.
fn publish_candidate(
    handle: &ModelHandle,
    built: Result<(EnsembleModel, f32), TrainingError>,
    samples: usize,
) -> RetrainOutcome {
    let (candidate, accuracy) = match built {
        Ok(built) => built,
        Err(e) => return RetrainOutcome::Rejected(e),
    };
    let version = candidate.version();
    match handle.swap(candidate) {
        Some(_) => RetrainOutcome::Accepted {
            model: handle.current(),
            accuracy,
            samples,
        },
        None => RetrainOutcome::Rejected(TrainingError::Superseded(version)),
    }
}

pub struct FeedbackTrainer {
    dataset: TrainingDataset,
    /// Events recorded since the last retrain started.
    pending: usize,
    model: ModelHandle,
    settings: TrainerSettings,
    in_flight: Option<JoinHandle<()>>,
    outcome_tx: Sender<RetrainOutcome>,
    outcome_rx: Receiver<RetrainOutcome>,
}

impl FeedbackTrainer {
    pub fn new(dataset: TrainingDataset, model: ModelHandle, settings: TrainerSettings) -> Self {
        let (outcome_tx, outcome_rx) = crossbeam_channel::unbounded();
        Self {
            dataset,
            pending: 0,
            model,
            settings,
            in_flight: None,
            outcome_tx,
            outcome_rx,
        }
    }

    /// Append a feedback event and start a retrain once enough have
    /// accumulated.  Returns `true` if a retrain was started.
    pub fn record(&mut self, event: FeedbackEvent, store: &mut impl TrainingStore) -> bool {
        if let Err(e) = store.append_feedback(&event) {
            warn!("TRAIN: feedback not persisted: {e}");
        }
        info!(
            "TRAIN: feedback {} at T={:.1} H={:.1} (dataset {})",
            event.label,
            event.temperature,
            event.humidity,
            self.dataset.len() + 1
        );
        self.dataset.append(event);
        self.pending += 1;
        self.maybe_retrain()
    }

    fn maybe_retrain(&mut self) -> bool {
        if self.pending < self.settings.retrain_threshold {
            return false;
        }
        if self.is_retraining() {
            debug!("TRAIN: retrain already running, {} events waiting", self.pending);
            return false;
        }
        self.retrain_now()
    }

    /// Start a retrain regardless of the threshold.  Returns `false` if one
    /// is already running or the thread could not be spawned.
    pub fn retrain_now(&mut self) -> bool {
        if self.is_retraining() {
            return false;
        }
        match self.spawn_retrain() {
            Ok(()) => {
                self.pending = 0;
                true
            }
            Err(e) => {
                error!("TRAIN: cannot start retrain thread: {e}");
                false
            }
        }
    }

    fn spawn_retrain(&mut self) -> std::io::Result<()> {
        let snapshot = self.dataset.clone();
        let version = self.model.version() + 1;
        let handle = self.model.clone();
        let settings = self.settings;
        let tx = self.outcome_tx.clone();
        info!(
            "TRAIN: retraining v{version} on {} samples in background",
            snapshot.len()
        );

        let thread = std::thread::Builder::new()
            .name("retrain".into())
            .spawn(move || {
                let built = build_candidate(&snapshot, version, &settings);
                let _ = tx.send(publish_candidate(&handle, built, snapshot.len()));
            })?;
        self.in_flight = Some(thread);
        Ok(())
    }

    /// Re-seed the dataset from `profile`'s grid, keep every occupant
    /// feedback event, and retrain on the result.
    ///
    /// The new dataset is persisted before it replaces the in-memory one,
    /// so a storage error leaves both untouched.
    pub fn switch_profile(
        &mut self,
        profile: ComfortProfile,
        store: &mut impl TrainingStore,
    ) -> Result<ProfileSwitch, StorageError> {
        if self.dataset.seed_profile() == Some(profile) {
            debug!("TRAIN: dataset already seeded from {profile:?}");
            return Ok(ProfileSwitch::Unchanged);
        }
        let next = self.dataset.reseeded(profile.seed_samples(Utc::now()));
        store.save_dataset(next.events())?;
        let kept_feedback = next.feedback().count();
        info!(
            "TRAIN: switched to {profile:?} profile ({} samples, {kept_feedback} from feedback)",
            next.len()
        );
        self.dataset = next;

        let retrain_started = self.retrain_now();
        if !retrain_started {
            // Picked up by the next poll once the running retrain is done.
            self.pending = self.pending.max(self.settings.retrain_threshold);
        }
        Ok(ProfileSwitch::Reseeded {
            kept_feedback,
            retrain_started,
        })
    }

    /// Collect finished retrains: log them and persist accepted models.
    pub fn poll(&mut self, store: &mut impl TrainingStore) -> Vec<RetrainOutcome> {
        let outcomes: Vec<RetrainOutcome> = self.outcome_rx.try_iter().collect();
        if outcomes.is_empty() {
            return outcomes;
        }
        if let Some(thread) = self.in_flight.take() {
            if thread.join().is_err() {
                error!("TRAIN: retrain thread panicked");
            }
        }
        for outcome in &outcomes {
            match outcome {
                RetrainOutcome::Accepted {
                    model,
                    accuracy,
                    samples,
                } => {
                    info!(
                        "TRAIN: accepted v{} (hold-out accuracy {:.3}, {} samples)",
                        model.version(),
                        accuracy,
                        samples
                    );
                    if let Err(e) = store.save_model(model) {
                        warn!("TRAIN: model v{} not persisted: {e}", model.version());
                    }
                }
                RetrainOutcome::Rejected(e) => {
                    warn!("TRAIN: candidate rejected, keeping v{}: {e}", self.model.version());
                }
            }
        }
        // Feedback that arrived during the retrain may already be due.
        self.maybe_retrain();
        outcomes
    }

    /// Block until the running retrain (if any) finishes, then poll.
    pub fn join_pending(&mut self, store: &mut impl TrainingStore) -> Vec<RetrainOutcome> {
        if let Some(thread) = self.in_flight.take() {
            if thread.join().is_err() {
                error!("TRAIN: retrain thread panicked");
            }
        }
        self.poll(store)
    }

    pub fn is_retraining(&self) -> bool {
        self.in_flight.as_ref().is_some_and(|t| !t.is_finished())
    }

    pub fn dataset(&self) -> &TrainingDataset {
        &self.dataset
    }

    pub fn pending(&self) -> usize {
        self.pending
    }

    pub fn model(&self) -> &ModelHandle {
        &self.model
    }
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Load (or seed) the dataset and load (or train) the live model.
///
/// Failing to obtain any usable model is the one fatal startup error.
pub fn bootstrap(
    config: &SystemConfig,
    store: &mut impl TrainingStore,
) -> Result<(TrainingDataset, EnsembleModel), Error> {
    let dataset = match store.load_dataset() {
        Ok(events) if !events.is_empty() => {
            info!("TRAIN: loaded {} samples", events.len());
            TrainingDataset::from_events(events)
        }
        Ok(_) | Err(StorageError::NotFound) => {
            let seeds = config.seed_profile.seed_samples(Utc::now());
            info!(
                "TRAIN: no dataset, seeding {} samples from {:?} profile",
                seeds.len(),
                config.seed_profile
            );
            store.save_dataset(&seeds)?;
            TrainingDataset::from_events(seeds)
        }
        Err(e) => return Err(e.into()),
    };
    if let Some(seeded) = dataset.seed_profile() {
        if seeded != config.seed_profile {
            info!(
                "TRAIN: keeping stored {seeded:?} seed samples (config names {:?})",
                config.seed_profile
            );
        }
    }

    let model = match store.load_model() {
        Ok(model) => {
            info!("TRAIN: loaded model v{}", model.version());
            model
        }
        Err(e) => {
            warn!("TRAIN: no usable model ({e}), training v1");
            let model = EnsembleModel::train(dataset.events(), 1, config.training_seed)?;
            if let Err(e) = store.save_model(&model) {
                warn!("TRAIN: model v1 not persisted: {e}");
            }
            model
        }
    };
    Ok((dataset, model))
}
