//! k-nearest-neighbours member on z-scored features.

use serde::{Deserialize, Serialize};

use super::dataset::FeedbackEvent;
use super::{Classifier, ComfortLabel, strict_plurality, tally};
use crate::error::TrainingError;

pub const K: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearestNeighbors {
    mean: [f32; 2],
    scale: [f32; 2],
    points: Vec<([f32; 2], ComfortLabel)>,
}

impl NearestNeighbors {
    pub fn fit(samples: &[FeedbackEvent]) -> Result<Self, TrainingError> {
        if samples.is_empty() {
            return Err(TrainingError::InsufficientData { needed: 1, have: 0 });
        }
        let n = samples.len() as f32;
        let raw = |s: &FeedbackEvent| [s.temperature, s.humidity];

        let mut mean = [0.0f32; 2];
        let mut scale = [0.0f32; 2];
        for f in 0..2 {
            mean[f] = samples.iter().map(|s| raw(s)[f]).sum::<f32>() / n;
            let var = samples
                .iter()
                .map(|s| (raw(s)[f] - mean[f]).powi(2))
                .sum::<f32>()
                / n;
            // A constant feature contributes nothing; keep it unscaled.
            scale[f] = if var > f32::EPSILON { var.sqrt() } else { 1.0 };
        }

        let mut model = Self {
            mean,
            scale,
            points: Vec::with_capacity(samples.len()),
        };
        model.points = samples
            .iter()
            .map(|s| (model.normalise(s.temperature, s.humidity), s.label))
            .collect();
        Ok(model)
    }

    fn normalise(&self, temperature: f32, humidity: f32) -> [f32; 2] {
        [
            (temperature - self.mean[0]) / self.scale[0],
            (humidity - self.mean[1]) / self.scale[1],
        ]
    }
}

impl Classifier for NearestNeighbors {
    fn name(&self) -> &'static str {
        "neighbors"
    }

    /// Plurality of the `K` nearest; on a tie the single nearest decides.
    fn predict(&self, temperature: f32, humidity: f32) -> ComfortLabel {
        let q = self.normalise(temperature, humidity);
        let mut by_distance: Vec<(f32, ComfortLabel)> = self
            .points
            .iter()
            .map(|(p, label)| ((p[0] - q[0]).powi(2) + (p[1] - q[1]).powi(2), *label))
            .collect();
        by_distance.sort_by(|a, b| a.0.total_cmp(&b.0));
        by_distance.truncate(K);

        let votes = tally(by_distance.iter().map(|(_, l)| *l));
        strict_plurality(&votes)
            .or_else(|| by_distance.first().map(|(_, l)| *l))
            .unwrap_or(ComfortLabel::Comfortable)
    }
}
