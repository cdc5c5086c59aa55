//! Gaussian naive Bayes member.

use serde::{Deserialize, Serialize};

use super::dataset::FeedbackEvent;
use super::{Classifier, ComfortLabel};
use crate::error::TrainingError;

/// Variance floor relative to the widest feature variance.
const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClassStats {
    log_prior: f64,
    mean: [f64; 2],
    var: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GaussianBayes {
    /// Indexed by [`ComfortLabel::index`]; `None` for labels never seen.
    classes: [Option<ClassStats>; ComfortLabel::COUNT],
}

impl GaussianBayes {
    pub fn fit(samples: &[FeedbackEvent]) -> Result<Self, TrainingError> {
        if samples.is_empty() {
            return Err(TrainingError::InsufficientData { needed: 1, have: 0 });
        }
        let features = |s: &FeedbackEvent| [f64::from(s.temperature), f64::from(s.humidity)];

        let epsilon = (0..2)
            .map(|f| variance(samples.iter().map(|s| features(s)[f])))
            .fold(0.0f64, f64::max)
            .max(1.0)
            * VAR_SMOOTHING;

        let total = samples.len() as f64;
        let classes = ComfortLabel::ALL.map(|label| {
            let members: Vec<[f64; 2]> = samples
                .iter()
                .filter(|s| s.label == label)
                .map(features)
                .collect();
            if members.is_empty() {
                return None;
            }
            let n = members.len() as f64;
            let mean = [0, 1].map(|f| members.iter().map(|x| x[f]).sum::<f64>() / n);
            let var = [0, 1].map(|f| variance(members.iter().map(|x| x[f])) + epsilon);
            Some(ClassStats {
                log_prior: (n / total).ln(),
                mean,
                var,
            })
        });

        Ok(Self { classes })
    }

    fn log_likelihood(stats: &ClassStats, x: [f64; 2]) -> f64 {
        let mut ll = stats.log_prior;
        for f in 0..2 {
            let var = stats.var[f];
            let d = x[f] - stats.mean[f];
            ll -= 0.5 * ((2.0 * core::f64::consts::PI * var).ln() + d * d / var);
        }
        ll
    }
}

impl Classifier for GaussianBayes {
    fn name(&self) -> &'static str {
        "bayes"
    }

    fn predict(&self, temperature: f32, humidity: f32) -> ComfortLabel {
        let x = [f64::from(temperature), f64::from(humidity)];
        ComfortLabel::ALL
            .iter()
            .filter_map(|&label| {
                self.classes[label.index()]
                    .as_ref()
                    .map(|stats| (label, Self::log_likelihood(stats, x)))
            })
            .filter(|(_, ll)| ll.is_finite())
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map_or(ComfortLabel::Comfortable, |(label, _)| label)
    }
}

/// Population variance.
fn variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64
}
