//! Random forest member.
//!
//! Bagged CART trees (Gini impurity) over the two features.  Tree
//! construction is seeded so a retrain on the same data is reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::dataset::FeedbackEvent;
use super::{Classifier, ComfortLabel, strict_plurality, tally};
use crate::error::TrainingError;

pub const TREE_COUNT: usize = 10;
pub const MAX_DEPTH: usize = 5;
const MIN_SPLIT: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum Feature {
    Temperature,
    Humidity,
}

impl Feature {
    const ALL: [Feature; 2] = [Feature::Temperature, Feature::Humidity];

    fn of(self, s: &FeedbackEvent) -> f32 {
        match self {
            Self::Temperature => s.temperature,
            Self::Humidity => s.humidity,
        }
    }

    fn pick(self, temperature: f32, humidity: f32) -> f32 {
        match self {
            Self::Temperature => temperature,
            Self::Humidity => humidity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum Node {
    Leaf(ComfortLabel),
    Split {
        feature: Feature,
        threshold: f32,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    fn classify(&self, temperature: f32, humidity: f32) -> ComfortLabel {
        let mut node = self;
        loop {
            match node {
                Node::Leaf(label) => return *label,
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if feature.pick(temperature, humidity) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Node>,
}

impl RandomForest {
    pub fn fit(samples: &[FeedbackEvent], seed: u64) -> Result<Self, TrainingError> {
        if samples.len() < MIN_SPLIT {
            return Err(TrainingError::InsufficientData {
                needed: MIN_SPLIT,
                have: samples.len(),
            });
        }
        let mut rng = StdRng::seed_from_u64(seed);
        let n = samples.len();
        let trees = (0..TREE_COUNT)
            .map(|_| {
                let bag: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                grow(samples, bag, 0)
            })
            .collect();
        Ok(Self { trees })
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn name(&self) -> &'static str {
        "forest"
    }

    fn predict(&self, temperature: f32, humidity: f32) -> ComfortLabel {
        let votes = tally(self.trees.iter().map(|t| t.classify(temperature, humidity)));
        strict_plurality(&votes).unwrap_or(ComfortLabel::Comfortable)
    }
}

// ---------------------------------------------------------------------------
// Tree construction
// ---------------------------------------------------------------------------

fn grow(samples: &[FeedbackEvent], idx: Vec<usize>, depth: usize) -> Node {
    let counts = tally(idx.iter().map(|&i| samples[i].label));
    let majority = majority(&counts);
    let pure = counts.iter().filter(|&&c| c > 0).count() <= 1;
    if depth >= MAX_DEPTH || pure || idx.len() < MIN_SPLIT {
        return Node::Leaf(majority);
    }

    let Some((feature, threshold)) = best_split(samples, &idx, &counts) else {
        return Node::Leaf(majority);
    };
    let (left, right): (Vec<usize>, Vec<usize>) = idx
        .into_iter()
        .partition(|&i| feature.of(&samples[i]) <= threshold);

    Node::Split {
        feature,
        threshold,
        left: Box::new(grow(samples, left, depth + 1)),
        right: Box::new(grow(samples, right, depth + 1)),
    }
}

/// Highest count wins; ties go to the lowest ordinal.
fn majority(counts: &[usize; ComfortLabel::COUNT]) -> ComfortLabel {
    strict_plurality(counts).unwrap_or_else(|| {
        let max = counts.iter().copied().max().unwrap_or(0);
        ComfortLabel::ALL
            .into_iter()
            .find(|l| counts[l.index()] == max)
            .unwrap_or(ComfortLabel::Comfortable)
    })
}

fn gini(counts: &[usize; ComfortLabel::COUNT], total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    let t = total as f64;
    1.0 - counts.iter().map(|&c| (c as f64 / t).powi(2)).sum::<f64>()
}

/// Best `(feature, threshold)` by weighted Gini, or `None` if no split
/// reduces impurity.
fn best_split(
    samples: &[FeedbackEvent],
    idx: &[usize],
    parent: &[usize; ComfortLabel::COUNT],
) -> Option<(Feature, f32)> {
    let total = idx.len();
    let mut best: Option<(Feature, f32)> = None;
    let mut best_impurity = gini(parent, total);

    for feature in Feature::ALL {
        let mut sorted: Vec<(f32, ComfortLabel)> = idx
            .iter()
            .map(|&i| (feature.of(&samples[i]), samples[i].label))
            .collect();
        sorted.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut left = [0usize; ComfortLabel::COUNT];
        let mut right = *parent;
        for k in 0..total - 1 {
            let (value, label) = sorted[k];
            left[label.index()] += 1;
            right[label.index()] -= 1;
            let next = sorted[k + 1].0;
            if next <= value {
                continue;
            }
            let (nl, nr) = (k + 1, total - k - 1);
            let impurity =
                (nl as f64 * gini(&left, nl) + nr as f64 * gini(&right, nr)) / total as f64;
            if impurity < best_impurity - 1e-12 {
                best_impurity = impurity;
                best = Some((feature, value + (next - value) / 2.0));
            }
        }
    }
    best
}
