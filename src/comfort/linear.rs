//! Ordinal linear regression member.
//!
//! Fits `y = w0 + w1·T + w2·H` by ordinary least squares on the ordinal
//! label encoding (cold = 0, comfortable = 1, hot = 2) and rounds the
//! regression output back onto a label.

use serde::{Deserialize, Serialize};

use super::dataset::FeedbackEvent;
use super::{Classifier, ComfortLabel};
use crate::error::TrainingError;

const PIVOT_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    /// `[intercept, temperature, humidity]`
    weights: [f64; 3],
}

impl LinearModel {
    pub fn fit(samples: &[FeedbackEvent]) -> Result<Self, TrainingError> {
        if samples.len() < 3 {
            return Err(TrainingError::InsufficientData {
                needed: 3,
                have: samples.len(),
            });
        }

        // Normal equations: (XᵀX) w = Xᵀy
        let mut xtx = [[0.0f64; 3]; 3];
        let mut xty = [0.0f64; 3];
        for s in samples {
            let x = [1.0, f64::from(s.temperature), f64::from(s.humidity)];
            let y = s.label.index() as f64;
            for i in 0..3 {
                xty[i] += x[i] * y;
                for j in 0..3 {
                    xtx[i][j] += x[i] * x[j];
                }
            }
        }

        let weights = solve3(xtx, xty).ok_or(TrainingError::Degenerate {
            model: "linear",
            reason: "features are collinear",
        })?;
        Ok(Self { weights })
    }

    pub fn weights(&self) -> [f64; 3] {
        self.weights
    }

    fn regress(&self, temperature: f32, humidity: f32) -> f64 {
        let [w0, w1, w2] = self.weights;
        w0 + w1 * f64::from(temperature) + w2 * f64::from(humidity)
    }
}

impl Classifier for LinearModel {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn predict(&self, temperature: f32, humidity: f32) -> ComfortLabel {
        let y = self.regress(temperature, humidity);
        if y.is_finite() {
            ComfortLabel::from_ordinal(y.round() as i64)
        } else {
            ComfortLabel::Comfortable
        }
    }
}

/// Gaussian elimination with partial pivoting on a 3×3 system.
fn solve3(mut a: [[f64; 3]; 3], mut b: [f64; 3]) -> Option<[f64; 3]> {
    for col in 0..3 {
        let pivot = (col..3).max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))?;
        if a[pivot][col].abs() < PIVOT_EPSILON {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        for row in col + 1..3 {
            let factor = a[row][col] / a[col][col];
            for k in col..3 {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = [0.0f64; 3];
    for row in (0..3).rev() {
        let tail: f64 = (row + 1..3).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }
    x.iter().all(|v| v.is_finite()).then_some(x)
}
