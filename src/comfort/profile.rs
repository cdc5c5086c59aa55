//! Seed comfort profiles.
//!
//! A profile is a fixed heat-index rule evaluated in Fahrenheit.  It is used
//! twice: to label a grid of seed samples when no dataset exists yet, and as
//! a rule-based ensemble member.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::dataset::FeedbackEvent;
use super::{Classifier, ComfortLabel};

const GRID_TEMPS: usize = 25;
const GRID_HUMIDITIES: usize = 20;
const GRID_TEMP_RANGE_C: (f32, f32) = (0.0, 35.0);
const GRID_HUMIDITY_RANGE: (f32, f32) = (30.0, 80.0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComfortProfile {
    Normal,
    HeatSensitive,
    ColdSensitive,
}

impl ComfortProfile {
    /// `(humidity weight, cold below, hot at or above)` on the °F heat index.
    const fn rule(self) -> (f32, f32, f32) {
        match self {
            Self::Normal => (0.2, 65.0, 87.0),
            Self::HeatSensitive => (0.5, 60.0, 78.0),
            Self::ColdSensitive => (0.05, 78.0, 88.0),
        }
    }

    pub fn label(self, temperature_c: f32, humidity: f32) -> ComfortLabel {
        let (weight, cold_below, hot_from) = self.rule();
        let heat_index = celsius_to_fahrenheit(temperature_c) + humidity * weight;
        if heat_index < cold_below {
            ComfortLabel::Cold
        } else if heat_index < hot_from {
            ComfortLabel::Comfortable
        } else {
            ComfortLabel::Hot
        }
    }

    /// Label the fixed 25 × 20 grid (0–35 °C, 30–80 %RH).
    pub fn seed_samples(self, observed_at: DateTime<Utc>) -> Vec<FeedbackEvent> {
        let temps = linspace(GRID_TEMP_RANGE_C, GRID_TEMPS);
        let hums = linspace(GRID_HUMIDITY_RANGE, GRID_HUMIDITIES);
        let mut samples = Vec::with_capacity(GRID_TEMPS * GRID_HUMIDITIES);
        for &t in &temps {
            let t = (t * 10.0).round() / 10.0;
            for &h in &hums {
                let h = h.round();
                samples.push(FeedbackEvent::at(t, h, self.label(t, h), observed_at).seeded(self));
            }
        }
        samples
    }
}

impl Classifier for ComfortProfile {
    fn name(&self) -> &'static str {
        match self {
            Self::Normal => "profile-normal",
            Self::HeatSensitive => "profile-heat-sensitive",
            Self::ColdSensitive => "profile-cold-sensitive",
        }
    }

    fn predict(&self, temperature: f32, humidity: f32) -> ComfortLabel {
        self.label(temperature, humidity)
    }
}

pub fn celsius_to_fahrenheit(c: f32) -> f32 {
    c * 9.0 / 5.0 + 32.0
}

fn linspace((lo, hi): (f32, f32), n: usize) -> Vec<f32> {
    let step = (hi - lo) / (n - 1) as f32;
    (0..n).map(|i| lo + step * i as f32).collect()
}
