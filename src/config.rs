//! System configuration parameters
//!
//! All tunable parameters for the ComfortLink controller.
//! Values come from defaults, optionally overridden by a JSON file and CLI flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::comfort::profile::ComfortProfile;
use crate::error::ConfigError;

/// Core system configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Serial link ---
    /// Serial device, e.g. `/dev/ttyACM0` or `COM5`
    pub port: String,
    pub baud_rate: u32,
    /// Blocking read timeout on the port (milliseconds)
    pub read_timeout_ms: u64,
    /// First reconnect delay (milliseconds)
    pub reconnect_initial_ms: u64,
    /// Reconnect delay cap (milliseconds)
    pub reconnect_max_ms: u64,
    /// Pause after opening the port while the board resets (milliseconds)
    pub reset_settle_ms: u64,

    // --- Telemetry ---
    /// Peer's nominal telemetry period (milliseconds)
    pub data_interval_ms: u64,
    /// Telemetry is stale after this many missed intervals
    pub stale_after_intervals: u32,
    /// How often the control loop re-checks staleness (milliseconds)
    pub staleness_check_interval_ms: u64,
    /// Plausible sensor range; readings outside are rejected
    pub min_temperature_c: f32,
    pub max_temperature_c: f32,
    pub min_humidity_pct: f32,
    pub max_humidity_pct: f32,

    // --- Actuation ---
    /// Minimum time between two unforced relay transitions (seconds)
    pub min_dwell_secs: u64,

    // --- Training ---
    /// New feedback events needed to trigger a retrain
    pub retrain_threshold: usize,
    /// Hold-out accuracy a candidate ensemble must reach (0.0-1.0)
    pub min_validation_accuracy: f32,
    /// Fraction of the dataset held out for validation
    pub holdout_fraction: f32,
    pub min_training_samples: usize,
    pub training_seed: u64,
    /// Profile used to seed an empty dataset
    pub seed_profile: ComfortProfile,

    // --- Persistence ---
    pub data_dir: PathBuf,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Serial link
            port: default_port().to_string(),
            baud_rate: 9600,
            read_timeout_ms: 100,
            reconnect_initial_ms: 1000,
            reconnect_max_ms: 8000,
            reset_settle_ms: 2000, // opening the port toggles DTR and reboots the board

            // Telemetry
            data_interval_ms: 1000, // peer sends at 1 Hz
            stale_after_intervals: 3,
            staleness_check_interval_ms: 250,
            min_temperature_c: -40.0,
            max_temperature_c: 85.0,
            min_humidity_pct: 0.0,
            max_humidity_pct: 100.0,

            // Actuation
            min_dwell_secs: 30,

            // Training
            retrain_threshold: 10,
            min_validation_accuracy: 0.6,
            holdout_fraction: 0.2,
            min_training_samples: 20,
            training_seed: 42,
            seed_profile: ComfortProfile::Normal,

            // Persistence
            data_dir: PathBuf::from("comfort-data"),
        }
    }
}

#[cfg(target_os = "windows")]
fn default_port() -> &'static str {
    "COM5"
}

#[cfg(not(target_os = "windows"))]
fn default_port() -> &'static str {
    "/dev/ttyACM0"
}

impl SystemConfig {
    /// Load from a JSON file.  Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the control loop.  Nothing is clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::ValidationFailed("baud_rate must be > 0"));
        }
        if self.data_interval_ms == 0 || self.stale_after_intervals == 0 {
            return Err(ConfigError::ValidationFailed(
                "data_interval_ms and stale_after_intervals must be > 0",
            ));
        }
        if self.staleness_check_interval_ms == 0 || self.read_timeout_ms == 0 {
            return Err(ConfigError::ValidationFailed(
                "staleness_check_interval_ms and read_timeout_ms must be > 0",
            ));
        }
        if self.reconnect_initial_ms == 0 || self.reconnect_max_ms < self.reconnect_initial_ms {
            return Err(ConfigError::ValidationFailed(
                "reconnect_max_ms must be >= reconnect_initial_ms > 0",
            ));
        }
        if self.min_temperature_c >= self.max_temperature_c
            || self.min_humidity_pct >= self.max_humidity_pct
        {
            return Err(ConfigError::ValidationFailed("sensor range is inverted"));
        }
        if self.retrain_threshold == 0 {
            return Err(ConfigError::ValidationFailed("retrain_threshold must be > 0"));
        }
        if !(0.0..=1.0).contains(&self.min_validation_accuracy) {
            return Err(ConfigError::ValidationFailed(
                "min_validation_accuracy must be 0.0-1.0",
            ));
        }
        if !(self.holdout_fraction > 0.0 && self.holdout_fraction < 1.0) {
            return Err(ConfigError::ValidationFailed(
                "holdout_fraction must be strictly between 0 and 1",
            ));
        }
        if self.min_training_samples < 2 {
            return Err(ConfigError::ValidationFailed("min_training_samples must be >= 2"));
        }
        Ok(())
    }

    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// `stale_after_intervals × data_interval`.
    pub fn stale_after(&self) -> Duration {
        Duration::from_millis(self.data_interval_ms) * self.stale_after_intervals
    }

    pub fn staleness_check_interval(&self) -> Duration {
        Duration::from_millis(self.staleness_check_interval_ms)
    }

    pub fn min_dwell(&self) -> Duration {
        Duration::from_secs(self.min_dwell_secs)
    }

    /// True if a reading lies inside the plausible sensor envelope.
    pub fn is_plausible(&self, temperature_c: f32, humidity_pct: f32) -> bool {
        (self.min_temperature_c..=self.max_temperature_c).contains(&temperature_c)
            && (self.min_humidity_pct..=self.max_humidity_pct).contains(&humidity_pct)
    }
}
