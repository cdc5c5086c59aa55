//! Telemetry cache: last-known-good reading and staleness.
//!
//! Only the control loop writes the cache, and only with readings that
//! already passed parsing and the plausibility envelope.  A rejected line
//! never reaches [`TelemetryCache::update`], so it cannot disturb the cached
//! reading or its age.

use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One temperature/humidity sample from the peer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SensorReading {
    /// Degrees Celsius.
    pub temperature: f32,
    /// Relative humidity, percent.
    pub humidity: f32,
    pub observed_at: DateTime<Utc>,
}

impl SensorReading {
    pub fn new(temperature: f32, humidity: f32) -> Self {
        Self {
            temperature,
            humidity,
            observed_at: Utc::now(),
        }
    }
}

#[derive(Debug)]
pub struct TelemetryCache {
    latest: Option<SensorReading>,
    /// Monotonic arrival time of `latest`, or cache creation if none yet.
    updated_at: Instant,
    stale_after: Duration,
}

impl TelemetryCache {
    pub fn new(stale_after: Duration, now: Instant) -> Self {
        Self {
            latest: None,
            updated_at: now,
            stale_after,
        }
    }

    /// Replace the cached reading.
    pub fn update(&mut self, reading: SensorReading, now: Instant) {
        self.latest = Some(reading);
        self.updated_at = now;
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.latest.as_ref()
    }

    /// Time since the last accepted reading (or since startup).
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.updated_at)
    }

    /// True once no reading has arrived for longer than the stale window.
    pub fn is_stale(&self, now: Instant) -> bool {
        self.age(now) > self.stale_after
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }
}
