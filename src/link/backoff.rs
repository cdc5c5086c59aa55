//! Bounded exponential reconnect delay.

use std::time::Duration;

/// 1 s → 2 s → 4 s → 8 s → 8 s … with the default config.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    next: Duration,
    attempts: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max,
            next: initial,
            attempts: 0,
        }
    }

    /// Delay to wait before the next attempt.  Advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.max);
        self.attempts = self.attempts.saturating_add(1);
        delay
    }

    /// Failed attempts since the last [`reset`](Self::reset).
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Back to the initial delay after a successful connect.
    pub fn reset(&mut self) {
        self.next = self.initial;
        self.attempts = 0;
    }
}
