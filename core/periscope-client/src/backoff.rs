//! Retry backoff for registrar outages.
//!
//! Index-based sequence over prime second counts. Prime spacings avoid
//! resonance with the update cadences and the heartbeat; the cap aligns the
//! retry rhythm to the heartbeat interval, so a persistent outage costs at
//! most one heartbeat of latency on recovery.

use std::time::Duration;

const BACKOFF_PRIMES: [u64; 8] = [1, 2, 3, 5, 11, 23, 47, 61];

/// Ceiling for any single backoff sleep, equal to the heartbeat interval.
pub const MAX_BACKOFF_SECS: u64 = 59;

/// Position-tracking backoff sequence.
#[derive(Debug, Default)]
pub struct Backoff {
    index: usize,
}

impl Backoff {
    /// Creates a backoff at index zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Duration at the current index, clamped to [`MAX_BACKOFF_SECS`].
    /// Positions past the end of the sequence also clamp to the maximum.
    #[must_use]
    pub fn current(&self) -> Duration {
        let secs = BACKOFF_PRIMES
            .get(self.index)
            .copied()
            .unwrap_or(MAX_BACKOFF_SECS);
        Duration::from_secs(secs.min(MAX_BACKOFF_SECS))
    }

    /// Returns the current duration and advances the index.
    pub fn advance(&mut self) -> Duration {
        let duration = self.current();
        self.index = self.index.saturating_add(1);
        duration
    }

    /// Resets to index zero (called on sync success).
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Current index into the sequence.
    #[must_use]
    pub fn index(&self) -> usize {
        self.index
    }
}
