//! Update cadence classes.
//!
//! Three fixed coarse cadences, all prime second counts so periodic
//! components spread out instead of resonating with each other or with the
//! 59 s heartbeat.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Coarse automatic update cadence for a registered component.
///
/// A registration without an interval is trigger-only: it is published only
/// when an explicit update is requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    /// 5 s — health checks, critical metrics.
    Fast,
    /// 23 s — statistics, mid-rate gauges.
    Medium,
    /// 59 s — logs, connectivity, background data.
    Slow,
}

impl Interval {
    /// Cadence length in whole seconds.
    #[must_use]
    pub const fn seconds(self) -> u64 {
        match self {
            Self::Fast => 5,
            Self::Medium => 23,
            Self::Slow => 59,
        }
    }

    /// Cadence length as a [`Duration`].
    #[must_use]
    pub const fn duration(self) -> Duration {
        Duration::from_secs(self.seconds())
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fast => write!(f, "Fast(5s)"),
            Self::Medium => write!(f, "Medium(23s)"),
            Self::Slow => write!(f, "Slow(59s)"),
        }
    }
}
