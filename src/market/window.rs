//! Fixed-length trading windows

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Default window length (15 minutes)
pub const DEFAULT_WINDOW_SECS: i64 = 900;

/// A fixed-length epoch identified by its start timestamp
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub duration_secs: i64,
}

impl Window {
    /// Window containing `now`, aligned to multiples of `duration_secs`
    pub fn containing(now: DateTime<Utc>, duration_secs: i64) -> Self {
        let duration_secs = duration_secs.max(1);
        let ts = now.timestamp();
        let start_ts = ts - ts.rem_euclid(duration_secs);
        let start = Utc
            .timestamp_opt(start_ts, 0)
            .single()
            .unwrap_or(now);
        Self {
            start,
            duration_secs,
        }
    }

    /// Unix start timestamp (window identifier)
    pub fn id(&self) -> i64 {
        self.start.timestamp()
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(self.duration_secs)
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.start + self.duration()
    }

    /// Time since window start, clamped to [0, duration]
    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (now - self.start).clamp(Duration::zero(), self.duration())
    }

    /// Time left in the window, clamped to [0, duration]
    pub fn remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.end() - now).clamp(Duration::zero(), self.duration())
    }

    /// Elapsed share of the window in [0, 1]
    pub fn elapsed_fraction(&self, now: DateTime<Utc>) -> f64 {
        self.elapsed(now).num_milliseconds() as f64 / (self.duration_secs * 1000) as f64
    }

    pub fn contains(&self, now: DateTime<Utc>) -> bool {
        now >= self.start && now < self.end()
    }

    pub fn next(&self) -> Self {
        Self {
            start: self.end(),
            duration_secs: self.duration_secs,
        }
    }
}
