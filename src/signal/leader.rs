//! Leader and flip tracking
//!
//! Tracks which outcome is priced higher and counts reversals. A reversal
//! only counts once the new leader is observed on consecutive ticks, so a
//! single noisy tick never registers as a flip.

use super::{RollingWindow, Side};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Leader tracker configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LeaderConfig {
    /// Consecutive opposite observations required to confirm a flip
    #[serde(default = "default_confirm_ticks")]
    pub confirm_ticks: u32,
    /// Window for the rolling flip counter and leader bias (seconds)
    #[serde(default = "default_flip_window_secs")]
    pub window_secs: u64,
}

fn default_confirm_ticks() -> u32 {
    2
}
fn default_flip_window_secs() -> u64 {
    90
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            confirm_ticks: default_confirm_ticks(),
            window_secs: default_flip_window_secs(),
        }
    }
}

/// Result of one leader observation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LeaderUpdate {
    pub leader: Side,
    pub flipped: bool,
    /// Confirmed flips inside the rolling window
    pub flip_count: usize,
    /// Confirmed flips since the last window reset
    pub total_flips: u32,
    /// Absolute YES/NO price difference
    pub spread: Decimal,
}

#[derive(Debug, Clone, Copy)]
struct PendingFlip {
    candidate: Side,
    count: u32,
}

/// Debounced leader tracker for one asset
#[derive(Debug, Clone)]
pub struct LeaderFlipTracker {
    confirm_ticks: u32,
    current: Option<Side>,
    pending: Option<PendingFlip>,
    total_flips: u32,
    recent_flips: RollingWindow<()>,
    bias: RollingWindow<f64>,
    last_observed: Option<DateTime<Utc>>,
    last_update: Option<LeaderUpdate>,
}

impl LeaderFlipTracker {
    pub fn new(config: &LeaderConfig) -> Self {
        let window = Duration::seconds(config.window_secs as i64);
        Self {
            confirm_ticks: config.confirm_ticks.max(1),
            current: None,
            pending: None,
            total_flips: 0,
            recent_flips: RollingWindow::new(window),
            bias: RollingWindow::new(window),
            last_observed: None,
            last_update: None,
        }
    }

    /// Feed one price observation
    ///
    /// Observations at or before the last observed timestamp are ignored and
    /// return the previous result, so replaying a tick never double-counts.
    pub fn update(
        &mut self,
        timestamp: DateTime<Utc>,
        price_yes: Decimal,
        price_no: Decimal,
    ) -> LeaderUpdate {
        if let (Some(last), Some(prev)) = (self.last_observed, self.last_update) {
            if timestamp <= last {
                return LeaderUpdate {
                    flipped: false,
                    ..prev
                };
            }
        }
        self.last_observed = Some(timestamp);

        let observed = if price_yes > price_no {
            Side::Yes
        } else {
            Side::No
        };
        self.bias.push(
            timestamp,
            match observed {
                Side::Yes => 1.0,
                Side::No => -1.0,
            },
        );
        self.recent_flips.expire(timestamp);

        let mut flipped = false;
        match self.current {
            None => {
                self.current = Some(observed);
            }
            Some(current) if current == observed => {
                self.pending = None;
            }
            Some(_) => {
                let count = match self.pending {
                    Some(p) if p.candidate == observed => p.count + 1,
                    _ => 1,
                };
                if count >= self.confirm_ticks {
                    self.current = Some(observed);
                    self.pending = None;
                    self.total_flips += 1;
                    self.recent_flips.push(timestamp, ());
                    flipped = true;
                    tracing::debug!(leader = %observed, total_flips = self.total_flips, "Leader flip confirmed");
                } else {
                    self.pending = Some(PendingFlip {
                        candidate: observed,
                        count,
                    });
                }
            }
        }

        let update = LeaderUpdate {
            leader: self.current.unwrap_or(observed),
            flipped,
            flip_count: self.recent_flips.len(),
            total_flips: self.total_flips,
            spread: (price_yes - price_no).abs(),
        };
        self.last_update = Some(update);
        update
    }

    /// Current leading outcome, if any observation has been made
    pub fn leader(&self) -> Option<Side> {
        self.current
    }

    /// Confirmed flips since the last window reset
    pub fn total_flips(&self) -> u32 {
        self.total_flips
    }

    /// Confirmed flips inside the rolling window
    pub fn flip_count(&self) -> usize {
        self.recent_flips.len()
    }

    /// Rolling leader bias in [-1, 1]; positive favours YES
    pub fn bias(&self) -> f64 {
        self.bias.mean().unwrap_or(0.0)
    }

    /// Per-window reset: clears window counters, keeps the current leader
    pub fn reset_window(&mut self) {
        self.total_flips = 0;
        self.pending = None;
    }
}
