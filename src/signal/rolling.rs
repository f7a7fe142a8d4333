//! Time-windowed sample buffer
//!
//! Keeps timestamped samples for a fixed duration. Shared by the OBI engine
//! and the leader tracker.

use chrono::{DateTime, Duration, Utc};
use std::collections::VecDeque;

/// Fixed-duration rolling sample buffer
#[derive(Debug, Clone)]
pub struct RollingWindow<T> {
    window: Duration,
    samples: VecDeque<(DateTime<Utc>, T)>,
}

impl<T> RollingWindow<T> {
    /// Create an empty window covering `window`
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            samples: VecDeque::new(),
        }
    }

    /// Add a sample and drop everything older than the window
    pub fn push(&mut self, timestamp: DateTime<Utc>, value: T) {
        self.samples.push_back((timestamp, value));
        self.expire(timestamp);
    }

    /// Drop samples strictly older than `now - window`
    pub fn expire(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while let Some((ts, _)) = self.samples.front() {
            if *ts < cutoff {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    /// Window duration
    pub fn window(&self) -> Duration {
        self.window
    }

    /// Iterate samples oldest first
    pub fn iter(&self) -> impl Iterator<Item = &(DateTime<Utc>, T)> {
        self.samples.iter()
    }
}

impl RollingWindow<f64> {
    /// Arithmetic mean of the samples, None when empty
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|(_, v)| *v).sum();
        Some(sum / self.samples.len() as f64)
    }
}
