//! Completed-window results

use crate::market::Asset;
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How a settled window ended for one asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Win,
    Loss,
    /// No shares held, or payout equal to cost
    Flat,
}

/// Settlement of one (window, asset)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowResult {
    pub window_start: DateTime<Utc>,
    pub asset: Asset,
    pub winner: Side,
    pub locked: bool,
    pub cost: Decimal,
    pub payout: Decimal,
    pub pnl: Decimal,
}

impl WindowResult {
    pub fn outcome(&self) -> Outcome {
        if self.cost.is_zero() || self.pnl.is_zero() {
            Outcome::Flat
        } else if self.pnl > Decimal::ZERO {
            Outcome::Win
        } else {
            Outcome::Loss
        }
    }
}

/// Running totals across all settled windows
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatsSummary {
    pub windows: usize,
    pub wins: u32,
    pub losses: u32,
    pub flats: u32,
    pub locked: u32,
    pub total_pnl: Decimal,
}

/// Results keyed by (window start, asset)
#[derive(Debug, Clone, Default)]
pub struct WindowStats {
    results: BTreeMap<(DateTime<Utc>, Asset), WindowResult>,
    summary: StatsSummary,
}

impl WindowStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a settlement; a key already recorded is left untouched
    pub fn record(&mut self, result: WindowResult) -> bool {
        let key = (result.window_start, result.asset);
        if self.results.contains_key(&key) {
            return false;
        }

        match result.outcome() {
            Outcome::Win => self.summary.wins += 1,
            Outcome::Loss => self.summary.losses += 1,
            Outcome::Flat => self.summary.flats += 1,
        }
        if result.locked {
            self.summary.locked += 1;
        }
        self.summary.total_pnl += result.pnl;
        if !self.results.keys().any(|(start, _)| *start == result.window_start) {
            self.summary.windows += 1;
        }

        self.results.insert(key, result);
        true
    }

    pub fn get(&self, window_start: DateTime<Utc>, asset: Asset) -> Option<&WindowResult> {
        self.results.get(&(window_start, asset))
    }

    pub fn summary(&self) -> &StatsSummary {
        &self.summary
    }

    /// Results for one asset, oldest first
    pub fn for_asset(&self, asset: Asset) -> impl Iterator<Item = &WindowResult> {
        self.results.values().filter(move |r| r.asset == asset)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}
