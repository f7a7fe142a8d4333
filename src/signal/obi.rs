//! Order-book imbalance estimation
//!
//! OBI = (bid - ask) / (bid + ask) in [-1, 1], rolling-averaged per side.
//! When book depth is unavailable a price proxy `(price - 0.5) * 2` is used
//! instead, and the reading is labelled as such.

use super::{RollingWindow, Side};
use crate::orderbook::OrderBook;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// OBI engine configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObiConfig {
    /// Rolling average window (seconds)
    #[serde(default = "default_obi_window_secs")]
    pub window_secs: u64,
    /// Book levels summed on each side
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
}

fn default_obi_window_secs() -> u64 {
    90
}
fn default_depth_levels() -> usize {
    5
}

impl Default for ObiConfig {
    fn default() -> Self {
        Self {
            window_secs: default_obi_window_secs(),
            depth_levels: default_depth_levels(),
        }
    }
}

/// Which estimator produced a reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObiMethod {
    Book,
    PriceProxy,
}

/// One instantaneous OBI sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObiReading {
    pub side: Side,
    pub value: f64,
    pub method: ObiMethod,
}

/// Raw imbalance from bid and ask volume; 0 when both are empty
pub fn imbalance(bid_volume: Decimal, ask_volume: Decimal) -> f64 {
    let total = bid_volume + ask_volume;
    if total.is_zero() {
        return 0.0;
    }
    ((bid_volume - ask_volume) / total)
        .to_f64()
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0)
}

/// Price-based imbalance proxy
pub fn price_imbalance(price: Decimal) -> f64 {
    ((price - Decimal::new(5, 1)) * Decimal::TWO)
        .to_f64()
        .unwrap_or(0.0)
        .clamp(-1.0, 1.0)
}

/// Entry gate on a side's rolling OBI; the threshold itself blocks
pub fn obi_blocks(rolling: f64, threshold: f64) -> bool {
    rolling <= threshold
}

/// Rolling OBI per outcome side for one asset
#[derive(Debug, Clone)]
pub struct ObiEngine {
    depth_levels: usize,
    yes: RollingWindow<f64>,
    no: RollingWindow<f64>,
    last_method: Option<ObiMethod>,
}

impl ObiEngine {
    pub fn new(config: &ObiConfig) -> Self {
        let window = Duration::seconds(config.window_secs as i64);
        Self {
            depth_levels: config.depth_levels.max(1),
            yes: RollingWindow::new(window),
            no: RollingWindow::new(window),
            last_method: None,
        }
    }

    /// Record a sample from bid/ask volume
    pub fn update(
        &mut self,
        timestamp: DateTime<Utc>,
        side: Side,
        bid_volume: Decimal,
        ask_volume: Decimal,
    ) -> ObiReading {
        let value = imbalance(bid_volume, ask_volume);
        self.record(timestamp, side, value, ObiMethod::Book)
    }

    /// Record a sample from an order book snapshot
    pub fn update_book(
        &mut self,
        timestamp: DateTime<Utc>,
        side: Side,
        book: &OrderBook,
    ) -> ObiReading {
        let bids = book.bid_depth(self.depth_levels);
        let asks = book.ask_depth(self.depth_levels);
        self.update(timestamp, side, bids, asks)
    }

    /// Record a sample from the price proxy
    pub fn update_price(
        &mut self,
        timestamp: DateTime<Utc>,
        side: Side,
        price: Decimal,
    ) -> ObiReading {
        let value = price_imbalance(price);
        self.record(timestamp, side, value, ObiMethod::PriceProxy)
    }

    fn record(
        &mut self,
        timestamp: DateTime<Utc>,
        side: Side,
        value: f64,
        method: ObiMethod,
    ) -> ObiReading {
        match side {
            Side::Yes => self.yes.push(timestamp, value),
            Side::No => self.no.push(timestamp, value),
        }
        self.last_method = Some(method);
        ObiReading {
            side,
            value,
            method,
        }
    }

    /// Drop samples that have left the window as of `now`
    pub fn expire(&mut self, now: DateTime<Utc>) {
        self.yes.expire(now);
        self.no.expire(now);
    }

    /// Rolling average for one side, `None` with no samples in the window
    pub fn rolling_reading(&self, side: Side) -> Option<f64> {
        match side {
            Side::Yes => self.yes.mean(),
            Side::No => self.no.mean(),
        }
    }

    /// Rolling average for one side, 0 with no samples
    pub fn rolling(&self, side: Side) -> f64 {
        self.rolling_reading(side).unwrap_or(0.0)
    }

    /// Average of both sides' rolling averages
    pub fn combined(&self) -> f64 {
        (self.rolling(Side::Yes) + self.rolling(Side::No)) / 2.0
    }

    /// True when a side's rolling OBI is at or below the threshold
    pub fn is_blocking(&self, side: Side, threshold: f64) -> bool {
        obi_blocks(self.rolling(side), threshold)
    }

    /// Estimator used for the latest sample
    pub fn last_method(&self) -> Option<ObiMethod> {
        self.last_method
    }

    pub fn reset(&mut self) {
        self.yes.clear();
        self.no.clear();
        self.last_method = None;
    }
}
