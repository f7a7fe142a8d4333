//! Upstream spot feed module
//!
//! Recent 1-minute spot closes and the return series derived from them

mod binance;
mod types;

pub use binance::{BinanceKlines, BINANCE_API_URL};
pub use types::{score_inputs_from_closes, simple_returns, ReturnWindows};

use crate::market::Asset;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Source of recent spot closes
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Up to `limit` 1-minute closes, oldest first
    async fn recent_closes(&self, asset: Asset, limit: usize) -> anyhow::Result<Vec<Decimal>>;
}
