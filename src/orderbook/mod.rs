//! Order book module
//!
//! Token prices and order book snapshots from the Polymarket CLOB

mod book;
mod client;

pub use book::OrderBook;
pub use client::{ClobClient, ClobConfig, CLOB_API_URL};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size available
    pub size: Decimal,
}

/// Source of token prices and books
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price for a token, in [0, 1]
    async fn get_price(&self, token_id: &str) -> anyhow::Result<Decimal>;
    /// Current order book for a token
    async fn get_order_book(&self, token_id: &str) -> anyhow::Result<OrderBook>;
}
