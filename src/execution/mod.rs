//! Execution engine module
//!
//! The exchange capability the strategy depends on, and a simulated
//! (paper) implementation with a single serialized ledger

mod paper;
mod types;

pub use paper::PaperExchange;
pub use types::{
    ExecutionError, Fill, OrderAck, OrderId, OrderRequest, OrderStatus, OrderType,
    RestingOrder, TokenPosition,
};

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Trait for exchange implementations
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Submit an order; taker orders resolve before returning
    async fn place_order(&self, order: OrderRequest) -> anyhow::Result<OrderAck>;
    /// Cancel a resting order
    async fn cancel_order(&self, id: OrderId) -> anyhow::Result<()>;
    /// Positions by token ID
    async fn positions(&self) -> anyhow::Result<HashMap<String, TokenPosition>>;
    /// Free cash balance
    async fn balance(&self) -> anyhow::Result<Decimal>;
    /// Resting orders
    async fn open_orders(&self) -> anyhow::Result<Vec<RestingOrder>>;
    /// Latest market price for a token; drives matching on a simulated venue
    async fn observe_price(&self, token_id: &str, price: Decimal) -> anyhow::Result<()>;
    /// Redeem a finished market, returns the payout
    async fn settle(&self, winning_token: &str, losing_token: &str) -> anyhow::Result<Decimal>;
}
