//! Execution types

use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// Order time-in-force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    /// Fill-or-kill: fills completely right away or not at all
    Fok,
    /// Immediate-or-cancel
    Ioc,
    /// Good-till-cancelled resting order
    Gtc,
}

impl OrderType {
    /// Taker order types that resolve synchronously
    pub fn is_urgent(self) -> bool {
        matches!(self, OrderType::Fok | OrderType::Ioc)
    }
}

/// A buy order to be submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Token identifier
    pub token_id: String,
    /// Outcome the token represents
    pub outcome: Side,
    /// Limit price
    pub price: Decimal,
    /// Size in shares
    pub size: Decimal,
    pub order_type: OrderType,
}

impl OrderRequest {
    /// Buy order for an outcome token
    pub fn buy(
        token_id: impl Into<String>,
        outcome: Side,
        price: Decimal,
        size: Decimal,
        order_type: OrderType,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            outcome,
            price,
            size,
            order_type,
        }
    }
}

/// Order outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Filled,
    Killed,
    Open,
}

/// Exchange response to an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderAck {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub fill_price: Option<Decimal>,
    pub filled_size: Option<Decimal>,
}

/// A fill (executed trade)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    /// Order ID
    pub order_id: OrderId,
    /// Token ID
    pub token_id: String,
    /// Fill price
    pub price: Decimal,
    /// Fill size
    pub size: Decimal,
    /// Fees paid
    pub fees: Decimal,
    /// Fill timestamp
    pub timestamp: DateTime<Utc>,
}

/// Shares and total cost held in one token
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPosition {
    pub shares: Decimal,
    pub cost: Decimal,
}

/// A GTC order waiting in the book
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestingOrder {
    pub order_id: OrderId,
    pub request: OrderRequest,
    pub created_at: DateTime<Utc>,
}

/// Execution errors
#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: Decimal, available: Decimal },
    #[error("Unknown order: {0}")]
    UnknownOrder(OrderId),
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
    #[error("Live execution is not supported")]
    LiveUnsupported,
}
