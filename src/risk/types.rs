//! Risk management types

use rust_decimal::Decimal;
use thiserror::Error;

/// Reasons a prospective order is refused
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RiskError {
    /// Projected shares exceed the cap
    #[error("Share cap exceeded: {projected} > {cap}")]
    ShareCapExceeded { projected: Decimal, cap: Decimal },
    /// Projected cost exceeds the notional cap
    #[error("Notional cap exceeded: {projected} > {cap}")]
    NotionalCapExceeded { projected: Decimal, cap: Decimal },
    /// Projected pair cost above the ceiling
    #[error("Pair cost too high: {projected} > {ceiling}")]
    PairCostTooHigh { projected: Decimal, ceiling: Decimal },
    /// Too many resting orders
    #[error("Open order cap reached: {open} >= {cap}")]
    OpenOrderCapReached { open: usize, cap: usize },
    /// Non-positive size or price
    #[error("Invalid order: {0}")]
    InvalidOrder(String),
}

/// Lock and recovery computation errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LockError {
    /// Buying at or above redemption value cannot reduce a deficit
    #[error("Cannot recover at price {0}: at or above redemption value")]
    PriceAtOrAboveRedemption(Decimal),
    /// Negative price
    #[error("Invalid price: {0}")]
    InvalidPrice(Decimal),
    /// Winner and loser prices leave no spread to solve against
    #[error("Non-positive spread: {0}")]
    NonPositiveSpread(Decimal),
}
