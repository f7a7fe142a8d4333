//! Order book state

use super::PriceLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// L2 aggregated order book for a token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBook {
    /// Token identifier
    pub token_id: String,
    /// Bid levels, sorted best (highest) to worst
    pub bids: Vec<PriceLevel>,
    /// Ask levels, sorted best (lowest) to worst
    pub asks: Vec<PriceLevel>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            bids: vec![],
            asks: vec![],
            updated_at: Utc::now(),
        }
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Total bid size over the best `levels` levels
    pub fn bid_depth(&self, levels: usize) -> Decimal {
        self.bids.iter().take(levels).map(|l| l.size).sum()
    }

    /// Total ask size over the best `levels` levels
    pub fn ask_depth(&self, levels: usize) -> Decimal {
        self.asks.iter().take(levels).map(|l| l.size).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, size: Decimal) -> PriceLevel {
        PriceLevel { price, size }
    }

    #[test]
    fn test_order_book_best_levels() {
        let mut book = OrderBook::new("test");
        book.bids = vec![level(dec!(0.50), dec!(100))];
        book.asks = vec![level(dec!(0.52), dec!(100))];

        assert_eq!(book.best_bid(), Some(dec!(0.50)));
        assert_eq!(book.best_ask(), Some(dec!(0.52)));
    }

    #[test]
    fn test_order_book_new() {
        let book = OrderBook::new("test-token");
        assert_eq!(book.token_id, "test-token");
        assert!(book.is_empty());
        assert!(book.best_bid().is_none());
        assert!(book.best_ask().is_none());
    }

    #[test]
    fn test_depth_sums_top_levels() {
        let mut book = OrderBook::new("test");
        book.bids = vec![
            level(dec!(0.55), dec!(100)),
            level(dec!(0.54), dec!(50)),
            level(dec!(0.53), dec!(25)),
        ];
        book.asks = vec![level(dec!(0.56), dec!(10))];

        assert_eq!(book.bid_depth(2), dec!(150));
        assert_eq!(book.bid_depth(10), dec!(175));
        assert_eq!(book.ask_depth(5), dec!(10));
        assert_eq!(book.best_bid(), Some(dec!(0.55)));
    }
}
