//! Per-window dual-outcome position

use crate::execution::{RestingOrder, TokenPosition};
use crate::market::WindowMarket;
use crate::signal::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Shares and cost held on each outcome of one market
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub yes_shares: Decimal,
    pub yes_cost: Decimal,
    pub no_shares: Decimal,
    pub no_cost: Decimal,
}

impl Position {
    pub fn new(yes_shares: Decimal, yes_cost: Decimal, no_shares: Decimal, no_cost: Decimal) -> Self {
        Self {
            yes_shares,
            yes_cost,
            no_shares,
            no_cost,
        }
    }

    /// Build from exchange positions for a market's two tokens
    pub fn from_tokens(market: &WindowMarket, tokens: &HashMap<String, TokenPosition>) -> Self {
        let yes = tokens.get(&market.yes_token_id).copied().unwrap_or_default();
        let no = tokens.get(&market.no_token_id).copied().unwrap_or_default();
        Self {
            yes_shares: yes.shares,
            yes_cost: yes.cost,
            no_shares: no.shares,
            no_cost: no.cost,
        }
    }

    /// Shares and cost of a market's resting orders, as if they all filled
    pub fn from_resting(market: &WindowMarket, orders: &[RestingOrder]) -> Self {
        let mut resting = Self::default();
        for order in orders.iter().map(|o| &o.request) {
            if order.token_id == market.token_id(order.outcome) {
                resting.apply_buy(order.outcome, order.price, order.size);
            }
        }
        resting
    }

    /// Record a buy fill on one side
    pub fn apply_buy(&mut self, side: Side, price: Decimal, size: Decimal) {
        match side {
            Side::Yes => {
                self.yes_shares += size;
                self.yes_cost += price * size;
            }
            Side::No => {
                self.no_shares += size;
                self.no_cost += price * size;
            }
        }
    }

    pub fn shares(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_shares,
            Side::No => self.no_shares,
        }
    }

    pub fn cost(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_cost,
            Side::No => self.no_cost,
        }
    }

    pub fn total_shares(&self) -> Decimal {
        self.yes_shares + self.no_shares
    }

    pub fn total_cost(&self) -> Decimal {
        self.yes_cost + self.no_cost
    }

    /// Average entry price on one side
    pub fn avg_price(&self, side: Side) -> Option<Decimal> {
        let shares = self.shares(side);
        if shares.is_zero() {
            return None;
        }
        Some(self.cost(side) / shares)
    }

    /// Net result if `side` wins: winning shares redeem at 1, the rest at 0
    pub fn pnl_if(&self, side: Side) -> Decimal {
        self.shares(side) - self.total_cost()
    }

    pub fn is_flat(&self) -> bool {
        self.yes_shares.is_zero() && self.no_shares.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{OrderRequest, OrderType};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_apply_buy_and_average() {
        let mut position = Position::default();
        position.apply_buy(Side::Yes, dec!(0.40), dec!(10));
        position.apply_buy(Side::Yes, dec!(0.50), dec!(10));
        assert_eq!(position.yes_shares, dec!(20));
        assert_eq!(position.yes_cost, dec!(9));
        assert_eq!(position.avg_price(Side::Yes), Some(dec!(0.45)));
        assert!(position.avg_price(Side::No).is_none());
    }

    #[test]
    fn test_pnl_per_outcome() {
        let position = Position::new(dec!(20), dec!(9), dec!(10), dec!(4));
        assert_eq!(position.pnl_if(Side::Yes), dec!(7));
        assert_eq!(position.pnl_if(Side::No), dec!(-3));
        assert_eq!(position.total_cost(), dec!(13));
        assert_eq!(position.total_shares(), dec!(30));
    }

    fn market() -> WindowMarket {
        WindowMarket {
            asset: crate::market::Asset::Btc,
            venue_id: "0x1".to_string(),
            slug: "btc".to_string(),
            yes_token_id: "yes".to_string(),
            no_token_id: "no".to_string(),
            window_start: Utc::now(),
            end_time: Utc::now(),
        }
    }

    fn resting(token: &str, outcome: Side, price: Decimal, size: Decimal) -> RestingOrder {
        RestingOrder {
            order_id: uuid::Uuid::new_v4(),
            request: OrderRequest::buy(token, outcome, price, size, OrderType::Gtc),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_from_resting_sums_this_market_only() {
        let orders = vec![
            resting("no", Side::No, dec!(0.38), dec!(10)),
            resting("no", Side::No, dec!(0.36), dec!(10)),
            resting("yes", Side::Yes, dec!(0.5), dec!(4)),
            resting("sol-no", Side::No, dec!(0.2), dec!(50)),
        ];
        let position = Position::from_resting(&market(), &orders);
        assert_eq!(position, Position::new(dec!(4), dec!(2), dec!(20), dec!(7.4)));
    }

    #[test]
    fn test_from_tokens() {
        let market = market();
        let mut tokens = HashMap::new();
        tokens.insert(
            "yes".to_string(),
            TokenPosition {
                shares: dec!(5),
                cost: dec!(2.5),
            },
        );
        tokens.insert(
            "other".to_string(),
            TokenPosition {
                shares: dec!(99),
                cost: dec!(1),
            },
        );
        let position = Position::from_tokens(&market, &tokens);
        assert_eq!(position, Position::new(dec!(5), dec!(2.5), dec!(0), dec!(0)));
        assert!(!position.is_flat());
    }
}
