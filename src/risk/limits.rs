//! Per-asset exposure caps

use super::{Position, RiskError};
use crate::execution::OrderType;
use crate::market::Asset;
use crate::signal::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Ceiling for one asset
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RiskCaps {
    /// Maximum shares held across both sides
    pub max_shares: Decimal,
    /// Maximum total cost (USD)
    pub max_notional: Decimal,
    /// Maximum concurrently resting orders
    pub max_open_orders: usize,
}

impl Default for RiskCaps {
    fn default() -> Self {
        Self {
            max_shares: dec!(200),
            max_notional: dec!(100),
            max_open_orders: 4,
        }
    }
}

/// Risk configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RiskConfig {
    /// Pair cost ceiling for pair-building orders
    #[serde(default = "default_max_pair_cost")]
    pub max_pair_cost: Decimal,
    /// Tolerance above the ceiling
    #[serde(default = "default_pair_cost_buffer")]
    pub pair_cost_buffer: Decimal,
    /// Surcharge applied to urgent (taker) orders when projecting pair cost
    #[serde(default = "default_taker_fee")]
    pub taker_fee: Decimal,
    #[serde(default)]
    pub default_caps: RiskCaps,
    /// Per-asset overrides of `default_caps`
    #[serde(default)]
    pub caps: HashMap<Asset, RiskCaps>,
}

fn default_max_pair_cost() -> Decimal {
    dec!(0.99)
}
fn default_pair_cost_buffer() -> Decimal {
    dec!(0.01)
}
fn default_taker_fee() -> Decimal {
    dec!(0.02)
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_pair_cost: default_max_pair_cost(),
            pair_cost_buffer: default_pair_cost_buffer(),
            taker_fee: default_taker_fee(),
            default_caps: RiskCaps::default(),
            caps: HashMap::new(),
        }
    }
}

impl RiskConfig {
    pub fn caps_for(&self, asset: Asset) -> RiskCaps {
        self.caps.get(&asset).copied().unwrap_or(self.default_caps)
    }
}

/// What an asset currently holds and has resting
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Exposure {
    pub position: Position,
    /// Shares and cost of resting buy orders, as if they all filled
    pub resting: Position,
    pub open_orders: usize,
}

impl Exposure {
    /// Held position with nothing resting
    pub fn holding(position: Position) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// Shares held plus shares resting
    pub fn committed_shares(&self) -> Decimal {
        self.position.total_shares() + self.resting.total_shares()
    }

    /// Cost held plus cost resting
    pub fn committed_cost(&self) -> Decimal {
        self.position.total_cost() + self.resting.total_cost()
    }
}

/// Pre-trade gate; a refused order is not placed and not retried
#[derive(Debug, Clone)]
pub struct RiskLimiter {
    config: RiskConfig,
}

impl RiskLimiter {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    pub fn caps_for(&self, asset: Asset) -> RiskCaps {
        self.config.caps_for(asset)
    }

    /// Share and notional caps, counting resting orders as filled
    pub fn can_place_order(
        &self,
        exposure: &Exposure,
        price: Decimal,
        size: Decimal,
        caps: &RiskCaps,
    ) -> Result<(), RiskError> {
        if size <= Decimal::ZERO {
            return Err(RiskError::InvalidOrder(format!("size {size} must be positive")));
        }
        if price <= Decimal::ZERO || price > Decimal::ONE {
            return Err(RiskError::InvalidOrder(format!("price {price} outside (0, 1]")));
        }

        let projected_shares = exposure.committed_shares() + size;
        if projected_shares > caps.max_shares {
            return Err(RiskError::ShareCapExceeded {
                projected: projected_shares,
                cap: caps.max_shares,
            });
        }

        let projected_cost = exposure.committed_cost() + price * size;
        if projected_cost > caps.max_notional {
            return Err(RiskError::NotionalCapExceeded {
                projected: projected_cost,
                cap: caps.max_notional,
            });
        }

        Ok(())
    }

    /// Caps plus the projected pair cost and the resting-order cap
    ///
    /// The pair cost is projected on the held position plus this order, and
    /// only once both sides would be held.
    pub fn can_add_pair_position(
        &self,
        exposure: &Exposure,
        side: Side,
        price: Decimal,
        size: Decimal,
        order_type: OrderType,
        caps: &RiskCaps,
    ) -> Result<(), RiskError> {
        self.can_place_order(exposure, price, size, caps)?;

        if !order_type.is_urgent() && exposure.open_orders >= caps.max_open_orders {
            return Err(RiskError::OpenOrderCapReached {
                open: exposure.open_orders,
                cap: caps.max_open_orders,
            });
        }

        let effective_price = if order_type.is_urgent() {
            price * (Decimal::ONE + self.config.taker_fee)
        } else {
            price
        };
        let mut next = exposure.position;
        next.apply_buy(side, effective_price, size);

        let matched = next.yes_shares.min(next.no_shares);
        if matched > Decimal::ZERO {
            let pair_cost = next.total_cost() / matched;
            let ceiling = self.config.max_pair_cost + self.config.pair_cost_buffer;
            if pair_cost > ceiling {
                return Err(RiskError::PairCostTooHigh {
                    projected: pair_cost,
                    ceiling,
                });
            }
        }

        Ok(())
    }
}
