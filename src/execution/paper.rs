//! Paper trading exchange with simulated fills
//!
//! All state lives in one ledger behind a mutex; every operation takes the
//! lock once, so a fill's balance and position updates are atomic.

use super::{
    Exchange, ExecutionError, Fill, OrderAck, OrderId, OrderRequest, OrderStatus, OrderType,
    RestingOrder, TokenPosition,
};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::Mutex;

#[derive(Debug, Default)]
struct Ledger {
    balance: Decimal,
    positions: HashMap<String, TokenPosition>,
    open: Vec<RestingOrder>,
    fills: Vec<Fill>,
    marks: HashMap<String, Decimal>,
}

impl Ledger {
    /// Apply a buy fill to balance and positions; fees are part of cost
    fn apply(&mut self, fill: Fill) -> Result<(), ExecutionError> {
        let needed = fill.price * fill.size + fill.fees;
        if needed > self.balance {
            return Err(ExecutionError::InsufficientBalance {
                needed,
                available: self.balance,
            });
        }
        self.balance -= needed;
        let position = self.positions.entry(fill.token_id.clone()).or_default();
        position.shares += fill.size;
        position.cost += needed;
        self.fills.push(fill);
        Ok(())
    }
}

/// Paper trading exchange
pub struct PaperExchange {
    fee_rate: Decimal,
    ledger: Mutex<Ledger>,
}

impl PaperExchange {
    /// Create a paper exchange with a starting balance and taker fee rate
    pub fn new(initial_balance: Decimal, fee_rate: Decimal) -> Self {
        Self {
            fee_rate,
            ledger: Mutex::new(Ledger {
                balance: initial_balance,
                ..Ledger::default()
            }),
        }
    }

    /// All fills so far
    pub async fn fills(&self) -> Vec<Fill> {
        self.ledger.lock().await.fills.clone()
    }

    fn validate(order: &OrderRequest) -> Result<(), ExecutionError> {
        if order.size <= Decimal::ZERO {
            return Err(ExecutionError::InvalidOrder(format!(
                "size must be positive, got {}",
                order.size
            )));
        }
        if order.price <= Decimal::ZERO || order.price > Decimal::ONE {
            return Err(ExecutionError::InvalidOrder(format!(
                "price must be in (0, 1], got {}",
                order.price
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn place_order(&self, order: OrderRequest) -> anyhow::Result<OrderAck> {
        Self::validate(&order)?;
        let order_id = OrderId::new_v4();
        let mut ledger = self.ledger.lock().await;

        if order.order_type == OrderType::Gtc {
            ledger.open.push(RestingOrder {
                order_id,
                request: order,
                created_at: Utc::now(),
            });
            tracing::debug!(?order_id, "Paper GTC order resting");
            return Ok(OrderAck {
                order_id,
                status: OrderStatus::Open,
                fill_price: None,
                filled_size: None,
            });
        }

        let marketable = ledger
            .marks
            .get(&order.token_id)
            .filter(|mark| order.price >= **mark)
            .copied();

        let Some(price) = marketable else {
            tracing::info!(?order_id, token = %order.token_id, price = %order.price, "Paper order killed");
            return Ok(OrderAck {
                order_id,
                status: OrderStatus::Killed,
                fill_price: None,
                filled_size: None,
            });
        };

        let fill = Fill {
            order_id,
            token_id: order.token_id.clone(),
            price,
            size: order.size,
            fees: price * order.size * self.fee_rate,
            timestamp: Utc::now(),
        };
        ledger.apply(fill)?;

        tracing::info!(?order_id, token = %order.token_id, %price, size = %order.size, "Paper order filled");
        Ok(OrderAck {
            order_id,
            status: OrderStatus::Filled,
            fill_price: Some(price),
            filled_size: Some(order.size),
        })
    }

    async fn cancel_order(&self, id: OrderId) -> anyhow::Result<()> {
        let mut ledger = self.ledger.lock().await;
        let before = ledger.open.len();
        ledger.open.retain(|o| o.order_id != id);
        if ledger.open.len() == before {
            return Err(ExecutionError::UnknownOrder(id).into());
        }
        tracing::info!(?id, "Paper order cancelled");
        Ok(())
    }

    async fn positions(&self) -> anyhow::Result<HashMap<String, TokenPosition>> {
        Ok(self.ledger.lock().await.positions.clone())
    }

    async fn balance(&self) -> anyhow::Result<Decimal> {
        Ok(self.ledger.lock().await.balance)
    }

    async fn open_orders(&self) -> anyhow::Result<Vec<RestingOrder>> {
        Ok(self.ledger.lock().await.open.clone())
    }

    async fn observe_price(&self, token_id: &str, price: Decimal) -> anyhow::Result<()> {
        let mut ledger = self.ledger.lock().await;
        ledger.marks.insert(token_id.to_string(), price);

        let (crossed, resting): (Vec<RestingOrder>, Vec<RestingOrder>) =
            std::mem::take(&mut ledger.open)
                .into_iter()
                .partition(|o| o.request.token_id == token_id && o.request.price >= price);
        ledger.open = resting;

        for order in crossed {
            let fill = Fill {
                order_id: order.order_id,
                token_id: order.request.token_id.clone(),
                price: order.request.price,
                size: order.request.size,
                fees: Decimal::ZERO,
                timestamp: Utc::now(),
            };
            match ledger.apply(fill) {
                Ok(()) => tracing::info!(
                    order_id = ?order.order_id,
                    token = %token_id,
                    price = %order.request.price,
                    size = %order.request.size,
                    "Paper resting order filled"
                ),
                Err(e) => tracing::warn!(
                    order_id = ?order.order_id,
                    error = %e,
                    "Paper resting order cancelled at match"
                ),
            }
        }
        Ok(())
    }

    async fn settle(&self, winning_token: &str, losing_token: &str) -> anyhow::Result<Decimal> {
        let mut ledger = self.ledger.lock().await;
        let payout = ledger
            .positions
            .remove(winning_token)
            .map(|p| p.shares)
            .unwrap_or(Decimal::ZERO);
        ledger.positions.remove(losing_token);
        ledger
            .open
            .retain(|o| o.request.token_id != winning_token && o.request.token_id != losing_token);
        ledger.balance += payout;
        tracing::info!(winning_token, %payout, "Paper market settled");
        Ok(payout)
    }
}
