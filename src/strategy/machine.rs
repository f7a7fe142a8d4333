//! Per-asset trading state machine
//!
//! One machine owns everything about one asset in the current window:
//! position, leader tracker, OBI engine, lock detector and the phase flags
//! that keep each phase to a single attempt. The orchestrator feeds it
//! observations and exposure, then calls [`AssetMachine::step`] once per tick.

use super::TradingState;
use crate::data::AssetSnapshot;
use crate::execution::{Exchange, OrderAck, OrderRequest, OrderStatus, OrderType};
use crate::guardrail::{GuardrailDecision, GuardrailEvaluator, GuardrailInputs, GuardrailMode};
use crate::market::{Asset, Window, WindowMarket};
use crate::orderbook::OrderBook;
use crate::risk::{analyze, recovery_shares, Exposure, LockAnalysis, LockDetector, Position, RiskLimiter};
use crate::signal::{
    LeaderConfig, LeaderFlipTracker, LeaderUpdate, ObiConfig, ObiEngine, Regime, ScoreResult, Side,
};
use crate::telemetry::metrics;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lowest price a limit order is placed at
const MIN_ORDER_PRICE: Decimal = dec!(0.01);
/// Highest price a limit order is placed at
const MAX_ORDER_PRICE: Decimal = dec!(0.99);

/// Order sizing and phase thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StrategyConfig {
    /// Shares bought by the entry order
    #[serde(default = "default_entry_size")]
    pub entry_size: Decimal,
    /// Added to the quote to form taker limit prices
    #[serde(default = "default_slippage")]
    pub slippage: Decimal,
    /// Ladder rung offsets below the hedge side's price
    #[serde(default = "default_ladder_offsets")]
    pub ladder_offsets: Vec<Decimal>,
    /// Shares per ladder rung
    #[serde(default = "default_ladder_size")]
    pub ladder_size: Decimal,
    /// Deficit (USD) above which LOCKING switches to RECOVERY
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: Decimal,
    /// Extra shares added to recovery sizing
    #[serde(default = "default_recovery_buffer")]
    pub recovery_buffer: Decimal,
    /// Upper bound on a single corrective order
    #[serde(default = "default_max_recovery_shares")]
    pub max_recovery_shares: Decimal,
    /// Corrective orders allowed per window
    #[serde(default = "default_max_recovery_attempts")]
    pub max_recovery_attempts: u32,
    /// Remaining seconds at which ENDGAME starts
    #[serde(default = "default_endgame_secs")]
    pub endgame_secs: u64,
    /// Leader price at which ENDGAME tops up a deficit
    #[serde(default = "default_endgame_price")]
    pub endgame_price: Decimal,
}

fn default_entry_size() -> Decimal {
    dec!(5)
}
fn default_slippage() -> Decimal {
    dec!(0.01)
}
fn default_ladder_offsets() -> Vec<Decimal> {
    vec![dec!(0.02), dec!(0.04), dec!(0.06)]
}
fn default_ladder_size() -> Decimal {
    dec!(5)
}
fn default_recovery_threshold() -> Decimal {
    dec!(5)
}
fn default_recovery_buffer() -> Decimal {
    dec!(1)
}
fn default_max_recovery_shares() -> Decimal {
    dec!(50)
}
fn default_max_recovery_attempts() -> u32 {
    1
}
fn default_endgame_secs() -> u64 {
    10
}
fn default_endgame_price() -> Decimal {
    dec!(0.92)
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            entry_size: default_entry_size(),
            slippage: default_slippage(),
            ladder_offsets: default_ladder_offsets(),
            ladder_size: default_ladder_size(),
            recovery_threshold: default_recovery_threshold(),
            recovery_buffer: default_recovery_buffer(),
            max_recovery_shares: default_max_recovery_shares(),
            max_recovery_attempts: default_max_recovery_attempts(),
            endgame_secs: default_endgame_secs(),
            endgame_price: default_endgame_price(),
        }
    }
}

/// Last known YES/NO prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub yes: Decimal,
    pub no: Decimal,
    pub at: DateTime<Utc>,
}

impl Quote {
    pub fn price(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes,
            Side::No => self.no,
        }
    }
}

/// Fresh data for one tick; `None` fields fall back to last-known values
#[derive(Debug, Clone, Default)]
pub struct MarketObservation {
    pub price_yes: Option<Decimal>,
    pub price_no: Option<Decimal>,
    pub book_yes: Option<OrderBook>,
    pub book_no: Option<OrderBook>,
}

/// Shared read-only inputs for one step
pub struct StepContext<'a> {
    pub now: DateTime<Utc>,
    pub window: Window,
    pub score: Option<&'a ScoreResult>,
    pub guardrails: &'a GuardrailEvaluator,
    pub risk: &'a RiskLimiter,
}

/// What a step did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub transition: Option<(TradingState, TradingState)>,
    pub orders_attempted: usize,
    pub orders_filled: usize,
    pub orders_resting: usize,
}

/// At most one attempt per phase per window
#[derive(Debug, Clone, Copy, Default)]
struct PhaseFlags {
    entry_side: Option<Side>,
    entry_attempted: bool,
    ladder_attempted: bool,
    recovery_attempts: u32,
    endgame_attempted: bool,
}

/// State machine for one asset
pub struct AssetMachine {
    asset: Asset,
    config: StrategyConfig,
    call_timeout: Duration,
    state: TradingState,
    window: Option<Window>,
    market: Option<WindowMarket>,
    position: Position,
    resting: Position,
    open_orders: usize,
    leader: LeaderFlipTracker,
    obi: ObiEngine,
    lock: LockDetector,
    analysis: LockAnalysis,
    phases: PhaseFlags,
    quote: Option<Quote>,
    bid_pair_cost: Option<Decimal>,
    last_decision: Option<GuardrailDecision>,
}

impl AssetMachine {
    pub fn new(
        asset: Asset,
        config: StrategyConfig,
        leader: &LeaderConfig,
        obi: &ObiConfig,
        call_timeout: Duration,
    ) -> Self {
        Self {
            asset,
            config,
            call_timeout,
            state: TradingState::Idle,
            window: None,
            market: None,
            position: Position::default(),
            resting: Position::default(),
            open_orders: 0,
            leader: LeaderFlipTracker::new(leader),
            obi: ObiEngine::new(obi),
            lock: LockDetector::new(),
            analysis: analyze(&Position::default()),
            phases: PhaseFlags::default(),
            quote: None,
            bid_pair_cost: None,
            last_decision: None,
        }
    }

    pub fn asset(&self) -> Asset {
        self.asset
    }

    pub fn state(&self) -> TradingState {
        self.state
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    pub fn market(&self) -> Option<&WindowMarket> {
        self.market.as_ref()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    /// Resting buy orders for this market, as if they all filled
    pub fn resting(&self) -> Position {
        self.resting
    }

    pub fn open_orders(&self) -> usize {
        self.open_orders
    }

    pub fn quote(&self) -> Option<Quote> {
        self.quote
    }

    pub fn leader(&self) -> Option<Side> {
        self.leader.leader()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn analysis(&self) -> &LockAnalysis {
        &self.analysis
    }

    pub fn last_decision(&self) -> Option<&GuardrailDecision> {
        self.last_decision.as_ref()
    }

    /// Reset all per-window state; the machine waits for a market in IDLE
    pub fn begin_window(&mut self, window: Window) {
        self.window = Some(window);
        self.market = None;
        self.position = Position::default();
        self.resting = Position::default();
        self.open_orders = 0;
        self.leader.reset_window();
        self.obi.reset();
        self.lock.reset();
        self.analysis = analyze(&self.position);
        self.phases = PhaseFlags::default();
        self.quote = None;
        self.bid_pair_cost = None;
        self.last_decision = None;
        self.transition(TradingState::Idle);
    }

    /// Attach the resolved market; IDLE moves to ARMED
    pub fn attach_market(&mut self, market: WindowMarket) -> bool {
        if self.state != TradingState::Idle || self.market.is_some() {
            return false;
        }
        tracing::info!(asset = %self.asset, slug = %market.slug, "Market resolved");
        self.market = Some(market);
        self.transition(TradingState::Armed);
        true
    }

    /// Feed fresh prices and books into the leader tracker and OBI engine
    ///
    /// OBI samples older than its window are dropped every call, even when
    /// the fetch failed and nothing new arrives.
    pub fn observe(&mut self, now: DateTime<Utc>, obs: MarketObservation) -> Option<LeaderUpdate> {
        self.obi.expire(now);
        let fresh = obs.price_yes.is_some() || obs.price_no.is_some();
        let yes = obs.price_yes.or(self.quote.map(|q| q.yes));
        let no = obs.price_no.or(self.quote.map(|q| q.no));

        for (side, book, price) in [
            (Side::Yes, obs.book_yes.as_ref(), obs.price_yes),
            (Side::No, obs.book_no.as_ref(), obs.price_no),
        ] {
            match (book.filter(|b| !b.is_empty()), price) {
                (Some(book), _) => {
                    self.obi.update_book(now, side, book);
                }
                (None, Some(price)) => {
                    self.obi.update_price(now, side, price);
                }
                (None, None) => {}
            }
        }

        self.bid_pair_cost = match (
            obs.book_yes.as_ref().and_then(OrderBook::best_bid),
            obs.book_no.as_ref().and_then(OrderBook::best_bid),
        ) {
            (Some(yes_bid), Some(no_bid)) => Some(yes_bid + no_bid),
            _ => None,
        };

        let (Some(yes), Some(no)) = (yes, no) else {
            return None;
        };
        if !fresh {
            return None;
        }
        self.quote = Some(Quote { yes, no, at: now });

        let update = self.leader.update(now, yes, no);
        if update.flipped {
            metrics::record_flip(self.asset);
            tracing::info!(
                asset = %self.asset,
                leader = %update.leader,
                total_flips = update.total_flips,
                "Leader flipped"
            );
        }
        Some(update)
    }

    /// Replace exposure with what the exchange reports
    pub fn sync_exposure(&mut self, exposure: Exposure) {
        self.position = exposure.position;
        self.resting = exposure.resting;
        self.open_orders = exposure.open_orders;
    }

    /// Run the current state's action once
    pub async fn step(
        &mut self,
        ctx: &StepContext<'_>,
        exchange: &dyn Exchange,
    ) -> anyhow::Result<StepOutcome> {
        let before = self.state;
        let mut outcome = StepOutcome::default();
        if self.state == TradingState::Idle {
            return Ok(outcome);
        }

        self.analysis = self.lock.check_lock(&self.position, ctx.now).analysis;

        let endgame_at = chrono::Duration::seconds(self.config.endgame_secs as i64);
        if self.state != TradingState::Endgame && ctx.window.remaining(ctx.now) <= endgame_at {
            self.cancel_resting(exchange).await;
            self.transition(TradingState::Endgame);
        }

        match self.state {
            TradingState::Idle | TradingState::Locked => {}
            TradingState::Armed => self.step_armed(ctx),
            TradingState::Entry => self.step_entry(ctx, exchange, &mut outcome).await?,
            TradingState::Laddering => self.step_laddering(ctx, exchange, &mut outcome).await?,
            TradingState::Locking => self.step_locking(exchange).await,
            TradingState::Recovery => self.step_recovery(ctx, exchange, &mut outcome).await,
            TradingState::Endgame => self.step_endgame(ctx, exchange, &mut outcome).await,
        }

        if self.state != before {
            outcome.transition = Some((before, self.state));
        }
        Ok(outcome)
    }

    fn step_armed(&mut self, ctx: &StepContext<'_>) {
        let (Some(quote), Some(side)) = (self.quote, self.leader.leader()) else {
            tracing::debug!(asset = %self.asset, "No quote yet, staying armed");
            return;
        };

        let inputs = GuardrailInputs {
            recommendation: ctx.score.map(|s| s.recommendation),
            stability: ctx.score.map(|s| s.components.stability),
            elapsed_fraction: ctx.window.elapsed_fraction(ctx.now),
            obi: self.obi.rolling_reading(side),
            total_flips: self.leader.total_flips(),
            shares_held: self.position.total_shares(),
            price_yes: quote.yes,
            price_no: quote.no,
            pair_cost: self.bid_pair_cost,
        };
        let decision = ctx.guardrails.check_all(&inputs);

        match decision.mode {
            GuardrailMode::EntryAllowed => {
                self.phases.entry_side = Some(side);
                self.transition(TradingState::Entry);
            }
            GuardrailMode::Recovery => self.transition(TradingState::Recovery),
            GuardrailMode::Blocked => {
                for blocker in &decision.blockers {
                    metrics::record_guardrail_block(self.asset, blocker.check);
                }
            }
        }
        self.last_decision = Some(decision);
    }

    async fn step_entry(
        &mut self,
        ctx: &StepContext<'_>,
        exchange: &dyn Exchange,
        outcome: &mut StepOutcome,
    ) -> anyhow::Result<()> {
        if self.phases.entry_attempted {
            self.transition(TradingState::Laddering);
            return Ok(());
        }
        self.phases.entry_attempted = true;

        let market = self.require_market()?;
        let side = self
            .phases
            .entry_side
            .or(self.leader.leader())
            .unwrap_or(Side::Yes);
        self.phases.entry_side = Some(side);

        if let Some(quote) = self.quote {
            let price = self.taker_price(quote.price(side));
            let size = self.config.entry_size;
            let caps = ctx.risk.caps_for(self.asset);
            match ctx.risk.can_add_pair_position(
                &self.exposure(),
                side,
                price,
                size,
                OrderType::Fok,
                &caps,
            ) {
                Ok(()) => {
                    let order = OrderRequest::buy(market.token_id(side), side, price, size, OrderType::Fok);
                    self.submit(exchange, order, outcome).await;
                }
                Err(e) => {
                    metrics::record_risk_rejection(self.asset);
                    tracing::debug!(asset = %self.asset, error = %e, "Entry refused by risk limits");
                }
            }
        } else {
            tracing::warn!(asset = %self.asset, "No quote for entry, skipping");
        }

        self.transition(TradingState::Laddering);
        Ok(())
    }

    async fn step_laddering(
        &mut self,
        ctx: &StepContext<'_>,
        exchange: &dyn Exchange,
        outcome: &mut StepOutcome,
    ) -> anyhow::Result<()> {
        if self.phases.ladder_attempted {
            self.transition(TradingState::Locking);
            return Ok(());
        }
        self.phases.ladder_attempted = true;

        let market = self.require_market()?;
        let hedge = self.phases.entry_side.unwrap_or(Side::Yes).opposite();

        match self.quote {
            _ if self.position.is_flat() => {
                tracing::debug!(asset = %self.asset, "Nothing to hedge, skipping ladder");
            }
            None => tracing::warn!(asset = %self.asset, "No quote for ladder, skipping"),
            Some(quote) => {
                let caps = ctx.risk.caps_for(self.asset);
                let base = quote.price(hedge);
                let offsets = self.config.ladder_offsets.clone();
                for offset in offsets {
                    let price = (base - offset).max(MIN_ORDER_PRICE).round_dp(2);
                    let size = self.config.ladder_size;
                    // earlier rungs of this ladder are already in `resting`
                    if let Err(e) = ctx.risk.can_add_pair_position(
                        &self.exposure(),
                        hedge,
                        price,
                        size,
                        OrderType::Gtc,
                        &caps,
                    ) {
                        metrics::record_risk_rejection(self.asset);
                        tracing::debug!(asset = %self.asset, %price, error = %e, "Ladder rung refused");
                        continue;
                    }
                    let order = OrderRequest::buy(market.token_id(hedge), hedge, price, size, OrderType::Gtc);
                    match self.submit(exchange, order, outcome).await.map(|ack| ack.status) {
                        Some(OrderStatus::Open) => {
                            self.resting.apply_buy(hedge, price, size);
                            self.open_orders += 1;
                        }
                        Some(OrderStatus::Filled) => self.position.apply_buy(hedge, price, size),
                        Some(OrderStatus::Killed) | None => {}
                    }
                }
            }
        }

        self.transition(TradingState::Locking);
        Ok(())
    }

    async fn step_locking(&mut self, exchange: &dyn Exchange) {
        if self.lock.is_locked() {
            self.cancel_resting(exchange).await;
            self.transition(TradingState::Locked);
            return;
        }

        let deficit = self.analysis.max_deficit();
        if deficit > self.config.recovery_threshold
            && self.phases.recovery_attempts < self.config.max_recovery_attempts
        {
            tracing::info!(asset = %self.asset, %deficit, "Deficit above threshold");
            self.transition(TradingState::Recovery);
        }
    }

    async fn step_recovery(
        &mut self,
        ctx: &StepContext<'_>,
        exchange: &dyn Exchange,
        outcome: &mut StepOutcome,
    ) {
        self.phases.recovery_attempts += 1;
        if let Err(e) = self.try_recovery(ctx, exchange, outcome).await {
            tracing::warn!(asset = %self.asset, error = %e, "Recovery skipped");
        }
        self.transition(TradingState::Locking);
    }

    async fn try_recovery(
        &mut self,
        ctx: &StepContext<'_>,
        exchange: &dyn Exchange,
        outcome: &mut StepOutcome,
    ) -> anyhow::Result<()> {
        if !self.analysis.needs_recovery {
            return Ok(());
        }
        let market = self.require_market()?;
        let quote = self
            .quote
            .ok_or_else(|| anyhow::anyhow!("no quote for recovery"))?;

        let side = self.analysis.recovery_side;
        let price = quote.price(side);
        let shares = recovery_shares(self.analysis.deficit(side), price, self.config.recovery_buffer)?
            .min(self.config.max_recovery_shares);
        if shares.is_zero() {
            return Ok(());
        }

        let limit = self.taker_price(price);
        let caps = ctx.risk.caps_for(self.asset);
        if let Err(e) = ctx.risk.can_place_order(&self.exposure(), limit, shares, &caps) {
            metrics::record_risk_rejection(self.asset);
            tracing::debug!(asset = %self.asset, error = %e, "Recovery refused by risk limits");
            return Ok(());
        }

        let order = OrderRequest::buy(market.token_id(side), side, limit, shares, OrderType::Fok);
        self.submit(exchange, order, outcome).await;
        Ok(())
    }

    async fn step_endgame(
        &mut self,
        ctx: &StepContext<'_>,
        exchange: &dyn Exchange,
        outcome: &mut StepOutcome,
    ) {
        if self.phases.endgame_attempted {
            return;
        }
        let (Some(quote), Some(leader), Some(market)) =
            (self.quote, self.leader.leader(), self.market.clone())
        else {
            return;
        };

        let price = quote.price(leader);
        let deficit = self.analysis.deficit(leader);
        if price < self.config.endgame_price || deficit.is_zero() {
            return;
        }
        self.phases.endgame_attempted = true;

        let shares = match recovery_shares(deficit, price, self.config.recovery_buffer) {
            Ok(shares) => shares.min(self.config.max_recovery_shares),
            Err(e) => {
                tracing::warn!(asset = %self.asset, error = %e, "Endgame top-up skipped");
                return;
            }
        };
        let limit = self.taker_price(price);
        let caps = ctx.risk.caps_for(self.asset);
        if let Err(e) = ctx.risk.can_place_order(&self.exposure(), limit, shares, &caps) {
            metrics::record_risk_rejection(self.asset);
            tracing::debug!(asset = %self.asset, error = %e, "Endgame top-up refused by risk limits");
            return;
        }

        tracing::info!(asset = %self.asset, %leader, %price, %shares, "Endgame top-up");
        let order = OrderRequest::buy(market.token_id(leader), leader, limit, shares, OrderType::Fok);
        self.submit(exchange, order, outcome).await;
    }

    /// Place one order under the call timeout; failures are logged, not retried
    async fn submit(
        &self,
        exchange: &dyn Exchange,
        order: OrderRequest,
        outcome: &mut StepOutcome,
    ) -> Option<OrderAck> {
        outcome.orders_attempted += 1;
        let order_type = order.order_type;
        let (side, price, size) = (order.outcome, order.price, order.size);

        match tokio::time::timeout(self.call_timeout, exchange.place_order(order)).await {
            Ok(Ok(ack)) => {
                metrics::record_order(self.asset, order_type, ack.status);
                match ack.status {
                    OrderStatus::Filled => outcome.orders_filled += 1,
                    OrderStatus::Open => outcome.orders_resting += 1,
                    OrderStatus::Killed => {}
                }
                tracing::info!(
                    asset = %self.asset,
                    %side,
                    %price,
                    %size,
                    ?order_type,
                    status = ?ack.status,
                    "Order placed"
                );
                Some(ack)
            }
            Ok(Err(e)) => {
                metrics::record_order_error(self.asset);
                tracing::warn!(asset = %self.asset, %side, error = %e, "Order failed");
                None
            }
            Err(_) => {
                metrics::record_order_error(self.asset);
                tracing::warn!(asset = %self.asset, %side, "Order timed out");
                None
            }
        }
    }

    /// Cancel this market's resting orders
    async fn cancel_resting(&mut self, exchange: &dyn Exchange) {
        let Some(market) = &self.market else {
            return;
        };
        let orders = match tokio::time::timeout(self.call_timeout, exchange.open_orders()).await {
            Ok(Ok(orders)) => orders,
            Ok(Err(e)) => {
                tracing::warn!(asset = %self.asset, error = %e, "Could not list open orders");
                return;
            }
            Err(_) => {
                tracing::warn!(asset = %self.asset, "Listing open orders timed out");
                return;
            }
        };

        let mut kept = Vec::new();
        for order in orders.into_iter().filter(|o| {
            o.request.token_id == market.yes_token_id || o.request.token_id == market.no_token_id
        }) {
            match tokio::time::timeout(self.call_timeout, exchange.cancel_order(order.order_id)).await {
                Ok(Ok(())) => continue,
                Ok(Err(e)) => {
                    tracing::warn!(asset = %self.asset, order_id = %order.order_id, error = %e, "Cancel failed")
                }
                Err(_) => {
                    tracing::warn!(asset = %self.asset, order_id = %order.order_id, "Cancel timed out")
                }
            }
            kept.push(order);
        }
        self.resting = Position::from_resting(market, &kept);
        self.open_orders = kept.len();
    }

    fn require_market(&self) -> anyhow::Result<WindowMarket> {
        self.market
            .clone()
            .ok_or_else(|| anyhow::anyhow!("{} is {} without a market", self.asset, self.state))
    }

    fn exposure(&self) -> Exposure {
        Exposure {
            position: self.position,
            resting: self.resting,
            open_orders: self.open_orders,
        }
    }

    fn taker_price(&self, price: Decimal) -> Decimal {
        (price + self.config.slippage).clamp(MIN_ORDER_PRICE, MAX_ORDER_PRICE)
    }

    fn transition(&mut self, to: TradingState) {
        if self.state == to {
            return;
        }
        tracing::info!(asset = %self.asset, from = %self.state, %to, "State transition");
        metrics::record_transition(self.asset, to);
        self.state = to;
    }

    /// View for dashboards and persistence
    pub fn snapshot(&self, score: Option<&ScoreResult>, regime: Regime) -> AssetSnapshot {
        AssetSnapshot {
            asset: self.asset,
            state: self.state,
            slug: self.market.as_ref().map(|m| m.slug.clone()),
            leader: self.leader.leader(),
            flip_count: self.leader.flip_count(),
            total_flips: self.leader.total_flips(),
            leader_bias: self.leader.bias(),
            obi_yes: self.obi.rolling(Side::Yes),
            obi_no: self.obi.rolling(Side::No),
            obi_combined: self.obi.combined(),
            obi_method: self.obi.last_method(),
            price_yes: self.quote.map(|q| q.yes),
            price_no: self.quote.map(|q| q.no),
            position: self.position,
            open_orders: self.open_orders,
            locked: self.lock.is_locked(),
            pnl_if_yes_wins: self.analysis.pnl_if_yes_wins,
            pnl_if_no_wins: self.analysis.pnl_if_no_wins,
            score: score.map(|s| s.score),
            regime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::PaperExchange;
    use crate::guardrail::{GuardrailCheck, GuardrailConfig};
    use crate::orderbook::PriceLevel;
    use crate::risk::{RiskCaps, RiskConfig};
    use crate::signal::{Recommendation, ScoreConfig, ScoreEngine, ScoreInputs};
    use chrono::TimeZone;

    const START: i64 = 9000;

    fn at(offset_secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(START + offset_secs, 0).unwrap()
    }

    fn market(window: &Window) -> WindowMarket {
        WindowMarket {
            asset: Asset::Btc,
            venue_id: "0xbtc".to_string(),
            slug: format!("btc-updown-15m-{}", window.id()),
            yes_token_id: "yes".to_string(),
            no_token_id: "no".to_string(),
            window_start: window.start,
            end_time: window.end(),
        }
    }

    fn strong_score() -> ScoreResult {
        let trend = vec![0.001; 5];
        let result = ScoreEngine::new(ScoreConfig::default()).compute(&ScoreInputs {
            micro_returns: trend.clone(),
            meso_returns: trend.clone(),
            macro_returns: trend,
            volatility_30m: 0.0,
            net_move: 0.005,
        });
        assert_eq!(result.recommendation, Recommendation::Start);
        result
    }

    struct Harness {
        machine: AssetMachine,
        window: Window,
        exchange: PaperExchange,
        guardrails: GuardrailEvaluator,
        risk: RiskLimiter,
        score: Option<ScoreResult>,
    }

    impl Harness {
        fn new(config: StrategyConfig) -> Self {
            let window = Window::containing(at(0), 900);
            let mut machine = AssetMachine::new(
                Asset::Btc,
                config,
                &LeaderConfig::default(),
                &ObiConfig::default(),
                Duration::from_secs(1),
            );
            machine.begin_window(window);
            assert!(machine.attach_market(market(&window)));
            Self {
                machine,
                window,
                exchange: PaperExchange::new(dec!(1000), Decimal::ZERO),
                guardrails: GuardrailEvaluator::new(GuardrailConfig::default()),
                risk: RiskLimiter::new(RiskConfig::default()),
                score: Some(strong_score()),
            }
        }

        async fn quote(&mut self, now: DateTime<Utc>, yes: Decimal, no: Decimal) {
            self.exchange.observe_price("yes", yes).await.unwrap();
            self.exchange.observe_price("no", no).await.unwrap();
            self.machine.observe(
                now,
                MarketObservation {
                    price_yes: Some(yes),
                    price_no: Some(no),
                    ..MarketObservation::default()
                },
            );
        }

        async fn sync(&mut self) {
            let positions = self.exchange.positions().await.unwrap();
            let orders = self.exchange.open_orders().await.unwrap();
            let market = self.machine.market().cloned().unwrap();
            self.machine.sync_exposure(Exposure {
                position: Position::from_tokens(&market, &positions),
                resting: Position::from_resting(&market, &orders),
                open_orders: orders.len(),
            });
        }

        async fn step(&mut self, now: DateTime<Utc>) -> StepOutcome {
            let ctx = StepContext {
                now,
                window: self.window,
                score: self.score.as_ref(),
                guardrails: &self.guardrails,
                risk: &self.risk,
            };
            self.machine.step(&ctx, &self.exchange).await.unwrap()
        }

        /// ARMED -> ENTRY -> LADDERING -> LOCKING with the entry order killed
        async fn drive_to_locking(&mut self) {
            self.quote(at(200), dec!(0.6), dec!(0.4)).await;
            // market trades above the entry limit
            self.exchange.observe_price("yes", dec!(0.7)).await.unwrap();
            self.step(at(200)).await;
            assert_eq!(self.machine.state(), TradingState::Entry);
            let outcome = self.step(at(201)).await;
            assert_eq!(outcome.orders_attempted, 1);
            assert_eq!(outcome.orders_filled, 0);
            let outcome = self.step(at(202)).await;
            assert_eq!(outcome.orders_attempted, 0);
            assert_eq!(self.machine.state(), TradingState::Locking);
        }
    }

    fn lock_config() -> StrategyConfig {
        StrategyConfig {
            entry_size: dec!(10),
            ladder_size: dec!(10),
            recovery_threshold: dec!(10),
            ..StrategyConfig::default()
        }
    }

    #[tokio::test]
    async fn test_attach_market_arms_once() {
        let mut h = Harness::new(StrategyConfig::default());
        assert_eq!(h.machine.state(), TradingState::Armed);
        let window = h.window;
        assert!(!h.machine.attach_market(market(&window)));
    }

    #[tokio::test]
    async fn test_idle_machine_does_nothing() {
        let window = Window::containing(at(0), 900);
        let mut machine = AssetMachine::new(
            Asset::Sol,
            StrategyConfig::default(),
            &LeaderConfig::default(),
            &ObiConfig::default(),
            Duration::from_secs(1),
        );
        machine.begin_window(window);
        let exchange = PaperExchange::new(dec!(100), Decimal::ZERO);
        let guardrails = GuardrailEvaluator::new(GuardrailConfig::default());
        let risk = RiskLimiter::new(RiskConfig::default());
        let ctx = StepContext {
            now: at(899),
            window,
            score: None,
            guardrails: &guardrails,
            risk: &risk,
        };
        let outcome = machine.step(&ctx, &exchange).await.unwrap();
        assert_eq!(outcome, StepOutcome::default());
        assert_eq!(machine.state(), TradingState::Idle);
    }

    #[tokio::test]
    async fn test_armed_stays_put_without_upstream_score() {
        let mut h = Harness::new(StrategyConfig::default());
        h.score = None;
        h.quote(at(200), dec!(0.6), dec!(0.4)).await;
        let outcome = h.step(at(200)).await;

        assert_eq!(outcome.transition, None);
        assert_eq!(h.machine.state(), TradingState::Armed);
        let decision = h.machine.last_decision().unwrap();
        assert!(!decision.allowed);
        assert!(decision.is_blocked_by(GuardrailCheck::Upstream));
    }

    #[tokio::test]
    async fn test_armed_waits_for_elapsed_fraction() {
        let mut h = Harness::new(StrategyConfig::default());
        h.quote(at(30), dec!(0.6), dec!(0.4)).await;
        h.step(at(30)).await;
        assert_eq!(h.machine.state(), TradingState::Armed);
        assert!(h
            .machine
            .last_decision()
            .unwrap()
            .is_blocked_by(GuardrailCheck::Rhr));
    }

    #[tokio::test]
    async fn test_entry_ladder_then_lock() {
        let mut h = Harness::new(lock_config());
        h.quote(at(200), dec!(0.6), dec!(0.4)).await;

        let outcome = h.step(at(200)).await;
        assert_eq!(outcome.transition, Some((TradingState::Armed, TradingState::Entry)));
        assert_eq!(outcome.orders_attempted, 0);

        // one FOK on the leader
        let outcome = h.step(at(201)).await;
        assert_eq!(outcome.orders_attempted, 1);
        assert_eq!(outcome.orders_filled, 1);
        assert_eq!(h.machine.state(), TradingState::Laddering);
        h.sync().await;
        assert_eq!(h.machine.position().yes_shares, dec!(10));
        assert_eq!(h.machine.position().yes_cost, dec!(6));

        // one GTC per rung on the hedge side
        let outcome = h.step(at(202)).await;
        assert_eq!(outcome.orders_attempted, 3);
        assert_eq!(outcome.orders_resting, 3);
        assert_eq!(h.machine.state(), TradingState::Locking);
        let mut rungs: Vec<_> = h
            .exchange
            .open_orders()
            .await
            .unwrap()
            .into_iter()
            .map(|o| (o.request.token_id, o.request.price))
            .collect();
        rungs.sort();
        assert_eq!(
            rungs,
            vec![
                ("no".to_string(), dec!(0.34)),
                ("no".to_string(), dec!(0.36)),
                ("no".to_string(), dec!(0.38)),
            ]
        );

        // deficit 6 is under the threshold: keep polling
        h.sync().await;
        h.step(at(203)).await;
        assert_eq!(h.machine.state(), TradingState::Locking);
        assert!(!h.machine.is_locked());

        // NO trades down through the top rung
        h.quote(at(240), dec!(0.63), dec!(0.37)).await;
        h.sync().await;
        assert_eq!(h.machine.open_orders(), 2);

        let outcome = h.step(at(241)).await;
        assert_eq!(outcome.transition, Some((TradingState::Locking, TradingState::Locked)));
        assert!(h.machine.is_locked());
        assert_eq!(h.machine.analysis().pnl_if_yes_wins, dec!(0.2));
        assert_eq!(h.machine.analysis().pnl_if_no_wins, dec!(0.2));
        assert!(h.exchange.open_orders().await.unwrap().is_empty());
        assert_eq!(h.machine.open_orders(), 0);

        let outcome = h.step(at(300)).await;
        assert_eq!(outcome.transition, None);
        assert_eq!(h.machine.state(), TradingState::Locked);
    }

    #[tokio::test]
    async fn test_ladder_respects_share_cap_with_resting_rungs() {
        let mut h = Harness::new(lock_config());
        h.risk = RiskLimiter::new(RiskConfig {
            default_caps: RiskCaps {
                max_shares: dec!(20),
                ..RiskCaps::default()
            },
            ..RiskConfig::default()
        });
        h.quote(at(200), dec!(0.6), dec!(0.4)).await;
        h.step(at(200)).await;
        h.step(at(201)).await;
        h.sync().await;
        assert_eq!(h.machine.position().yes_shares, dec!(10));

        // 10 held + 10 resting fills the cap: the two lower rungs are refused
        let outcome = h.step(at(202)).await;
        assert_eq!(outcome.orders_attempted, 1);
        assert_eq!(outcome.orders_resting, 1);
        assert_eq!(h.machine.open_orders(), 1);
        assert_eq!(h.machine.resting().no_shares, dec!(10));
        assert_eq!(h.exchange.open_orders().await.unwrap().len(), 1);

        // NO trades through every rung price
        h.quote(at(240), dec!(0.7), dec!(0.3)).await;
        h.sync().await;
        assert_eq!(h.machine.position().total_shares(), dec!(20));
        assert!(h.machine.resting().is_flat());
        assert_eq!(h.machine.open_orders(), 0);
    }

    #[tokio::test]
    async fn test_synced_resting_orders_block_recovery_past_cap() {
        let mut h = Harness::new(StrategyConfig::default());
        h.drive_to_locking().await;
        h.risk = RiskLimiter::new(RiskConfig {
            default_caps: RiskCaps {
                max_shares: dec!(50),
                ..RiskCaps::default()
            },
            ..RiskConfig::default()
        });

        // NO outcome loses 12; 21 corrective shares fit next to the 20 held
        // but not next to the 20 resting as well
        h.machine.sync_exposure(Exposure {
            position: Position::new(dec!(20), dec!(12), dec!(0), dec!(0)),
            resting: Position::new(dec!(20), dec!(8), dec!(0), dec!(0)),
            open_orders: 2,
        });
        h.step(at(300)).await;
        assert_eq!(h.machine.state(), TradingState::Recovery);
        let outcome = h.step(at(301)).await;
        assert_eq!(outcome.orders_attempted, 0);
    }

    #[tokio::test]
    async fn test_killed_entry_skips_ladder() {
        let mut h = Harness::new(StrategyConfig::default());
        h.drive_to_locking().await;
        assert!(h.exchange.open_orders().await.unwrap().is_empty());
        assert!(h.machine.position().is_flat());
    }

    #[tokio::test]
    async fn test_recovery_places_one_corrective_order() {
        let mut h = Harness::new(StrategyConfig::default());
        h.drive_to_locking().await;

        // 20 YES bought for 12: NO outcome loses 12
        h.machine
            .sync_exposure(Exposure::holding(Position::new(dec!(20), dec!(12), dec!(0), dec!(0))));
        let outcome = h.step(at(300)).await;
        assert_eq!(outcome.transition, Some((TradingState::Locking, TradingState::Recovery)));

        let outcome = h.step(at(301)).await;
        assert_eq!(outcome.orders_attempted, 1);
        assert_eq!(outcome.orders_filled, 1);
        assert_eq!(h.machine.state(), TradingState::Locking);
        let fills = h.exchange.fills().await;
        let recovery = fills.last().unwrap();
        assert_eq!(recovery.token_id, "no");
        assert_eq!(recovery.size, dec!(21));

        // attempts exhausted: the deficit no longer triggers recovery
        let outcome = h.step(at(302)).await;
        assert_eq!(outcome.transition, None);
        assert_eq!(h.machine.state(), TradingState::Locking);
    }

    #[tokio::test]
    async fn test_recovery_capped_by_risk_limits() {
        let mut h = Harness::new(StrategyConfig::default());
        h.drive_to_locking().await;

        // already at the share cap
        h.machine
            .sync_exposure(Exposure::holding(Position::new(dec!(200), dec!(90), dec!(0), dec!(0))));
        h.step(at(300)).await;
        assert_eq!(h.machine.state(), TradingState::Recovery);
        let outcome = h.step(at(301)).await;
        assert_eq!(outcome.orders_attempted, 0);
        assert_eq!(h.machine.state(), TradingState::Locking);
    }

    #[tokio::test]
    async fn test_endgame_cancels_and_tops_up_leader() {
        let mut h = Harness::new(StrategyConfig::default());
        h.drive_to_locking().await;

        h.quote(at(880), dec!(0.95), dec!(0.05)).await;
        h.machine
            .sync_exposure(Exposure::holding(Position::new(dec!(0), dec!(0), dec!(10), dec!(5))));

        let outcome = h.step(at(895)).await;
        assert_eq!(outcome.transition, Some((TradingState::Locking, TradingState::Endgame)));
        assert_eq!(outcome.orders_attempted, 1);
        assert_eq!(outcome.orders_filled, 1);
        let fills = h.exchange.fills().await;
        let top_up = fills.last().unwrap();
        assert_eq!(top_up.token_id, "yes");
        assert_eq!(top_up.size, dec!(50));

        let outcome = h.step(at(896)).await;
        assert_eq!(outcome.orders_attempted, 0);
        assert_eq!(h.machine.state(), TradingState::Endgame);
    }

    #[tokio::test]
    async fn test_endgame_without_conviction_is_noop() {
        let mut h = Harness::new(StrategyConfig::default());
        h.drive_to_locking().await;
        let outcome = h.step(at(895)).await;
        assert_eq!(h.machine.state(), TradingState::Endgame);
        assert_eq!(outcome.orders_attempted, 0);
    }

    #[tokio::test]
    async fn test_begin_window_resets_everything() {
        let mut h = Harness::new(lock_config());
        h.quote(at(200), dec!(0.6), dec!(0.4)).await;
        h.step(at(200)).await;
        h.step(at(201)).await;
        h.sync().await;
        assert!(!h.machine.position().is_flat());

        let next = h.window.next();
        h.machine.begin_window(next);
        assert_eq!(h.machine.state(), TradingState::Idle);
        assert!(h.machine.position().is_flat());
        assert!(h.machine.market().is_none());
        assert!(h.machine.quote().is_none());
        assert!(!h.machine.is_locked());
        assert_eq!(h.machine.window(), Some(next));
    }

    #[tokio::test]
    async fn test_stale_obi_stops_blocking_after_window() {
        let mut h = Harness::new(StrategyConfig::default());
        let mut book_yes = OrderBook::new("yes");
        book_yes.asks = vec![PriceLevel {
            price: dec!(0.61),
            size: dec!(500),
        }];
        h.machine.observe(
            at(10),
            MarketObservation {
                price_yes: Some(dec!(0.6)),
                price_no: Some(dec!(0.4)),
                book_yes: Some(book_yes),
                book_no: None,
            },
        );
        h.step(at(50)).await;
        let decision = h.machine.last_decision().unwrap();
        assert!(decision.is_blocked_by(GuardrailCheck::Obi));

        // fetches fail from here on: only the last quote remains
        h.machine.observe(at(200), MarketObservation::default());
        let snapshot = h.machine.snapshot(None, Regime::Choppy);
        assert_eq!(snapshot.obi_yes, 0.0);
        assert_eq!(snapshot.obi_combined, 0.0);
        h.step(at(200)).await;
        assert!(!h
            .machine
            .last_decision()
            .unwrap()
            .is_blocked_by(GuardrailCheck::Obi));
        assert_eq!(h.machine.state(), TradingState::Entry);
    }

    #[tokio::test]
    async fn test_snapshot_reports_bias_and_combined_obi() {
        let mut h = Harness::new(StrategyConfig::default());
        h.quote(at(10), dec!(0.75), dec!(0.25)).await;
        let snapshot = h.machine.snapshot(None, Regime::Choppy);
        assert!(snapshot.leader_bias > 0.0);
        // proxies 0.5 and -0.5
        assert!((snapshot.obi_yes - 0.5).abs() < 1e-12);
        assert!(snapshot.obi_combined.abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_stale_observation_does_not_count_flips() {
        let mut h = Harness::new(StrategyConfig::default());
        h.quote(at(10), dec!(0.6), dec!(0.4)).await;
        assert!(h.machine.observe(at(11), MarketObservation::default()).is_none());
        assert!(h.machine.observe(at(12), MarketObservation::default()).is_none());
        assert_eq!(h.machine.leader(), Some(Side::Yes));
        assert_eq!(h.machine.snapshot(None, Regime::Choppy).total_flips, 0);
    }
}
