//! Tick orchestration across assets
//!
//! The orchestrator owns one [`AssetMachine`] per asset plus the shared
//! engines. Each tick rolls the window if needed, resolves markets, pulls
//! quotes and books, syncs exposure from the exchange and steps every
//! machine. Assets run concurrently; every external call is bounded by a
//! timeout and a failure only affects the asset that made it.

use super::{AssetMachine, MarketObservation, StepContext, WindowResult, WindowStats};
use crate::config::Config;
use crate::data::{Totals, TradingSnapshot};
use crate::execution::Exchange;
use crate::feed::{score_inputs_from_closes, CandleSource, ReturnWindows};
use crate::guardrail::GuardrailEvaluator;
use crate::market::{Asset, VenueResolver, Window};
use crate::orderbook::PriceSource;
use crate::risk::{Exposure, Position, RiskLimiter};
use crate::signal::{RegimeClassifier, ScoreEngine, ScoreResult, Side};
use crate::telemetry::metrics;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// External capabilities the orchestrator depends on
#[derive(Clone)]
pub struct Collaborators {
    pub exchange: Arc<dyn Exchange>,
    pub prices: Arc<dyn PriceSource>,
    pub venues: Arc<dyn VenueResolver>,
    pub candles: Arc<dyn CandleSource>,
}

/// Await `fut` under `timeout`; failures are logged and become `None`
async fn bounded<T>(
    timeout: Duration,
    source: &'static str,
    asset: Option<Asset>,
    fut: impl Future<Output = anyhow::Result<T>>,
) -> Option<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            metrics::record_upstream_failure(source);
            tracing::warn!(source, asset = ?asset, error = %e, "External call failed");
            None
        }
        Err(_) => {
            metrics::record_upstream_failure(source);
            tracing::warn!(source, asset = ?asset, ?timeout, "External call timed out");
            None
        }
    }
}

/// Drives every asset machine through one tick at a time
pub struct Orchestrator {
    window_secs: i64,
    call_timeout: Duration,
    returns: ReturnWindows,
    machines: BTreeMap<Asset, AssetMachine>,
    scores: ScoreEngine,
    regimes: RegimeClassifier,
    guardrails: GuardrailEvaluator,
    risk: RiskLimiter,
    stats: WindowStats,
    window: Option<Window>,
    collab: Collaborators,
}

impl Orchestrator {
    pub fn new(config: &Config, collab: Collaborators) -> Self {
        let call_timeout = config.execution.call_timeout();
        let machines = config
            .market
            .assets
            .iter()
            .map(|&asset| {
                let machine = AssetMachine::new(
                    asset,
                    config.strategy.clone(),
                    &config.signal.leader,
                    &config.signal.obi,
                    call_timeout,
                );
                (asset, machine)
            })
            .collect();

        Self {
            window_secs: config.market.window_secs,
            call_timeout,
            returns: config.upstream.returns,
            machines,
            scores: ScoreEngine::new(config.score.clone()),
            regimes: RegimeClassifier::new(config.regime.clone()),
            guardrails: GuardrailEvaluator::new(config.guardrail.clone()),
            risk: RiskLimiter::new(config.risk.clone()),
            stats: WindowStats::new(),
            window: None,
            collab,
        }
    }

    pub fn machine(&self, asset: Asset) -> Option<&AssetMachine> {
        self.machines.get(&asset)
    }

    pub fn machines(&self) -> impl Iterator<Item = &AssetMachine> {
        self.machines.values()
    }

    pub fn stats(&self) -> &WindowStats {
        &self.stats
    }

    pub fn window(&self) -> Option<Window> {
        self.window
    }

    pub fn latest_score(&self, asset: Asset) -> Option<&ScoreResult> {
        self.scores.latest(asset)
    }

    /// Process every asset once
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TradingSnapshot {
        let started = Instant::now();
        let window = Window::containing(now, self.window_secs);

        self.roll_window(window).await;
        self.resolve_markets(window).await;
        self.observe_markets(now).await;
        self.sync_exposure().await;
        self.step_machines(now, window).await;

        let snapshot = self.snapshot(now, window).await;
        metrics::record_tick_latency(started.elapsed());
        snapshot
    }

    /// Pull spot closes and rescore every asset
    pub async fn refresh_scores(&mut self) {
        let candles = &self.collab.candles;
        let timeout = self.call_timeout;
        let limit = self.returns.closes_needed();

        let fetched = join_all(self.machines.keys().map(|&asset| async move {
            let closes = bounded(
                timeout,
                "candles",
                Some(asset),
                candles.recent_closes(asset, limit),
            )
            .await;
            (asset, closes)
        }))
        .await;

        for (asset, closes) in fetched {
            let Some(closes) = closes else {
                continue;
            };
            let inputs = score_inputs_from_closes(&closes, &self.returns);
            let result = self.scores.score(asset, &inputs);
            self.regimes.add_score(asset, result.score);
            tracing::debug!(
                %asset,
                score = result.score,
                recommendation = ?result.recommendation,
                regime = ?self.regimes.regime(asset),
                "Score refreshed"
            );
        }
    }

    /// Settle the finished window and reset every machine for the new one
    async fn roll_window(&mut self, window: Window) {
        if self.window == Some(window) {
            return;
        }
        if let Some(previous) = self.window {
            tracing::info!(from = previous.id(), to = window.id(), "Window rolled");
            self.settle(previous).await;
        }
        for machine in self.machines.values_mut() {
            machine.begin_window(window);
        }
        self.window = Some(window);
    }

    /// Redeem every market of the finished window and record its result
    ///
    /// Results come from the exchange's positions at settlement time, so fills
    /// made on the window's last tick are counted.
    async fn settle(&mut self, previous: Window) {
        let exchange = &self.collab.exchange;
        let positions = bounded(self.call_timeout, "exchange", None, exchange.positions()).await;
        for machine in self.machines.values() {
            let Some(market) = machine.market() else {
                continue;
            };
            let winner = match (machine.quote(), machine.leader()) {
                (Some(quote), _) if quote.yes > quote.no => Side::Yes,
                (Some(_), _) => Side::No,
                (None, Some(leader)) => leader,
                (None, None) => {
                    tracing::warn!(asset = %machine.asset(), "No quote to settle on, skipping");
                    continue;
                }
            };

            let settled = bounded(
                self.call_timeout,
                "settle",
                Some(machine.asset()),
                exchange.settle(market.token_id(winner), market.token_id(winner.opposite())),
            )
            .await;
            if settled.is_none() {
                continue;
            }

            let position = match &positions {
                Some(positions) => Position::from_tokens(market, positions),
                None => machine.position(),
            };
            let result = WindowResult {
                window_start: previous.start,
                asset: machine.asset(),
                winner,
                locked: machine.is_locked(),
                cost: position.total_cost(),
                payout: position.shares(winner),
                pnl: position.pnl_if(winner),
            };
            tracing::info!(
                asset = %result.asset,
                winner = %winner,
                locked = result.locked,
                pnl = %result.pnl,
                "Window settled"
            );
            self.stats.record(result);
        }
        metrics::set_window_pnl(self.stats.summary().total_pnl);
    }

    async fn resolve_markets(&mut self, window: Window) {
        let venues = &self.collab.venues;
        let timeout = self.call_timeout;
        let pending: Vec<Asset> = self
            .machines
            .values()
            .filter(|m| m.market().is_none())
            .map(AssetMachine::asset)
            .collect();
        if pending.is_empty() {
            return;
        }

        let resolved = join_all(pending.into_iter().map(|asset| async move {
            let market = bounded(
                timeout,
                "venue",
                Some(asset),
                venues.resolve_window_market(asset, &window),
            )
            .await;
            (asset, market)
        }))
        .await;

        for (asset, market) in resolved {
            match market {
                Some(Some(market)) => {
                    if let Some(machine) = self.machines.get_mut(&asset) {
                        machine.attach_market(market);
                    }
                }
                Some(None) => tracing::debug!(%asset, "No tradable market yet"),
                None => {}
            }
        }
    }

    async fn observe_markets(&mut self, now: DateTime<Utc>) {
        let prices = &self.collab.prices;
        let timeout = self.call_timeout;
        let markets: Vec<_> = self.machines.values().filter_map(|m| m.market().cloned()).collect();

        let observed = join_all(markets.into_iter().map(|market| async move {
            let asset = Some(market.asset);
            let (price_yes, price_no, book_yes, book_no) = tokio::join!(
                bounded(timeout, "price", asset, prices.get_price(&market.yes_token_id)),
                bounded(timeout, "price", asset, prices.get_price(&market.no_token_id)),
                bounded(timeout, "book", asset, prices.get_order_book(&market.yes_token_id)),
                bounded(timeout, "book", asset, prices.get_order_book(&market.no_token_id)),
            );
            let obs = MarketObservation {
                price_yes,
                price_no,
                book_yes,
                book_no,
            };
            (market, obs)
        }))
        .await;

        let exchange = &self.collab.exchange;
        for (market, obs) in observed {
            for (token, price) in [
                (&market.yes_token_id, obs.price_yes),
                (&market.no_token_id, obs.price_no),
            ] {
                if let Some(price) = price {
                    bounded(timeout, "exchange", Some(market.asset), exchange.observe_price(token, price))
                        .await;
                }
            }
            if let Some(machine) = self.machines.get_mut(&market.asset) {
                machine.observe(now, obs);
            }
        }
    }

    /// Positions and resting orders as the exchange reports them
    async fn sync_exposure(&mut self) {
        let exchange = &self.collab.exchange;
        let timeout = self.call_timeout;
        let (positions, orders) = tokio::join!(
            bounded(timeout, "exchange", None, exchange.positions()),
            bounded(timeout, "exchange", None, exchange.open_orders()),
        );
        let (Some(positions), Some(orders)) = (positions, orders) else {
            return;
        };

        for machine in self.machines.values_mut() {
            let Some(market) = machine.market() else {
                continue;
            };
            let open: Vec<_> = orders
                .iter()
                .filter(|o| {
                    o.request.token_id == market.yes_token_id
                        || o.request.token_id == market.no_token_id
                })
                .cloned()
                .collect();
            let exposure = Exposure {
                position: Position::from_tokens(market, &positions),
                resting: Position::from_resting(market, &open),
                open_orders: open.len(),
            };
            machine.sync_exposure(exposure);
        }
    }

    async fn step_machines(&mut self, now: DateTime<Utc>, window: Window) {
        let scores = &self.scores;
        let guardrails = &self.guardrails;
        let risk = &self.risk;
        let exchange: &dyn Exchange = self.collab.exchange.as_ref();

        let results = join_all(self.machines.values_mut().map(move |machine| {
            let ctx = StepContext {
                now,
                window,
                score: scores.latest(machine.asset()),
                guardrails,
                risk,
            };
            async move {
                let asset = machine.asset();
                (asset, machine.step(&ctx, exchange).await)
            }
        }))
        .await;

        for (asset, result) in results {
            match result {
                Ok(outcome) if outcome.orders_attempted > 0 => tracing::debug!(
                    %asset,
                    attempted = outcome.orders_attempted,
                    filled = outcome.orders_filled,
                    resting = outcome.orders_resting,
                    "Step placed orders"
                ),
                Ok(_) => {}
                Err(e) => tracing::warn!(%asset, error = %e, "Step failed"),
            }
        }
    }

    async fn snapshot(&self, now: DateTime<Utc>, window: Window) -> TradingSnapshot {
        let balance = bounded(self.call_timeout, "exchange", None, self.collab.exchange.balance()).await;
        if let Some(balance) = balance {
            metrics::set_balance(balance);
        }

        let assets: Vec<_> = self
            .machines
            .values()
            .map(|m| {
                let asset = m.asset();
                m.snapshot(self.scores.latest(asset), self.regimes.regime(asset))
            })
            .collect();
        for asset in &assets {
            metrics::set_asset_gauges(asset);
        }

        TradingSnapshot {
            timestamp: now,
            window_start: window.start,
            window_remaining_secs: window.remaining(now).num_seconds(),
            totals: Totals::from_assets(&assets, balance),
            assets,
            stats: self.stats.summary().clone(),
        }
    }
}
