//! End-to-end integration tests
//!
//! One asset through a whole window against in-memory collaborators and
//! the paper exchange.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use poly_lock::config::Config;
use poly_lock::data::{JsonFileStore, SnapshotStore};
use poly_lock::execution::{Exchange, PaperExchange};
use poly_lock::feed::CandleSource;
use poly_lock::guardrail::GuardrailCheck;
use poly_lock::market::{Asset, VenueResolver, Window, WindowMarket};
use poly_lock::orderbook::{OrderBook, PriceSource};
use poly_lock::strategy::{Collaborators, Orchestrator, TradingState};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Prices set by the test between ticks; books are always empty
#[derive(Default)]
struct ScriptedPrices {
    prices: Mutex<HashMap<String, Decimal>>,
}

impl ScriptedPrices {
    fn set(&self, yes: Decimal, no: Decimal) {
        let mut prices = self.prices.lock().unwrap();
        prices.insert("btc-yes".to_string(), yes);
        prices.insert("btc-no".to_string(), no);
    }
}

#[async_trait]
impl PriceSource for ScriptedPrices {
    async fn get_price(&self, token_id: &str) -> anyhow::Result<Decimal> {
        self.prices
            .lock()
            .unwrap()
            .get(token_id)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("no price for {token_id}"))
    }

    async fn get_order_book(&self, token_id: &str) -> anyhow::Result<OrderBook> {
        Ok(OrderBook::new(token_id))
    }
}

/// Same token ids every window, new slug per window
struct StaticVenue;

#[async_trait]
impl VenueResolver for StaticVenue {
    async fn resolve_window_market(
        &self,
        asset: Asset,
        window: &Window,
    ) -> anyhow::Result<Option<WindowMarket>> {
        Ok(Some(WindowMarket {
            asset,
            venue_id: format!("0x{}", window.id()),
            slug: format!("btc-updown-15m-{}", window.id()),
            yes_token_id: "btc-yes".to_string(),
            no_token_id: "btc-no".to_string(),
            window_start: window.start,
            end_time: window.end(),
        }))
    }
}

/// Steadily rising closes: every lookback trends up
struct TrendingCandles;

#[async_trait]
impl CandleSource for TrendingCandles {
    async fn recent_closes(&self, _asset: Asset, limit: usize) -> anyhow::Result<Vec<Decimal>> {
        Ok((0..limit).map(|i| Decimal::from(100 + i as i64)).collect())
    }
}

fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

fn config() -> Config {
    let mut config = Config::default();
    config.market.assets = vec![Asset::Btc];
    config.strategy.entry_size = dec!(10);
    config.strategy.ladder_size = dec!(10);
    config.strategy.recovery_threshold = dec!(10);
    config
}

fn setup(prices: Arc<ScriptedPrices>) -> (Orchestrator, Arc<PaperExchange>) {
    let exchange = Arc::new(PaperExchange::new(dec!(1000), Decimal::ZERO));
    let collab = Collaborators {
        exchange: exchange.clone(),
        prices,
        venues: Arc::new(StaticVenue),
        candles: Arc::new(TrendingCandles),
    };
    (Orchestrator::new(&config(), collab), exchange)
}

#[tokio::test]
async fn test_full_window_reaches_lock_and_settles() {
    let prices = Arc::new(ScriptedPrices::default());
    prices.set(dec!(0.6), dec!(0.4));
    let (mut orch, exchange) = setup(prices.clone());
    orch.refresh_scores().await;

    // guardrails pass on the first tick past the minimum elapsed fraction
    let snapshot = orch.tick(at(9200)).await;
    let btc = snapshot.asset(Asset::Btc).unwrap();
    assert_eq!(btc.state, TradingState::Entry);
    assert!(btc.position.is_flat());

    // exactly one FOK on the leader
    orch.tick(at(9201)).await;
    assert_eq!(exchange.fills().await.len(), 1);
    assert_eq!(orch.machine(Asset::Btc).unwrap().state(), TradingState::Laddering);

    // at most one GTC per ladder level
    let snapshot = orch.tick(at(9202)).await;
    let btc = snapshot.asset(Asset::Btc).unwrap();
    assert_eq!(btc.state, TradingState::Locking);
    assert_eq!(btc.position.yes_shares, dec!(10));
    assert_eq!(exchange.open_orders().await.unwrap().len(), 3);

    orch.tick(at(9203)).await;
    assert_eq!(orch.machine(Asset::Btc).unwrap().state(), TradingState::Locking);

    // NO trades through the top rung: both outcomes now profitable
    prices.set(dec!(0.63), dec!(0.37));
    let snapshot = orch.tick(at(9240)).await;
    let btc = snapshot.asset(Asset::Btc).unwrap();
    assert_eq!(btc.state, TradingState::Locked);
    assert!(btc.locked);
    assert_eq!(btc.pnl_if_yes_wins, dec!(0.2));
    assert_eq!(btc.pnl_if_no_wins, dec!(0.2));
    assert_eq!(snapshot.totals.open_orders, 0);
    assert!(exchange.open_orders().await.unwrap().is_empty());

    // stays locked, even when the prices move against the lock
    prices.set(dec!(0.5), dec!(0.5));
    let snapshot = orch.tick(at(9600)).await;
    assert_eq!(snapshot.asset(Asset::Btc).unwrap().state, TradingState::Locked);
    prices.set(dec!(0.63), dec!(0.37));

    let snapshot = orch.tick(at(9895)).await;
    assert_eq!(snapshot.asset(Asset::Btc).unwrap().state, TradingState::Endgame);
    assert_eq!(exchange.fills().await.len(), 2);

    // new window: settle, record, reset
    let snapshot = orch.tick(at(9905)).await;
    let btc = snapshot.asset(Asset::Btc).unwrap();
    assert_eq!(btc.state, TradingState::Armed);
    assert!(btc.position.is_flat());
    assert!(!btc.locked);
    assert_eq!(btc.total_flips, 0);
    assert_eq!(snapshot.window_start, at(9900));

    let result = orch.stats().get(at(9000), Asset::Btc).unwrap();
    assert!(result.locked);
    assert_eq!(result.pnl, dec!(0.2));
    assert_eq!(snapshot.stats.wins, 1);
    assert_eq!(snapshot.stats.locked, 1);
    assert_eq!(snapshot.totals.balance, Some(dec!(1000.2)));
}

#[tokio::test]
async fn test_final_tick_fill_is_settled() {
    let prices = Arc::new(ScriptedPrices::default());
    prices.set(dec!(0.6), dec!(0.4));
    let (mut orch, exchange) = setup(prices.clone());
    orch.refresh_scores().await;

    for secs in [9200, 9201, 9202, 9203] {
        orch.tick(at(secs)).await;
    }
    assert_eq!(exchange.open_orders().await.unwrap().len(), 3);

    // last tick of the window: every rung fills, then ENDGAME tops up YES
    prices.set(dec!(0.95), dec!(0.05));
    let snapshot = orch.tick(at(9895)).await;
    assert_eq!(snapshot.asset(Asset::Btc).unwrap().state, TradingState::Endgame);
    assert_eq!(exchange.fills().await.len(), 5);
    let top_up = exchange.fills().await.pop().unwrap();
    assert_eq!(top_up.token_id, "btc-yes");
    assert_eq!(top_up.size, dec!(50));
    let before_settle = exchange.balance().await.unwrap();

    orch.tick(at(9905)).await;
    let result = orch.stats().get(at(9000), Asset::Btc).unwrap();
    // 60 YES and 30 NO for 64.3 in total
    assert_eq!(result.cost, dec!(64.3));
    assert_eq!(result.payout, dec!(60));
    assert_eq!(result.pnl, dec!(-4.3));
    assert_eq!(exchange.balance().await.unwrap(), before_settle + result.payout);
    assert_eq!(exchange.balance().await.unwrap(), dec!(1000) + result.pnl);
    assert_eq!(orch.stats().summary().losses, 1);
}

#[tokio::test]
async fn test_flipping_market_is_skipped() {
    let prices = Arc::new(ScriptedPrices::default());
    let (mut orch, exchange) = setup(prices.clone());
    orch.refresh_scores().await;

    // two confirmed flips while still too early to enter
    let script = [
        (9010, dec!(0.6), dec!(0.4)),
        (9011, dec!(0.4), dec!(0.6)),
        (9012, dec!(0.4), dec!(0.6)),
        (9013, dec!(0.6), dec!(0.4)),
        (9014, dec!(0.6), dec!(0.4)),
    ];
    for (secs, yes, no) in script {
        prices.set(yes, no);
        orch.tick(at(secs)).await;
    }

    let snapshot = orch.tick(at(9100)).await;
    let btc = snapshot.asset(Asset::Btc).unwrap();
    assert_eq!(btc.total_flips, 2);
    assert_eq!(btc.state, TradingState::Armed);
    let decision = orch.machine(Asset::Btc).unwrap().last_decision().unwrap();
    assert!(decision.is_blocked_by(GuardrailCheck::Flips));
    assert!(exchange.fills().await.is_empty());
}

#[tokio::test]
async fn test_snapshot_persists_between_processes() {
    let prices = Arc::new(ScriptedPrices::default());
    prices.set(dec!(0.6), dec!(0.4));
    let (mut orch, _exchange) = setup(prices);
    let snapshot = orch.tick(at(9100)).await;

    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("state").join("snapshot.json")).unwrap();
    assert!(store.load().await.unwrap().is_none());
    store.save(&snapshot).await.unwrap();

    let reader = JsonFileStore::open(store.path()).unwrap();
    assert_eq!(reader.load().await.unwrap(), Some(snapshot));
}
