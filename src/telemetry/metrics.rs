//! Prometheus metrics
//!
//! Thin wrappers over the `metrics` facade so metric names live in one
//! place. Without an installed recorder every call is a no-op.

use crate::data::AssetSnapshot;
use crate::execution::{OrderStatus, OrderType};
use crate::guardrail::GuardrailCheck;
use crate::market::Asset;
use crate::strategy::TradingState;
use metrics_exporter_prometheus::PrometheusBuilder;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::net::SocketAddr;
use std::time::Duration;

/// Start the Prometheus scrape endpoint on `port`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter on {}: {}", addr, e))?;
    tracing::info!(%addr, "Metrics exporter listening");
    Ok(())
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

pub fn record_order(asset: Asset, order_type: OrderType, status: OrderStatus) {
    let order_type = match order_type {
        OrderType::Fok => "fok",
        OrderType::Ioc => "ioc",
        OrderType::Gtc => "gtc",
    };
    let status = match status {
        OrderStatus::Filled => "filled",
        OrderStatus::Killed => "killed",
        OrderStatus::Open => "open",
    };
    metrics::counter!(
        "polylock_orders_total",
        "asset" => asset.to_string(),
        "type" => order_type,
        "status" => status
    )
    .increment(1);
}

pub fn record_order_error(asset: Asset) {
    metrics::counter!("polylock_order_errors_total", "asset" => asset.to_string()).increment(1);
}

pub fn record_risk_rejection(asset: Asset) {
    metrics::counter!("polylock_risk_rejections_total", "asset" => asset.to_string()).increment(1);
}

pub fn record_flip(asset: Asset) {
    metrics::counter!("polylock_leader_flips_total", "asset" => asset.to_string()).increment(1);
}

pub fn record_guardrail_block(asset: Asset, check: GuardrailCheck) {
    metrics::counter!(
        "polylock_guardrail_blocks_total",
        "asset" => asset.to_string(),
        "check" => check.name()
    )
    .increment(1);
}

pub fn record_transition(asset: Asset, to: TradingState) {
    metrics::counter!(
        "polylock_state_transitions_total",
        "asset" => asset.to_string(),
        "to" => to.to_string()
    )
    .increment(1);
}

pub fn record_upstream_failure(source: &'static str) {
    metrics::counter!("polylock_upstream_failures_total", "source" => source).increment(1);
}

pub fn record_tick_latency(duration: Duration) {
    metrics::histogram!("polylock_tick_latency_ms").record(duration.as_secs_f64() * 1000.0);
}

pub fn set_balance(balance: Decimal) {
    metrics::gauge!("polylock_balance_usd").set(to_f64(balance));
}

pub fn set_window_pnl(total: Decimal) {
    metrics::gauge!("polylock_settled_pnl_usd").set(to_f64(total));
}

/// Per-asset gauges from a tick snapshot
pub fn set_asset_gauges(snapshot: &AssetSnapshot) {
    let asset = snapshot.asset.to_string();
    metrics::gauge!("polylock_asset_state", "asset" => asset.clone())
        .set(f64::from(snapshot.state.code()));
    metrics::gauge!("polylock_asset_obi", "asset" => asset.clone(), "side" => "yes")
        .set(snapshot.obi_yes);
    metrics::gauge!("polylock_asset_obi", "asset" => asset.clone(), "side" => "no")
        .set(snapshot.obi_no);
    metrics::gauge!("polylock_asset_obi", "asset" => asset.clone(), "side" => "combined")
        .set(snapshot.obi_combined);
    metrics::gauge!("polylock_asset_leader_bias", "asset" => asset.clone())
        .set(snapshot.leader_bias);
    metrics::gauge!("polylock_asset_pnl_usd", "asset" => asset.clone(), "outcome" => "yes")
        .set(to_f64(snapshot.pnl_if_yes_wins));
    metrics::gauge!("polylock_asset_pnl_usd", "asset" => asset.clone(), "outcome" => "no")
        .set(to_f64(snapshot.pnl_if_no_wins));
    metrics::gauge!("polylock_asset_locked", "asset" => asset)
        .set(if snapshot.locked { 1.0 } else { 0.0 });
}
