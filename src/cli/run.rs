//! Run command implementation

use crate::config::Config;
use crate::data::{JsonFileStore, SnapshotStore};
use crate::execution::PaperExchange;
use crate::feed::BinanceKlines;
use crate::market::{GammaConfig, GammaResolver};
use crate::orderbook::{ClobClient, ClobConfig};
use crate::strategy::{Collaborators, Orchestrator};
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Stop after this many ticks
    #[arg(long)]
    pub ticks: Option<u64>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        config.validate()?;

        let store = if config.data.snapshots_enabled {
            Some(JsonFileStore::open(&config.data.snapshot_path)?)
        } else {
            None
        };
        let mut orchestrator = Orchestrator::new(config, collaborators(config)?);

        let mut interval = tokio::time::interval(config.execution.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let refresh_every = Duration::from_secs(config.upstream.refresh_interval_secs.max(1));
        let mut last_refresh: Option<Instant> = None;
        let mut ticks = 0u64;

        tracing::info!(
            assets = ?config.market.assets,
            balance = %config.execution.initial_balance,
            "Starting paper trading"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if last_refresh.map_or(true, |at| at.elapsed() >= refresh_every) {
                        orchestrator.refresh_scores().await;
                        last_refresh = Some(Instant::now());
                    }

                    let snapshot = orchestrator.tick(Utc::now()).await;
                    if let Some(store) = &store {
                        if let Err(e) = store.save(&snapshot).await {
                            tracing::warn!(error = %e, "Snapshot save failed");
                        }
                    }

                    ticks += 1;
                    if self.ticks.is_some_and(|limit| ticks >= limit) {
                        tracing::info!(ticks, "Tick limit reached");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                    break;
                }
            }
        }

        let summary = orchestrator.stats().summary();
        tracing::info!(
            windows = summary.windows,
            wins = summary.wins,
            losses = summary.losses,
            locked = summary.locked,
            total_pnl = %summary.total_pnl,
            "Stopped"
        );
        Ok(())
    }
}

/// Paper exchange plus the HTTP collaborators
fn collaborators(config: &Config) -> anyhow::Result<Collaborators> {
    let timeout = config.market.request_timeout();
    Ok(Collaborators {
        exchange: Arc::new(PaperExchange::new(
            config.execution.initial_balance,
            config.execution.fee_rate,
        )),
        prices: Arc::new(ClobClient::with_config(ClobConfig {
            base_url: config.market.clob_url.clone(),
            timeout,
        })?),
        venues: Arc::new(GammaResolver::with_config(GammaConfig {
            base_url: config.market.gamma_url.clone(),
            timeout,
        })?),
        candles: Arc::new(BinanceKlines::new(config.upstream.binance_url.clone(), timeout)?),
    })
}
