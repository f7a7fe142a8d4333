//! Trading snapshots and their JSON file store

use crate::market::Asset;
use crate::risk::Position;
use crate::signal::{ObiMethod, Regime, Side};
use crate::strategy::{StatsSummary, TradingState};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One asset's view at the end of a tick
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSnapshot {
    pub asset: Asset,
    pub state: TradingState,
    pub slug: Option<String>,
    pub leader: Option<Side>,
    /// Confirmed flips inside the rolling window
    pub flip_count: usize,
    pub total_flips: u32,
    /// Rolling leader bias in [-1, 1], positive favours YES
    pub leader_bias: f64,
    pub obi_yes: f64,
    pub obi_no: f64,
    /// Mean of the two sides' rolling OBI
    pub obi_combined: f64,
    pub obi_method: Option<ObiMethod>,
    pub price_yes: Option<Decimal>,
    pub price_no: Option<Decimal>,
    pub position: Position,
    pub open_orders: usize,
    pub locked: bool,
    pub pnl_if_yes_wins: Decimal,
    pub pnl_if_no_wins: Decimal,
    pub score: Option<f64>,
    pub regime: Regime,
}

/// Aggregates across assets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub balance: Option<Decimal>,
    pub total_cost: Decimal,
    pub open_orders: usize,
    pub locked_assets: usize,
    /// Sum over assets of the worse of the two outcomes
    pub worst_case_pnl: Decimal,
}

impl Totals {
    pub fn from_assets(assets: &[AssetSnapshot], balance: Option<Decimal>) -> Self {
        Self {
            balance,
            total_cost: assets.iter().map(|a| a.position.total_cost()).sum(),
            open_orders: assets.iter().map(|a| a.open_orders).sum(),
            locked_assets: assets.iter().filter(|a| a.locked).count(),
            worst_case_pnl: assets
                .iter()
                .map(|a| a.pnl_if_yes_wins.min(a.pnl_if_no_wins))
                .sum(),
        }
    }
}

/// Everything a tick exposes to outside readers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSnapshot {
    pub timestamp: DateTime<Utc>,
    pub window_start: DateTime<Utc>,
    pub window_remaining_secs: i64,
    pub assets: Vec<AssetSnapshot>,
    pub totals: Totals,
    pub stats: StatsSummary,
}

impl TradingSnapshot {
    pub fn asset(&self, asset: Asset) -> Option<&AssetSnapshot> {
        self.assets.iter().find(|a| a.asset == asset)
    }
}

/// Persistence for the latest snapshot
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn save(&self, snapshot: &TradingSnapshot) -> anyhow::Result<()>;
    /// `Ok(None)` when nothing has been saved yet
    async fn load(&self) -> anyhow::Result<Option<TradingSnapshot>>;
}

/// Pretty JSON file, replaced atomically on every save
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Open a store at `path`, creating its directory
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating snapshot directory {}", dir.display()))?;
        }
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotStore for JsonFileStore {
    async fn save(&self, snapshot: &TradingSnapshot) -> anyhow::Result<()> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }

    async fn load(&self) -> anyhow::Result<Option<TradingSnapshot>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.path.display())),
        }
    }
}
