//! Snapshot persistence
//!
//! The per-tick view of every asset, written for dashboards and the
//! `status` command to read

mod snapshot;

pub use snapshot::{AssetSnapshot, JsonFileStore, SnapshotStore, Totals, TradingSnapshot};
