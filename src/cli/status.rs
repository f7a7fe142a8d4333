//! Status command implementation

use crate::config::Config;
use crate::data::{JsonFileStore, SnapshotStore, TradingSnapshot};
use std::fmt::Write;

/// Print the last snapshot written by `run`
pub async fn print_status(config: &Config) -> anyhow::Result<()> {
    let store = JsonFileStore::open(&config.data.snapshot_path)?;
    match store.load().await? {
        Some(snapshot) => print!("{}", render(&snapshot)),
        None => println!("No snapshot at {}", store.path().display()),
    }
    Ok(())
}

fn render(snapshot: &TradingSnapshot) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "poly-lock status at {} (window {}, {}s left)",
        snapshot.timestamp.format("%H:%M:%S"),
        snapshot.window_start.format("%H:%M"),
        snapshot.window_remaining_secs
    );
    for asset in &snapshot.assets {
        let leader = asset.leader.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {:<4} {:<9} leader={:<3} bias={:+.2} flips={} obi={:+.2}/{:+.2} ({:+.2}) yes={}@{} no={}@{} pnl={}/{}{}",
            asset.asset.to_string(),
            asset.state.to_string(),
            leader,
            asset.leader_bias,
            asset.total_flips,
            asset.obi_yes,
            asset.obi_no,
            asset.obi_combined,
            asset.position.yes_shares,
            asset.position.yes_cost,
            asset.position.no_shares,
            asset.position.no_cost,
            asset.pnl_if_yes_wins,
            asset.pnl_if_no_wins,
            if asset.locked { " LOCKED" } else { "" },
        );
    }
    let totals = &snapshot.totals;
    let balance = totals.balance.map(|b| b.to_string()).unwrap_or_else(|| "?".to_string());
    let _ = writeln!(
        out,
        "  balance={} cost={} open_orders={} worst_case={}",
        balance, totals.total_cost, totals.open_orders, totals.worst_case_pnl
    );
    let stats = &snapshot.stats;
    let _ = writeln!(
        out,
        "  windows={} wins={} losses={} flats={} locked={} pnl={}",
        stats.windows, stats.wins, stats.losses, stats.flats, stats.locked, stats.total_pnl
    );
    out
}
