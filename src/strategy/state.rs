//! Per-asset trading lifecycle states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one asset inside a window
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradingState {
    /// No tradable market this window
    Idle,
    /// Market resolved, waiting on guardrails
    Armed,
    /// One taker order on the leader
    Entry,
    /// Resting orders on the hedge side
    Laddering,
    /// Polling the lock analysis
    Locking,
    /// Dual-profit lock reached
    Locked,
    /// One corrective order on the losing side
    Recovery,
    /// Final seconds of the window
    Endgame,
}

impl TradingState {
    /// Numeric code for the state gauge
    pub fn code(self) -> u8 {
        match self {
            TradingState::Idle => 0,
            TradingState::Armed => 1,
            TradingState::Entry => 2,
            TradingState::Laddering => 3,
            TradingState::Locking => 4,
            TradingState::Locked => 5,
            TradingState::Recovery => 6,
            TradingState::Endgame => 7,
        }
    }
}

impl fmt::Display for TradingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradingState::Idle => "IDLE",
            TradingState::Armed => "ARMED",
            TradingState::Entry => "ENTRY",
            TradingState::Laddering => "LADDERING",
            TradingState::Locking => "LOCKING",
            TradingState::Locked => "LOCKED",
            TradingState::Recovery => "RECOVERY",
            TradingState::Endgame => "ENDGAME",
        };
        f.write_str(name)
    }
}
