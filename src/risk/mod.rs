//! Risk management module
//!
//! Dual-outcome positions, lock detection and pre-trade exposure caps

mod limits;
mod lock;
mod position;
mod types;

pub use limits::{Exposure, RiskCaps, RiskConfig, RiskLimiter};
pub use lock::{
    analyze, recovery_shares, solve_aggressive, AggressiveSolution, LockAnalysis, LockDetector,
    LockStatus,
};
pub use position::Position;
pub use types::{LockError, RiskError};
