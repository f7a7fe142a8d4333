//! Signal module
//!
//! Per-asset decision inputs: conviction score, regime, leader/flip
//! tracking and order-book imbalance

mod leader;
mod obi;
mod regime;
mod rolling;
mod score;
mod types;

pub use leader::{LeaderConfig, LeaderFlipTracker, LeaderUpdate};
pub use obi::{
    imbalance, obi_blocks, price_imbalance, ObiConfig, ObiEngine, ObiMethod, ObiReading,
};
pub use regime::{Regime, RegimeClassifier, RegimeConfig, RegimeStats};
pub use rolling::RollingWindow;
pub use score::{
    direction, stability, trendiness, Directions, Divergence, ScoreComponents, ScoreConfig,
    ScoreEngine, ScoreInputs, ScoreResult,
};
pub use types::{Direction, Recommendation, Side};
