//! Strategy module
//!
//! The per-asset lifecycle machine, the orchestrator that ticks every
//! asset, and settled-window statistics

mod machine;
mod orchestrator;
mod state;
mod stats;

pub use machine::{AssetMachine, MarketObservation, Quote, StepContext, StepOutcome, StrategyConfig};
pub use orchestrator::{Collaborators, Orchestrator};
pub use state::TradingState;
pub use stats::{Outcome, StatsSummary, WindowResult, WindowStats};
