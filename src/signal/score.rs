//! Directional-conviction score
//!
//! Combines multi-timeframe return trendiness with a move-vs-volatility
//! stability measure into a single score in [0, 1], penalised when the
//! timeframes point in opposite directions.

use super::{Direction, Recommendation};
use crate::market::Asset;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Returns inside this band sum to a neutral direction
pub const DIRECTION_DEAD_ZONE: f64 = 0.0001;

/// Minutes covered by the volatility input
pub const STABILITY_MINUTES: f64 = 30.0;

const MICRO_WEIGHT: f64 = 0.4;
const STABILITY_WEIGHT: f64 = 0.3;
const MESO_WEIGHT: f64 = 0.2;
const MACRO_WEIGHT: f64 = 0.1;

const MICRO_MESO_PENALTY: f64 = 0.5;
const MICRO_MACRO_PENALTY: f64 = 0.8;

/// Score grading thresholds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScoreConfig {
    /// Score at or above which entries are recommended
    #[serde(default = "default_start_threshold")]
    pub start_threshold: f64,
    /// Score at or above which existing positions are held
    #[serde(default = "default_hold_threshold")]
    pub hold_threshold: f64,
}

fn default_start_threshold() -> f64 {
    0.55
}
fn default_hold_threshold() -> f64 {
    0.35
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            start_threshold: default_start_threshold(),
            hold_threshold: default_hold_threshold(),
        }
    }
}

/// Raw inputs for one score computation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInputs {
    pub micro_returns: Vec<f64>,
    pub meso_returns: Vec<f64>,
    pub macro_returns: Vec<f64>,
    /// Per-minute return volatility over the last 30 minutes
    pub volatility_30m: f64,
    /// Relative price change over the last 30 minutes
    pub net_move: f64,
}

/// Per-component breakdown
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub micro_trend: f64,
    pub meso_trend: f64,
    pub macro_trend: f64,
    pub stability: f64,
}

/// Direction of each timeframe
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Directions {
    pub micro: Direction,
    pub meso: Direction,
    pub macro_: Direction,
}

/// Divergence penalties applied to the weighted score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
    pub micro_meso: bool,
    pub micro_macro: bool,
    /// Combined multiplier (1.0 when no divergence)
    pub multiplier: f64,
}

/// Output of the score engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub score: f64,
    pub components: ScoreComponents,
    pub directions: Directions,
    pub divergence: Divergence,
    pub recommendation: Recommendation,
}

/// `|sum| / sum(|r|)`; 0 for empty or all-zero series
pub fn trendiness(returns: &[f64]) -> f64 {
    let abs_sum: f64 = returns.iter().map(|r| r.abs()).sum();
    if abs_sum == 0.0 {
        return 0.0;
    }
    let sum: f64 = returns.iter().sum();
    (sum.abs() / abs_sum).clamp(0.0, 1.0)
}

/// Sign of the summed returns with a dead-zone
pub fn direction(returns: &[f64]) -> Direction {
    let sum: f64 = returns.iter().sum();
    if sum > DIRECTION_DEAD_ZONE {
        Direction::Up
    } else if sum < -DIRECTION_DEAD_ZONE {
        Direction::Down
    } else {
        Direction::Neutral
    }
}

/// How large the net move is relative to the expected move
///
/// Zero volatility means no observed variance and scores as fully stable.
pub fn stability(net_move: f64, volatility_30m: f64, minutes: f64) -> f64 {
    if volatility_30m == 0.0 {
        return 1.0;
    }
    let expected = volatility_30m * minutes.sqrt();
    (net_move.abs() / expected / 0.5).clamp(0.0, 1.0)
}

/// Computes and remembers the latest score per asset
#[derive(Debug, Default)]
pub struct ScoreEngine {
    config: ScoreConfig,
    latest: HashMap<Asset, ScoreResult>,
}

impl ScoreEngine {
    pub fn new(config: ScoreConfig) -> Self {
        Self {
            config,
            latest: HashMap::new(),
        }
    }

    /// Score an asset and record it as the latest value
    pub fn score(&mut self, asset: Asset, inputs: &ScoreInputs) -> ScoreResult {
        let result = self.compute(inputs);
        self.latest.insert(asset, result.clone());
        result
    }

    /// Pure score computation
    pub fn compute(&self, inputs: &ScoreInputs) -> ScoreResult {
        let components = ScoreComponents {
            micro_trend: trendiness(&inputs.micro_returns),
            meso_trend: trendiness(&inputs.meso_returns),
            macro_trend: trendiness(&inputs.macro_returns),
            stability: stability(inputs.net_move, inputs.volatility_30m, STABILITY_MINUTES),
        };
        let directions = Directions {
            micro: direction(&inputs.micro_returns),
            meso: direction(&inputs.meso_returns),
            macro_: direction(&inputs.macro_returns),
        };

        let weighted = MICRO_WEIGHT * components.micro_trend
            + STABILITY_WEIGHT * components.stability
            + MESO_WEIGHT * components.meso_trend
            + MACRO_WEIGHT * components.macro_trend;

        let micro_meso = directions.micro.disagrees_with(directions.meso);
        let micro_macro = directions.micro.disagrees_with(directions.macro_);
        let mut multiplier = 1.0;
        if micro_meso {
            multiplier *= MICRO_MESO_PENALTY;
        }
        if micro_macro {
            multiplier *= MICRO_MACRO_PENALTY;
        }

        let score = (weighted * multiplier).clamp(0.0, 1.0);

        ScoreResult {
            score,
            components,
            directions,
            divergence: Divergence {
                micro_meso,
                micro_macro,
                multiplier,
            },
            recommendation: self.grade(score),
        }
    }

    /// Map a score onto START / HOLD / STOP
    pub fn grade(&self, score: f64) -> Recommendation {
        if score >= self.config.start_threshold {
            Recommendation::Start
        } else if score >= self.config.hold_threshold {
            Recommendation::Hold
        } else {
            Recommendation::Stop
        }
    }

    /// Last score recorded for an asset
    pub fn latest(&self, asset: Asset) -> Option<&ScoreResult> {
        self.latest.get(&asset)
    }
}
