//! Market regime classification from recent score history

use crate::market::Asset;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Samples required before statistics are computed
const MIN_SAMPLES: usize = 3;

/// Qualitative state of an asset's recent scores
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Regime {
    Steady,
    Waking,
    Fading,
    Choppy,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Regime::Steady => "STEADY",
            Regime::Waking => "WAKING",
            Regime::Fading => "FADING",
            Regime::Choppy => "CHOPPY",
        };
        write!(f, "{s}")
    }
}

/// Regime classifier configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RegimeConfig {
    /// Score history length per asset
    #[serde(default = "default_history_len")]
    pub history_len: usize,
    /// Standard deviation at or above which the regime is choppy
    #[serde(default = "default_std_threshold")]
    pub std_threshold: f64,
    /// Half-over-half mean change that counts as a trend
    #[serde(default = "default_trend_threshold")]
    pub trend_threshold: f64,
}

fn default_history_len() -> usize {
    24
}
fn default_std_threshold() -> f64 {
    0.15
}
fn default_trend_threshold() -> f64 {
    0.05
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            history_len: default_history_len(),
            std_threshold: default_std_threshold(),
            trend_threshold: default_trend_threshold(),
        }
    }
}

/// Statistics behind a regime decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeStats {
    pub mean: f64,
    pub std_dev: f64,
    pub trend: f64,
    pub regime: Regime,
}

impl RegimeStats {
    /// Neutral stats used until enough history exists
    pub fn neutral() -> Self {
        Self {
            mean: 0.5,
            std_dev: 0.5,
            trend: 0.0,
            regime: Regime::Choppy,
        }
    }
}

/// Keeps a bounded score history per asset and classifies it
#[derive(Debug, Default)]
pub struct RegimeClassifier {
    config: RegimeConfig,
    history: HashMap<Asset, VecDeque<f64>>,
    stats: HashMap<Asset, RegimeStats>,
}

impl RegimeClassifier {
    pub fn new(config: RegimeConfig) -> Self {
        Self {
            config,
            history: HashMap::new(),
            stats: HashMap::new(),
        }
    }

    /// Record a score and recompute the asset's regime
    pub fn add_score(&mut self, asset: Asset, score: f64) {
        let capacity = self.config.history_len.max(1);
        let history = self.history.entry(asset).or_default();
        history.push_back(score);
        while history.len() > capacity {
            history.pop_front();
        }
        let stats = classify(history, &self.config);
        self.stats.insert(asset, stats);
    }

    /// Current regime, CHOPPY for unknown assets
    pub fn regime(&self, asset: Asset) -> Regime {
        self.stats(asset).regime
    }

    /// Current statistics, neutral for unknown assets
    pub fn stats(&self, asset: Asset) -> RegimeStats {
        self.stats
            .get(&asset)
            .copied()
            .unwrap_or_else(RegimeStats::neutral)
    }

    /// Number of scores held for an asset
    pub fn history_len(&self, asset: Asset) -> usize {
        self.history.get(&asset).map_or(0, VecDeque::len)
    }
}

fn mean(values: impl ExactSizeIterator<Item = f64>) -> f64 {
    let n = values.len();
    if n == 0 {
        return 0.0;
    }
    values.sum::<f64>() / n as f64
}

fn classify(history: &VecDeque<f64>, config: &RegimeConfig) -> RegimeStats {
    let n = history.len();
    if n < MIN_SAMPLES {
        return RegimeStats::neutral();
    }

    let mean_all = mean(history.iter().copied());
    let variance = history.iter().map(|s| (s - mean_all).powi(2)).sum::<f64>() / n as f64;
    let std_dev = variance.sqrt();

    let mid = n / 2;
    let first = mean(history.iter().take(mid).copied());
    let second = mean(history.iter().skip(mid).copied());
    let trend = second - first;

    let regime = if std_dev >= config.std_threshold {
        Regime::Choppy
    } else if trend > config.trend_threshold {
        Regime::Waking
    } else if trend < -config.trend_threshold {
        Regime::Fading
    } else {
        Regime::Steady
    };

    RegimeStats {
        mean: mean_all,
        std_dev,
        trend,
        regime,
    }
}
