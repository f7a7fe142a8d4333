//! Upstream return series construction

use crate::signal::ScoreInputs;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Deserialize;

/// Lookbacks (in 1-minute returns) used to build score inputs
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReturnWindows {
    #[serde(default = "default_micro")]
    pub micro: usize,
    #[serde(default = "default_meso")]
    pub meso: usize,
    #[serde(default = "default_macro", rename = "macro")]
    pub macro_: usize,
    /// Returns used for the volatility and net-move inputs
    #[serde(default = "default_volatility")]
    pub volatility: usize,
}

fn default_micro() -> usize {
    5
}
fn default_meso() -> usize {
    15
}
fn default_macro() -> usize {
    60
}
fn default_volatility() -> usize {
    30
}

impl Default for ReturnWindows {
    fn default() -> Self {
        Self {
            micro: default_micro(),
            meso: default_meso(),
            macro_: default_macro(),
            volatility: default_volatility(),
        }
    }
}

impl ReturnWindows {
    /// Closes needed to fill every lookback
    pub fn closes_needed(&self) -> usize {
        self.micro.max(self.meso).max(self.macro_).max(self.volatility) + 1
    }
}

/// Simple returns between consecutive closes; non-positive closes are skipped
pub fn simple_returns(closes: &[Decimal]) -> Vec<f64> {
    closes
        .windows(2)
        .filter_map(|pair| {
            let prev = pair[0].to_f64()?;
            let curr = pair[1].to_f64()?;
            if prev <= 0.0 || curr <= 0.0 {
                return None;
            }
            Some(curr / prev - 1.0)
        })
        .collect()
}

fn tail(values: &[f64], n: usize) -> Vec<f64> {
    values[values.len().saturating_sub(n)..].to_vec()
}

/// Build score inputs from 1-minute closes (oldest first)
pub fn score_inputs_from_closes(closes: &[Decimal], windows: &ReturnWindows) -> ScoreInputs {
    let returns = simple_returns(closes);
    if returns.is_empty() {
        return ScoreInputs::default();
    }

    let vol_returns = tail(&returns, windows.volatility);
    let n = vol_returns.len() as f64;
    let mean = vol_returns.iter().sum::<f64>() / n;
    let variance = vol_returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;

    let last = closes.len() - 1;
    let anchor = last.saturating_sub(windows.volatility);
    let net_move = match (closes[anchor].to_f64(), closes[last].to_f64()) {
        (Some(from), Some(to)) if from > 0.0 => to / from - 1.0,
        _ => 0.0,
    };

    ScoreInputs {
        micro_returns: tail(&returns, windows.micro),
        meso_returns: tail(&returns, windows.meso),
        macro_returns: tail(&returns, windows.macro_),
        volatility_30m: variance.sqrt(),
        net_move,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_simple_returns() {
        let returns = simple_returns(&[dec!(100), dec!(110), dec!(99)]);
        assert_eq!(returns.len(), 2);
        assert!((returns[0] - 0.1).abs() < 1e-12);
        assert!((returns[1] + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_too_few_closes() {
        let inputs = score_inputs_from_closes(&[dec!(100)], &ReturnWindows::default());
        assert_eq!(inputs, ScoreInputs::default());
    }

    #[test]
    fn test_lookbacks_are_tails() {
        let closes: Vec<Decimal> = (0..=70).map(|i| Decimal::from(1000 + i)).collect();
        let inputs = score_inputs_from_closes(&closes, &ReturnWindows::default());
        assert_eq!(inputs.micro_returns.len(), 5);
        assert_eq!(inputs.meso_returns.len(), 15);
        assert_eq!(inputs.macro_returns.len(), 60);
        // 1070 / 1040 - 1
        assert!((inputs.net_move - (1070.0 / 1040.0 - 1.0)).abs() < 1e-12);
        assert!(inputs.volatility_30m > 0.0);
    }

    #[test]
    fn test_flat_series_has_zero_volatility() {
        let closes = vec![dec!(50); 40];
        let inputs = score_inputs_from_closes(&closes, &ReturnWindows::default());
        assert_eq!(inputs.volatility_30m, 0.0);
        assert_eq!(inputs.net_move, 0.0);
    }

    #[test]
    fn test_closes_needed() {
        assert_eq!(ReturnWindows::default().closes_needed(), 61);
    }
}
