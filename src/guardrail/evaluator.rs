//! Guardrail evaluation

use super::{Blocker, CheckResult, FlipMode, GuardrailCheck, GuardrailDecision, GuardrailMode};
use crate::signal::{obi_blocks, Recommendation};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds for the admission checks
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GuardrailConfig {
    /// Minimum elapsed fraction of the window before entering
    #[serde(default = "default_min_elapsed_fraction")]
    pub min_elapsed_fraction: f64,
    /// Rolling OBI at or below this blocks entry
    #[serde(default = "default_obi_threshold")]
    pub obi_threshold: f64,
    /// Flips at which a flat asset is skipped
    #[serde(default = "default_skip_flips")]
    pub skip_flips: u32,
    /// Flips at which an asset holding shares switches to recovery
    #[serde(default = "default_recovery_flips")]
    pub recovery_flips: u32,
    #[serde(default = "default_min_stability")]
    pub min_stability: f64,
    #[serde(default = "default_min_spread")]
    pub min_spread: Decimal,
    #[serde(default = "default_max_spread")]
    pub max_spread: Decimal,
    /// Ceiling for the combined best-bid pair cost
    #[serde(default = "default_max_pair_cost")]
    pub max_pair_cost: Decimal,
}

fn default_min_elapsed_fraction() -> f64 {
    0.10
}
fn default_obi_threshold() -> f64 {
    -0.30
}
fn default_skip_flips() -> u32 {
    2
}
fn default_recovery_flips() -> u32 {
    3
}
fn default_min_stability() -> f64 {
    0.30
}
fn default_min_spread() -> Decimal {
    dec!(0.04)
}
fn default_max_spread() -> Decimal {
    dec!(0.70)
}
fn default_max_pair_cost() -> Decimal {
    dec!(0.99)
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            min_elapsed_fraction: default_min_elapsed_fraction(),
            obi_threshold: default_obi_threshold(),
            skip_flips: default_skip_flips(),
            recovery_flips: default_recovery_flips(),
            min_stability: default_min_stability(),
            min_spread: default_min_spread(),
            max_spread: default_max_spread(),
            max_pair_cost: default_max_pair_cost(),
        }
    }
}

/// Everything the checks look at for one asset
#[derive(Debug, Clone, PartialEq)]
pub struct GuardrailInputs {
    /// Latest upstream recommendation, if any score exists yet
    pub recommendation: Option<Recommendation>,
    pub stability: Option<f64>,
    pub elapsed_fraction: f64,
    /// Rolling OBI on the side that would be bought
    pub obi: Option<f64>,
    pub total_flips: u32,
    pub shares_held: Decimal,
    pub price_yes: Decimal,
    pub price_no: Decimal,
    /// YES best bid + NO best bid, when both books are known
    pub pair_cost: Option<Decimal>,
}

/// Composite entry gate
#[derive(Debug, Clone)]
pub struct GuardrailEvaluator {
    config: GuardrailConfig,
}

impl GuardrailEvaluator {
    pub fn new(config: GuardrailConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GuardrailConfig {
        &self.config
    }

    /// Run every check; allowed only when all pass
    pub fn check_all(&self, inputs: &GuardrailInputs) -> GuardrailDecision {
        let flip_mode = self.flip_mode(inputs.total_flips, inputs.shares_held);
        let results = [
            self.check_upstream(inputs.recommendation),
            self.check_rhr(inputs.elapsed_fraction),
            self.check_obi(inputs.obi),
            self.check_flips(flip_mode, inputs.total_flips),
            self.check_stability(inputs.stability),
            self.check_spread(inputs.price_yes, inputs.price_no),
            self.check_pair_cost(inputs.pair_cost),
        ];

        let blockers: Vec<Blocker> = results
            .into_iter()
            .filter(|r| !r.passed)
            .map(|r| Blocker {
                check: r.check,
                reason: r.reason,
            })
            .collect();

        let allowed = blockers.is_empty();
        let mode = match (allowed, flip_mode) {
            (false, _) => GuardrailMode::Blocked,
            (true, FlipMode::Recovery) => GuardrailMode::Recovery,
            (true, _) => GuardrailMode::EntryAllowed,
        };

        if !allowed {
            tracing::debug!(
                blockers = %blockers.iter().map(|b| b.check.name()).collect::<Vec<_>>().join(","),
                "Guardrails blocked entry"
            );
        }

        GuardrailDecision {
            allowed,
            mode,
            blockers,
        }
    }

    pub fn flip_mode(&self, total_flips: u32, shares_held: Decimal) -> FlipMode {
        let holding = shares_held > Decimal::ZERO;
        if !holding && total_flips >= self.config.skip_flips {
            FlipMode::Skip
        } else if holding && total_flips >= self.config.recovery_flips {
            FlipMode::Recovery
        } else {
            FlipMode::Normal
        }
    }

    pub fn check_upstream(&self, recommendation: Option<Recommendation>) -> CheckResult {
        match recommendation {
            Some(Recommendation::Start) => {
                CheckResult::pass(GuardrailCheck::Upstream, "upstream START")
            }
            Some(other) => CheckResult::fail(
                GuardrailCheck::Upstream,
                format!("upstream recommends {other}"),
            ),
            None => CheckResult::fail(GuardrailCheck::Upstream, "no upstream score yet"),
        }
    }

    pub fn check_rhr(&self, elapsed_fraction: f64) -> CheckResult {
        if elapsed_fraction >= self.config.min_elapsed_fraction {
            CheckResult::pass(
                GuardrailCheck::Rhr,
                format!("elapsed {elapsed_fraction:.2} of window"),
            )
        } else {
            CheckResult::fail(
                GuardrailCheck::Rhr,
                format!(
                    "elapsed {:.2} < {:.2} of window",
                    elapsed_fraction, self.config.min_elapsed_fraction
                ),
            )
        }
    }

    pub fn check_obi(&self, obi: Option<f64>) -> CheckResult {
        match obi {
            None => CheckResult::pass(GuardrailCheck::Obi, "no OBI readings"),
            Some(value) if !obi_blocks(value, self.config.obi_threshold) => {
                CheckResult::pass(GuardrailCheck::Obi, format!("rolling OBI {value:.2}"))
            }
            Some(value) => CheckResult::fail(
                GuardrailCheck::Obi,
                format!(
                    "rolling OBI {:.2} <= {:.2}",
                    value, self.config.obi_threshold
                ),
            ),
        }
    }

    pub fn check_flips(&self, mode: FlipMode, total_flips: u32) -> CheckResult {
        match mode {
            FlipMode::Skip => CheckResult::fail(
                GuardrailCheck::Flips,
                format!("{total_flips} flips with no shares held"),
            ),
            FlipMode::Recovery => CheckResult::pass(
                GuardrailCheck::Flips,
                format!("{total_flips} flips, recovery mode"),
            ),
            FlipMode::Normal => {
                CheckResult::pass(GuardrailCheck::Flips, format!("{total_flips} flips"))
            }
        }
    }

    pub fn check_stability(&self, stability: Option<f64>) -> CheckResult {
        match stability {
            Some(value) if value >= self.config.min_stability => {
                CheckResult::pass(GuardrailCheck::Stability, format!("stability {value:.2}"))
            }
            Some(value) => CheckResult::fail(
                GuardrailCheck::Stability,
                format!(
                    "stability {:.2} < {:.2}",
                    value, self.config.min_stability
                ),
            ),
            None => CheckResult::fail(GuardrailCheck::Stability, "no stability reading"),
        }
    }

    pub fn check_spread(&self, price_yes: Decimal, price_no: Decimal) -> CheckResult {
        let spread = (price_yes - price_no).abs();
        if spread >= self.config.min_spread && spread <= self.config.max_spread {
            CheckResult::pass(GuardrailCheck::Spread, format!("spread {spread}"))
        } else {
            CheckResult::fail(
                GuardrailCheck::Spread,
                format!(
                    "spread {} outside [{}, {}]",
                    spread, self.config.min_spread, self.config.max_spread
                ),
            )
        }
    }

    pub fn check_pair_cost(&self, pair_cost: Option<Decimal>) -> CheckResult {
        match pair_cost {
            None => CheckResult::pass(GuardrailCheck::PairCost, "pair cost unavailable"),
            Some(cost) if cost <= self.config.max_pair_cost => {
                CheckResult::pass(GuardrailCheck::PairCost, format!("pair cost {cost}"))
            }
            Some(cost) => CheckResult::fail(
                GuardrailCheck::PairCost,
                format!("pair cost {} > {}", cost, self.config.max_pair_cost),
            ),
        }
    }
}
