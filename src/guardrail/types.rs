//! Guardrail types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Named admission checks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuardrailCheck {
    /// Upstream recommendation must be START-grade
    Upstream,
    /// Minimum elapsed fraction of the window
    Rhr,
    /// Rolling order book imbalance above the blocking threshold
    Obi,
    /// Confirmed leader flips this window
    Flips,
    /// Upstream stability score
    Stability,
    /// YES/NO price spread range
    Spread,
    /// Combined best-bid pair cost ceiling
    PairCost,
}

impl GuardrailCheck {
    pub fn name(&self) -> &'static str {
        match self {
            GuardrailCheck::Upstream => "upstream",
            GuardrailCheck::Rhr => "rhr",
            GuardrailCheck::Obi => "obi",
            GuardrailCheck::Flips => "flips",
            GuardrailCheck::Stability => "stability",
            GuardrailCheck::Spread => "spread",
            GuardrailCheck::PairCost => "pair_cost",
        }
    }
}

impl fmt::Display for GuardrailCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of a single check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub check: GuardrailCheck,
    pub passed: bool,
    pub reason: String,
}

impl CheckResult {
    pub fn pass(check: GuardrailCheck, reason: impl Into<String>) -> Self {
        Self {
            check,
            passed: true,
            reason: reason.into(),
        }
    }

    pub fn fail(check: GuardrailCheck, reason: impl Into<String>) -> Self {
        Self {
            check,
            passed: false,
            reason: reason.into(),
        }
    }
}

/// Flip-count classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlipMode {
    Normal,
    /// Too choppy to open a position
    Skip,
    /// Choppy with shares held: proceed, but correct rather than enter
    Recovery,
}

/// What the caller may do next
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardrailMode {
    EntryAllowed,
    Recovery,
    Blocked,
}

/// A failing check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Blocker {
    pub check: GuardrailCheck,
    pub reason: String,
}

impl fmt::Display for Blocker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.check, self.reason)
    }
}

/// Composite result; every failure is listed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardrailDecision {
    pub allowed: bool,
    pub mode: GuardrailMode,
    pub blockers: Vec<Blocker>,
}

impl GuardrailDecision {
    pub fn is_blocked_by(&self, check: GuardrailCheck) -> bool {
        self.blockers.iter().any(|b| b.check == check)
    }
}
