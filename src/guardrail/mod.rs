//! Entry admission control
//!
//! An AND-gate over independent named checks. Every failing check is
//! reported, not only the first.

mod evaluator;
mod types;

pub use evaluator::{GuardrailConfig, GuardrailEvaluator, GuardrailInputs};
pub use types::{Blocker, CheckResult, FlipMode, GuardrailCheck, GuardrailDecision, GuardrailMode};
