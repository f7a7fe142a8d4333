//! Dual-outcome lock detection and recovery sizing
//!
//! A winning share redeems for 1.00 and a losing share for 0. A position is
//! dual-locked when it ends in profit whichever outcome wins.

use super::{LockError, Position};
use crate::signal::Side;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Payoff analysis of a position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockAnalysis {
    pub pnl_if_yes_wins: Decimal,
    pub pnl_if_no_wins: Decimal,
    /// Total cost per matched pair; None unless both sides are held
    pub pair_cost: Option<Decimal>,
    pub is_dual_lock: bool,
    pub needs_recovery: bool,
    /// Side with the lower payoff
    pub recovery_side: Side,
    pub yes_deficit: Decimal,
    pub no_deficit: Decimal,
}

impl LockAnalysis {
    pub fn deficit(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.yes_deficit,
            Side::No => self.no_deficit,
        }
    }

    pub fn pnl_if(&self, side: Side) -> Decimal {
        match side {
            Side::Yes => self.pnl_if_yes_wins,
            Side::No => self.pnl_if_no_wins,
        }
    }

    /// Larger of the two deficits
    pub fn max_deficit(&self) -> Decimal {
        self.yes_deficit.max(self.no_deficit)
    }
}

/// Analyse a position's payoff under both outcomes
pub fn analyze(position: &Position) -> LockAnalysis {
    let total_cost = position.total_cost();
    let pnl_if_yes_wins = position.yes_shares - total_cost;
    let pnl_if_no_wins = position.no_shares - total_cost;

    let matched = position.yes_shares.min(position.no_shares);
    let pair_cost = (matched > Decimal::ZERO).then(|| total_cost / matched);

    let yes_deficit = (-pnl_if_yes_wins).max(Decimal::ZERO);
    let no_deficit = (-pnl_if_no_wins).max(Decimal::ZERO);
    let recovery_side = if pnl_if_yes_wins < pnl_if_no_wins {
        Side::Yes
    } else {
        Side::No
    };

    let is_dual_lock = pnl_if_yes_wins > Decimal::ZERO && pnl_if_no_wins > Decimal::ZERO;

    LockAnalysis {
        pnl_if_yes_wins,
        pnl_if_no_wins,
        pair_cost,
        is_dual_lock,
        needs_recovery: !is_dual_lock && (yes_deficit > Decimal::ZERO || no_deficit > Decimal::ZERO),
        recovery_side,
        yes_deficit,
        no_deficit,
    }
}

/// Shares to buy at `price` so the side's payoff covers `deficit`
///
/// `ceil(deficit / (1 - price) + buffer)`. A price at or above 1.00 can never
/// recover a deficit and is an error.
pub fn recovery_shares(deficit: Decimal, price: Decimal, buffer: Decimal) -> Result<Decimal, LockError> {
    if price >= Decimal::ONE {
        return Err(LockError::PriceAtOrAboveRedemption(price));
    }
    if price < Decimal::ZERO {
        return Err(LockError::InvalidPrice(price));
    }
    if deficit <= Decimal::ZERO {
        return Ok(Decimal::ZERO);
    }
    Ok((deficit / (Decimal::ONE - price) + buffer).ceil())
}

/// Simultaneous buys on both sides that target a profit on each outcome
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggressiveSolution {
    pub winner: Side,
    pub winner_shares: Decimal,
    pub loser_shares: Decimal,
    /// Cost of both buys at the quoted prices
    pub added_cost: Decimal,
}

/// Closed-form winner/loser share deltas reaching `target_profit`
///
/// Solves `W + dW - C' = T` and `L + dL - C' = T` with
/// `C' = C + dW * pw + dL * pl`. The system's determinant is the spread
/// `1 - pw - pl`, which must be positive. Deltas are rounded up to whole
/// shares and never negative.
pub fn solve_aggressive(
    position: &Position,
    winner: Side,
    winner_price: Decimal,
    loser_price: Decimal,
    target_profit: Decimal,
) -> Result<AggressiveSolution, LockError> {
    let spread = Decimal::ONE - winner_price - loser_price;
    if spread <= Decimal::ZERO {
        return Err(LockError::NonPositiveSpread(spread));
    }

    let cost = position.total_cost();
    let a = target_profit - position.shares(winner) + cost;
    let b = target_profit - position.shares(winner.opposite()) + cost;

    let d_winner = (a * (Decimal::ONE - loser_price) + loser_price * b) / spread;
    let d_loser = (b * (Decimal::ONE - winner_price) + winner_price * a) / spread;

    let winner_shares = d_winner.max(Decimal::ZERO).ceil();
    let loser_shares = d_loser.max(Decimal::ZERO).ceil();

    Ok(AggressiveSolution {
        winner,
        winner_shares,
        loser_shares,
        added_cost: winner_shares * winner_price + loser_shares * loser_price,
    })
}

/// Lock state after a check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LockStatus {
    pub locked: bool,
    pub locked_at: Option<DateTime<Utc>>,
    /// Position at the moment the lock was achieved
    pub snapshot: Option<Position>,
    pub analysis: LockAnalysis,
}

/// Sticky lock tracker for one asset and window
#[derive(Debug, Clone, Default)]
pub struct LockDetector {
    locked_at: Option<DateTime<Utc>>,
    snapshot: Option<Position>,
}

impl LockDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Analyse and latch the lock; once locked, stays locked until reset
    pub fn check_lock(&mut self, position: &Position, now: DateTime<Utc>) -> LockStatus {
        let analysis = analyze(position);
        if analysis.is_dual_lock && self.locked_at.is_none() {
            self.locked_at = Some(now);
            self.snapshot = Some(*position);
            tracing::info!(
                pnl_if_yes = %analysis.pnl_if_yes_wins,
                pnl_if_no = %analysis.pnl_if_no_wins,
                "Dual-profit lock achieved"
            );
        }
        LockStatus {
            locked: self.is_locked(),
            locked_at: self.locked_at,
            snapshot: self.snapshot,
            analysis,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked_at.is_some()
    }

    /// New window
    pub fn reset(&mut self) {
        self.locked_at = None;
        self.snapshot = None;
    }
}
