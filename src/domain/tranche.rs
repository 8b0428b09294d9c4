//! Tranche planning for liquidating a balance in bounded slices

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Fraction of the starting balance treated as dust
pub const DUST_RATIO: Decimal = dec!(0.01);

/// Decimal places kept for order quantities
pub const QTY_SCALE: u32 = 8;

#[derive(Debug, Error, PartialEq)]
pub enum TrancheError {
    #[error("Starting balance must be positive, got {0}")]
    EmptyBalance(Decimal),
    #[error("Tranche portion must be positive, got {0}")]
    InvalidPortion(Decimal),
}

/// Truncate a quantity to the order precision
pub fn truncate_qty(value: Decimal) -> Decimal {
    value.trunc_with_scale(QTY_SCALE)
}

/// Number of tranches needed to move `balance` in slices of `portion`.
///
/// The ratio is rounded to 3 dp before the ceiling, so this is not a literal
/// `ceil(balance / portion)`: 90.003 in slices of 30 gives 3 tranches, not 4.
/// What that leaves behind is under 0.0005 of a portion, which stays inside
/// the dust threshold whenever the portion is at most 20x the start balance.
pub fn tranche_count(balance: Decimal, portion: Decimal) -> u32 {
    if portion <= Decimal::ZERO || balance <= Decimal::ZERO {
        return 0;
    }
    (balance / portion).round_dp(3).ceil().to_u32().unwrap_or(u32::MAX)
}

/// Balance to liquidate, per-tranche cap, and what is still left
#[derive(Debug, Clone, PartialEq)]
pub struct TranchePlan {
    start: Decimal,
    portion: Decimal,
    remaining: Decimal,
}

impl TranchePlan {
    pub fn new(start: Decimal, portion: Decimal) -> Result<Self, TrancheError> {
        if start <= Decimal::ZERO {
            return Err(TrancheError::EmptyBalance(start));
        }
        if portion <= Decimal::ZERO {
            return Err(TrancheError::InvalidPortion(portion));
        }
        Ok(Self {
            start,
            portion,
            remaining: start,
        })
    }

    pub fn remaining(&self) -> Decimal {
        self.remaining
    }

    /// Record a freshly observed balance. The remaining amount never grows.
    pub fn observe(&mut self, balance: Decimal) {
        let balance = balance.max(Decimal::ZERO);
        if balance < self.remaining {
            self.remaining = balance;
        }
    }

    /// At or below the dust threshold of the starting balance
    pub fn is_done(&self) -> bool {
        self.remaining <= self.start * DUST_RATIO
    }

    /// Split the remaining balance into slices of at most `portion`
    pub fn tranches(&self) -> Vec<Decimal> {
        let count = tranche_count(self.remaining, self.portion);
        let mut left = self.remaining;
        let mut out = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if left <= Decimal::ZERO {
                break;
            }
            let qty = truncate_qty(left.min(self.portion));
            if qty <= Decimal::ZERO {
                break;
            }
            out.push(qty);
            left -= qty;
        }
        out
    }
}
