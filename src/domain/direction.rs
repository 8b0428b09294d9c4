//! Trade Direction
//!
//! Long and short positions run the same algorithms with mirrored comparisons.
//! Everything that used to be an `if short` branch goes through the sign
//! multiplier here instead.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction label attached to TD-style setup bars
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendLabel {
    Up,
    Down,
}

impl fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrendLabel::Up => write!(f, "up"),
            TrendLabel::Down => write!(f, "down"),
        }
    }
}

/// Side of an order sent to the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// Order book side used to price an exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookSide {
    Bids,
    Asks,
}

/// Position direction with a +1 / -1 sign multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short
    pub fn sign(self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn is_short(self) -> bool {
        self == Direction::Short
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::Long => Direction::Short,
            Direction::Short => Direction::Long,
        }
    }

    /// Direction implied by a TD label (up = long)
    pub fn from_label(label: TrendLabel) -> Self {
        match label {
            TrendLabel::Up => Direction::Long,
            TrendLabel::Down => Direction::Short,
        }
    }

    /// Label of bars moving in this direction's favour
    pub fn favourable_label(self) -> TrendLabel {
        match self {
            Direction::Long => TrendLabel::Up,
            Direction::Short => TrendLabel::Down,
        }
    }

    /// Label of bars moving against this direction
    pub fn adverse_label(self) -> TrendLabel {
        self.opposite().favourable_label()
    }

    /// `price` is at or past `level` on the losing side (long: `<=`, short: `>=`)
    pub fn reached_adverse(self, price: f64, level: f64) -> bool {
        self.sign() * (price - level) <= 0.0
    }

    /// `price` is strictly past `level` on the losing side (long: `<`, short: `>`)
    pub fn beyond_adverse(self, price: f64, level: f64) -> bool {
        self.sign() * (price - level) < 0.0
    }

    /// `price` is strictly past `level` on the winning side (long: `>`, short: `<`)
    pub fn beyond_favourable(self, price: f64, level: f64) -> bool {
        self.sign() * (price - level) > 0.0
    }

    /// Moves `level` against the position by `fraction` (long: down, short: up)
    pub fn adverse_offset(self, level: f64, fraction: f64) -> f64 {
        level * (1.0 - self.sign() * fraction)
    }

    /// Moves `level` in favour of the position by `fraction` (long: up, short: down)
    pub fn favourable_offset(self, level: f64, fraction: f64) -> f64 {
        level * (1.0 + self.sign() * fraction)
    }

    /// The more favourable of two prices (long: max, short: min)
    pub fn better(self, a: f64, b: f64) -> f64 {
        match self {
            Direction::Long => a.max(b),
            Direction::Short => a.min(b),
        }
    }

    /// Order side that closes a position in this direction
    pub fn exit_side(self) -> OrderSide {
        match self {
            Direction::Long => OrderSide::Sell,
            Direction::Short => OrderSide::Buy,
        }
    }

    /// Book side an exit order trades against
    pub fn exit_book(self) -> BookSide {
        match self {
            Direction::Long => BookSide::Bids,
            Direction::Short => BookSide::Asks,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Long => write!(f, "long"),
            Direction::Short => write!(f, "short"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sign_and_labels() {
        assert_eq!(Direction::Long.sign(), 1.0);
        assert_eq!(Direction::Short.sign(), -1.0);
        assert_eq!(Direction::Long.adverse_label(), TrendLabel::Down);
        assert_eq!(Direction::Short.adverse_label(), TrendLabel::Up);
        assert_eq!(Direction::from_label(TrendLabel::Down), Direction::Short);
    }

    #[test]
    fn test_adverse_comparisons_are_mirrored() {
        assert!(Direction::Long.reached_adverse(100.0, 100.0));
        assert!(Direction::Long.reached_adverse(99.0, 100.0));
        assert!(!Direction::Long.reached_adverse(101.0, 100.0));

        assert!(Direction::Short.reached_adverse(100.0, 100.0));
        assert!(Direction::Short.reached_adverse(101.0, 100.0));
        assert!(!Direction::Short.reached_adverse(99.0, 100.0));

        assert!(!Direction::Long.beyond_adverse(100.0, 100.0));
        assert!(Direction::Short.beyond_adverse(100.5, 100.0));
        assert!(Direction::Short.beyond_favourable(99.5, 100.0));
    }

    #[test]
    fn test_offsets() {
        assert_relative_eq!(Direction::Long.adverse_offset(100.0, 0.02), 98.0, epsilon = 1e-9);
        assert_relative_eq!(Direction::Short.adverse_offset(100.0, 0.02), 102.0, epsilon = 1e-9);
        assert_relative_eq!(Direction::Long.favourable_offset(100.0, 0.01), 101.0, epsilon = 1e-9);
        assert_relative_eq!(Direction::Short.favourable_offset(100.0, 0.01), 99.0, epsilon = 1e-9);
    }

    #[test]
    fn test_exit_side() {
        assert_eq!(Direction::Long.exit_side(), OrderSide::Sell);
        assert_eq!(Direction::Short.exit_side(), OrderSide::Buy);
        assert_eq!(Direction::Long.exit_book(), BookSide::Bids);
        assert_eq!(Direction::Short.exit_book(), BookSide::Asks);
    }

    #[test]
    fn test_better() {
        assert_eq!(Direction::Long.better(1.0, 2.0), 2.0);
        assert_eq!(Direction::Short.better(1.0, 2.0), 1.0);
    }
}
