//! Exit Rules
//!
//! Candle-driven exit conditions evaluated by the exit controller after the
//! stop checks: exhaustion setups, RSI extremes and the take-profit ratchet.

use serde::{Deserialize, Serialize};

use crate::domain::{BarSeries, Direction, SETUP_COMPLETE};
use crate::strategy::stops::adverse_extreme;

/// Long exits when the 4h RSI is at least this high
pub const RSI_LONG_4H: f64 = 83.5;
pub const RSI_LONG_1H: f64 = 81.5;
/// Short exits when the 4h RSI is at most this low
pub const RSI_SHORT_4H: f64 = 26.5;
pub const RSI_SHORT_1H: f64 = 30.0;

/// RSI on the two timeframes the exit rules look at
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MomentumReading {
    pub four_hour: f64,
    pub one_hour: f64,
}

impl MomentumReading {
    pub fn new(four_hour: f64, one_hour: f64) -> Self {
        Self { four_hour, one_hour }
    }
}

/// Both timeframes are overextended in the position's favour
pub fn rsi_extreme(direction: Direction, reading: &MomentumReading) -> bool {
    match direction {
        Direction::Long => reading.four_hour >= RSI_LONG_4H && reading.one_hour >= RSI_LONG_1H,
        Direction::Short => reading.four_hour <= RSI_SHORT_4H && reading.one_hour <= RSI_SHORT_1H,
    }
}

/// The last completed analysis bar finished a full setup
pub fn exhaustion_complete(bars: &BarSeries) -> bool {
    bars.prior().td_setup == SETUP_COMPLETE
}

/// Take-profit level that follows short-interval bars once first reached.
///
/// Starts at `entry * (1 ± threshold)`. When price trades beyond the level,
/// the level moves to the prior short-interval bar's adverse extreme. After
/// the first move it only tightens.
#[derive(Debug, Clone, PartialEq)]
pub struct TakeProfitRatchet {
    direction: Direction,
    level: f64,
    noise: f64,
    reached: bool,
}

impl TakeProfitRatchet {
    pub fn new(direction: Direction, entry_price: f64, threshold: f64, noise: f64) -> Self {
        Self {
            direction,
            level: direction.favourable_offset(entry_price, threshold),
            noise,
            reached: false,
        }
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn reached(&self) -> bool {
        self.reached
    }

    /// Move the level if price is beyond it. Returns whether the level changed.
    pub fn update(&mut self, price: f64, bars: &BarSeries) -> bool {
        if !self.direction.beyond_favourable(price, self.level) {
            return false;
        }
        let candidate = adverse_extreme(bars.prior(), self.direction);
        let next = if self.reached {
            self.direction.better(self.level, candidate)
        } else {
            candidate
        };
        if (next - self.level).abs() <= f64::EPSILON {
            return false;
        }
        self.level = next;
        self.reached = true;
        true
    }

    /// Price has fallen through the ratcheted level by more than the noise band
    pub fn should_exit(&self, price: f64) -> bool {
        self.reached
            && self
                .direction
                .beyond_adverse(price, self.direction.adverse_offset(self.level, self.noise))
    }
}
