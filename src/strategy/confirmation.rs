//! Confirmation Filters
//!
//! A stop touched by a single wick should not liquidate the position. Two
//! filters decide whether a breach is real:
//!
//! - Rolling extrema (price action): sub-interval extremes on the adverse side
//!   must form a monotonic run across a full window without recovering
//!   through the threshold.
//! - Indicator bars (candles): the closes of the last two completed
//!   short-interval bars are both beyond the threshold.
//!
//! Neither filter places orders.

use crate::domain::{BarSeries, Direction, RollingWindow};
use crate::ports::ExtremeSample;

/// Outcome of feeding one sample into the rolling filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterVerdict {
    /// Window not full or not monotonic yet
    Pending,
    /// Breach confirmed
    Confirmed,
    /// Price came back through the threshold; the breach was a wick
    Recovered,
}

/// Rolling-extrema filter for a single breach
#[derive(Debug, Clone)]
pub struct RollingExtremaFilter {
    direction: Direction,
    threshold: f64,
    window: RollingWindow<f64>,
}

impl RollingExtremaFilter {
    pub fn new(direction: Direction, threshold: f64, window_len: usize) -> Self {
        Self {
            direction,
            threshold,
            window: RollingWindow::new(window_len),
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn samples(&self) -> usize {
        self.window.len()
    }

    /// Feed one sub-interval sample
    pub fn observe(&mut self, sample: &ExtremeSample) -> FilterVerdict {
        // Long watches highs: a high back above the stop means the dip recovered
        let extreme = sample.adverse_extreme(self.direction);
        if self.direction.beyond_favourable(extreme, self.threshold) {
            return FilterVerdict::Recovered;
        }

        self.window.push(extreme);
        if !self.window.is_full() {
            return FilterVerdict::Pending;
        }

        let monotonic = match self.direction {
            Direction::Long => self.window.non_increasing(),
            Direction::Short => self.window.non_decreasing(),
        };
        if monotonic {
            FilterVerdict::Confirmed
        } else {
            FilterVerdict::Pending
        }
    }
}

/// Closes of the last two completed bars are both strictly beyond `threshold`
/// on the adverse side. The most recent bar is still forming and is skipped.
pub fn indicator_bars_confirm(bars: &BarSeries, direction: Direction, threshold: f64) -> bool {
    match (bars.from_end(2), bars.from_end(3)) {
        (Some(last_closed), Some(before)) => {
            direction.beyond_adverse(last_closed.close, threshold)
                && direction.beyond_adverse(before.close, threshold)
        }
        _ => false,
    }
}
