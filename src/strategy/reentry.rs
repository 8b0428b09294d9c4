//! Re-entry Rules
//!
//! Pattern checks used by the buyback detector. Price-action mode keeps
//! separate low, high and crossing windows; candle mode looks for a fresh
//! two-bar trend clearing the prior bar.

use std::time::Duration;

use crate::domain::{BarSeries, Direction, RollingWindow};
use crate::ports::ExtremeSample;
use crate::strategy::stops::favourable_extreme;

/// Rolling windows of recent sub-interval samples
#[derive(Debug, Clone)]
pub struct ReentryWindows {
    reference: f64,
    min_confirming: usize,
    lows: RollingWindow<f64>,
    highs: RollingWindow<f64>,
    crossed: RollingWindow<bool>,
}

impl ReentryWindows {
    pub fn new(reference: f64, window: usize, min_confirming: usize) -> Self {
        Self {
            reference,
            min_confirming,
            lows: RollingWindow::new(window),
            highs: RollingWindow::new(window),
            crossed: RollingWindow::new(window),
        }
    }

    pub fn reference(&self) -> f64 {
        self.reference
    }

    pub fn push(&mut self, sample: &ExtremeSample) {
        self.lows.push(sample.low);
        self.highs.push(sample.high);
        self.crossed.push(sample.crossed);
    }

    pub fn is_primed(&self) -> bool {
        self.lows.is_full()
    }

    fn any_crossed(&self) -> bool {
        self.crossed.iter().any(|c| *c)
    }

    /// Lows holding up, a crossing, and enough highs at or above the reference
    pub fn long_signal(&self) -> bool {
        self.is_primed()
            && self.lows.non_decreasing()
            && self.any_crossed()
            && self.highs.count_where(|h| h >= self.reference) >= self.min_confirming
    }

    /// Highs rolling over, a crossing, and enough lows at or below the reference
    pub fn short_signal(&self) -> bool {
        self.is_primed()
            && self.highs.non_increasing()
            && self.any_crossed()
            && self.lows.count_where(|l| l <= self.reference) >= self.min_confirming
    }

    /// Long wins when both qualify. Shorts only where the venue allows them.
    pub fn signal(&self, allows_short: bool) -> Option<Direction> {
        if self.long_signal() {
            Some(Direction::Long)
        } else if allows_short && self.short_signal() {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

/// Inputs for one candle-mode re-entry check
#[derive(Debug, Clone)]
pub struct CandleReentryCheck<'a> {
    pub analysis: &'a BarSeries,
    /// Longer series checked when re-entering in the exited direction
    pub extended: Option<&'a BarSeries>,
    /// Longer series checked when re-entering against the exited direction
    pub opposite_extended: Option<&'a BarSeries>,
    pub exited: Direction,
    pub price: f64,
    pub contingency: f64,
    pub elapsed: Duration,
    pub min_elapsed: Duration,
    pub ride_pullbacks: bool,
    pub max_setup: u8,
}

impl CandleReentryCheck<'_> {
    pub fn qualifies(&self, candidate: Direction) -> bool {
        let label = candidate.favourable_label();
        if !self.analysis.last_two_labelled(label) || self.elapsed <= self.min_elapsed {
            return false;
        }
        let breakout = candidate.favourable_offset(
            favourable_extreme(self.analysis.prior(), candidate),
            self.contingency,
        );
        if !candidate.beyond_favourable(self.price, breakout) || self.analysis.last().td_setup >= self.max_setup {
            return false;
        }
        if self.ride_pullbacks {
            return true;
        }
        let check = if candidate == self.exited {
            self.extended
        } else {
            self.opposite_extended
        };
        check.map_or(true, |series| series.last().td_direction == label)
    }

    pub fn signal(&self, allows_short: bool) -> Option<Direction> {
        if self.qualifies(Direction::Long) {
            Some(Direction::Long)
        } else if allows_short && self.qualifies(Direction::Short) {
            Some(Direction::Short)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Bar, TrendLabel};

    fn fill(windows: &mut ReentryWindows, samples: &[(f64, f64)]) {
        for (low, high) in samples {
            windows.push(&ExtremeSample::new(*low, *high, windows.reference()));
        }
    }

    #[test]
    fn test_not_primed_until_full() {
        let mut windows = ReentryWindows::new(100.0, 5, 3);
        fill(&mut windows, &[(99.0, 101.0), (99.5, 101.0), (100.0, 102.0), (100.5, 102.0)]);
        assert!(!windows.is_primed());
        assert_eq!(windows.signal(true), None);
    }

    #[test]
    fn test_long_three_of_five() {
        let mut windows = ReentryWindows::new(100.0, 5, 3);
        fill(
            &mut windows,
            &[(98.0, 99.0), (98.5, 99.5), (99.0, 100.0), (99.5, 100.5), (100.0, 101.0)],
        );
        assert!(windows.long_signal());
        assert_eq!(windows.signal(false), Some(Direction::Long));
    }

    #[test]
    fn test_long_needs_three_highs() {
        let mut windows = ReentryWindows::new(100.0, 5, 3);
        fill(
            &mut windows,
            &[(98.0, 99.0), (98.5, 99.5), (99.0, 99.8), (99.5, 100.5), (100.0, 101.0)],
        );
        assert!(!windows.long_signal());
    }

    #[test]
    fn test_long_needs_rising_lows() {
        let mut windows = ReentryWindows::new(100.0, 5, 3);
        fill(
            &mut windows,
            &[(98.0, 99.0), (98.5, 100.0), (98.2, 100.0), (99.5, 100.5), (100.0, 101.0)],
        );
        assert!(!windows.long_signal());
    }

    #[test]
    fn test_long_needs_a_crossing() {
        let mut windows = ReentryWindows::new(100.0, 5, 3);
        fill(
            &mut windows,
            &[(100.1, 101.0), (100.2, 101.0), (100.3, 101.0), (100.4, 101.0), (100.5, 101.0)],
        );
        assert!(!windows.long_signal());
    }

    #[test]
    fn test_short_only_when_allowed() {
        let mut windows = ReentryWindows::new(100.0, 5, 3);
        fill(
            &mut windows,
            &[(101.0, 102.0), (100.5, 101.5), (100.0, 101.0), (99.5, 100.5), (99.0, 100.0)],
        );
        assert!(windows.short_signal());
        assert_eq!(windows.signal(false), None);
        assert_eq!(windows.signal(true), Some(Direction::Short));
    }

    fn analysis(label: TrendLabel, last_setup: u8) -> BarSeries {
        BarSeries::new(vec![
            Bar::new(100.0, 102.0, 98.0, 101.0, 1, label),
            Bar::new(101.0, 103.0, 99.0, 102.0, last_setup, label),
        ])
        .unwrap()
    }

    fn check<'a>(bars: &'a BarSeries, price: f64) -> CandleReentryCheck<'a> {
        CandleReentryCheck {
            analysis: bars,
            extended: None,
            opposite_extended: None,
            exited: Direction::Long,
            price,
            contingency: 0.02,
            elapsed: Duration::from_secs(3600),
            min_elapsed: Duration::from_secs(1800),
            ride_pullbacks: false,
            max_setup: 7,
        }
    }

    #[test]
    fn test_candle_long_breakout() {
        let bars = analysis(TrendLabel::Up, 2);
        // Prior high 102 * 1.02 = 104.04
        assert!(check(&bars, 104.1).qualifies(Direction::Long));
        assert!(!check(&bars, 104.0).qualifies(Direction::Long));
    }

    #[test]
    fn test_candle_requires_elapsed_and_fresh_setup() {
        let bars = analysis(TrendLabel::Up, 2);
        let mut early = check(&bars, 105.0);
        early.elapsed = Duration::from_secs(600);
        assert!(!early.qualifies(Direction::Long));

        let late = analysis(TrendLabel::Up, 7);
        assert!(!check(&late, 105.0).qualifies(Direction::Long));
    }

    #[test]
    fn test_candle_cross_check() {
        let bars = analysis(TrendLabel::Up, 2);
        let extended_down = analysis(TrendLabel::Down, 3);

        let mut c = check(&bars, 105.0);
        c.extended = Some(&extended_down);
        assert!(!c.qualifies(Direction::Long));

        c.ride_pullbacks = true;
        assert!(c.qualifies(Direction::Long));
    }

    #[test]
    fn test_candle_short_uses_opposite_series() {
        let bars = analysis(TrendLabel::Down, 2);
        let opposite_down = analysis(TrendLabel::Down, 3);
        let extended_up = analysis(TrendLabel::Up, 3);

        // Prior low 98 * 0.98 = 96.04
        let mut c = check(&bars, 96.0);
        c.extended = Some(&extended_up);
        c.opposite_extended = Some(&opposite_down);
        assert_eq!(c.signal(true), Some(Direction::Short));
        assert_eq!(c.signal(false), None);
    }
}
