//! Candle bars with TD-style setup annotations

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::direction::TrendLabel;

/// Maximum count of a completed exhaustion setup
pub const SETUP_COMPLETE: u8 = 9;

#[derive(Debug, Error, PartialEq)]
pub enum BarSeriesError {
    #[error("Need at least {required} bars, got {available}")]
    TooShort { required: usize, available: usize },
}

/// One OHLC bar annotated with the exhaustion setup counter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Setup count (0 when no setup is running)
    pub td_setup: u8,
    pub td_direction: TrendLabel,
    /// Extreme price of the running setup, when the provider tracks one
    pub move_extreme: Option<f64>,
}

impl Bar {
    pub fn new(open: f64, high: f64, low: f64, close: f64, td_setup: u8, td_direction: TrendLabel) -> Self {
        Self {
            open,
            high,
            low,
            close,
            td_setup,
            td_direction,
            move_extreme: None,
        }
    }

    pub fn with_move_extreme(mut self, extreme: f64) -> Self {
        self.move_extreme = Some(extreme);
        self
    }

    /// Bar has a usable price body
    pub fn is_complete(&self) -> bool {
        self.open.is_finite() && self.high.is_finite() && self.low.is_finite() && self.close.is_finite()
    }
}

/// Ordered bars, oldest first. Always holds at least two bars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSeries {
    bars: Vec<Bar>,
}

impl BarSeries {
    pub const MIN_BARS: usize = 2;

    pub fn new(bars: Vec<Bar>) -> Result<Self, BarSeriesError> {
        if bars.len() < Self::MIN_BARS {
            return Err(BarSeriesError::TooShort {
                required: Self::MIN_BARS,
                available: bars.len(),
            });
        }
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    /// Most recent (possibly still forming) bar
    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// Bar before the most recent one
    pub fn prior(&self) -> &Bar {
        &self.bars[self.bars.len() - 2]
    }

    /// Bar `n` positions back from the end (`from_end(1)` is `last()`)
    pub fn from_end(&self, n: usize) -> Option<&Bar> {
        if n == 0 || n > self.bars.len() {
            return None;
        }
        self.bars.get(self.bars.len() - n)
    }

    /// Last two bars both carry `label`
    pub fn last_two_labelled(&self, label: TrendLabel) -> bool {
        self.last().td_direction == label && self.prior().td_direction == label
    }

    /// Enough trailing bars carry setup data and every bar has a price body.
    ///
    /// Used once at startup to decide whether the candle-driven strategy can
    /// run at all.
    pub fn is_analysable(&self, trailing: usize) -> bool {
        if self.bars.len() < trailing || self.bars.iter().any(|b| !b.is_complete()) {
            return false;
        }
        self.bars[self.bars.len() - trailing..]
            .iter()
            .all(|b| b.td_setup > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(setup: u8, dir: TrendLabel) -> Bar {
        Bar::new(1.0, 1.1, 0.9, 1.0, setup, dir)
    }

    #[test]
    fn test_series_requires_two_bars() {
        let result = BarSeries::new(vec![bar(1, TrendLabel::Up)]);
        assert_eq!(
            result.unwrap_err(),
            BarSeriesError::TooShort { required: 2, available: 1 }
        );
    }

    #[test]
    fn test_last_and_prior() {
        let series = BarSeries::new(vec![
            bar(1, TrendLabel::Up),
            bar(2, TrendLabel::Up),
            bar(1, TrendLabel::Down),
        ])
        .unwrap();
        assert_eq!(series.last().td_setup, 1);
        assert_eq!(series.prior().td_setup, 2);
        assert_eq!(series.from_end(3).unwrap().td_setup, 1);
        assert!(series.from_end(4).is_none());
        assert!(series.from_end(0).is_none());
    }

    #[test]
    fn test_last_two_labelled() {
        let series = BarSeries::new(vec![bar(1, TrendLabel::Down), bar(2, TrendLabel::Down)]).unwrap();
        assert!(series.last_two_labelled(TrendLabel::Down));
        assert!(!series.last_two_labelled(TrendLabel::Up));
    }

    #[test]
    fn test_is_analysable() {
        let good = BarSeries::new(vec![
            bar(1, TrendLabel::Up),
            bar(2, TrendLabel::Up),
            bar(3, TrendLabel::Up),
        ])
        .unwrap();
        assert!(good.is_analysable(3));

        let missing_setup = BarSeries::new(vec![
            bar(1, TrendLabel::Up),
            bar(0, TrendLabel::Up),
            bar(3, TrendLabel::Up),
        ])
        .unwrap();
        assert!(!missing_setup.is_analysable(3));

        let mut gap = bar(2, TrendLabel::Up);
        gap.open = f64::NAN;
        let missing_open = BarSeries::new(vec![bar(1, TrendLabel::Up), gap, bar(3, TrendLabel::Up)]).unwrap();
        assert!(!missing_open.is_analysable(3));
    }
}
