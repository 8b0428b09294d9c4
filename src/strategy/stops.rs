//! Stop Calculation
//!
//! Pure part of the stop engine: turns an analysis bar series into a
//! [`StopSnapshot`] and decides when the next refresh or status summary is due.

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use std::fmt;

use crate::domain::{round5, Bar, BarSeries, Direction, StopSnapshot, TrendLabel};
use crate::strategy::exit_rules::MomentumReading;

/// Price of `bar` on the side that hurts `direction` (low for long, high for short)
pub fn adverse_extreme(bar: &Bar, direction: Direction) -> f64 {
    match direction {
        Direction::Long => bar.low,
        Direction::Short => bar.high,
    }
}

/// Price of `bar` on the side that helps `direction` (high for long, low for short)
pub fn favourable_extreme(bar: &Bar, direction: Direction) -> f64 {
    match direction {
        Direction::Long => bar.high,
        Direction::Short => bar.low,
    }
}

/// Stop percentage below (long) or above (short) entry for a given ratio
pub fn stop_pct(direction: Direction, ratio: f64) -> f64 {
    direction.sign() * (1.0 - ratio) * 100.0
}

/// Recompute stop, extreme stop and flip from the latest analysis bars
pub fn compute_snapshot(
    bars: &BarSeries,
    direction: Direction,
    entry_price: f64,
    contingency: f64,
) -> StopSnapshot {
    let stop = direction.adverse_offset(adverse_extreme(bars.prior(), direction), contingency);
    let ratio = round5(stop / entry_price);
    let extreme = bars
        .last()
        .move_extreme
        .map(|e| direction.adverse_offset(e, contingency));

    StopSnapshot {
        stop_price: Some(stop),
        stop_ratio: Some(ratio),
        stop_pct: Some(stop_pct(direction, ratio)),
        extreme_price: extreme,
        flip_confirmed: Some(bars.last_two_labelled(direction.adverse_label())),
    }
}

/// Fires once per UTC hour
#[derive(Debug, Clone, Default)]
pub struct HourCadence {
    last_hour: Option<(i64, u32)>,
}

impl HourCadence {
    pub fn new() -> Self {
        Self::default()
    }

    /// True on the first call and whenever `now` is in a new hour
    pub fn due(&mut self, now: DateTime<Utc>) -> bool {
        let key = (now.timestamp() / 86_400, now.hour());
        if self.last_hour == Some(key) {
            return false;
        }
        self.last_hour = Some(key);
        true
    }
}

/// Fires every `every_hours` hours
#[derive(Debug, Clone)]
pub struct StatusClock {
    every: ChronoDuration,
    last: Option<DateTime<Utc>>,
}

impl StatusClock {
    pub fn new(every_hours: u32) -> Self {
        Self {
            every: ChronoDuration::hours(i64::from(every_hours.max(1))),
            last: None,
        }
    }

    pub fn due(&mut self, now: DateTime<Utc>, force: bool) -> bool {
        let due = force || self.last.map_or(true, |last| now - last >= self.every);
        if due {
            self.last = Some(now);
        }
        due
    }
}

/// Periodic human-readable stop report
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSummary {
    pub market: String,
    pub direction: Direction,
    pub stop_price: f64,
    pub extreme_stop: Option<f64>,
    pub flip_confirmed: bool,
    /// Setup count and label of the prior and last bar
    pub setups: [(u8, TrendLabel); 2],
    pub momentum: Option<MomentumReading>,
}

impl StatusSummary {
    pub fn from_bars(
        market: &str,
        direction: Direction,
        stop_price: f64,
        extreme_stop: Option<f64>,
        flip_confirmed: bool,
        bars: &BarSeries,
        momentum: Option<MomentumReading>,
    ) -> Self {
        let prior = bars.prior();
        let last = bars.last();
        Self {
            market: market.to_string(),
            direction,
            stop_price,
            extreme_stop,
            flip_confirmed,
            setups: [(prior.td_setup, prior.td_direction), (last.td_setup, last.td_direction)],
            momentum,
        }
    }
}

impl fmt::Display for StatusSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): stop {:.8}", self.market, self.direction, self.stop_price)?;
        match self.extreme_stop {
            Some(extreme) => write!(f, ", extreme stop {:.8}", extreme)?,
            None => write!(f, ", no extreme stop")?,
        }
        write!(
            f,
            ", flip {}, TD {}{} / {}{}",
            if self.flip_confirmed { "confirmed" } else { "pending" },
            self.setups[0].0,
            self.setups[0].1,
            self.setups[1].0,
            self.setups[1].1,
        )?;
        if let Some(m) = self.momentum {
            write!(f, ", RSI 4h {:.1} 1h {:.1}", m.four_hour, m.one_hour)?;
        }
        Ok(())
    }
}
