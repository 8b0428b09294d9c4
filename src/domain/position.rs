use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::accounting::ExitLedger;
use super::direction::Direction;

/// Ratio above which the target is treated as a typo against the live price
pub const FAT_FINGER_HIGH: f64 = 8.0;
/// Ratio below which the target is treated as a typo against the live price
pub const FAT_FINGER_LOW: f64 = 0.15;

#[derive(Debug, Error, PartialEq)]
pub enum PositionError {
    #[error("Invalid entry price: {0}")]
    InvalidEntryPrice(f64),
    #[error("Invalid target price: {0}")]
    InvalidTargetPrice(f64),
    #[error("Invalid stop price: {0}")]
    InvalidStopPrice(f64),
    #[error("Target {target} is {ratio:.2}x the current price {price} - missing or extra zero?")]
    FatFinger { target: f64, price: f64, ratio: f64 },
}

/// Round to 5 decimal places, the precision used for tp/sl ratios
pub fn round5(value: f64) -> f64 {
    (value * 100_000.0).round() / 100_000.0
}

/// Entry, take-profit and stop prices as supplied for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeParams {
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_price: f64,
}

impl TradeParams {
    pub fn new(entry_price: f64, target_price: f64, stop_price: f64) -> Result<Self, PositionError> {
        if !(entry_price > 0.0) {
            return Err(PositionError::InvalidEntryPrice(entry_price));
        }
        if !(target_price > 0.0) {
            return Err(PositionError::InvalidTargetPrice(target_price));
        }
        if !(stop_price > 0.0) {
            return Err(PositionError::InvalidStopPrice(stop_price));
        }
        Ok(Self {
            entry_price,
            target_price,
            stop_price,
        })
    }

    /// Take-profit as a multiple of entry
    pub fn tp_ratio(&self) -> f64 {
        round5(self.target_price / self.entry_price)
    }

    /// Stop-loss as a multiple of entry
    pub fn sl_ratio(&self) -> f64 {
        round5(self.stop_price / self.entry_price)
    }

    pub fn tp_pct(&self) -> f64 {
        (self.tp_ratio() - 1.0) * 100.0
    }

    pub fn sl_pct(&self) -> f64 {
        (1.0 - self.sl_ratio()) * 100.0
    }

    /// Direction implied by the levels alone (target below stop means short)
    pub fn implied_direction(&self) -> Direction {
        if self.target_price < self.stop_price {
            Direction::Short
        } else {
            Direction::Long
        }
    }

    /// Reject targets that are wildly off the live price
    pub fn check_fat_finger(&self, current_price: f64) -> Result<(), PositionError> {
        let ratio = self.target_price / current_price;
        if ratio >= FAT_FINGER_HIGH || ratio <= FAT_FINGER_LOW {
            return Err(PositionError::FatFinger {
                target: self.target_price,
                price: current_price,
                ratio,
            });
        }
        Ok(())
    }
}

/// Stop values recomputed on one cadence tick. `None` means "no update".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StopSnapshot {
    pub stop_price: Option<f64>,
    pub stop_ratio: Option<f64>,
    pub stop_pct: Option<f64>,
    pub extreme_price: Option<f64>,
    pub flip_confirmed: Option<bool>,
}

impl StopSnapshot {
    pub fn is_empty(&self) -> bool {
        self.stop_price.is_none() && self.extreme_price.is_none() && self.flip_confirmed.is_none()
    }
}

/// The single mutable state of the position being exited
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionState {
    pub market: String,
    pub direction: Direction,
    pub params: TradeParams,
    pub stop_price: f64,
    pub stop_ratio: f64,
    pub stop_pct: f64,
    pub extreme_stop: Option<f64>,
    pub flip_confirmed: bool,
    pub ledger: ExitLedger,
}

impl PositionState {
    pub fn new(market: impl Into<String>, direction: Direction, params: TradeParams) -> Self {
        let stop_ratio = params.sl_ratio();
        Self {
            market: market.into(),
            direction,
            stop_price: params.stop_price,
            stop_ratio,
            stop_pct: params.sl_pct(),
            extreme_stop: None,
            flip_confirmed: false,
            params,
            ledger: ExitLedger::default(),
        }
    }

    pub fn entry_price(&self) -> f64 {
        self.params.entry_price
    }

    pub fn target_price(&self) -> f64 {
        self.params.target_price
    }

    /// Merge a snapshot, keeping previous values for absent fields.
    ///
    /// The flip flag only ever goes from `false` to `true`. Returns whether
    /// the stop level changed.
    pub fn apply_snapshot(&mut self, snapshot: &StopSnapshot) -> bool {
        let mut stop_changed = false;
        if let Some(stop) = snapshot.stop_price {
            stop_changed = (stop - self.stop_price).abs() > f64::EPSILON;
            self.stop_price = stop;
        }
        if let Some(ratio) = snapshot.stop_ratio {
            self.stop_ratio = ratio;
        }
        if let Some(pct) = snapshot.stop_pct {
            self.stop_pct = pct;
        }
        if let Some(extreme) = snapshot.extreme_price {
            self.extreme_stop = Some(extreme);
        }
        if snapshot.flip_confirmed == Some(true) {
            self.flip_confirmed = true;
        }
        stop_changed
    }

    /// Current price as a percentage of entry
    pub fn percent_of_entry(&self, price: f64) -> f64 {
        ((price / self.entry_price()) * 100.0 * 100.0).round() / 100.0
    }

    /// Price has passed the original target in the position's favour
    pub fn target_reached(&self, price: f64) -> bool {
        self.direction.beyond_favourable(price, self.target_price())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn params() -> TradeParams {
        TradeParams::new(0.0017, 0.0021, 0.0015).unwrap()
    }

    #[test]
    fn test_trade_params_ratios() {
        let p = params();
        assert_relative_eq!(p.tp_ratio(), 1.23529, epsilon = 1e-9);
        assert_relative_eq!(p.sl_ratio(), 0.88235, epsilon = 1e-9);
        assert_relative_eq!(p.tp_pct(), 23.529, epsilon = 1e-6);
        assert_relative_eq!(p.sl_pct(), 11.765, epsilon = 1e-6);
    }

    #[test]
    fn test_invalid_params() {
        assert_eq!(
            TradeParams::new(0.0, 1.0, 1.0).unwrap_err(),
            PositionError::InvalidEntryPrice(0.0)
        );
        assert_eq!(
            TradeParams::new(1.0, -1.0, 1.0).unwrap_err(),
            PositionError::InvalidTargetPrice(-1.0)
        );
        assert!(TradeParams::new(1.0, 1.0, f64::NAN).is_err());
    }

    #[test]
    fn test_implied_direction() {
        assert_eq!(params().implied_direction(), Direction::Long);
        let short = TradeParams::new(100.0, 80.0, 110.0).unwrap();
        assert_eq!(short.implied_direction(), Direction::Short);
    }

    #[test]
    fn test_fat_finger() {
        let p = params();
        assert!(p.check_fat_finger(0.0017).is_ok());
        assert!(matches!(
            p.check_fat_finger(0.00017),
            Err(PositionError::FatFinger { .. })
        ));
        assert!(matches!(
            p.check_fat_finger(0.017),
            Err(PositionError::FatFinger { .. })
        ));
    }

    #[test]
    fn test_apply_snapshot_keeps_missing_fields() {
        let mut pos = PositionState::new("BTC-LTC", Direction::Long, params());
        let changed = pos.apply_snapshot(&StopSnapshot {
            stop_price: Some(0.0016),
            stop_ratio: Some(0.94118),
            stop_pct: Some(5.882),
            extreme_price: Some(0.00155),
            flip_confirmed: None,
        });
        assert!(changed);
        assert_eq!(pos.stop_price, 0.0016);
        assert_eq!(pos.extreme_stop, Some(0.00155));
        assert!(!pos.flip_confirmed);

        let changed = pos.apply_snapshot(&StopSnapshot::default());
        assert!(!changed);
        assert_eq!(pos.stop_price, 0.0016);
        assert_eq!(pos.extreme_stop, Some(0.00155));
    }

    #[test]
    fn test_flip_is_sticky() {
        let mut pos = PositionState::new("BTC-LTC", Direction::Long, params());
        pos.apply_snapshot(&StopSnapshot {
            flip_confirmed: Some(true),
            ..Default::default()
        });
        assert!(pos.flip_confirmed);

        pos.apply_snapshot(&StopSnapshot {
            flip_confirmed: Some(false),
            ..Default::default()
        });
        assert!(pos.flip_confirmed);
    }

    #[test]
    fn test_target_reached() {
        let pos = PositionState::new("BTC-LTC", Direction::Long, params());
        assert!(pos.target_reached(0.0022));
        assert!(!pos.target_reached(0.0021));

        let short = PositionState::new(
            "USD-BTC",
            Direction::Short,
            TradeParams::new(100.0, 80.0, 110.0).unwrap(),
        );
        assert!(short.target_reached(79.0));
        assert!(!short.target_reached(81.0));
    }

    #[test]
    fn test_percent_of_entry() {
        let pos = PositionState::new("BTC-LTC", Direction::Long, params());
        assert_relative_eq!(pos.percent_of_entry(0.0015), 88.24, epsilon = 1e-9);
    }
}
