//! Engine Parameters
//!
//! Runtime settings for the stop engine, exit controller, sale executor and
//! buyback detector. Built from the TOML config; defaults match a 4h setup.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::AssetClass;
use crate::ports::DEFAULT_MIN_TRADE_CODES;

/// Main engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Monitoring loop sleep
    pub poll_interval: Duration,
    /// Wait between price checks while the market is on maintenance
    pub maintenance_retry: Duration,
    /// Wait for cancellations to settle after an interrupt
    pub cancel_settle: Duration,
    /// Commission charged per fill, as a fraction
    pub commission_rate: f64,
    /// Margin leverage applied at startup
    pub leverage: f64,
    pub stops: StopSettings,
    pub exit: ExitSettings,
    pub sale: SaleSettings,
    pub buyback: BuybackSettings,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(30),
            maintenance_retry: Duration::from_secs(300),
            cancel_settle: Duration::from_secs(10),
            commission_rate: 0.0025,
            leverage: 5.0,
            stops: StopSettings::default(),
            exit: ExitSettings::default(),
            sale: SaleSettings::default(),
            buyback: BuybackSettings::default(),
        }
    }
}

impl EngineSettings {
    /// Divide every timer by `speedrun` (1 = real time)
    pub fn with_speedrun(mut self, speedrun: f64) -> Self {
        if speedrun <= 0.0 || speedrun == 1.0 {
            return self;
        }
        let scale = |d: Duration| d.div_f64(speedrun);
        self.poll_interval = scale(self.poll_interval);
        self.maintenance_retry = scale(self.maintenance_retry);
        self.cancel_settle = scale(self.cancel_settle);
        self.exit.take_profit_refresh = scale(self.exit.take_profit_refresh);
        self.sale.settle_interval = scale(self.sale.settle_interval);
        self.buyback.poll_interval = scale(self.buyback.poll_interval);
        self.buyback.min_elapsed = scale(self.buyback.min_elapsed);
        self.buyback.min_elapsed_ride = scale(self.buyback.min_elapsed_ride);
        self
    }

    /// Zero every timer. Used by tests and dry runs.
    pub fn without_delays(mut self) -> Self {
        self.poll_interval = Duration::ZERO;
        self.maintenance_retry = Duration::ZERO;
        self.cancel_settle = Duration::ZERO;
        self.exit.take_profit_refresh = Duration::ZERO;
        self.sale.settle_interval = Duration::ZERO;
        self.buyback.poll_interval = Duration::ZERO;
        self.buyback.min_elapsed = Duration::ZERO;
        self.buyback.min_elapsed_ride = Duration::ZERO;
        self
    }

    pub fn contingency(&self, class: AssetClass) -> f64 {
        self.stops.contingency(class)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<(), ParamsError> {
        self.stops.validate()?;
        self.sale.validate()?;
        if self.exit.take_profit_threshold <= 0.0 || self.exit.take_profit_threshold >= 1.0 {
            return Err(ParamsError::InvalidTakeProfit(self.exit.take_profit_threshold));
        }
        if self.buyback.window == 0 || self.buyback.min_confirming > self.buyback.window {
            return Err(ParamsError::InvalidBuybackWindow {
                window: self.buyback.window,
                min_confirming: self.buyback.min_confirming,
            });
        }
        if self.leverage <= 0.0 {
            return Err(ParamsError::InvalidLeverage(self.leverage));
        }
        Ok(())
    }
}

/// Stop engine and confirmation filter settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopSettings {
    pub contingency_btc: f64,
    pub contingency_alt: f64,
    /// Analysis interval for stops and flips
    pub td_period: String,
    /// Longer interval checked before a same-direction re-entry
    pub td_period_extended: String,
    /// Longer interval checked before an opposite-direction re-entry
    pub td_period_ext_opposite: String,
    /// Bars used by the indicator-bar filter
    pub confirm_interval: String,
    /// Hours between status summaries
    pub status_every_hours: u32,
    /// Length of the rolling-extrema window
    pub filter_window: usize,
}

impl Default for StopSettings {
    fn default() -> Self {
        Self {
            contingency_btc: 0.02,
            contingency_alt: 0.04,
            td_period: "4h".to_string(),
            td_period_extended: "9h".to_string(),
            td_period_ext_opposite: "12h".to_string(),
            confirm_interval: "10min".to_string(),
            status_every_hours: 4,
            filter_window: 3,
        }
    }
}

impl StopSettings {
    pub fn contingency(&self, class: AssetClass) -> f64 {
        match class {
            AssetClass::Btc => self.contingency_btc,
            AssetClass::AltMid | AssetClass::AltVolatile => self.contingency_alt,
        }
    }

    pub fn validate(&self) -> Result<(), ParamsError> {
        for c in [self.contingency_btc, self.contingency_alt] {
            if c <= 0.0 || c >= 0.5 {
                return Err(ParamsError::InvalidContingency(c));
            }
        }
        if self.filter_window == 0 {
            return Err(ParamsError::InvalidFilterWindow(self.filter_window));
        }
        if self.status_every_hours == 0 {
            return Err(ParamsError::InvalidStatusInterval);
        }
        Ok(())
    }
}

/// Exit controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExitSettings {
    /// Hand over to the mooning controller once the target is passed
    pub ride_after_target: bool,
    /// Enable the take-profit ratchet
    pub take_profit: bool,
    /// Initial take-profit distance from entry
    pub take_profit_threshold: f64,
    /// Slack below the ratcheted level before exiting
    pub take_profit_noise: f64,
    /// Bars the take-profit level ratchets to
    pub take_profit_interval: String,
    pub take_profit_refresh: Duration,
}

impl Default for ExitSettings {
    fn default() -> Self {
        Self {
            ride_after_target: true,
            take_profit: true,
            take_profit_threshold: 0.05,
            take_profit_noise: 0.0025,
            take_profit_interval: "15min".to_string(),
            take_profit_refresh: Duration::from_secs(15 * 60),
        }
    }
}

/// Sale executor settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleSettings {
    /// Sleep between outer iterations to let fills settle
    pub settle_interval: Duration,
    /// Cancel orders with at least this share unfilled
    pub unfilled_cancel_ratio: Decimal,
    pub concession_increment: f64,
    pub concession_max: f64,
    /// Notify after this many price decreases (and every multiple)
    pub stuck_threshold: u32,
    /// Rejection codes meaning "below minimum trade size"
    pub min_trade_codes: Vec<String>,
}

impl Default for SaleSettings {
    fn default() -> Self {
        Self {
            settle_interval: Duration::from_secs(30),
            unfilled_cancel_ratio: dec!(0.05),
            concession_increment: 0.001,
            concession_max: 0.0255,
            stuck_threshold: 30,
            min_trade_codes: DEFAULT_MIN_TRADE_CODES.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl SaleSettings {
    pub fn validate(&self) -> Result<(), ParamsError> {
        if self.concession_increment <= 0.0 || self.concession_max < self.concession_increment {
            return Err(ParamsError::InvalidConcession {
                increment: self.concession_increment,
                max: self.concession_max,
            });
        }
        if self.unfilled_cancel_ratio <= Decimal::ZERO || self.unfilled_cancel_ratio > Decimal::ONE {
            return Err(ParamsError::InvalidUnfilledRatio(self.unfilled_cancel_ratio));
        }
        Ok(())
    }
}

/// Buyback detector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuybackSettings {
    pub poll_interval: Duration,
    /// Re-enter faster without the higher-timeframe cross-check
    pub ride_pullbacks: bool,
    /// Rolling window length in price-action mode
    pub window: usize,
    /// Samples that must clear the reference price
    pub min_confirming: usize,
    pub min_elapsed: Duration,
    pub min_elapsed_ride: Duration,
    /// Setup count at or above which a candle re-entry is skipped
    pub max_setup: u8,
}

impl Default for BuybackSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            ride_pullbacks: false,
            window: 5,
            min_confirming: 3,
            min_elapsed: Duration::from_secs(30 * 60),
            min_elapsed_ride: Duration::from_secs(10 * 60),
            max_setup: 7,
        }
    }
}

impl BuybackSettings {
    pub fn min_elapsed(&self) -> Duration {
        if self.ride_pullbacks {
            self.min_elapsed_ride
        } else {
            self.min_elapsed
        }
    }
}

/// Parameter validation errors
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("Invalid contingency: {0} (must be 0 < c < 0.5)")]
    InvalidContingency(f64),
    #[error("Invalid filter window: {0} (minimum 1)")]
    InvalidFilterWindow(usize),
    #[error("Status interval must be at least one hour")]
    InvalidStatusInterval,
    #[error("Invalid take-profit threshold: {0} (must be 0 < t < 1)")]
    InvalidTakeProfit(f64),
    #[error("Invalid concession: increment {increment}, max {max}")]
    InvalidConcession { increment: f64, max: f64 },
    #[error("Invalid unfilled ratio: {0} (must be 0 < r <= 1)")]
    InvalidUnfilledRatio(Decimal),
    #[error("Invalid buyback window: {min_confirming} of {window}")]
    InvalidBuybackWindow { window: usize, min_confirming: usize },
    #[error("Invalid leverage: {0}")]
    InvalidLeverage(f64),
}
