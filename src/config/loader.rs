//! Configuration Loader
//!
//! Loads and validates the engine configuration from a TOML file. Every
//! section and field is optional; missing values take the engine defaults.

use rust_decimal::prelude::*;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::ports::DEFAULT_MIN_TRADE_CODES;
use crate::strategy::{BuybackSettings, EngineSettings, ExitSettings, SaleSettings, StopSettings};

/// Main configuration structure matching exitbot.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSection,
    pub stops: StopsSection,
    pub exit: ExitSection,
    pub sale: SaleSection,
    pub buyback: BuybackSection,
    pub exchange: ExchangeSection,
    pub logging: LoggingSection,
}

/// Monitoring loop timing
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// Seconds between monitoring ticks
    pub poll_interval_secs: u64,
    /// Seconds between retries while the market is on maintenance
    pub maintenance_retry_secs: u64,
    /// Seconds to wait for cancellations after an interrupt
    pub cancel_settle_secs: u64,
    /// Divide every timer by this (1 = real time)
    pub speedrun: f64,
    /// Leverage set on margin markets at startup
    pub leverage: f64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            poll_interval_secs: 30,
            maintenance_retry_secs: 300,
            cancel_settle_secs: 10,
            speedrun: 1.0,
            leverage: 5.0,
        }
    }
}

/// Stop engine and confirmation filters
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StopsSection {
    pub contingency_btc: f64,
    pub contingency_alt: f64,
    pub td_period: String,
    pub td_period_extended: String,
    pub td_period_ext_opposite: String,
    pub confirm_interval: String,
    pub status_every_hours: u32,
    pub filter_window: usize,
}

impl Default for StopsSection {
    fn default() -> Self {
        let stops = StopSettings::default();
        Self {
            contingency_btc: stops.contingency_btc,
            contingency_alt: stops.contingency_alt,
            td_period: stops.td_period,
            td_period_extended: stops.td_period_extended,
            td_period_ext_opposite: stops.td_period_ext_opposite,
            confirm_interval: stops.confirm_interval,
            status_every_hours: stops.status_every_hours,
            filter_window: stops.filter_window,
        }
    }
}

/// Exit conditions beyond the stop-loss
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExitSection {
    pub ride_after_target: bool,
    pub take_profit: bool,
    pub take_profit_threshold: f64,
    pub take_profit_noise: f64,
    pub take_profit_interval: String,
    pub take_profit_refresh_mins: u64,
}

impl Default for ExitSection {
    fn default() -> Self {
        let exit = ExitSettings::default();
        Self {
            ride_after_target: exit.ride_after_target,
            take_profit: exit.take_profit,
            take_profit_threshold: exit.take_profit_threshold,
            take_profit_noise: exit.take_profit_noise,
            take_profit_interval: exit.take_profit_interval,
            take_profit_refresh_mins: exit.take_profit_refresh.as_secs() / 60,
        }
    }
}

/// Sale executor
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SaleSection {
    pub settle_interval_secs: u64,
    /// Cancel orders with at least this share unfilled (0.05 = 5%)
    pub unfilled_cancel_ratio: f64,
    pub concession_increment: f64,
    pub concession_max: f64,
    pub stuck_threshold: u32,
}

impl Default for SaleSection {
    fn default() -> Self {
        let sale = SaleSettings::default();
        Self {
            settle_interval_secs: sale.settle_interval.as_secs(),
            unfilled_cancel_ratio: sale.unfilled_cancel_ratio.to_f64().unwrap_or(0.05),
            concession_increment: sale.concession_increment,
            concession_max: sale.concession_max,
            stuck_threshold: sale.stuck_threshold,
        }
    }
}

/// Buyback detector
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BuybackSection {
    pub poll_interval_secs: u64,
    pub ride_pullbacks: bool,
    pub window: usize,
    pub min_confirming: usize,
    pub min_elapsed_mins: u64,
    pub min_elapsed_ride_mins: u64,
    pub max_setup: u8,
}

impl Default for BuybackSection {
    fn default() -> Self {
        let buyback = BuybackSettings::default();
        Self {
            poll_interval_secs: buyback.poll_interval.as_secs(),
            ride_pullbacks: buyback.ride_pullbacks,
            window: buyback.window,
            min_confirming: buyback.min_confirming,
            min_elapsed_mins: buyback.min_elapsed.as_secs() / 60,
            min_elapsed_ride_mins: buyback.min_elapsed_ride.as_secs() / 60,
            max_setup: buyback.max_setup,
        }
    }
}

/// Exchange conventions and the paper gateway used in simulation
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExchangeSection {
    /// Commission charged per fill, as a fraction
    pub commission_rate: f64,
    /// Rejection codes meaning "below minimum trade size"
    pub min_trade_codes: Vec<String>,
    /// Smallest order the paper gateway accepts
    pub paper_min_trade: f64,
    /// Seed for partial fills in the paper gateway; full fills when unset
    pub paper_partial_fill_seed: Option<u64>,
    /// Directory the re-entry plan is written to
    pub plan_dir: String,
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            commission_rate: 0.0025,
            min_trade_codes: DEFAULT_MIN_TRADE_CODES.iter().map(|c| c.to_string()).collect(),
            paper_min_trade: 0.0,
            paper_partial_fill_seed: None,
            plan_dir: "data/plans".to_string(),
        }
    }
}

impl ExchangeSection {
    /// Plan directory with `~` expanded
    pub fn plan_dir(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.plan_dir).to_string())
    }
}

/// Logging configuration section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Validation failed: {0}")]
    ValidationError(String),
}

/// Load configuration from a TOML file (`~` is expanded)
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = shellexpand::tilde(&path.as_ref().to_string_lossy()).to_string();
    let content = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Validate all configuration parameters
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.speedrun <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "speedrun must be > 0, got {}",
                self.engine.speedrun
            )));
        }

        if self.engine.poll_interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "poll_interval_secs must be > 0".to_string(),
            ));
        }

        if self.exchange.commission_rate < 0.0 || self.exchange.commission_rate >= 0.1 {
            return Err(ConfigError::ValidationError(format!(
                "commission_rate must be 0-0.1, got {}",
                self.exchange.commission_rate
            )));
        }

        if self.exchange.paper_min_trade < 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "paper_min_trade must be >= 0, got {}",
                self.exchange.paper_min_trade
            )));
        }

        if self.stops.td_period.is_empty() || self.stops.confirm_interval.is_empty() {
            return Err(ConfigError::ValidationError(
                "td_period and confirm_interval cannot be empty".to_string(),
            ));
        }

        EngineSettings::from(self)
            .validate()
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

// Conversion from Config to the runtime settings
impl From<&Config> for EngineSettings {
    fn from(config: &Config) -> Self {
        let engine = &config.engine;
        let stops = &config.stops;
        let exit = &config.exit;
        let sale = &config.sale;
        let buyback = &config.buyback;

        EngineSettings {
            poll_interval: Duration::from_secs(engine.poll_interval_secs),
            maintenance_retry: Duration::from_secs(engine.maintenance_retry_secs),
            cancel_settle: Duration::from_secs(engine.cancel_settle_secs),
            commission_rate: config.exchange.commission_rate,
            leverage: engine.leverage,
            stops: StopSettings {
                contingency_btc: stops.contingency_btc,
                contingency_alt: stops.contingency_alt,
                td_period: stops.td_period.clone(),
                td_period_extended: stops.td_period_extended.clone(),
                td_period_ext_opposite: stops.td_period_ext_opposite.clone(),
                confirm_interval: stops.confirm_interval.clone(),
                status_every_hours: stops.status_every_hours,
                filter_window: stops.filter_window,
            },
            exit: ExitSettings {
                ride_after_target: exit.ride_after_target,
                take_profit: exit.take_profit,
                take_profit_threshold: exit.take_profit_threshold,
                take_profit_noise: exit.take_profit_noise,
                take_profit_interval: exit.take_profit_interval.clone(),
                take_profit_refresh: Duration::from_secs(exit.take_profit_refresh_mins * 60),
            },
            sale: SaleSettings {
                settle_interval: Duration::from_secs(sale.settle_interval_secs),
                unfilled_cancel_ratio: Decimal::from_f64(sale.unfilled_cancel_ratio).unwrap_or(Decimal::ZERO),
                concession_increment: sale.concession_increment,
                concession_max: sale.concession_max,
                stuck_threshold: sale.stuck_threshold,
                min_trade_codes: config.exchange.min_trade_codes.clone(),
            },
            buyback: BuybackSettings {
                poll_interval: Duration::from_secs(buyback.poll_interval_secs),
                ride_pullbacks: buyback.ride_pullbacks,
                window: buyback.window,
                min_confirming: buyback.min_confirming,
                min_elapsed: Duration::from_secs(buyback.min_elapsed_mins * 60),
                min_elapsed_ride: Duration::from_secs(buyback.min_elapsed_ride_mins * 60),
                max_setup: buyback.max_setup,
            },
        }
        .with_speedrun(engine.speedrun)
    }
}
