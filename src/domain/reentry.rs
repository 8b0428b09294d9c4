//! Run modes, buyback pricing and the re-entry hand-off

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::decision::StoppedMode;
use super::direction::{Direction, TrendLabel};

#[derive(Debug, Error, PartialEq)]
pub enum RunModeError {
    #[error("Unknown run mode '{0}' (expected s, r, sns, rns or rnts)")]
    Unknown(String),
}

/// How a run trades: simulated or real, with or without the stop-loss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunMode {
    /// `s`
    Simulation,
    /// `r`
    Real,
    /// `sns`: simulation, exits only on profit
    SimulationNoStop,
    /// `rns`: real, exits only on profit
    RealNoStop,
    /// `rnts`: real with stop-loss but no trailing exit after the target
    RealNoTrailing,
}

impl RunMode {
    pub fn is_simulation(self) -> bool {
        matches!(self, RunMode::Simulation | RunMode::SimulationNoStop)
    }

    pub fn stop_loss(self) -> bool {
        !matches!(self, RunMode::SimulationNoStop | RunMode::RealNoStop)
    }

    pub fn trailing_stop(self) -> bool {
        self != RunMode::RealNoTrailing
    }

    pub fn code(self) -> &'static str {
        match self {
            RunMode::Simulation => "s",
            RunMode::Real => "r",
            RunMode::SimulationNoStop => "sns",
            RunMode::RealNoStop => "rns",
            RunMode::RealNoTrailing => "rnts",
        }
    }
}

impl FromStr for RunMode {
    type Err = RunModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s" => Ok(RunMode::Simulation),
            "r" => Ok(RunMode::Real),
            "sns" => Ok(RunMode::SimulationNoStop),
            "rns" => Ok(RunMode::RealNoStop),
            "rnts" => Ok(RunMode::RealNoTrailing),
            other => Err(RunModeError::Unknown(other.to_string())),
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// How the entry task should buy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMode {
    /// Candle data drove the signal, buy at market now
    Now,
    /// Price-action signal, use the regular entry routine
    Reg,
}

/// Price the buyback detector compares against
pub fn buyback_price(
    mode: StoppedMode,
    direction: Direction,
    exit_price: Option<f64>,
    last_price: f64,
    is_btc_market: bool,
) -> f64 {
    let exit = exit_price.unwrap_or(last_price);
    match mode {
        // Re-enter slightly better than the exit
        StoppedMode::PreProfit => direction.adverse_offset(exit, 0.0025),
        StoppedMode::PostProfit => {
            let margin = if is_btc_market { 0.005 } else { 0.01 };
            direction.favourable_offset(exit, margin)
        }
        StoppedMode::Manual => exit,
    }
}

/// Everything the follow-up entry task needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReentryPlan {
    pub market: String,
    pub price: f64,
    pub direction: Direction,
    /// Notional to trade; negative for shorts
    pub notional: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub run_mode: RunMode,
    pub entry_mode: EntryMode,
}

impl ReentryPlan {
    /// Derive the plan from the buyback price and the exited trade's tp ratio.
    ///
    /// `notional` is passed unsigned and flipped for shorts.
    #[allow(clippy::too_many_arguments)]
    pub fn derive(
        market: impl Into<String>,
        label: TrendLabel,
        buyback_price: f64,
        tp_ratio: f64,
        contingency: f64,
        notional: f64,
        run_mode: RunMode,
        candles_available: bool,
    ) -> Self {
        let direction = Direction::from_label(label);
        let target_price = match direction {
            Direction::Long => buyback_price * tp_ratio,
            Direction::Short => buyback_price / tp_ratio,
        };
        Self {
            market: market.into(),
            price: buyback_price,
            direction,
            notional: direction.sign() * notional.abs(),
            stop_price: direction.adverse_offset(buyback_price, contingency),
            target_price,
            run_mode,
            entry_mode: if candles_available {
                EntryMode::Now
            } else {
                EntryMode::Reg
            },
        }
    }
}
