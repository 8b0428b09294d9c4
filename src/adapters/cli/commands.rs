//! CLI Commands
//!
//! Argument definitions for the exitbot binary.

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;

use crate::domain::{MarketKind, QuoteConvention, RunMode};

/// exitbot - Position exit and re-entry engine
#[derive(Parser, Debug)]
#[command(
    name = "exitbot",
    version = env!("CARGO_PKG_VERSION"),
    author = env!("CARGO_PKG_AUTHORS"),
    about = "Position exit and re-entry engine",
    long_about = "exitbot holds one open position, recalculates its stop from TD setups, \
                  confirms breaches against manipulation wicks, sells in tranches and \
                  watches for a buyback once the position is closed."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run one exit cycle on a position
    Run(RunCmd),

    /// Validate a config file and print the resolved settings
    Check(CheckCmd),
}

/// How the traded contract is quoted
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketArg {
    Spot,
    Inverse,
    Linear,
}

impl From<MarketArg> for MarketKind {
    fn from(arg: MarketArg) -> Self {
        match arg {
            MarketArg::Spot => MarketKind::Spot,
            MarketArg::Inverse => MarketKind::Margin(QuoteConvention::Inverse),
            MarketArg::Linear => MarketKind::Margin(QuoteConvention::Linear),
        }
    }
}

/// Run an exit cycle
#[derive(Parser, Debug)]
pub struct RunCmd {
    /// Run mode: s, r, sns, rns or rnts
    #[arg(value_name = "MODE")]
    pub mode: RunMode,

    /// Market name, e.g. BTC-LTC or USD-BTC
    #[arg(value_name = "MARKET")]
    pub market: String,

    /// Entry price of the open position
    #[arg(value_name = "ENTRY")]
    pub entry: f64,

    /// Target price
    #[arg(value_name = "TARGET")]
    pub target: f64,

    /// Initial stop price
    #[arg(value_name = "STOP")]
    pub stop: f64,

    /// Market type
    #[arg(long, value_enum, default_value = "spot")]
    pub kind: MarketArg,

    /// Sell at most this much of the balance
    #[arg(long, value_name = "AMOUNT")]
    pub limit: Option<Decimal>,

    /// Sell in portions of this size
    #[arg(long, value_name = "AMOUNT")]
    pub portion: Option<Decimal>,

    /// Take candles from this market instead
    #[arg(long, value_name = "MARKET")]
    pub reference: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/exitbot.toml")]
    pub config: PathBuf,

    /// Recorded market data (JSON) that drives the simulation
    #[arg(long, value_name = "FILE")]
    pub replay: PathBuf,

    /// Override the config speedrun multiplier
    #[arg(long, value_name = "FACTOR")]
    pub speedrun: Option<f64>,
}

/// Validate configuration
#[derive(Parser, Debug)]
pub struct CheckCmd {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/exitbot.toml")]
    pub config: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_run() {
        let app = CliApp::try_parse_from([
            "exitbot", "run", "s", "BTC-LTC", "0.0017", "0.0021", "0.0015", "--limit", "50", "--replay", "ltc.json",
            "-v",
        ])
        .unwrap();
        assert!(app.verbose);
        let Command::Run(cmd) = app.command else {
            panic!("expected run");
        };
        assert_eq!(cmd.mode, RunMode::Simulation);
        assert_eq!(cmd.market, "BTC-LTC");
        assert_eq!(cmd.limit, Some(dec!(50)));
        assert_eq!(MarketKind::from(cmd.kind), MarketKind::Spot);
    }

    #[test]
    fn test_parse_margin_run() {
        let app = CliApp::try_parse_from([
            "exitbot", "run", "rnts", "USD-BTC", "10000", "9000", "10500", "--kind", "inverse", "--replay",
            "btc.json",
        ])
        .unwrap();
        let Command::Run(cmd) = app.command else {
            panic!("expected run");
        };
        assert_eq!(cmd.mode, RunMode::RealNoTrailing);
        assert_eq!(
            MarketKind::from(cmd.kind),
            MarketKind::Margin(QuoteConvention::Inverse)
        );
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let result = CliApp::try_parse_from(["exitbot", "run", "x", "BTC-LTC", "1", "2", "0.5", "--replay", "a.json"]);
        assert!(result.is_err());
    }
}
