//! Application Layer - Position lifecycle
//!
//! Async loops that drive a position through the ports:
//! - `stop_engine`: hourly stop refresh from TD bars
//! - `signals`: candle and price-action trend signal sources
//! - `sale_executor`: tranche selling with cancel/re-price
//! - `exit_controller` / `mooning`: monitoring before and after the target
//! - `buyback`: re-entry detection after an exit
//! - `cycle`: the whole run from startup checks to re-entry hand-off

pub mod buyback;
pub mod context;
pub mod cycle;
pub mod exit_controller;
pub mod mooning;
pub mod sale_executor;
pub mod signals;
pub mod stop_engine;

pub use buyback::{BuybackDetector, BuybackSignal};
pub use context::{EngineContext, EnginePorts};
pub use cycle::{CycleError, CycleOutcome, CycleRequest, PositionCycle};
pub use exit_controller::{ExitController, ExitOutcome};
pub use mooning::MooningController;
pub use sale_executor::{SaleError, SaleExecutor, SaleLimits, SIMULATION_BALANCE};
pub use signals::{select_source, CandleSignals, PriceActionSignals, ReentryWatch, TrendSignalSource};
pub use stop_engine::StopEngine;
