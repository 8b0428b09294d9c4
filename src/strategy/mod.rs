//! Strategy Layer - Pure exit and re-entry rules
//!
//! Everything here is synchronous and side-effect free; the application
//! layer feeds it market data and acts on the results.
//!
//! - `params`: engine settings and validation
//! - `confirmation`: rolling-extrema and indicator-bar breach filters
//! - `stops`: stop snapshot calculation, refresh cadence, status summaries
//! - `exit_rules`: exhaustion, RSI extremes and the take-profit ratchet
//! - `reentry`: price-action and candle re-entry patterns

pub mod confirmation;
pub mod exit_rules;
pub mod params;
pub mod reentry;
pub mod stops;

pub use confirmation::{indicator_bars_confirm, FilterVerdict, RollingExtremaFilter};
pub use exit_rules::{exhaustion_complete, rsi_extreme, MomentumReading, TakeProfitRatchet};
pub use params::{BuybackSettings, EngineSettings, ExitSettings, ParamsError, SaleSettings, StopSettings};
pub use reentry::{CandleReentryCheck, ReentryWindows};
pub use stops::{compute_snapshot, HourCadence, StatusClock, StatusSummary};
