//! Domain Layer - Core types for the exit engine
//!
//! Pure types and arithmetic with no I/O. All external interactions happen
//! through the ports layer.
//!
//! - `direction`: long/short sign multiplier and mirrored comparisons
//! - `candle`: TD-annotated bars and bar series
//! - `market`: market names and asset classes
//! - `window`: fixed-size FIFO used by the rolling filters
//! - `position`: trade parameters, stop snapshot and position state
//! - `accounting`: exit ledger and settlement
//! - `tranche`: tranche planning for the sale executor
//! - `concession`: stepped price concession
//! - `decision`: exit decisions and sale statuses
//! - `reentry`: run modes, buyback pricing and the re-entry plan

pub mod accounting;
pub mod candle;
pub mod concession;
pub mod decision;
pub mod direction;
pub mod market;
pub mod position;
pub mod reentry;
pub mod tranche;
pub mod window;

pub use accounting::{ExitLedger, MarketKind, QuoteConvention, TradeSummary};
pub use candle::{Bar, BarSeries, BarSeriesError, SETUP_COMPLETE};
pub use concession::PriceConcession;
pub use decision::{ExitDecision, Resolution, SaleStatus, StoppedMode};
pub use direction::{BookSide, Direction, OrderSide, TrendLabel};
pub use market::{AssetClass, MarketError, MarketInfo};
pub use position::{round5, PositionError, PositionState, StopSnapshot, TradeParams};
pub use reentry::{buyback_price, EntryMode, ReentryPlan, RunMode, RunModeError};
pub use tranche::{tranche_count, truncate_qty, TranchePlan, TrancheError};
pub use window::RollingWindow;
