//! Ports Layer - Trait definitions for external dependencies
//!
//! This module defines the interfaces (ports) that adapters must implement.
//! Following hexagonal architecture, these traits abstract:
//! - Market data (average price, TD bars, RSI, sub-interval extremes)
//! - Order execution (limit orders, balances, margin positions)
//! - Job bookkeeping (cancel/sell flags, stop and progress persistence)
//! - Outbound notifications

pub mod execution;
pub mod jobs;
pub mod market_data;
pub mod notifier;

// Re-export main traits and types
pub use execution::{
    first_open_position, BookTop, GatewayError, LimitOrderRequest, MarginPosition, OpenOrder,
    OrderAck, OrderGateway, OrderRecord, RejectionKind, DEFAULT_MIN_TRADE_CODES,
};
pub use jobs::{BuybackId, BuybackRecord, JobId, JobRecord, JobStore, Progress, StoreError};
pub use market_data::{CandleQuery, ExtremeSample, MarketDataError, MarketDataPort};
pub use notifier::{NotifyError, NotifyKind, Notifier};

#[cfg(test)]
pub use execution::MockOrderGateway;
#[cfg(test)]
pub use jobs::MockJobStore;
#[cfg(test)]
pub use market_data::MockMarketDataPort;
#[cfg(test)]
pub use notifier::MockNotifier;
