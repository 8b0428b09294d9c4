//! Trend Signal Sources
//!
//! Whether usable candle data exists is decided once at startup. The answer
//! picks one of two implementations of [`TrendSignalSource`], and every
//! controller asks the source instead of branching on data availability.
//!
//! - [`CandleSignals`]: stop engine, indicator-bar confirmation, exhaustion,
//!   RSI, take-profit ratchet and candle re-entry
//! - [`PriceActionSignals`]: rolling-extrema confirmation and re-entry only

mod candles;
mod price_action;

pub use candles::CandleSignals;
pub use price_action::PriceActionSignals;

use async_trait::async_trait;
use std::time::Instant;

use crate::application::context::EngineContext;
use crate::domain::{Direction, ExitDecision, PositionState, StopSnapshot};
use crate::strategy::{FilterVerdict, RollingExtremaFilter};

/// Consecutive sampling failures after which a filter gives up unconfirmed
const MAX_SAMPLE_FAILURES: u32 = 10;

/// A buyback in progress
#[derive(Debug, Clone)]
pub struct ReentryWatch {
    /// Price the re-entry pattern is measured against
    pub reference: f64,
    /// Direction of the position that was exited
    pub exited: Direction,
    pub started: Instant,
}

impl ReentryWatch {
    pub fn new(reference: f64, exited: Direction) -> Self {
        Self {
            reference,
            exited,
            started: Instant::now(),
        }
    }
}

#[async_trait]
pub trait TrendSignalSource: Send {
    fn candles_available(&self) -> bool;

    /// Refresh the stop snapshot into `position` if due
    async fn refresh(&mut self, ctx: &EngineContext, position: &mut PositionState, force: bool) -> StopSnapshot;

    /// Confirm a stop-loss breach at `threshold`
    async fn confirm_stop(&mut self, ctx: &EngineContext, position: &PositionState, threshold: f64) -> bool;

    /// Confirm an extreme-stop breach observed at `price`
    async fn confirm_extreme(&mut self, ctx: &EngineContext, position: &PositionState, price: f64) -> bool;

    /// Exhaustion, RSI and take-profit exits
    async fn signal_exit(&mut self, ctx: &EngineContext, position: &PositionState, price: f64) -> Option<ExitDecision>;

    /// Trailing stop for the mooning controller given the running extreme
    fn trailing_stop(&self, position: &PositionState, extreme: f64, contingency: f64) -> f64;

    /// Confirm a trailing-stop breach at `threshold`
    async fn confirm_trailing(&mut self, ctx: &EngineContext, position: &PositionState, threshold: f64) -> bool;

    async fn begin_reentry(&mut self, ctx: &EngineContext, watch: &ReentryWatch);

    /// One buyback tick. Returns the re-entry direction once the pattern appears.
    async fn poll_reentry(&mut self, ctx: &EngineContext, watch: &ReentryWatch) -> Option<Direction>;
}

/// Select the signal source for the whole run
pub fn select_source(ctx: &EngineContext, position: &PositionState, candles_available: bool) -> Box<dyn TrendSignalSource> {
    if candles_available {
        Box::new(CandleSignals::new(&ctx.settings, position))
    } else {
        Box::new(PriceActionSignals::new())
    }
}

/// Sample sub-interval extremes until the rolling filter decides.
///
/// Returns `false` on recovery, on an operator cancel, or after repeated
/// sampling failures.
pub async fn run_rolling_filter(ctx: &EngineContext, direction: Direction, threshold: f64) -> bool {
    let mut filter = RollingExtremaFilter::new(direction, threshold, ctx.settings.stops.filter_window);
    let mut failures = 0;

    loop {
        if ctx.cancel_requested().await {
            tracing::info!("Confirmation for {} interrupted by cancel", ctx.market.name);
            return false;
        }

        match ctx.market_data().sample_extremes(&ctx.market.name, threshold).await {
            Ok(sample) => {
                failures = 0;
                match filter.observe(&sample) {
                    FilterVerdict::Confirmed => {
                        tracing::info!("Breach of {:.8} confirmed over {} samples", threshold, filter.samples());
                        return true;
                    }
                    FilterVerdict::Recovered => {
                        tracing::info!("Price recovered through {:.8}, breach ignored", threshold);
                        return false;
                    }
                    FilterVerdict::Pending => {
                        tracing::debug!("Filter pending: {} samples (low {}, high {})", filter.samples(), sample.low, sample.high);
                    }
                }
            }
            Err(e) => {
                failures += 1;
                tracing::warn!("Extreme sampling failed ({}/{}): {}", failures, MAX_SAMPLE_FAILURES, e);
                if failures >= MAX_SAMPLE_FAILURES {
                    return false;
                }
                ctx.pause(ctx.settings.poll_interval).await;
            }
        }
    }
}
