use async_trait::async_trait;

use super::{run_rolling_filter, ReentryWatch, TrendSignalSource};
use crate::application::context::EngineContext;
use crate::domain::{Direction, ExitDecision, PositionState, StopSnapshot};
use crate::strategy::ReentryWindows;

/// Signals from raw price action when no usable candles exist
#[derive(Default)]
pub struct PriceActionSignals {
    windows: Option<ReentryWindows>,
}

impl PriceActionSignals {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrendSignalSource for PriceActionSignals {
    fn candles_available(&self) -> bool {
        false
    }

    async fn refresh(&mut self, _ctx: &EngineContext, _position: &mut PositionState, _force: bool) -> StopSnapshot {
        StopSnapshot::default()
    }

    async fn confirm_stop(&mut self, ctx: &EngineContext, position: &PositionState, threshold: f64) -> bool {
        run_rolling_filter(ctx, position.direction, threshold).await
    }

    async fn confirm_extreme(&mut self, ctx: &EngineContext, position: &PositionState, price: f64) -> bool {
        run_rolling_filter(ctx, position.direction, price).await
    }

    async fn signal_exit(&mut self, _ctx: &EngineContext, _position: &PositionState, _price: f64) -> Option<ExitDecision> {
        None
    }

    fn trailing_stop(&self, position: &PositionState, extreme: f64, contingency: f64) -> f64 {
        position.direction.adverse_offset(extreme, contingency)
    }

    async fn confirm_trailing(&mut self, ctx: &EngineContext, position: &PositionState, threshold: f64) -> bool {
        run_rolling_filter(ctx, position.direction, threshold).await
    }

    async fn begin_reentry(&mut self, ctx: &EngineContext, watch: &ReentryWatch) {
        tracing::info!(
            "Watching for price-action re-entry around {:.8} after {} exit",
            watch.reference,
            watch.exited
        );
        self.windows = Some(ReentryWindows::new(
            watch.reference,
            ctx.settings.buyback.window,
            ctx.settings.buyback.min_confirming,
        ));
    }

    async fn poll_reentry(&mut self, ctx: &EngineContext, watch: &ReentryWatch) -> Option<Direction> {
        let windows = self.windows.get_or_insert_with(|| {
            ReentryWindows::new(watch.reference, ctx.settings.buyback.window, ctx.settings.buyback.min_confirming)
        });

        if let Some(direction) = windows.signal(ctx.market.allows_short()) {
            return Some(direction);
        }

        match ctx.market_data().sample_extremes(&ctx.market.name, watch.reference).await {
            Ok(sample) => windows.push(&sample),
            Err(e) => tracing::warn!("Buyback sample failed for {}: {}", ctx.market.name, e),
        }
        None
    }
}
