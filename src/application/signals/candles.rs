use async_trait::async_trait;
use chrono::Utc;
use std::time::Instant;

use super::{ReentryWatch, TrendSignalSource};
use crate::application::context::EngineContext;
use crate::application::stop_engine::StopEngine;
use crate::domain::{BarSeries, Direction, ExitDecision, PositionState, StopSnapshot};
use crate::ports::CandleQuery;
use crate::strategy::{
    exhaustion_complete, indicator_bars_confirm, rsi_extreme, CandleReentryCheck, EngineSettings, HourCadence,
    TakeProfitRatchet,
};

const CONFIRM_LOOKBACK: u32 = 1_000;
const CONFIRM_MIN_BARS: usize = 5;
const EXTENDED_LOOKBACK: u32 = 60_000;
const OPPOSITE_LOOKBACK: u32 = 80_000;

/// Bars the candle re-entry check reads, refreshed once per hour
#[derive(Default)]
struct ReentryBars {
    cadence: HourCadence,
    analysis: Option<BarSeries>,
    extended: Option<BarSeries>,
    opposite: Option<BarSeries>,
}

/// Signals driven by TD-annotated candles
pub struct CandleSignals {
    stop_engine: StopEngine,
    take_profit: Option<TakeProfitRatchet>,
    tp_bars: Option<BarSeries>,
    tp_fetched: Option<Instant>,
    reentry: ReentryBars,
}

impl CandleSignals {
    pub fn new(settings: &EngineSettings, position: &PositionState) -> Self {
        let take_profit = settings.exit.take_profit.then(|| {
            TakeProfitRatchet::new(
                position.direction,
                position.entry_price(),
                settings.exit.take_profit_threshold,
                settings.exit.take_profit_noise,
            )
        });
        Self {
            stop_engine: StopEngine::new(settings.stops.status_every_hours),
            take_profit,
            tp_bars: None,
            tp_fetched: None,
            reentry: ReentryBars::default(),
        }
    }

    pub fn take_profit_level(&self) -> Option<f64> {
        self.take_profit.as_ref().map(|tp| tp.level())
    }

    async fn fetch(ctx: &EngineContext, interval: &str, direction: Direction, lookback: u32, min_bars: usize) -> Option<BarSeries> {
        let query = ctx
            .candle_query(interval, direction)
            .with_lookback(lookback)
            .with_min_bars(min_bars);
        match ctx.market_data().candles(&query).await {
            Ok(bars) => bars,
            Err(e) => {
                tracing::warn!("{} bars unavailable for {}: {}", interval, query.market, e);
                None
            }
        }
    }

    /// Short-interval bars for the take-profit ratchet, at most once per refresh period
    async fn take_profit_bars(&mut self, ctx: &EngineContext, direction: Direction) -> Option<&BarSeries> {
        let stale = self
            .tp_fetched
            .map_or(true, |at| at.elapsed() >= ctx.settings.exit.take_profit_refresh);
        if stale {
            let bars = Self::fetch(
                ctx,
                &ctx.settings.exit.take_profit_interval,
                direction,
                CONFIRM_LOOKBACK,
                CONFIRM_MIN_BARS,
            )
            .await;
            if bars.is_some() {
                self.tp_bars = bars;
            }
            self.tp_fetched = Some(Instant::now());
        }
        self.tp_bars.as_ref()
    }
}

#[async_trait]
impl TrendSignalSource for CandleSignals {
    fn candles_available(&self) -> bool {
        true
    }

    async fn refresh(&mut self, ctx: &EngineContext, position: &mut PositionState, force: bool) -> StopSnapshot {
        self.stop_engine.refresh(ctx, position, force).await
    }

    async fn confirm_stop(&mut self, ctx: &EngineContext, position: &PositionState, threshold: f64) -> bool {
        let Some(bars) = Self::fetch(
            ctx,
            &ctx.settings.stops.confirm_interval,
            position.direction,
            CONFIRM_LOOKBACK,
            CONFIRM_MIN_BARS,
        )
        .await
        else {
            return false;
        };
        let confirmed = indicator_bars_confirm(&bars, position.direction, threshold);
        tracing::debug!("Indicator-bar confirmation at {:.8}: {}", threshold, confirmed);
        confirmed
    }

    async fn confirm_extreme(&mut self, _ctx: &EngineContext, _position: &PositionState, _price: f64) -> bool {
        true
    }

    async fn signal_exit(&mut self, ctx: &EngineContext, position: &PositionState, price: f64) -> Option<ExitDecision> {
        if let Some(bars) = self.stop_engine.bars() {
            if exhaustion_complete(bars) {
                return Some(ExitDecision::ExhaustionSignal);
            }
        }
        if let Some(reading) = self.stop_engine.momentum() {
            if rsi_extreme(position.direction, &reading) {
                return Some(ExitDecision::RsiExtreme);
            }
        }

        if self.take_profit.is_none() {
            return None;
        }
        let bars = self.take_profit_bars(ctx, position.direction).await?.clone();
        let take_profit = self.take_profit.as_mut()?;
        if take_profit.update(price, &bars) {
            tracing::info!("Take-profit level for {} ratcheted to {:.8}", position.market, take_profit.level());
        }
        take_profit.should_exit(price).then_some(ExitDecision::TakeProfit)
    }

    fn trailing_stop(&self, position: &PositionState, _extreme: f64, _contingency: f64) -> f64 {
        position.stop_price
    }

    async fn confirm_trailing(&mut self, _ctx: &EngineContext, _position: &PositionState, _threshold: f64) -> bool {
        true
    }

    async fn begin_reentry(&mut self, _ctx: &EngineContext, watch: &ReentryWatch) {
        tracing::info!("Watching for candle re-entry after {} exit", watch.exited);
        self.reentry = ReentryBars::default();
    }

    async fn poll_reentry(&mut self, ctx: &EngineContext, watch: &ReentryWatch) -> Option<Direction> {
        let stops = &ctx.settings.stops;
        if self.reentry.cadence.due(Utc::now()) {
            if let Some(bars) = Self::fetch(
                ctx,
                &stops.td_period,
                watch.exited,
                CandleQuery::DEFAULT_LOOKBACK,
                CandleQuery::DEFAULT_MIN_BARS,
            )
            .await
            {
                self.reentry.analysis = Some(bars);
            }
            // Failed longer-timeframe fetches disable the cross-check
            self.reentry.extended = Self::fetch(
                ctx,
                &stops.td_period_extended,
                watch.exited,
                EXTENDED_LOOKBACK,
                CandleQuery::DEFAULT_MIN_BARS,
            )
            .await;
            self.reentry.opposite = Self::fetch(
                ctx,
                &stops.td_period_ext_opposite,
                watch.exited,
                OPPOSITE_LOOKBACK,
                CandleQuery::DEFAULT_MIN_BARS,
            )
            .await;
        }

        let analysis = self.reentry.analysis.as_ref()?;
        let price = ctx.price().await?;
        let buyback = &ctx.settings.buyback;
        let check = CandleReentryCheck {
            analysis,
            extended: self.reentry.extended.as_ref(),
            opposite_extended: self.reentry.opposite.as_ref(),
            exited: watch.exited,
            price,
            contingency: ctx.contingency(),
            elapsed: watch.started.elapsed(),
            min_elapsed: buyback.min_elapsed(),
            ride_pullbacks: buyback.ride_pullbacks,
            max_setup: buyback.max_setup,
        };
        check.signal(ctx.market.allows_short())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{context, long_position, quiet_notifier, quiet_store};
    use crate::domain::{Bar, TrendLabel};
    use crate::ports::{MockMarketDataPort, MockOrderGateway};

    fn closes(values: &[f64]) -> BarSeries {
        BarSeries::new(
            values
                .iter()
                .map(|c| Bar::new(*c, *c, *c, *c, 1, TrendLabel::Down))
                .collect(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_confirm_stop_reads_short_bars() {
        let mut data = MockMarketDataPort::new();
        data.expect_candles()
            .withf(|q: &CandleQuery| q.interval == "10min")
            .returning(|_| Ok(Some(closes(&[0.0016, 0.00149, 0.00148, 0.00151]))));
        let ctx = context(data, MockOrderGateway::new(), quiet_store(), quiet_notifier());

        let position = long_position();
        let mut signals = CandleSignals::new(&ctx.settings, &position);
        assert!(signals.confirm_stop(&ctx, &position, 0.0015).await);
    }

    #[tokio::test]
    async fn test_missing_bars_do_not_confirm() {
        let mut data = MockMarketDataPort::new();
        data.expect_candles().returning(|_| Ok(None));
        let ctx = context(data, MockOrderGateway::new(), quiet_store(), quiet_notifier());

        let position = long_position();
        let mut signals = CandleSignals::new(&ctx.settings, &position);
        assert!(!signals.confirm_stop(&ctx, &position, 0.0015).await);
        assert!(signals.confirm_extreme(&ctx, &position, 0.0014).await);
    }

    #[tokio::test]
    async fn test_take_profit_exit() {
        let mut data = MockMarketDataPort::new();
        // Prior 15min bar low sits at 0.00180
        data.expect_candles()
            .withf(|q: &CandleQuery| q.interval == "15min")
            .returning(|_| {
                Ok(Some(
                    BarSeries::new(vec![
                        Bar::new(0.00181, 0.00182, 0.00180, 0.00181, 1, TrendLabel::Up),
                        Bar::new(0.00181, 0.00185, 0.00181, 0.00184, 2, TrendLabel::Up),
                    ])
                    .unwrap(),
                ))
            });
        let ctx = context(data, MockOrderGateway::new(), quiet_store(), quiet_notifier());

        let position = long_position();
        let mut signals = CandleSignals::new(&ctx.settings, &position);
        // Entry 0.0017 * 1.05
        assert!((signals.take_profit_level().unwrap() - 0.001785).abs() < 1e-12);

        assert_eq!(signals.signal_exit(&ctx, &position, 0.00184).await, None);
        assert!((signals.take_profit_level().unwrap() - 0.00180).abs() < 1e-12);
        assert_eq!(signals.signal_exit(&ctx, &position, 0.00179).await, Some(ExitDecision::TakeProfit));
    }
}
