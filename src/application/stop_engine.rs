//! Stop Engine
//!
//! Refreshes the stop, extreme stop and flip flag from analysis bars once per
//! UTC hour (or on demand), persists the stop and emits periodic status
//! summaries. Fetch failures leave the snapshot empty.

use chrono::{DateTime, Utc};

use crate::application::context::EngineContext;
use crate::domain::{BarSeries, PositionState, StopSnapshot};
use crate::ports::NotifyKind;
use crate::strategy::{compute_snapshot, HourCadence, MomentumReading, StatusClock, StatusSummary};

pub struct StopEngine {
    cadence: HourCadence,
    status: StatusClock,
    bars: Option<BarSeries>,
    momentum: Option<MomentumReading>,
}

impl StopEngine {
    pub fn new(status_every_hours: u32) -> Self {
        Self {
            cadence: HourCadence::new(),
            status: StatusClock::new(status_every_hours),
            bars: None,
            momentum: None,
        }
    }

    /// Analysis bars from the last successful refresh
    pub fn bars(&self) -> Option<&BarSeries> {
        self.bars.as_ref()
    }

    pub fn momentum(&self) -> Option<MomentumReading> {
        self.momentum
    }

    pub async fn refresh(&mut self, ctx: &EngineContext, position: &mut PositionState, force: bool) -> StopSnapshot {
        self.refresh_at(ctx, position, force, Utc::now()).await
    }

    pub async fn refresh_at(
        &mut self,
        ctx: &EngineContext,
        position: &mut PositionState,
        force: bool,
        now: DateTime<Utc>,
    ) -> StopSnapshot {
        let hour_changed = self.cadence.due(now);
        if !hour_changed && !force {
            return StopSnapshot::default();
        }

        let query = ctx.candle_query(&ctx.settings.stops.td_period, position.direction);
        let bars = match ctx.market_data().candles(&query).await {
            Ok(Some(bars)) => bars,
            Ok(None) => {
                tracing::warn!("No {} bars for {}, keeping previous stop", query.interval, query.market);
                return StopSnapshot::default();
            }
            Err(e) => {
                tracing::warn!("Bar fetch failed for {}: {}", query.market, e);
                return StopSnapshot::default();
            }
        };

        let snapshot = compute_snapshot(&bars, position.direction, position.entry_price(), ctx.contingency());
        self.momentum = fetch_momentum(ctx).await;

        let was_flipped = position.flip_confirmed;
        if position.apply_snapshot(&snapshot) {
            tracing::info!(
                "Stop for {} moved to {:.8} ({:.2}%)",
                position.market,
                position.stop_price,
                position.stop_pct
            );
        }
        if position.flip_confirmed && !was_flipped {
            tracing::info!("Flip confirmed for {}", position.market);
        }
        ctx.persist_stop(position.stop_price, position.stop_ratio).await;

        if self.status.due(now, force) {
            let summary = StatusSummary::from_bars(
                &position.market,
                position.direction,
                position.stop_price,
                position.extreme_stop,
                position.flip_confirmed,
                &bars,
                self.momentum,
            );
            ctx.notify(NotifyKind::Status, &summary.to_string()).await;
        }

        self.bars = Some(bars);
        snapshot
    }
}

/// RSI on 4h and 1h; `None` unless both are available
pub async fn fetch_momentum(ctx: &EngineContext) -> Option<MomentumReading> {
    let market = ctx.indicator_market();
    let four_hour = ctx.market_data().momentum(market, "4h").await;
    let one_hour = ctx.market_data().momentum(market, "1h").await;
    match (four_hour, one_hour) {
        (Ok(four_hour), Ok(one_hour)) => Some(MomentumReading::new(four_hour, one_hour)),
        (Err(e), _) | (_, Err(e)) => {
            tracing::debug!("RSI unavailable for {}: {}", market, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{context, long_position, quiet_notifier, quiet_store};
    use crate::domain::{Bar, TrendLabel};
    use crate::ports::{MarketDataError, MockJobStore, MockMarketDataPort, MockNotifier, MockOrderGateway};
    use chrono::{Duration as ChronoDuration, TimeZone};

    fn flipped_bars() -> BarSeries {
        BarSeries::new(vec![
            Bar::new(0.0016, 0.0017, 0.0016, 0.0016, 1, TrendLabel::Down),
            Bar::new(0.0016, 0.00165, 0.00155, 0.00156, 2, TrendLabel::Down),
        ])
        .unwrap()
    }

    fn data_with_bars() -> MockMarketDataPort {
        let mut data = MockMarketDataPort::new();
        data.expect_candles().returning(|_| Ok(Some(flipped_bars())));
        data.expect_momentum().returning(|_, _| Ok(50.0));
        data
    }

    #[tokio::test]
    async fn test_refresh_updates_position() {
        let mut store = MockJobStore::new();
        store.expect_persist_stop().times(1).returning(|_, _, _| Ok(()));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_, _| Ok(()));
        let ctx = context(data_with_bars(), MockOrderGateway::new(), store, notifier);

        let mut position = long_position();
        let mut engine = StopEngine::new(4);
        let snap = engine.refresh(&ctx, &mut position, true).await;

        assert_eq!(snap.flip_confirmed, Some(true));
        assert!(position.flip_confirmed);
        // Prior low 0.0016 less 4% contingency for an alt
        assert!((position.stop_price - 0.0016 * 0.96).abs() < 1e-12);
        assert_eq!(engine.momentum(), Some(MomentumReading::new(50.0, 50.0)));
        assert!(engine.bars().is_some());
    }

    #[tokio::test]
    async fn test_refresh_waits_for_next_hour() {
        let mut store = MockJobStore::new();
        store.expect_persist_stop().times(2).returning(|_, _, _| Ok(()));
        let mut notifier = MockNotifier::new();
        notifier.expect_notify().times(1).returning(|_, _| Ok(()));
        let ctx = context(data_with_bars(), MockOrderGateway::new(), store, notifier);

        let mut position = long_position();
        let mut engine = StopEngine::new(4);
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 8, 10, 0).unwrap();

        assert!(!engine.refresh_at(&ctx, &mut position, false, t0).await.is_empty());
        assert!(engine
            .refresh_at(&ctx, &mut position, false, t0 + ChronoDuration::minutes(20))
            .await
            .is_empty());
        // New hour refreshes; the status summary waits for four hours
        assert!(!engine
            .refresh_at(&ctx, &mut position, false, t0 + ChronoDuration::minutes(55))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_stop() {
        let mut data = MockMarketDataPort::new();
        data.expect_candles()
            .returning(|_| Err(MarketDataError::RestError("timeout".into())));
        let ctx = context(data, MockOrderGateway::new(), quiet_store(), quiet_notifier());

        let mut position = long_position();
        let before = position.stop_price;
        let mut engine = StopEngine::new(4);
        let snap = engine.refresh(&ctx, &mut position, true).await;

        assert!(snap.is_empty());
        assert_eq!(position.stop_price, before);
        assert!(!position.flip_confirmed);
    }
}
