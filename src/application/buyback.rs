//! Buyback Detector
//!
//! Runs after an exit and watches for a re-entry pattern through the signal
//! source. Reports a direction and price; never places orders itself.

use serde::{Deserialize, Serialize};

use crate::application::context::EngineContext;
use crate::application::signals::{ReentryWatch, TrendSignalSource};
use crate::domain::Direction;
use crate::ports::{BuybackId, BuybackRecord, NotifyKind};

/// Re-entry found by the detector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BuybackSignal {
    pub direction: Direction,
    pub price: f64,
}

pub struct BuybackDetector<'a> {
    ctx: &'a EngineContext,
    signals: &'a mut dyn TrendSignalSource,
}

impl<'a> BuybackDetector<'a> {
    pub fn new(ctx: &'a EngineContext, signals: &'a mut dyn TrendSignalSource) -> Self {
        Self { ctx, signals }
    }

    /// Watch until a re-entry qualifies or the operator aborts
    pub async fn run(&mut self, reference: f64, exited: Direction, notional: f64) -> Option<BuybackSignal> {
        let ctx = self.ctx;
        let store = ctx.store();
        let id = match store
            .register_buyback(BuybackRecord {
                market: ctx.market.name.clone(),
                price: reference,
                notional,
            })
            .await
        {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!("Buyback not registered, abort flag unavailable: {}", e);
                None
            }
        };

        let watch = ReentryWatch::new(reference, exited);
        self.signals.begin_reentry(ctx, &watch).await;
        ctx.notify(
            NotifyKind::Buyback,
            &format!(
                "watching for re-entry around {:.8} ({} mode)",
                reference,
                if self.signals.candles_available() { "candle" } else { "price-action" }
            ),
        )
        .await;

        loop {
            if self.abort_requested(id).await {
                tracing::info!("Buyback on {} aborted", ctx.market.name);
                self.finish(id).await;
                return None;
            }

            if let Some(direction) = self.signals.poll_reentry(ctx, &watch).await {
                let price = ctx.price().await.unwrap_or(reference);
                ctx.notify(
                    NotifyKind::Buyback,
                    &format!("{} re-entry signal at {:.8}", direction, price),
                )
                .await;
                self.finish(id).await;
                return Some(BuybackSignal { direction, price });
            }

            if let (Some(id), Some(price)) = (id, ctx.price().await) {
                if let Err(e) = store.persist_buyback_price(id, price).await {
                    tracing::warn!("Buyback price not persisted: {}", e);
                }
            }
            ctx.pause(ctx.settings.buyback.poll_interval).await;
        }
    }

    async fn abort_requested(&self, id: Option<BuybackId>) -> bool {
        let Some(id) = id else {
            return false;
        };
        self.ctx
            .store()
            .buyback_abort_requested(id)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Buyback abort flag read failed: {}", e);
                false
            })
    }

    async fn finish(&self, id: Option<BuybackId>) {
        if let Some(id) = id {
            if let Err(e) = self.ctx.store().remove_buyback(id).await {
                tracing::warn!("Buyback {} not removed: {}", id, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::signals::PriceActionSignals;
    use crate::application::test_support::{context, quiet_notifier};
    use crate::ports::{ExtremeSample, MockJobStore, MockMarketDataPort, MockOrderGateway};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn buyback_store(abort_after: usize) -> MockJobStore {
        let mut store = MockJobStore::new();
        store.expect_register_buyback().times(1).returning(|_| Ok(7));
        store.expect_remove_buyback().times(1).returning(|_| Ok(()));
        store.expect_persist_buyback_price().returning(|_, _| Ok(()));
        let checks = AtomicUsize::new(0);
        store
            .expect_buyback_abort_requested()
            .returning(move |_| Ok(checks.fetch_add(1, Ordering::SeqCst) >= abort_after));
        store
    }

    #[tokio::test]
    async fn test_long_reentry_detected() {
        let mut data = MockMarketDataPort::new();
        data.expect_average_price().returning(|_| Ok(0.00151));
        let samples = [
            (0.00146, 0.00148),
            (0.00147, 0.00149),
            (0.00148, 0.00150),
            (0.00149, 0.00151),
            (0.00150, 0.00152),
        ];
        let calls = AtomicUsize::new(0);
        data.expect_sample_extremes().returning(move |_, reference| {
            let (low, high) = samples[calls.fetch_add(1, Ordering::SeqCst).min(samples.len() - 1)];
            Ok(ExtremeSample::new(low, high, reference))
        });
        let ctx = context(data, MockOrderGateway::new(), buyback_store(usize::MAX), quiet_notifier());

        let mut signals = PriceActionSignals::new();
        let signal = BuybackDetector::new(&ctx, &mut signals)
            .run(0.0015, Direction::Long, 0.15)
            .await;
        assert_eq!(
            signal,
            Some(BuybackSignal {
                direction: Direction::Long,
                price: 0.00151
            })
        );
    }

    #[tokio::test]
    async fn test_abort_returns_none() {
        let mut data = MockMarketDataPort::new();
        data.expect_average_price().returning(|_| Ok(0.0014));
        data.expect_sample_extremes()
            .returning(|_, reference| Ok(ExtremeSample::new(0.0013, 0.00135, reference)));
        let ctx = context(data, MockOrderGateway::new(), buyback_store(3), quiet_notifier());

        let mut signals = PriceActionSignals::new();
        let signal = BuybackDetector::new(&ctx, &mut signals)
            .run(0.0015, Direction::Long, 0.15)
            .await;
        assert_eq!(signal, None);
    }
}
