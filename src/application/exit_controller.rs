//! Exit Controller
//!
//! Monitoring loop for an open position. Each tick refreshes the stop,
//! reads the price and evaluates the exit conditions in priority order:
//!
//! 1. stop-loss breach with the flip confirmed, confirmed by the filter
//! 2. extreme-stop breach
//! 3. exhaustion setup, RSI extremes, take-profit ratchet (candles only)
//! 4. operator sell request
//! 5. operator cancel
//!
//! The first hit hands the position to the sale executor. Passing the target
//! with riding enabled hands over to the mooning controller instead.

use crate::application::context::EngineContext;
use crate::application::mooning::MooningController;
use crate::application::sale_executor::SaleExecutor;
use crate::application::signals::TrendSignalSource;
use crate::domain::{ExitDecision, PositionState, Resolution, SaleStatus, StoppedMode};
use crate::ports::{NotifyKind, Progress};

/// How the exit phase ended
#[derive(Debug, Clone, PartialEq)]
pub struct ExitOutcome {
    pub decision: ExitDecision,
    /// `None` when the job was cancelled without selling
    pub status: Option<SaleStatus>,
    pub mode: StoppedMode,
    pub last_price: Option<f64>,
}

impl ExitOutcome {
    pub fn cancelled(mode: StoppedMode, last_price: Option<f64>) -> Self {
        Self {
            decision: ExitDecision::ExternalCancel,
            status: None,
            mode,
            last_price,
        }
    }

    pub fn resolution(&self) -> Resolution {
        match self.status {
            Some(status) => status.resolution(),
            None => Resolution {
                message: "Cancelled as requested",
                cancel_orders: true,
                notify: false,
                cancel_buyback: true,
            },
        }
    }
}

/// Sell for `decision` and wrap the sale status
pub(crate) async fn sell(
    ctx: &EngineContext,
    sale: &mut SaleExecutor,
    position: &mut PositionState,
    decision: ExitDecision,
    mode: StoppedMode,
    price: f64,
) -> ExitOutcome {
    ctx.notify(
        NotifyKind::Sell,
        &format!("{} at {:.8} ({}% of entry), selling", decision, price, position.percent_of_entry(price)),
    )
    .await;
    ctx.persist_progress(Progress::selling(price)).await;

    let status = sale.run(ctx, position).await;
    tracing::info!("Sale after {} finished with status {}", decision, status);
    ExitOutcome {
        decision,
        status: Some(status),
        mode,
        last_price: Some(price),
    }
}

/// Operator requests, checked after the price-driven conditions
pub(crate) async fn operator_decision(ctx: &EngineContext) -> Option<ExitDecision> {
    if ctx.sell_requested().await {
        ctx.clear_sell_request().await;
        return Some(ExitDecision::ExternalSellRequest);
    }
    if ctx.cancel_requested().await {
        return Some(ExitDecision::ExternalCancel);
    }
    None
}

pub struct ExitController<'a> {
    ctx: &'a EngineContext,
    signals: &'a mut dyn TrendSignalSource,
    sale: &'a mut SaleExecutor,
    /// Extreme stop may fire again once price is back inside it
    extreme_armed: bool,
}

impl<'a> ExitController<'a> {
    pub fn new(ctx: &'a EngineContext, signals: &'a mut dyn TrendSignalSource, sale: &'a mut SaleExecutor) -> Self {
        Self {
            ctx,
            signals,
            sale,
            extreme_armed: true,
        }
    }

    pub async fn run(&mut self, position: &mut PositionState) -> ExitOutcome {
        let ctx = self.ctx;
        let stop_loss = ctx.run_mode.stop_loss();
        let riding = ctx.settings.exit.ride_after_target;
        let mut last_price = None;

        tracing::info!(
            "Monitoring {} {} from {:.8}: target {:.8}, stop {:.8}, stop-loss {}",
            position.direction,
            position.market,
            position.entry_price(),
            position.target_price(),
            position.stop_price,
            if stop_loss { "on" } else { "off" }
        );

        loop {
            self.signals.refresh(ctx, position, false).await;

            let Some(price) = ctx.price().await else {
                if ctx.cancel_requested().await {
                    return ExitOutcome::cancelled(StoppedMode::Manual, last_price);
                }
                ctx.pause(ctx.settings.poll_interval).await;
                continue;
            };
            last_price = Some(price);
            ctx.persist_progress(Progress::monitoring(price, position.percent_of_entry(price)))
                .await;
            tracing::debug!("{} at {:.8}, stop {:.8}", position.market, price, position.stop_price);

            if riding && position.target_reached(price) {
                ctx.notify(
                    NotifyKind::Mooning,
                    &format!("target {:.8} passed at {:.8}, riding the trend", position.target_price(), price),
                )
                .await;
                let mut mooning = MooningController::new(ctx, &mut *self.signals, &mut *self.sale);
                return mooning.run(position, price).await;
            }

            let mut decision = None;
            if stop_loss {
                decision = self.price_decision(position, price).await;
            }
            if decision.is_none() {
                decision = operator_decision(ctx).await;
            }

            match decision {
                Some(ExitDecision::ExternalCancel) => {
                    tracing::info!("Job for {} cancelled while monitoring", position.market);
                    return ExitOutcome::cancelled(StoppedMode::Manual, last_price);
                }
                Some(decision) => {
                    let mode = if decision.is_manual() {
                        StoppedMode::Manual
                    } else {
                        StoppedMode::PreProfit
                    };
                    return sell(ctx, self.sale, position, decision, mode, price).await;
                }
                None => ctx.pause(ctx.settings.poll_interval).await,
            }
        }
    }

    async fn price_decision(&mut self, position: &PositionState, price: f64) -> Option<ExitDecision> {
        let ctx = self.ctx;
        let direction = position.direction;

        if position.flip_confirmed
            && direction.reached_adverse(price, position.stop_price)
            && self.signals.confirm_stop(ctx, position, position.stop_price).await
        {
            return Some(ExitDecision::StopLoss);
        }

        if let Some(extreme) = position.extreme_stop {
            if !direction.beyond_adverse(price, extreme) {
                self.extreme_armed = true;
            } else if self.extreme_armed {
                self.extreme_armed = false;
                if self.signals.confirm_extreme(ctx, position, price).await {
                    return Some(ExitDecision::ExtremeBreach);
                }
            }
        }

        self.signals.signal_exit(ctx, position, price).await
    }
}
