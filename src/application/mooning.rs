//! Mooning Controller
//!
//! Rides a position past its target. The exit level is the tighter of the
//! cutoff below the price where the target was passed and a trailing stop
//! that follows the running extreme and never loosens.
//!
//! With the trailing stop off (`rnts`) nothing price-driven ends the ride;
//! only an operator sell or cancel does.

use crate::application::context::EngineContext;
use crate::application::exit_controller::{operator_decision, sell, ExitOutcome};
use crate::application::sale_executor::SaleExecutor;
use crate::application::signals::TrendSignalSource;
use crate::domain::{ExitDecision, PositionState, StoppedMode};
use crate::ports::Progress;

pub struct MooningController<'a> {
    ctx: &'a EngineContext,
    signals: &'a mut dyn TrendSignalSource,
    sale: &'a mut SaleExecutor,
}

impl<'a> MooningController<'a> {
    pub fn new(ctx: &'a EngineContext, signals: &'a mut dyn TrendSignalSource, sale: &'a mut SaleExecutor) -> Self {
        Self { ctx, signals, sale }
    }

    /// Ride from `reached_price`, the price at which the target was passed
    pub async fn run(&mut self, position: &mut PositionState, reached_price: f64) -> ExitOutcome {
        let ctx = self.ctx;
        let direction = position.direction;
        let contingency = ctx.contingency();
        let trailing_mode = ctx.run_mode.trailing_stop();

        let cutoff = direction.adverse_offset(reached_price, contingency);
        let mut extreme = reached_price;
        let mut trailing = self.signals.trailing_stop(position, extreme, contingency);
        let mut last_price = Some(reached_price);

        tracing::info!(
            "Mooning on {}: cutoff {:.8}, trailing stop {:.8}",
            position.market,
            cutoff,
            trailing
        );

        loop {
            self.signals.refresh(ctx, position, false).await;

            let Some(price) = ctx.price().await else {
                if ctx.cancel_requested().await {
                    return ExitOutcome::cancelled(StoppedMode::PostProfit, last_price);
                }
                ctx.pause(ctx.settings.poll_interval).await;
                continue;
            };
            last_price = Some(price);

            if direction.beyond_favourable(price, extreme) {
                extreme = price;
                tracing::debug!("New extreme {:.8} on {}", extreme, position.market);
            }
            let candidate = self.signals.trailing_stop(position, extreme, contingency);
            let tightened = direction.better(trailing, candidate);
            if tightened != trailing {
                tracing::info!("Trailing stop on {} moved to {:.8}", position.market, tightened);
                trailing = tightened;
            }

            let percent_of_target = ((price / position.target_price()) * 10_000.0).round() / 100.0;
            ctx.persist_progress(Progress::mooning(price, percent_of_target)).await;

            let threshold = direction.better(cutoff, trailing);

            let mut decision = None;
            if trailing_mode
                && position.flip_confirmed
                && direction.beyond_adverse(price, threshold)
                && self.signals.confirm_trailing(ctx, position, threshold).await
            {
                decision = Some(ExitDecision::TrailingStop);
            }
            if decision.is_none() {
                decision = operator_decision(ctx).await;
            }

            match decision {
                Some(ExitDecision::ExternalCancel) => {
                    tracing::info!("Job for {} cancelled while mooning", position.market);
                    return ExitOutcome::cancelled(StoppedMode::PostProfit, last_price);
                }
                Some(decision) => {
                    let mode = if decision.is_manual() {
                        StoppedMode::Manual
                    } else {
                        StoppedMode::PostProfit
                    };
                    return sell(ctx, self.sale, position, decision, mode, price).await;
                }
                None => ctx.pause(ctx.settings.poll_interval).await,
            }
        }
    }
}
