//! Position Cycle
//!
//! Drives one position from startup checks to the re-entry hand-off:
//!
//! 1. wait out market maintenance, reject fat-finger targets
//! 2. capture the balance or contracts, read the margin direction
//! 3. register the job and pick the signal source
//! 4. run the exit (and mooning) controller until a terminal status
//! 5. settle fills and report the trade summary
//! 6. watch for a buyback unless the outcome suppresses it
//!
//! An interrupt at any point removes the job, cancels orders, settles and
//! reports what was filled.

use std::collections::HashSet;
use std::future::Future;
use thiserror::Error;

use crate::application::buyback::BuybackDetector;
use crate::application::context::{EngineContext, EnginePorts};
use crate::application::exit_controller::{ExitController, ExitOutcome};
use crate::application::sale_executor::{history_snapshot, settle_fills, SaleError, SaleExecutor, SaleLimits};
use crate::application::signals::{select_source, TrendSignalSource};
use crate::domain::{
    buyback_price, Direction, ExitLedger, MarketInfo, MarketKind, PositionError, PositionState, ReentryPlan,
    RunMode, TradeParams, TradeSummary,
};
use crate::ports::{JobRecord, NotifyKind, StoreError};
use crate::strategy::EngineSettings;

/// Trailing bars that must carry setup data for the candle strategy
const ANALYSABLE_BARS: usize = 3;

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("Invalid trade parameters: {0}")]
    Position(#[from] PositionError),
    #[error(transparent)]
    Sale(#[from] SaleError),
    #[error("Job store error: {0}")]
    Store(#[from] StoreError),
}

/// What to run
#[derive(Debug, Clone)]
pub struct CycleRequest {
    pub market: MarketInfo,
    pub params: TradeParams,
    pub run_mode: RunMode,
    pub limits: SaleLimits,
}

/// Result of a whole cycle
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    /// `None` when the cycle was interrupted
    pub exit: Option<ExitOutcome>,
    pub summary: TradeSummary,
    pub buyback_price: Option<f64>,
    pub reentry: Option<ReentryPlan>,
}

impl CycleOutcome {
    pub fn interrupted(&self) -> bool {
        self.exit.is_none()
    }

    /// Job status tag: the sale status, or `cancelled`/`interrupted`
    pub fn status_tag(&self) -> &'static str {
        match &self.exit {
            Some(ExitOutcome { status: Some(status), .. }) => status.as_str(),
            Some(_) => "cancelled",
            None => "interrupted",
        }
    }
}

/// Everything set up by the startup checks
struct Prepared {
    ctx: EngineContext,
    position: PositionState,
    signals: Box<dyn TrendSignalSource>,
    sale: SaleExecutor,
    known_orders: HashSet<String>,
}

pub struct PositionCycle {
    ports: EnginePorts,
    settings: EngineSettings,
    request: CycleRequest,
}

impl PositionCycle {
    pub fn new(ports: EnginePorts, settings: EngineSettings, request: CycleRequest) -> Self {
        Self {
            ports,
            settings,
            request,
        }
    }

    /// Run until the cycle ends or `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<CycleOutcome, CycleError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let prepared = tokio::select! {
            prepared = self.prepare() => Some(prepared?),
            _ = &mut shutdown => None,
        };
        let Some(mut prepared) = prepared else {
            tracing::info!("Interrupted before the position was prepared");
            let summary = ExitLedger::default().summary(self.request.market.kind, self.request.params.implied_direction());
            return Ok(CycleOutcome {
                exit: None,
                summary,
                buyback_price: None,
                reentry: None,
            });
        };

        let outcome = tokio::select! {
            outcome = Self::drive(&mut prepared) => Some(outcome),
            _ = &mut shutdown => None,
        };
        match outcome {
            Some(outcome) => Ok(outcome),
            None => Ok(Self::interrupt(&mut prepared).await),
        }
    }

    async fn prepare(&self) -> Result<Prepared, CycleError> {
        let market = self.request.market.clone();
        let run_mode = self.request.run_mode;
        let params = self.request.params.clone();
        let mut ctx = EngineContext::new(self.ports.clone(), market.clone(), 0, run_mode, self.settings.clone());

        let price = self.wait_for_market(&ctx).await;
        params.check_fat_finger(price)?;

        let mut position = PositionState::new(&market.name, params.implied_direction(), params.clone());
        let mut sale = SaleExecutor::new(self.request.limits);
        let contracts = sale.capture_start(&ctx, &mut position).await?;
        if market.kind.is_margin() && !run_mode.is_simulation() {
            position.direction = if contracts < 0.0 { Direction::Short } else { Direction::Long };
        }

        if let MarketKind::Margin(_) = market.kind {
            if let Err(e) = ctx.gateway().set_leverage(&market.name, self.settings.leverage).await {
                ctx.notify(NotifyKind::Error, &format!("could not set leverage {}: {}", self.settings.leverage, e))
                    .await;
            }
        }

        ctx.job = ctx
            .store()
            .register_job(JobRecord {
                market: market.name.clone(),
                direction: position.direction,
                entry_price: params.entry_price,
                target_price: params.target_price,
                stop_price: params.stop_price,
                run_mode,
                stop_loss: run_mode.stop_loss(),
            })
            .await?;

        let candles_available = Self::candles_available(&ctx, position.direction).await;
        if !candles_available {
            position.flip_confirmed = true;
            ctx.notify(
                NotifyKind::Status,
                "no usable candle data, running on price action with flip confirmed",
            )
            .await;
        }

        let mut signals = select_source(&ctx, &position, candles_available);
        if candles_available {
            signals.refresh(&ctx, &mut position, true).await;
        }
        let known_orders = history_snapshot(&ctx).await;

        tracing::info!(
            "Job {} started: {} {} ({}), entry {:.8}, tp {:.5} ({:.2}%), sl {:.5} ({:.2}%), mode {}",
            ctx.job,
            position.direction,
            market.name,
            market.kind,
            params.entry_price,
            params.tp_ratio(),
            params.tp_pct(),
            params.sl_ratio(),
            params.sl_pct(),
            run_mode
        );

        Ok(Prepared {
            ctx,
            position,
            signals,
            sale,
            known_orders,
        })
    }

    /// Current price, retrying while the market is on maintenance
    async fn wait_for_market(&self, ctx: &EngineContext) -> f64 {
        let mut notified = false;
        loop {
            if let Some(price) = ctx.price().await {
                return price;
            }
            if !notified {
                ctx.notify(
                    NotifyKind::Maintenance,
                    "price unavailable, market may be on maintenance; retrying",
                )
                .await;
                notified = true;
            }
            ctx.pause(self.settings.maintenance_retry).await;
        }
    }

    async fn candles_available(ctx: &EngineContext, direction: Direction) -> bool {
        let query = ctx.candle_query(&ctx.settings.stops.td_period, direction);
        match ctx.market_data().candles(&query).await {
            Ok(Some(bars)) => bars.is_analysable(ANALYSABLE_BARS),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Candle availability check failed for {}: {}", query.market, e);
                false
            }
        }
    }

    async fn drive(prepared: &mut Prepared) -> CycleOutcome {
        let Prepared {
            ctx,
            position,
            signals,
            sale,
            known_orders,
        } = prepared;

        let exit = ExitController::new(ctx, signals.as_mut(), sale).run(position).await;
        let resolution = exit.resolution();
        tracing::info!("{} (decision {}, mode {})", resolution.message, exit.decision, exit.mode);

        if resolution.cancel_orders {
            if let Err(e) = ctx.gateway().cancel_all(&ctx.market.name).await {
                tracing::warn!("Could not cancel orders after exit: {}", e);
            }
        }
        if resolution.notify {
            ctx.notify(NotifyKind::Error, resolution.message).await;
        }

        let summary = Self::settle(ctx, position, known_orders).await;
        Self::remove_job(ctx).await;

        if resolution.cancel_buyback {
            tracing::info!("Buyback suppressed after {}", exit.status.map_or("cancel", |s| s.as_str()));
            return CycleOutcome {
                exit: Some(exit),
                summary,
                buyback_price: None,
                reentry: None,
            };
        }

        let last_price = exit.last_price.unwrap_or(position.entry_price());
        let reference = buyback_price(
            exit.mode,
            position.direction,
            position.ledger.exit_price,
            last_price,
            ctx.market.is_btc(),
        );
        let notional = Self::reentry_notional(ctx, position, reference);
        tracing::info!("Buyback armed at {:.8} ({} exit), notional {:.8}", reference, exit.mode, notional);

        let signal = BuybackDetector::new(ctx, signals.as_mut())
            .run(reference, position.direction, notional)
            .await;
        let reentry = signal.map(|signal| {
            ReentryPlan::derive(
                &ctx.market.name,
                signal.direction.favourable_label(),
                reference,
                position.params.tp_ratio(),
                ctx.contingency(),
                notional,
                ctx.run_mode,
                signals.candles_available(),
            )
        });
        if let Some(plan) = &reentry {
            tracing::info!(
                "Re-entry {} at {:.8}: target {:.8}, stop {:.8}",
                plan.direction,
                plan.price,
                plan.target_price,
                plan.stop_price
            );
        }

        CycleOutcome {
            exit: Some(exit),
            summary,
            buyback_price: Some(reference),
            reentry,
        }
    }

    /// Margin re-enters with proceeds over leverage, spot with the sold balance
    fn reentry_notional(ctx: &EngineContext, position: &PositionState, reference: f64) -> f64 {
        use rust_decimal::prelude::ToPrimitive;

        if ctx.market.kind.is_margin() {
            position.ledger.proceeds / ctx.settings.leverage
        } else {
            let balance = position.ledger.balance_start.to_f64().unwrap_or(0.0);
            balance * reference * (1.0 - ctx.settings.commission_rate)
        }
    }

    async fn settle(ctx: &EngineContext, position: &mut PositionState, known: &HashSet<String>) -> TradeSummary {
        settle_fills(ctx, position, known).await;
        let summary = position.ledger.summary(ctx.market.kind, position.direction);
        ctx.notify(NotifyKind::Finished, &summary.to_string()).await;
        summary
    }

    async fn remove_job(ctx: &EngineContext) {
        if let Err(e) = ctx.store().remove_job(ctx.job).await {
            tracing::warn!("Job {} not removed: {}", ctx.job, e);
        }
    }

    async fn interrupt(prepared: &mut Prepared) -> CycleOutcome {
        let ctx = &prepared.ctx;
        tracing::warn!("Interrupted, cleaning up job {}", ctx.job);
        Self::remove_job(ctx).await;
        if let Err(e) = ctx.gateway().cancel_all(&ctx.market.name).await {
            tracing::warn!("Could not cancel orders on interrupt: {}", e);
        }
        ctx.pause(ctx.settings.cancel_settle).await;
        let summary = Self::settle(ctx, &mut prepared.position, &prepared.known_orders).await;
        CycleOutcome {
            exit: None,
            summary,
            buyback_price: None,
            reentry: None,
        }
    }
}
