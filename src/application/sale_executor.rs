//! Sale Executor
//!
//! Liquidates the position in tranches with limit orders, re-pricing orders
//! that fail to fill with a stepped concession. Every failure degrades to a
//! terminal [`SaleStatus`]; nothing escapes as an error once selling starts.

use rust_decimal::prelude::*;
use std::collections::HashSet;
use thiserror::Error;

use crate::application::context::EngineContext;
use crate::domain::{
    truncate_qty, MarketKind, PositionState, PriceConcession, QuoteConvention, RunMode, SaleStatus, TrancheError,
    TranchePlan,
};
use crate::ports::{first_open_position, GatewayError, LimitOrderRequest, NotifyKind, Progress, RejectionKind};

#[derive(Debug, Error)]
pub enum SaleError {
    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),
    #[error("Nothing to sell: {0} balance is zero")]
    EmptyBalance(String),
    #[error("No open position on {0}")]
    NoPosition(String),
}

/// Caps on how much of the balance is sold
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SaleLimits {
    /// Sell at most this much of the available balance
    pub limit: Option<Decimal>,
    /// Largest single order
    pub portion: Option<Decimal>,
}

/// Balance assumed by simulated runs without an explicit limit
pub const SIMULATION_BALANCE: Decimal = rust_decimal_macros::dec!(100);

impl SaleLimits {
    /// Simulated runs sell the limit (100 by default) in one portion of that size
    pub fn for_run(run_mode: RunMode, limit: Option<Decimal>, portion: Option<Decimal>) -> Self {
        if run_mode.is_simulation() {
            let limit = limit.unwrap_or(SIMULATION_BALANCE);
            Self {
                limit: Some(limit),
                portion: Some(portion.unwrap_or(limit)),
            }
        } else {
            Self { limit, portion }
        }
    }
}

pub struct SaleExecutor {
    limits: SaleLimits,
    /// Spot balance left untouched because of the sell limit
    reserved: Decimal,
}

impl SaleExecutor {
    pub fn new(limits: SaleLimits) -> Self {
        Self {
            limits,
            reserved: Decimal::ZERO,
        }
    }

    /// Record the starting balance (spot) or contracts (margin) and the
    /// position's value at entry. Also returns the margin position's signed
    /// contract count so the caller can read the direction from it.
    pub async fn capture_start(&mut self, ctx: &EngineContext, position: &mut PositionState) -> Result<f64, SaleError> {
        let gateway = ctx.gateway();
        let kind = ctx.market.kind;
        let signed = match kind {
            MarketKind::Spot => {
                let available = gateway.available_balance(&ctx.market.currency).await?;
                let start = self.limits.limit.map_or(available, |limit| limit.min(available));
                if start <= Decimal::ZERO {
                    return Err(SaleError::EmptyBalance(ctx.market.currency.clone()));
                }
                self.reserved = available - start;
                position.ledger.balance_start = start;
                start.to_f64().unwrap_or(0.0)
            }
            MarketKind::Margin(_) => {
                let open = first_open_position(gateway, &ctx.market.name)
                    .await?
                    .ok_or_else(|| SaleError::NoPosition(ctx.market.name.clone()))?;
                let contracts = open.contracts.abs();
                position.ledger.contracts_start = contracts;
                position.ledger.balance_start = Decimal::from_f64(contracts).unwrap_or(Decimal::ZERO);
                open.contracts
            }
        };
        position.ledger.set_value_original(kind, position.entry_price());
        tracing::info!(
            "Start balance for {}: {} ({}), value at entry {:.8}",
            ctx.market.name,
            position.ledger.balance_start,
            kind,
            position.ledger.value_original
        );
        Ok(signed)
    }

    /// Sell until the balance is dust or a terminal condition is hit
    pub async fn run(&mut self, ctx: &EngineContext, position: &mut PositionState) -> SaleStatus {
        let settings = &ctx.settings.sale;
        let market = &ctx.market.name;
        let direction = position.direction;

        if let Err(e) = ctx.gateway().cancel_all(market).await {
            tracing::warn!("Could not cancel open orders before selling: {}", e);
        }

        let start = position.ledger.balance_start;
        let portion = self.limits.portion.unwrap_or(start);
        let mut plan = match TranchePlan::new(start, portion) {
            Ok(plan) => plan,
            Err(TrancheError::InvalidPortion(_)) => match TranchePlan::new(start, start) {
                Ok(plan) => plan,
                Err(_) => return SaleStatus::Completed,
            },
            Err(TrancheError::EmptyBalance(_)) => {
                tracing::info!("Nothing left to sell on {}", market);
                return SaleStatus::Completed;
            }
        };

        let mut concession = PriceConcession::new(direction, settings.concession_increment, settings.concession_max);
        let mut decrease_attempts: u32 = 0;
        let mut next_stuck_notice = settings.stuck_threshold.max(1);
        let mut first = true;

        tracing::info!("Selling {} on {} in portions of {}", start, market, portion);

        loop {
            if !first {
                ctx.pause(settings.settle_interval).await;
            }
            first = false;

            if ctx.cancel_requested().await {
                tracing::info!("Sale on {} aborted by cancel request", market);
                return SaleStatus::Aborted;
            }

            let cancelled = self.cancel_unfilled(ctx).await;
            if cancelled > 0 {
                decrease_attempts += cancelled;
                if concession.raise() {
                    tracing::info!("Price concession raised to {:.4}", concession.step());
                }
                while decrease_attempts >= next_stuck_notice {
                    let minutes = decrease_attempts as u64 * settings.settle_interval.as_secs() / 60;
                    ctx.notify(
                        NotifyKind::Sell,
                        &format!("unable to sell for more than {} minutes ({} price decreases)", minutes, decrease_attempts),
                    )
                    .await;
                    next_stuck_notice += settings.stuck_threshold.max(1);
                }
            }

            let balance = match self.current_balance(ctx).await {
                Ok(balance) => balance,
                Err(e) => {
                    tracing::warn!("Balance check failed on {}: {}", market, e);
                    continue;
                }
            };
            plan.observe(balance);
            if plan.is_done() {
                tracing::info!("Sale on {} complete, {} left", market, plan.remaining());
                return SaleStatus::Completed;
            }

            let tranches = match ctx.market.kind {
                MarketKind::Margin(_) => vec![truncate_qty(plan.remaining())],
                MarketKind::Spot => plan.tranches(),
            };

            for quantity in tranches {
                let Some(reference) = self.reference_price(ctx, position).await else {
                    break;
                };
                let mut price = concession.apply(reference);
                if ctx.market.kind == MarketKind::Margin(QuoteConvention::Inverse) {
                    price = price.round();
                }

                let request = LimitOrderRequest {
                    market: market.clone(),
                    side: direction.exit_side(),
                    quantity,
                    price,
                    reduce_only: ctx.market.kind.is_margin(),
                };
                tracing::debug!("Placing {} {} @ {:.8}", request.side, quantity, price);

                match ctx.gateway().place_limit_order(request).await {
                    Ok(ack) if !ack.id.is_empty() => {
                        position.ledger.record_submission(price);
                        ctx.persist_progress(Progress::selling(price)).await;
                    }
                    Ok(_) => {
                        tracing::warn!("Order on {} acknowledged without an id", market);
                        return SaleStatus::UnrecognizedResponse;
                    }
                    Err(e) => {
                        tracing::warn!("Order on {} failed: {}", market, e);
                        return match RejectionKind::classify(&e, &settings.min_trade_codes) {
                            RejectionKind::AmountTooLow => SaleStatus::AmountTooLow,
                            RejectionKind::Unrecognized => SaleStatus::UnrecognizedResponse,
                        };
                    }
                }
            }
        }
    }

    /// Cancel orders still mostly unfilled. Returns how many were cancelled.
    async fn cancel_unfilled(&self, ctx: &EngineContext) -> u32 {
        let market = &ctx.market.name;
        let orders = match ctx.gateway().open_orders(market).await {
            Ok(orders) => orders,
            Err(e) => {
                tracing::warn!("Open orders unavailable on {}: {}", market, e);
                return 0;
            }
        };

        let mut cancelled = 0;
        for order in orders
            .iter()
            .filter(|o| o.unfilled_ratio() >= ctx.settings.sale.unfilled_cancel_ratio)
        {
            match ctx.gateway().cancel_order(market, &order.id).await {
                Ok(()) => {
                    tracing::debug!("Cancelled unfilled order {} ({} left)", order.id, order.remaining);
                    cancelled += 1;
                }
                Err(e) => tracing::warn!("Could not cancel order {}: {}", order.id, e),
            }
        }
        cancelled
    }

    /// Balance still to sell: spot minus the reserved amount, or open contracts
    async fn current_balance(&self, ctx: &EngineContext) -> Result<Decimal, GatewayError> {
        match ctx.market.kind {
            MarketKind::Spot => {
                let available = ctx.gateway().available_balance(&ctx.market.currency).await?;
                Ok((available - self.reserved).max(Decimal::ZERO))
            }
            MarketKind::Margin(_) => {
                let open = first_open_position(ctx.gateway(), &ctx.market.name).await?;
                Ok(open
                    .and_then(|p| Decimal::from_f64(p.contracts.abs()))
                    .unwrap_or(Decimal::ZERO))
            }
        }
    }

    /// Book top for margin exits, average price for spot
    async fn reference_price(&self, ctx: &EngineContext, position: &PositionState) -> Option<f64> {
        match ctx.market.kind {
            MarketKind::Margin(_) => match ctx.gateway().book_top(&ctx.market.name, position.direction.exit_book()).await {
                Ok(top) if top.price > 0.0 => Some(top.price),
                Ok(_) => None,
                Err(e) => {
                    tracing::warn!("Order book unavailable on {}: {}", ctx.market.name, e);
                    None
                }
            },
            MarketKind::Spot => ctx.price().await,
        }
    }
}

/// Ids of orders that existed before the run, so settlement only counts new fills
pub async fn history_snapshot(ctx: &EngineContext) -> HashSet<String> {
    match ctx.gateway().order_history(&ctx.market.name).await {
        Ok(records) => records.into_iter().map(|r| r.id).collect(),
        Err(e) => {
            tracing::warn!("Order history unavailable at start: {}", e);
            HashSet::new()
        }
    }
}

/// Fill the ledger from orders placed during this run
pub async fn settle_fills(ctx: &EngineContext, position: &mut PositionState, known: &HashSet<String>) {
    let records = match ctx.gateway().order_history(&ctx.market.name).await {
        Ok(records) => records,
        Err(e) => {
            tracing::warn!("Order history unavailable for settlement: {}", e);
            Vec::new()
        }
    };
    let exit_side = position.direction.exit_side();
    let ledger = &mut position.ledger;
    ledger.reset_fills();

    for record in records
        .iter()
        .filter(|r| !known.contains(&r.id) && r.side == exit_side)
    {
        let filled = record.filled().to_f64().unwrap_or(0.0);
        if filled > 0.0 {
            ledger.record_fill(filled, record.proceeds / filled, record.commission);
        } else {
            ledger.commission += record.commission;
        }
    }

    match ctx.market.kind {
        MarketKind::Spot => ledger.settle_spot(),
        MarketKind::Margin(convention) => ledger.settle_margin(convention),
    }
}
