//! Paper Order Gateway
//!
//! Simulated exchange for simulation runs. Limit orders fill on placement,
//! fully or (with a seeded RNG) partially. Spot sells reserve the whole
//! quantity until the order fills or is cancelled; margin exits reduce the
//! open contracts by the filled amount. Every order lands in the history
//! with its commission so settlement works as it does live.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::{BookSide, OrderSide};
use crate::ports::{
    BookTop, GatewayError, LimitOrderRequest, MarginPosition, MarketDataPort, OpenOrder, OrderAck, OrderGateway,
    OrderRecord,
};

/// Rejection code for orders under the minimum trade size
pub const PAPER_MIN_TRADE_CODE: &str = "MIN_TRADE_REQUIREMENT_NOT_MET";

#[derive(Debug)]
struct PaperOrder {
    order: OpenOrder,
    reduce_only: bool,
}

#[derive(Debug, Default)]
struct PaperBook {
    balances: HashMap<String, Decimal>,
    positions: HashMap<String, MarginPosition>,
    open: Vec<PaperOrder>,
    history: HashMap<String, Vec<OrderRecord>>,
    leverage: HashMap<String, f64>,
    next_id: u64,
    rng: Option<StdRng>,
}

/// In-process exchange used in simulation mode
#[derive(Clone)]
pub struct PaperGateway {
    feed: Arc<dyn MarketDataPort>,
    book: Arc<Mutex<PaperBook>>,
    commission_rate: f64,
    min_trade: Decimal,
}

impl PaperGateway {
    pub fn new(feed: Arc<dyn MarketDataPort>, commission_rate: f64) -> Self {
        Self {
            feed,
            book: Arc::new(Mutex::new(PaperBook::default())),
            commission_rate,
            min_trade: Decimal::ZERO,
        }
    }

    /// Reject orders smaller than `min_trade`
    pub fn with_min_trade(mut self, min_trade: Decimal) -> Self {
        self.min_trade = min_trade;
        self
    }

    /// Fill a random 50-100% share of each order
    pub fn with_partial_fills(mut self, seed: u64) -> Self {
        if let Some(book) = Arc::get_mut(&mut self.book) {
            book.get_mut().rng = Some(StdRng::seed_from_u64(seed));
        }
        self
    }

    pub async fn deposit(&self, asset: &str, amount: Decimal) {
        let mut book = self.book.lock().await;
        *book.balances.entry(asset.to_uppercase()).or_default() += amount;
    }

    /// Open a margin position with signed `contracts`
    pub async fn open_position(&self, market: &str, contracts: f64, entry_price: f64) {
        let mut book = self.book.lock().await;
        book.positions.insert(
            market.to_string(),
            MarginPosition {
                market: market.to_string(),
                contracts,
                entry_price: Some(entry_price),
            },
        );
    }

    pub async fn balance(&self, asset: &str) -> Decimal {
        let book = self.book.lock().await;
        book.balances.get(&asset.to_uppercase()).copied().unwrap_or(Decimal::ZERO)
    }

    pub async fn leverage(&self, market: &str) -> Option<f64> {
        self.book.lock().await.leverage.get(market).copied()
    }

    /// Asset a spot market order spends: the part after the dash
    fn sold_asset(market: &str) -> String {
        market.rsplit('-').next().unwrap_or(market).to_uppercase()
    }

    fn trade_asset(market: &str) -> Option<String> {
        market.split_once('-').map(|(trade, _)| trade.to_uppercase())
    }
}

#[async_trait]
impl OrderGateway for PaperGateway {
    async fn place_limit_order(&self, request: LimitOrderRequest) -> Result<OrderAck, GatewayError> {
        if request.quantity <= Decimal::ZERO || request.quantity < self.min_trade {
            return Err(GatewayError::Rejected {
                code: PAPER_MIN_TRADE_CODE.to_string(),
            });
        }
        if !(request.price > 0.0) {
            return Err(GatewayError::Rejected {
                code: "INVALID_PRICE".to_string(),
            });
        }

        let mut book = self.book.lock().await;
        let market = request.market.clone();

        if request.reduce_only {
            let open = book
                .positions
                .get(&market)
                .map(|p| p.contracts.abs())
                .unwrap_or(0.0);
            if request.quantity.to_f64().unwrap_or(0.0) > open + f64::EPSILON {
                return Err(GatewayError::Rejected {
                    code: "REDUCE_ONLY_EXCEEDS_POSITION".to_string(),
                });
            }
        } else {
            let asset = Self::sold_asset(&market);
            let available = book.balances.get(&asset).copied().unwrap_or(Decimal::ZERO);
            if request.quantity > available {
                return Err(GatewayError::Rejected {
                    code: "INSUFFICIENT_FUNDS".to_string(),
                });
            }
            book.balances.insert(asset, available - request.quantity);
        }

        let share = match book.rng.as_mut() {
            Some(rng) => rng.gen_range(0.5..=1.0),
            None => 1.0,
        };
        let filled = (request.quantity * Decimal::from_f64(share).unwrap_or(Decimal::ONE))
            .round_dp_with_strategy(8, RoundingStrategy::ToZero);
        let remaining = request.quantity - filled;
        let filled_f = filled.to_f64().unwrap_or(0.0);
        let proceeds = filled_f * request.price;
        let commission = proceeds * self.commission_rate;

        if request.reduce_only {
            if let Some(position) = book.positions.get_mut(&market) {
                let sign = position.contracts.signum();
                position.contracts = sign * (position.contracts.abs() - filled_f).max(0.0);
            }
        } else if let Some(quote) = Self::trade_asset(&market) {
            let credit = Decimal::from_f64(proceeds - commission).unwrap_or(Decimal::ZERO);
            *book.balances.entry(quote).or_default() += credit;
        }

        book.next_id += 1;
        let id = format!("paper-{}", book.next_id);
        book.history.entry(market.clone()).or_default().push(OrderRecord {
            id: id.clone(),
            side: request.side,
            quantity: request.quantity,
            remaining,
            proceeds,
            commission,
        });
        if remaining > Decimal::ZERO {
            book.open.push(PaperOrder {
                order: OpenOrder {
                    id: id.clone(),
                    market: market.clone(),
                    side: request.side,
                    quantity: request.quantity,
                    remaining,
                    price: request.price,
                },
                reduce_only: request.reduce_only,
            });
        }

        tracing::debug!(
            "Paper {} {} {} @ {:.8}: filled {}, {} left",
            request.side,
            request.quantity,
            market,
            request.price,
            filled,
            remaining
        );
        Ok(OrderAck { id })
    }

    async fn cancel_order(&self, market: &str, id: &str) -> Result<(), GatewayError> {
        let mut book = self.book.lock().await;
        let Some(index) = book
            .open
            .iter()
            .position(|o| o.order.id == id && o.order.market == market)
        else {
            return Err(GatewayError::Rejected {
                code: "ORDER_NOT_OPEN".to_string(),
            });
        };
        let cancelled = book.open.remove(index);
        // Unfilled spot quantity goes back to the balance
        if !cancelled.reduce_only {
            *book.balances.entry(Self::sold_asset(market)).or_default() += cancelled.order.remaining;
        }
        Ok(())
    }

    async fn cancel_all(&self, market: &str) -> Result<(), GatewayError> {
        let ids: Vec<String> = {
            let book = self.book.lock().await;
            book.open
                .iter()
                .filter(|o| o.order.market == market)
                .map(|o| o.order.id.clone())
                .collect()
        };
        for id in ids {
            self.cancel_order(market, &id).await?;
        }
        Ok(())
    }

    async fn open_orders(&self, market: &str) -> Result<Vec<OpenOrder>, GatewayError> {
        let book = self.book.lock().await;
        Ok(book
            .open
            .iter()
            .filter(|o| o.order.market == market)
            .map(|o| o.order.clone())
            .collect())
    }

    async fn available_balance(&self, asset: &str) -> Result<Decimal, GatewayError> {
        Ok(self.balance(asset).await)
    }

    async fn positions(&self, market: &str) -> Result<Vec<MarginPosition>, GatewayError> {
        let book = self.book.lock().await;
        Ok(book.positions.get(market).cloned().into_iter().collect())
    }

    async fn book_top(&self, market: &str, side: BookSide) -> Result<BookTop, GatewayError> {
        let price = self
            .feed
            .average_price(market)
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        tracing::debug!("Paper book top {:?} for {} at {:.8}", side, market, price);
        Ok(BookTop { price, size: 0.0 })
    }

    async fn order_history(&self, market: &str) -> Result<Vec<OrderRecord>, GatewayError> {
        let book = self.book.lock().await;
        Ok(book.history.get(market).cloned().unwrap_or_default())
    }

    async fn set_leverage(&self, market: &str, leverage: f64) -> Result<(), GatewayError> {
        if !(leverage > 0.0) {
            return Err(GatewayError::Rejected {
                code: "INVALID_LEVERAGE".to_string(),
            });
        }
        self.book.lock().await.leverage.insert(market.to_string(), leverage);
        Ok(())
    }
}
