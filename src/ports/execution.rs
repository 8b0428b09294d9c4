use async_trait::async_trait;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BookSide, OrderSide};

/// Exchange rejection codes that mean "order below the minimum trade size"
pub const DEFAULT_MIN_TRADE_CODES: [&str; 2] = [
    "DUST_TRADE_DISALLOWED_MIN_VALUE_50K_SAT",
    "MIN_TRADE_REQUIREMENT_NOT_MET",
];

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GatewayError {
    #[error("Order rejected: {code}")]
    Rejected { code: String },
    #[error("Transport failure: {0}")]
    Transport(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

/// How a failed placement ends a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    AmountTooLow,
    Unrecognized,
}

impl RejectionKind {
    /// Only the configured minimum-trade codes count as "too low"; any other
    /// failure during placement is unrecognised.
    pub fn classify<S: AsRef<str>>(error: &GatewayError, min_trade_codes: &[S]) -> Self {
        match error {
            GatewayError::Rejected { code }
                if min_trade_codes.iter().any(|c| c.as_ref() == code) =>
            {
                RejectionKind::AmountTooLow
            }
            _ => RejectionKind::Unrecognized,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitOrderRequest {
    pub market: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: f64,
    /// Close an existing margin position rather than open a new one
    pub reduce_only: bool,
}

/// Exchange acknowledgement of a placed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenOrder {
    pub id: String,
    pub market: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub remaining: Decimal,
    pub price: f64,
}

impl OpenOrder {
    /// Share of the order still waiting to fill
    pub fn unfilled_ratio(&self) -> Decimal {
        if self.quantity.is_zero() {
            return Decimal::ZERO;
        }
        self.remaining / self.quantity
    }
}

/// Open margin position as reported by the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginPosition {
    pub market: String,
    /// Signed contract count (negative for shorts)
    pub contracts: f64,
    pub entry_price: Option<f64>,
}

impl MarginPosition {
    pub fn is_open(&self) -> bool {
        self.contracts != 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookTop {
    pub price: f64,
    pub size: f64,
}

/// One historical order, used to settle fills after an exit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRecord {
    pub id: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub remaining: Decimal,
    /// Total quote value filled
    pub proceeds: f64,
    pub commission: f64,
}

impl OrderRecord {
    pub fn filled(&self) -> Decimal {
        (self.quantity - self.remaining).max(Decimal::ZERO)
    }
}

/// Order gateway port trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderGateway: Send + Sync {
    async fn place_limit_order(&self, request: LimitOrderRequest) -> Result<OrderAck, GatewayError>;

    async fn cancel_order(&self, market: &str, id: &str) -> Result<(), GatewayError>;

    async fn cancel_all(&self, market: &str) -> Result<(), GatewayError>;

    async fn open_orders(&self, market: &str) -> Result<Vec<OpenOrder>, GatewayError>;

    async fn available_balance(&self, asset: &str) -> Result<Decimal, GatewayError>;

    async fn positions(&self, market: &str) -> Result<Vec<MarginPosition>, GatewayError>;

    async fn book_top(&self, market: &str, side: BookSide) -> Result<BookTop, GatewayError>;

    async fn order_history(&self, market: &str) -> Result<Vec<OrderRecord>, GatewayError>;

    async fn set_leverage(&self, market: &str, leverage: f64) -> Result<(), GatewayError>;
}

/// First open margin position, if any
pub async fn first_open_position(
    gateway: &dyn OrderGateway,
    market: &str,
) -> Result<Option<MarginPosition>, GatewayError> {
    let positions = gateway.positions(market).await?;
    Ok(positions.into_iter().find(|p| p.is_open()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_classify_min_trade_codes() {
        let low = GatewayError::Rejected {
            code: "MIN_TRADE_REQUIREMENT_NOT_MET".into(),
        };
        assert_eq!(
            RejectionKind::classify(&low, &DEFAULT_MIN_TRADE_CODES),
            RejectionKind::AmountTooLow
        );

        let other = GatewayError::Rejected {
            code: "INSUFFICIENT_FUNDS".into(),
        };
        assert_eq!(
            RejectionKind::classify(&other, &DEFAULT_MIN_TRADE_CODES),
            RejectionKind::Unrecognized
        );
        assert_eq!(
            RejectionKind::classify(&GatewayError::Transport("timeout".into()), &DEFAULT_MIN_TRADE_CODES),
            RejectionKind::Unrecognized
        );
    }

    #[test]
    fn test_unfilled_ratio() {
        let order = OpenOrder {
            id: "1".into(),
            market: "BTC-LTC".into(),
            side: OrderSide::Sell,
            quantity: dec!(10),
            remaining: dec!(0.4),
            price: 1.0,
        };
        assert_eq!(order.unfilled_ratio(), dec!(0.04));

        let empty = OpenOrder {
            quantity: dec!(0),
            ..order
        };
        assert_eq!(empty.unfilled_ratio(), dec!(0));
    }

    #[tokio::test]
    async fn test_first_open_position_skips_empty() {
        let mut mock = MockOrderGateway::new();
        mock.expect_positions().returning(|_| {
            Ok(vec![
                MarginPosition {
                    market: "USD-BTC".into(),
                    contracts: 0.0,
                    entry_price: None,
                },
                MarginPosition {
                    market: "USD-BTC".into(),
                    contracts: -500.0,
                    entry_price: Some(9000.0),
                },
            ])
        });

        let position = first_open_position(&mock, "USD-BTC").await.unwrap().unwrap();
        assert_eq!(position.contracts, -500.0);
    }
}
