//! Exit ledger and settlement for spot and margin markets
//!
//! Spot exits trade base-asset quantity and earn `quantity * price`. Margin
//! exits trade contracts, and proceeds depend on how the contract is quoted.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::direction::Direction;

/// How a margin contract converts to quote value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuoteConvention {
    /// Contracts are priced in quote units: value = contracts / price
    Inverse,
    /// Contracts are priced in base units: value = contracts * price
    Linear,
}

impl QuoteConvention {
    pub fn value(self, contracts: f64, price: f64) -> f64 {
        match self {
            QuoteConvention::Inverse => {
                if price == 0.0 {
                    0.0
                } else {
                    contracts / price
                }
            }
            QuoteConvention::Linear => contracts * price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketKind {
    Spot,
    Margin(QuoteConvention),
}

impl MarketKind {
    pub fn is_margin(self) -> bool {
        matches!(self, MarketKind::Margin(_))
    }

    /// Whether settlement value rises with price
    fn value_rises_with_price(self) -> bool {
        !matches!(self, MarketKind::Margin(QuoteConvention::Inverse))
    }
}

impl fmt::Display for MarketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketKind::Spot => write!(f, "spot"),
            MarketKind::Margin(QuoteConvention::Inverse) => write!(f, "margin (inverse)"),
            MarketKind::Margin(QuoteConvention::Linear) => write!(f, "margin (linear)"),
        }
    }
}

/// Running totals of an exit
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExitLedger {
    pub balance_start: Decimal,
    pub value_original: f64,
    pub contracts_start: f64,
    pub proceeds: f64,
    pub commission: f64,
    pub quantity_sold: f64,
    pub submitted_prices: Vec<f64>,
    pub exit_price: Option<f64>,
}

impl ExitLedger {
    pub fn record_submission(&mut self, price: f64) {
        self.submitted_prices.push(price);
    }

    /// Mean of every exit price submitted
    pub fn average_submitted(&self) -> Option<f64> {
        if self.submitted_prices.is_empty() {
            return None;
        }
        Some(self.submitted_prices.iter().sum::<f64>() / self.submitted_prices.len() as f64)
    }

    pub fn record_fill(&mut self, quantity: f64, price: f64, commission: f64) {
        self.proceeds += quantity * price;
        self.quantity_sold += quantity;
        self.commission += commission;
    }

    /// Clear fill totals before recomputing them from order history
    pub fn reset_fills(&mut self) {
        self.proceeds = 0.0;
        self.commission = 0.0;
        self.quantity_sold = 0.0;
    }

    /// Set value at entry from the start balance or contracts
    pub fn set_value_original(&mut self, kind: MarketKind, entry_price: f64) {
        self.value_original = match kind {
            MarketKind::Spot => entry_price * self.balance_start.to_f64().unwrap_or(0.0),
            MarketKind::Margin(convention) => convention.value(self.contracts_start, entry_price),
        };
    }

    /// Settle margin proceeds from the starting contracts and the exit average
    pub fn settle_margin(&mut self, convention: QuoteConvention) {
        if let Some(exit) = self.exit_price.or_else(|| self.average_submitted()) {
            self.exit_price = Some(exit);
            self.proceeds = convention.value(self.contracts_start, exit);
        }
    }

    /// Spot exit price is the quantity-weighted average of fills
    pub fn settle_spot(&mut self) {
        if self.quantity_sold > 0.0 {
            self.exit_price = Some(self.proceeds / self.quantity_sold);
        }
    }

    pub fn has_fills(&self) -> bool {
        self.quantity_sold > 0.0 || (self.contracts_start > 0.0 && self.exit_price.is_some())
    }

    pub fn summary(&self, kind: MarketKind, direction: Direction) -> TradeSummary {
        TradeSummary::new(self, kind, direction)
    }
}

/// Outcome of one exit in quote terms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeSummary {
    pub proceeds: f64,
    pub commission: f64,
    pub quantity_sold: f64,
    pub value_original: f64,
    pub exit_price: Option<f64>,
    pub gain: f64,
    pub gain_pct: f64,
}

impl TradeSummary {
    fn new(ledger: &ExitLedger, kind: MarketKind, direction: Direction) -> Self {
        let diff = ledger.proceeds - ledger.value_original;
        // Inverse contracts gain value as price falls.
        let profit_sign = if kind.value_rises_with_price() {
            direction.sign()
        } else {
            -direction.sign()
        };
        let gain = profit_sign * diff - ledger.commission;
        let gain_pct = if ledger.value_original != 0.0 {
            100.0 * gain / ledger.value_original
        } else {
            0.0
        };
        Self {
            proceeds: ledger.proceeds,
            commission: ledger.commission,
            quantity_sold: ledger.quantity_sold,
            value_original: ledger.value_original,
            exit_price: ledger.exit_price,
            gain,
            gain_pct,
        }
    }

    pub fn verdict(&self) -> &'static str {
        if self.gain >= 0.0 {
            "gained"
        } else {
            "lost"
        }
    }
}

impl fmt::Display for TradeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "proceeds {:.8}, commission {:.8}, {} {:.8} ({:.2}%)",
            self.proceeds,
            self.commission,
            self.verdict(),
            self.gain.abs(),
            self.gain_pct
        )?;
        if let Some(exit) = self.exit_price {
            write!(f, ", exit {:.8}", exit)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    #[test]
    fn test_margin_proceeds_per_convention() {
        assert_relative_eq!(QuoteConvention::Inverse.value(1000.0, 50.0), 20.0);
        assert_relative_eq!(QuoteConvention::Linear.value(1000.0, 50.0), 50_000.0);
        assert_eq!(QuoteConvention::Inverse.value(1000.0, 0.0), 0.0);
    }

    #[test]
    fn test_spot_proceeds_sum_tranches() {
        let mut ledger = ExitLedger {
            balance_start: dec!(100),
            ..Default::default()
        };
        ledger.set_value_original(MarketKind::Spot, 0.0017);
        ledger.record_fill(60.0, 0.0015, 0.0);
        ledger.record_fill(40.0, 0.00149, 0.0);
        ledger.settle_spot();

        assert_relative_eq!(ledger.proceeds, 60.0 * 0.0015 + 40.0 * 0.00149, epsilon = 1e-12);
        assert_relative_eq!(ledger.exit_price.unwrap(), 0.001496, epsilon = 1e-12);
        assert_relative_eq!(ledger.value_original, 0.17, epsilon = 1e-12);

        let summary = ledger.summary(MarketKind::Spot, Direction::Long);
        assert!(summary.gain < 0.0);
        assert_eq!(summary.verdict(), "lost");
    }

    #[test]
    fn test_margin_settlement_uses_submitted_average() {
        let mut ledger = ExitLedger {
            contracts_start: 1000.0,
            ..Default::default()
        };
        ledger.record_submission(40.0);
        ledger.record_submission(60.0);
        ledger.settle_margin(QuoteConvention::Inverse);

        assert_eq!(ledger.exit_price, Some(50.0));
        assert_relative_eq!(ledger.proceeds, 20.0);
    }

    #[test]
    fn test_short_gain_sign() {
        // Linear short: price fell from 100 to 80
        let mut ledger = ExitLedger {
            contracts_start: 10.0,
            ..Default::default()
        };
        ledger.set_value_original(MarketKind::Margin(QuoteConvention::Linear), 100.0);
        ledger.exit_price = Some(80.0);
        ledger.settle_margin(QuoteConvention::Linear);
        let summary = ledger.summary(MarketKind::Margin(QuoteConvention::Linear), Direction::Short);
        assert_relative_eq!(summary.gain, 200.0);
        assert_relative_eq!(summary.gain_pct, 20.0);

        // Inverse short: price fell from 100 to 80, each contract is worth more base
        let mut ledger = ExitLedger {
            contracts_start: 1000.0,
            ..Default::default()
        };
        let kind = MarketKind::Margin(QuoteConvention::Inverse);
        ledger.set_value_original(kind, 100.0);
        ledger.exit_price = Some(80.0);
        ledger.settle_margin(QuoteConvention::Inverse);
        let summary = ledger.summary(kind, Direction::Short);
        assert_relative_eq!(summary.gain, 2.5, epsilon = 1e-9);
        assert_eq!(summary.verdict(), "gained");

        // Same move is a loss for an inverse long
        let summary = ledger.summary(kind, Direction::Long);
        assert_relative_eq!(summary.gain, -2.5, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_value_original() {
        let ledger = ExitLedger::default();
        let summary = ledger.summary(MarketKind::Spot, Direction::Long);
        assert_eq!(summary.gain_pct, 0.0);
        assert!(!ledger.has_fills());
    }
}
