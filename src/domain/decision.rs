//! Exit decisions, sale outcomes and how each outcome resolves the run

use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason a monitoring tick handed the position to the sale executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitDecision {
    StopLoss,
    ExtremeBreach,
    ExhaustionSignal,
    RsiExtreme,
    TrailingStop,
    TakeProfit,
    ExternalSellRequest,
    ExternalCancel,
}

impl ExitDecision {
    /// Decisions raised by the operator rather than by price
    pub fn is_manual(self) -> bool {
        matches!(self, ExitDecision::ExternalSellRequest | ExitDecision::ExternalCancel)
    }
}

impl fmt::Display for ExitDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExitDecision::StopLoss => "stop-loss",
            ExitDecision::ExtremeBreach => "extreme-breach",
            ExitDecision::ExhaustionSignal => "exhaustion-signal",
            ExitDecision::RsiExtreme => "rsi-extreme",
            ExitDecision::TrailingStop => "trailing-stop",
            ExitDecision::TakeProfit => "take-profit",
            ExitDecision::ExternalSellRequest => "external-sell-request",
            ExitDecision::ExternalCancel => "external-cancel",
        };
        write!(f, "{}", s)
    }
}

/// Terminal status of a sale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SaleStatus {
    /// Remaining balance is at or below the dust threshold
    Completed,
    /// Exchange rejected a tranche as below its minimum trade size
    AmountTooLow,
    /// Placement failed without a recognisable answer
    UnrecognizedResponse,
    /// Operator cancelled while selling
    Aborted,
}

impl SaleStatus {
    /// Short tag recorded with the job
    pub fn as_str(self) -> &'static str {
        match self {
            SaleStatus::Completed => "stop",
            SaleStatus::AmountTooLow => "err_low",
            SaleStatus::UnrecognizedResponse => "no_idea",
            SaleStatus::Aborted => "abort_telegram",
        }
    }

    pub fn resolution(self) -> Resolution {
        match self {
            SaleStatus::Completed => Resolution {
                message: "Finishing up normally",
                cancel_orders: false,
                notify: false,
                cancel_buyback: false,
            },
            SaleStatus::AmountTooLow => Resolution {
                message: "Trade amount was too small and returned error, finishing up",
                cancel_orders: true,
                notify: true,
                cancel_buyback: true,
            },
            SaleStatus::UnrecognizedResponse => Resolution {
                message: "Sell calls did not return proper answer, aborting",
                cancel_orders: true,
                notify: true,
                cancel_buyback: true,
            },
            SaleStatus::Aborted => Resolution {
                message: "Aborted as requested",
                cancel_orders: true,
                notify: false,
                cancel_buyback: true,
            },
        }
    }
}

impl fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What the caller does after a sale finishes. Every status ends the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub message: &'static str,
    pub cancel_orders: bool,
    pub notify: bool,
    pub cancel_buyback: bool,
}

/// Which buyback price rule applies after the exit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoppedMode {
    PreProfit,
    PostProfit,
    Manual,
}

impl fmt::Display for StoppedMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoppedMode::PreProfit => write!(f, "pre-profit"),
            StoppedMode::PostProfit => write!(f, "post-profit"),
            StoppedMode::Manual => write!(f, "manual"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tags() {
        assert_eq!(SaleStatus::Completed.as_str(), "stop");
        assert_eq!(SaleStatus::AmountTooLow.as_str(), "err_low");
        assert_eq!(SaleStatus::UnrecognizedResponse.as_str(), "no_idea");
        assert_eq!(SaleStatus::Aborted.to_string(), "abort_telegram");
    }

    #[test]
    fn test_resolutions() {
        let done = SaleStatus::Completed.resolution();
        assert!(!done.cancel_orders);
        assert!(!done.cancel_buyback);

        for status in [SaleStatus::AmountTooLow, SaleStatus::UnrecognizedResponse, SaleStatus::Aborted] {
            let r = status.resolution();
            assert!(r.cancel_orders, "{} should cancel orders", status);
            assert!(r.cancel_buyback, "{} should suppress buyback", status);
        }
        assert!(SaleStatus::AmountTooLow.resolution().notify);
        assert!(!SaleStatus::Aborted.resolution().notify);
    }

    #[test]
    fn test_decision_kinds() {
        assert!(ExitDecision::ExternalCancel.is_manual());
        assert!(ExitDecision::ExternalSellRequest.is_manual());
        assert!(!ExitDecision::StopLoss.is_manual());
        assert_eq!(ExitDecision::TakeProfit.to_string(), "take-profit");
    }
}
