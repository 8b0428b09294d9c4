//! Market naming and asset classes

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::accounting::MarketKind;

/// Alts with enough depth to use the mid-cap profile
const MID_CAP_ALTS: [&str; 4] = ["XMR", "DASH", "ETH", "LTC"];

#[derive(Debug, Error, PartialEq)]
pub enum MarketError {
    #[error("Invalid market name '{0}'")]
    InvalidName(String),
}

/// Volatility profile of the traded asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetClass {
    Btc,
    AltMid,
    AltVolatile,
}

impl AssetClass {
    pub fn of(currency: &str) -> Self {
        let currency = currency.to_uppercase();
        if currency == "BTC" {
            AssetClass::Btc
        } else if MID_CAP_ALTS.contains(&currency.as_str()) {
            AssetClass::AltMid
        } else {
            AssetClass::AltVolatile
        }
    }
}

/// A market such as `BTC-LTC` (quote `BTC`, traded asset `LTC`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketInfo {
    pub name: String,
    /// Quote asset the position is valued in
    pub trade: String,
    /// Asset held by the position
    pub currency: String,
    pub kind: MarketKind,
    pub asset_class: AssetClass,
    /// Market to take candles from instead of this one
    pub reference: Option<String>,
}

impl MarketInfo {
    /// Parse `QUOTE-ASSET`. A bare symbol is treated as quoted in BTC.
    pub fn parse(name: &str, kind: MarketKind) -> Result<Self, MarketError> {
        let name = name.trim().to_uppercase();
        if name.is_empty() || name.split('-').any(str::is_empty) || name.matches('-').count() > 1 {
            return Err(MarketError::InvalidName(name));
        }
        let (trade, currency) = match name.split_once('-') {
            Some((trade, currency)) => (trade.to_string(), currency.to_string()),
            None => ("BTC".to_string(), name.clone()),
        };
        let asset_class = AssetClass::of(&currency);
        Ok(Self {
            name,
            trade,
            currency,
            kind,
            asset_class,
            reference: None,
        })
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference = reference;
        self
    }

    pub fn is_btc(&self) -> bool {
        self.asset_class == AssetClass::Btc
    }

    /// Shorts can only be re-entered where the venue supports them
    pub fn allows_short(&self) -> bool {
        self.kind.is_margin()
    }
}
