use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{BarSeries, Direction};

/// Market data error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("Market unavailable: {0}")]
    Unavailable(String),

    #[error("REST API error: {0}")]
    RestError(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),
}

/// Candle query parameters
#[derive(Debug, Clone, PartialEq)]
pub struct CandleQuery {
    pub market: String,
    /// Bar interval, e.g. "4h", "1h", "15min"
    pub interval: String,
    /// How far back the provider may look, in minutes
    pub lookback_minutes: u32,
    /// Fewer bars than this means "unavailable"
    pub min_bars: usize,
    pub direction: Direction,
    /// Take bars from another market when the traded one has thin history
    pub reference_market: Option<String>,
}

impl CandleQuery {
    pub const DEFAULT_LOOKBACK: u32 = 35_000;
    pub const DEFAULT_MIN_BARS: usize = 15;

    pub fn new(market: impl Into<String>, interval: impl Into<String>, direction: Direction) -> Self {
        Self {
            market: market.into(),
            interval: interval.into(),
            lookback_minutes: Self::DEFAULT_LOOKBACK,
            min_bars: Self::DEFAULT_MIN_BARS,
            direction,
            reference_market: None,
        }
    }

    pub fn with_lookback(mut self, minutes: u32) -> Self {
        self.lookback_minutes = minutes;
        self
    }

    pub fn with_min_bars(mut self, bars: usize) -> Self {
        self.min_bars = bars;
        self
    }

    pub fn with_reference(mut self, reference: Option<String>) -> Self {
        self.reference_market = reference;
        self
    }
}

/// Extremes of one short sub-interval relative to a reference price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExtremeSample {
    pub low: f64,
    pub high: f64,
    /// The sub-interval traded through the reference price
    pub crossed: bool,
}

impl ExtremeSample {
    pub fn new(low: f64, high: f64, reference: f64) -> Self {
        Self {
            low,
            high,
            crossed: low <= reference && reference <= high,
        }
    }

    /// The extreme that moves against `direction` (high for long, low for short)
    pub fn adverse_extreme(&self, direction: Direction) -> f64 {
        match direction {
            Direction::Long => self.high,
            Direction::Short => self.low,
        }
    }
}

/// Market data port trait
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MarketDataPort: Send + Sync {
    /// Volume-weighted average of recent trades
    async fn average_price(&self, market: &str) -> Result<f64, MarketDataError>;

    /// TD-annotated bars. `Ok(None)` when the provider has no usable series.
    async fn candles(&self, query: &CandleQuery) -> Result<Option<BarSeries>, MarketDataError>;

    /// Latest RSI value on `interval`
    async fn momentum(&self, market: &str, interval: &str) -> Result<f64, MarketDataError>;

    /// Sample one sub-interval and report its low/high against `reference`.
    ///
    /// Implementations block for the length of the sub-interval.
    async fn sample_extremes(&self, market: &str, reference: f64) -> Result<ExtremeSample, MarketDataError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_crossed() {
        assert!(ExtremeSample::new(9.0, 11.0, 10.0).crossed);
        assert!(ExtremeSample::new(10.0, 11.0, 10.0).crossed);
        assert!(!ExtremeSample::new(10.5, 11.0, 10.0).crossed);
    }

    #[test]
    fn test_adverse_extreme() {
        let sample = ExtremeSample::new(9.0, 11.0, 10.0);
        assert_eq!(sample.adverse_extreme(Direction::Long), 11.0);
        assert_eq!(sample.adverse_extreme(Direction::Short), 9.0);
    }

    #[test]
    fn test_query_builder() {
        let query = CandleQuery::new("BTC-LTC", "4h", Direction::Long)
            .with_lookback(60_000)
            .with_reference(Some("USDT-LTC".to_string()));
        assert_eq!(query.lookback_minutes, 60_000);
        assert_eq!(query.min_bars, CandleQuery::DEFAULT_MIN_BARS);
        assert_eq!(query.reference_market.as_deref(), Some("USDT-LTC"));
    }

    #[tokio::test]
    async fn test_mock_port_returns_unavailable() {
        let mut mock = MockMarketDataPort::new();
        mock.expect_candles().returning(|_| Ok(None));
        mock.expect_average_price()
            .returning(|_| Err(MarketDataError::Unavailable("maintenance".into())));

        let query = CandleQuery::new("BTC-LTC", "4h", Direction::Long);
        assert!(mock.candles(&query).await.unwrap().is_none());
        assert!(mock.average_price("BTC-LTC").await.is_err());
    }
}
