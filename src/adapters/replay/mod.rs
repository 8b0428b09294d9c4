//! Replay market data
//!
//! Serves a recorded script instead of a live provider. Prices and extreme
//! samples are consumed in order and the last one repeats once the script
//! runs out. Candles and momentum are fixed per interval.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;

use crate::domain::{Bar, BarSeries};
use crate::ports::{CandleQuery, ExtremeSample, MarketDataError, MarketDataPort};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Failed to read replay file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse replay file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Replay script has no prices")]
    NoPrices,
}

/// Recorded market for one run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayScript {
    pub prices: Vec<f64>,
    /// Bars per interval, oldest first
    pub candles: HashMap<String, Vec<Bar>>,
    /// RSI per interval
    pub momentum: HashMap<String, f64>,
    /// (low, high) per sub-interval sample
    pub extremes: Vec<(f64, f64)>,
}

#[derive(Debug)]
pub struct ReplayMarketData {
    script: ReplayScript,
    price_cursor: AtomicUsize,
    sample_cursor: AtomicUsize,
}

impl ReplayMarketData {
    pub fn new(script: ReplayScript) -> Result<Self, ReplayError> {
        if script.prices.is_empty() {
            return Err(ReplayError::NoPrices);
        }
        Ok(Self {
            script,
            price_cursor: AtomicUsize::new(0),
            sample_cursor: AtomicUsize::new(0),
        })
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ReplayError> {
        let content = std::fs::read_to_string(path)?;
        Self::new(serde_json::from_str(&content)?)
    }

    /// Next scripted item, repeating the last one when exhausted
    fn next<T: Copy>(items: &[T], cursor: &AtomicUsize) -> Option<T> {
        let index = cursor.fetch_add(1, Ordering::SeqCst);
        items.get(index.min(items.len().saturating_sub(1))).copied()
    }

    /// Price most recently served
    fn current_price(&self) -> f64 {
        let served = self.price_cursor.load(Ordering::SeqCst).max(1);
        let index = (served - 1).min(self.script.prices.len() - 1);
        self.script.prices[index]
    }
}

#[async_trait]
impl MarketDataPort for ReplayMarketData {
    async fn average_price(&self, market: &str) -> Result<f64, MarketDataError> {
        Self::next(&self.script.prices, &self.price_cursor)
            .ok_or_else(|| MarketDataError::Unavailable(market.to_string()))
    }

    async fn candles(&self, query: &CandleQuery) -> Result<Option<BarSeries>, MarketDataError> {
        let Some(bars) = self.script.candles.get(&query.interval) else {
            return Ok(None);
        };
        if bars.len() < query.min_bars {
            tracing::debug!(
                "Replay has {} {} bars, query wants {}",
                bars.len(),
                query.interval,
                query.min_bars
            );
            return Ok(None);
        }
        Ok(BarSeries::new(bars.clone()).ok())
    }

    async fn momentum(&self, market: &str, interval: &str) -> Result<f64, MarketDataError> {
        self.script
            .momentum
            .get(interval)
            .copied()
            .ok_or_else(|| MarketDataError::Unavailable(format!("{} RSI {}", market, interval)))
    }

    async fn sample_extremes(&self, _market: &str, reference: f64) -> Result<ExtremeSample, MarketDataError> {
        match Self::next(&self.script.extremes, &self.sample_cursor) {
            Some((low, high)) => Ok(ExtremeSample::new(low, high, reference)),
            None => {
                let price = self.current_price();
                Ok(ExtremeSample::new(price, price, reference))
            }
        }
    }
}
