use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Direction, RunMode};

pub type JobId = u64;
pub type BuybackId = u64;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Job {0} not found")]
    JobNotFound(JobId),
    #[error("Buyback {0} not found")]
    BuybackNotFound(BuybackId),
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Row describing a running exit job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub market: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub target_price: f64,
    pub stop_price: f64,
    pub run_mode: RunMode,
    pub stop_loss: bool,
}

/// Latest monitoring state of a job
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub price: f64,
    /// Price as a percentage of entry (or of target while mooning)
    pub percent_of: f64,
    pub selling: bool,
    pub mooning: bool,
}

impl Progress {
    pub fn monitoring(price: f64, percent_of: f64) -> Self {
        Self {
            price,
            percent_of,
            selling: false,
            mooning: false,
        }
    }

    pub fn selling(price: f64) -> Self {
        Self {
            price,
            percent_of: 0.0,
            selling: true,
            mooning: false,
        }
    }

    pub fn mooning(price: f64, percent_of: f64) -> Self {
        Self {
            price,
            percent_of,
            selling: false,
            mooning: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuybackRecord {
    pub market: String,
    pub price: f64,
    pub notional: f64,
}

/// Job bookkeeping port. Every call is best effort from the engine's side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn register_job(&self, job: JobRecord) -> Result<JobId, StoreError>;

    async fn remove_job(&self, job: JobId) -> Result<(), StoreError>;

    /// Operator asked the job to stop
    async fn cancel_requested(&self, job: JobId) -> Result<bool, StoreError>;

    /// Operator asked for an immediate sale on `market`
    async fn sell_requested(&self, market: &str) -> Result<bool, StoreError>;

    async fn clear_sell_request(&self, job: JobId) -> Result<(), StoreError>;

    async fn persist_stop(&self, job: JobId, stop_price: f64, stop_ratio: f64) -> Result<(), StoreError>;

    async fn persist_progress(&self, job: JobId, progress: Progress) -> Result<(), StoreError>;

    async fn register_buyback(&self, record: BuybackRecord) -> Result<BuybackId, StoreError>;

    async fn remove_buyback(&self, id: BuybackId) -> Result<(), StoreError>;

    async fn buyback_abort_requested(&self, id: BuybackId) -> Result<bool, StoreError>;

    async fn persist_buyback_price(&self, id: BuybackId, price: f64) -> Result<(), StoreError>;
}
