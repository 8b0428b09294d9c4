//! In-memory job store
//!
//! Holds jobs and buybacks behind a mutex. The operator side (cancel, sell
//! and abort requests) is exposed as plain methods so a front end or a test
//! can drive the engine.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::ports::{BuybackId, BuybackRecord, JobId, JobRecord, JobStore, Progress, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobEntry {
    pub record: JobRecord,
    pub cancel: bool,
    pub stop: Option<(f64, f64)>,
    pub progress: Option<Progress>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuybackEntry {
    pub record: BuybackRecord,
    pub abort: bool,
    pub last_price: Option<f64>,
}

/// Serialisable view of the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub jobs: BTreeMap<JobId, JobEntry>,
    pub buybacks: BTreeMap<BuybackId, BuybackEntry>,
    pub sell_requests: Vec<String>,
    pub removed_jobs: Vec<JobId>,
}

#[derive(Debug, Default)]
struct StoreState {
    jobs: BTreeMap<JobId, JobEntry>,
    buybacks: BTreeMap<BuybackId, BuybackEntry>,
    sell_requests: HashSet<String>,
    removed_jobs: Vec<JobId>,
    next_job: JobId,
    next_buyback: BuybackId,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryJobStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn request_cancel(&self, job: JobId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state.jobs.get_mut(&job).ok_or(StoreError::JobNotFound(job))?;
        entry.cancel = true;
        Ok(())
    }

    pub async fn request_sell(&self, market: &str) {
        self.state.lock().await.sell_requests.insert(market.to_string());
    }

    pub async fn abort_buyback(&self, id: BuybackId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state.buybacks.get_mut(&id).ok_or(StoreError::BuybackNotFound(id))?;
        entry.abort = true;
        Ok(())
    }

    pub async fn job(&self, job: JobId) -> Option<JobEntry> {
        self.state.lock().await.jobs.get(&job).cloned()
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        let state = self.state.lock().await;
        let mut sell_requests: Vec<String> = state.sell_requests.iter().cloned().collect();
        sell_requests.sort();
        StoreSnapshot {
            jobs: state.jobs.clone(),
            buybacks: state.buybacks.clone(),
            sell_requests,
            removed_jobs: state.removed_jobs.clone(),
        }
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn register_job(&self, job: JobRecord) -> Result<JobId, StoreError> {
        let mut state = self.state.lock().await;
        state.next_job += 1;
        let id = state.next_job;
        state.jobs.insert(
            id,
            JobEntry {
                record: job,
                cancel: false,
                stop: None,
                progress: None,
            },
        );
        Ok(id)
    }

    async fn remove_job(&self, job: JobId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state.jobs.remove(&job).ok_or(StoreError::JobNotFound(job))?;
        state.removed_jobs.push(job);
        Ok(())
    }

    async fn cancel_requested(&self, job: JobId) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(&job)
            .map(|e| e.cancel)
            .ok_or(StoreError::JobNotFound(job))
    }

    async fn sell_requested(&self, market: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.sell_requests.contains(market))
    }

    async fn clear_sell_request(&self, job: JobId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let market = state
            .jobs
            .get(&job)
            .map(|e| e.record.market.clone())
            .ok_or(StoreError::JobNotFound(job))?;
        state.sell_requests.remove(&market);
        Ok(())
    }

    async fn persist_stop(&self, job: JobId, stop_price: f64, stop_ratio: f64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state.jobs.get_mut(&job).ok_or(StoreError::JobNotFound(job))?;
        entry.stop = Some((stop_price, stop_ratio));
        Ok(())
    }

    async fn persist_progress(&self, job: JobId, progress: Progress) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state.jobs.get_mut(&job).ok_or(StoreError::JobNotFound(job))?;
        entry.progress = Some(progress);
        Ok(())
    }

    async fn register_buyback(&self, record: BuybackRecord) -> Result<BuybackId, StoreError> {
        let mut state = self.state.lock().await;
        state.next_buyback += 1;
        let id = state.next_buyback;
        state.buybacks.insert(
            id,
            BuybackEntry {
                record,
                abort: false,
                last_price: None,
            },
        );
        Ok(id)
    }

    async fn remove_buyback(&self, id: BuybackId) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        state
            .buybacks
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::BuybackNotFound(id))
    }

    async fn buyback_abort_requested(&self, id: BuybackId) -> Result<bool, StoreError> {
        let state = self.state.lock().await;
        state
            .buybacks
            .get(&id)
            .map(|e| e.abort)
            .ok_or(StoreError::BuybackNotFound(id))
    }

    async fn persist_buyback_price(&self, id: BuybackId, price: f64) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state.buybacks.get_mut(&id).ok_or(StoreError::BuybackNotFound(id))?;
        entry.last_price = Some(price);
        Ok(())
    }
}
