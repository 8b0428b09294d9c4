//! Shared handles for one position run
//!
//! Bundles the ports with the market, job and settings, and wraps the
//! best-effort calls (notifications, persistence, flag reads) so the loops
//! never have to handle their errors.

use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Direction, MarketInfo, RunMode};
use crate::ports::{CandleQuery, JobId, JobStore, MarketDataPort, Notifier, NotifyKind, OrderGateway, Progress};
use crate::strategy::EngineSettings;

/// The four collaborators the engine talks to
#[derive(Clone)]
pub struct EnginePorts {
    pub market_data: Arc<dyn MarketDataPort>,
    pub gateway: Arc<dyn OrderGateway>,
    pub store: Arc<dyn JobStore>,
    pub notifier: Arc<dyn Notifier>,
}

impl EnginePorts {
    pub fn new(
        market_data: Arc<dyn MarketDataPort>,
        gateway: Arc<dyn OrderGateway>,
        store: Arc<dyn JobStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            market_data,
            gateway,
            store,
            notifier,
        }
    }

    /// Send a notification, logging delivery failures
    pub async fn notify(&self, kind: NotifyKind, text: &str) {
        tracing::info!("[{}] {}", kind, text);
        if let Err(e) = self.notifier.notify(kind, text).await {
            tracing::warn!("Notification dropped: {}", e);
        }
    }
}

/// Everything a controller needs for the current job
#[derive(Clone)]
pub struct EngineContext {
    pub ports: EnginePorts,
    pub market: MarketInfo,
    pub job: JobId,
    pub run_mode: RunMode,
    pub settings: EngineSettings,
}

impl EngineContext {
    pub fn new(ports: EnginePorts, market: MarketInfo, job: JobId, run_mode: RunMode, settings: EngineSettings) -> Self {
        Self {
            ports,
            market,
            job,
            run_mode,
            settings,
        }
    }

    pub fn market_data(&self) -> &dyn MarketDataPort {
        self.ports.market_data.as_ref()
    }

    pub fn gateway(&self) -> &dyn OrderGateway {
        self.ports.gateway.as_ref()
    }

    pub fn store(&self) -> &dyn JobStore {
        self.ports.store.as_ref()
    }

    pub fn contingency(&self) -> f64 {
        self.settings.contingency(self.market.asset_class)
    }

    /// Candle query for this market, honouring the reference market
    pub fn candle_query(&self, interval: &str, direction: Direction) -> CandleQuery {
        CandleQuery::new(&self.market.name, interval, direction).with_reference(self.market.reference.clone())
    }

    /// Market that indicators are read from
    pub fn indicator_market(&self) -> &str {
        self.market.reference.as_deref().unwrap_or(&self.market.name)
    }

    pub async fn notify(&self, kind: NotifyKind, text: &str) {
        self.ports
            .notify(kind, &format!("{}: {}", self.market.name, text))
            .await;
    }

    /// Current average price; `None` when the feed fails this tick
    pub async fn price(&self) -> Option<f64> {
        match self.market_data().average_price(&self.market.name).await {
            Ok(price) if price > 0.0 => Some(price),
            Ok(price) => {
                tracing::warn!("Ignoring non-positive price {} for {}", price, self.market.name);
                None
            }
            Err(e) => {
                tracing::warn!("Price fetch failed for {}: {}", self.market.name, e);
                None
            }
        }
    }

    /// Operator asked to stop this job. Read failures count as "not yet".
    pub async fn cancel_requested(&self) -> bool {
        self.store().cancel_requested(self.job).await.unwrap_or_else(|e| {
            tracing::warn!("Cancel flag read failed: {}", e);
            false
        })
    }

    pub async fn sell_requested(&self) -> bool {
        self.store()
            .sell_requested(&self.market.name)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!("Sell request read failed: {}", e);
                false
            })
    }

    pub async fn clear_sell_request(&self) {
        if let Err(e) = self.store().clear_sell_request(self.job).await {
            tracing::warn!("Could not clear sell request: {}", e);
        }
    }

    pub async fn persist_progress(&self, progress: Progress) {
        if let Err(e) = self.store().persist_progress(self.job, progress).await {
            tracing::warn!("Progress not persisted: {}", e);
        }
    }

    pub async fn persist_stop(&self, stop_price: f64, stop_ratio: f64) {
        if let Err(e) = self.store().persist_stop(self.job, stop_price, stop_ratio).await {
            tracing::warn!("Stop not persisted: {}", e);
        }
    }

    /// Sleep between polls. A zero duration still yields to the runtime.
    pub async fn pause(&self, duration: Duration) {
        if duration.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(duration).await;
        }
    }
}
