//! Exit Cycle Integration Tests
//!
//! Runs whole position cycles against the in-process adapters:
//! 1. Spot stop-loss confirmed by rolling extrema, then a long buyback
//! 2. Minimum-trade rejection suppresses the buyback
//! 3. Operator sell request with the stop-loss off, buyback aborted
//! 4. Linear margin short stopped out and re-entered short
//! 5. Shutdown while monitoring
//!
//! Everything is deterministic: replayed prices, paper fills, no delays.

use approx::assert_relative_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

use exitbot::adapters::{LogNotifier, MemoryJobStore, PaperGateway, ReplayMarketData, ReplayScript};
use exitbot::application::{CycleRequest, EnginePorts, PositionCycle, SaleLimits};
use exitbot::domain::{
    Direction, EntryMode, ExitDecision, MarketInfo, MarketKind, QuoteConvention, RunMode, SaleStatus, StoppedMode,
    TradeParams,
};
use exitbot::ports::{MarketDataPort, NotifyKind};
use exitbot::strategy::EngineSettings;

// ============================================================================
// Test Fixtures
// ============================================================================

struct Harness {
    paper: PaperGateway,
    store: MemoryJobStore,
    notifier: LogNotifier,
    ports: EnginePorts,
}

fn harness(script: ReplayScript, min_trade: Decimal) -> Harness {
    let feed: Arc<dyn MarketDataPort> = Arc::new(ReplayMarketData::new(script).unwrap());
    let paper = PaperGateway::new(feed.clone(), 0.0025).with_min_trade(min_trade);
    let store = MemoryJobStore::new();
    let notifier = LogNotifier::new();
    let ports = EnginePorts::new(
        feed,
        Arc::new(paper.clone()),
        Arc::new(store.clone()),
        Arc::new(notifier.clone()),
    );
    Harness {
        paper,
        store,
        notifier,
        ports,
    }
}

fn settings() -> EngineSettings {
    EngineSettings::default().without_delays()
}

/// BTC-LTC long bought at 0.0017, target 0.0021, stop 0.0015
fn ltc_request(run_mode: RunMode) -> CycleRequest {
    CycleRequest {
        market: MarketInfo::parse("BTC-LTC", MarketKind::Spot).unwrap(),
        params: TradeParams::new(0.0017, 0.0021, 0.0015).unwrap(),
        run_mode,
        limits: SaleLimits::for_run(run_mode, None, None),
    }
}

/// Price dips through the stop and stays there
fn stop_script(extremes: Vec<(f64, f64)>) -> ReplayScript {
    ReplayScript {
        prices: vec![0.0016, 0.0014],
        extremes,
        ..Default::default()
    }
}

/// Highs falling under the 0.0015 stop: confirms a long breach in three samples
const FALLING_HIGHS: [(f64, f64); 3] = [(0.00138, 0.00149), (0.00137, 0.00148), (0.00136, 0.00147)];

/// Wait until the cycle has registered its job
async fn wait_for_job(store: &MemoryJobStore) -> u64 {
    loop {
        if let Some(id) = store.snapshot().await.jobs.keys().next().copied() {
            return id;
        }
        tokio::task::yield_now().await;
    }
}

// ============================================================================
// Spot exits
// ============================================================================

#[tokio::test]
async fn test_spot_stop_loss_then_long_buyback() {
    let mut extremes = FALLING_HIGHS.to_vec();
    // Rising lows crossing the buyback price
    extremes.extend([
        (0.00130, 0.00146),
        (0.00131, 0.00146),
        (0.00132, 0.00146),
        (0.00133, 0.00146),
        (0.00134, 0.00146),
    ]);
    let h = harness(stop_script(extremes), Decimal::ZERO);
    h.paper.deposit("LTC", dec!(100)).await;

    let outcome = PositionCycle::new(h.ports.clone(), settings(), ltc_request(RunMode::Simulation))
        .run(std::future::pending())
        .await
        .unwrap();

    let exit = outcome.exit.clone().unwrap();
    assert_eq!(exit.decision, ExitDecision::StopLoss);
    assert_eq!(exit.status, Some(SaleStatus::Completed));
    assert_eq!(exit.mode, StoppedMode::PreProfit);
    assert_eq!(outcome.status_tag(), "stop");

    // 100 LTC sold at 0.0014
    assert_relative_eq!(outcome.summary.proceeds, 0.14, epsilon = 1e-12);
    assert_relative_eq!(outcome.summary.commission, 0.00035, epsilon = 1e-12);
    assert_relative_eq!(outcome.summary.exit_price.unwrap(), 0.0014, epsilon = 1e-12);
    assert!(outcome.summary.gain < 0.0);
    assert_eq!(h.paper.balance("LTC").await, Decimal::ZERO);

    // Re-entry slightly under the exit
    let reference = outcome.buyback_price.unwrap();
    assert_relative_eq!(reference, 0.0014 * 0.9975, epsilon = 1e-12);
    let plan = outcome.reentry.unwrap();
    assert_eq!(plan.direction, Direction::Long);
    assert_eq!(plan.entry_mode, EntryMode::Reg);
    assert_relative_eq!(plan.notional, 100.0 * reference * 0.9975, epsilon = 1e-12);

    // Without candles the flip is assumed
    assert!(!h.notifier.messages_of(NotifyKind::Status).await.is_empty());
    assert_eq!(h.notifier.messages_of(NotifyKind::Finished).await.len(), 1);

    let snapshot = h.store.snapshot().await;
    assert!(snapshot.jobs.is_empty());
    assert_eq!(snapshot.removed_jobs, vec![1]);
    assert!(snapshot.buybacks.is_empty());
}

#[tokio::test]
async fn test_min_trade_rejection_suppresses_buyback() {
    let h = harness(stop_script(FALLING_HIGHS.to_vec()), dec!(1000));
    h.paper.deposit("LTC", dec!(100)).await;

    let outcome = PositionCycle::new(h.ports.clone(), settings(), ltc_request(RunMode::Simulation))
        .run(std::future::pending())
        .await
        .unwrap();

    assert_eq!(outcome.status_tag(), "err_low");
    assert_eq!(outcome.buyback_price, None);
    assert_eq!(outcome.reentry, None);
    assert_eq!(outcome.summary.quantity_sold, 0.0);
    assert_eq!(h.paper.balance("LTC").await, dec!(100));

    let errors = h.notifier.messages_of(NotifyKind::Error).await;
    assert!(errors.iter().any(|m| m.contains("too small")));
    assert!(h.notifier.messages_of(NotifyKind::Buyback).await.is_empty());
}

#[tokio::test]
async fn test_sell_request_without_stop_loss() {
    // Highs never reach the exit price, so the buyback never fires
    let script = stop_script(vec![(0.00130, 0.00135)]);
    let h = harness(script, Decimal::ZERO);
    h.paper.deposit("LTC", dec!(100)).await;

    let store = h.store.clone();
    let operator = tokio::spawn(async move {
        wait_for_job(&store).await;
        store.request_sell("BTC-LTC").await;
        loop {
            if let Some(id) = store.snapshot().await.buybacks.keys().next().copied() {
                store.abort_buyback(id).await.unwrap();
                return;
            }
            tokio::task::yield_now().await;
        }
    });

    let outcome = PositionCycle::new(h.ports.clone(), settings(), ltc_request(RunMode::SimulationNoStop))
        .run(std::future::pending())
        .await
        .unwrap();
    operator.await.unwrap();

    let exit = outcome.exit.clone().unwrap();
    assert_eq!(exit.decision, ExitDecision::ExternalSellRequest);
    assert_eq!(exit.mode, StoppedMode::Manual);
    assert_eq!(outcome.status_tag(), "stop");

    // Manual exits buy back at the exit price
    assert_relative_eq!(outcome.buyback_price.unwrap(), 0.0014, epsilon = 1e-12);
    assert_eq!(outcome.reentry, None);

    let snapshot = h.store.snapshot().await;
    assert!(snapshot.sell_requests.is_empty());
    assert!(snapshot.buybacks.is_empty());
}

// ============================================================================
// Margin exits
// ============================================================================

#[tokio::test]
async fn test_linear_short_stopped_and_reentered() {
    let script = ReplayScript {
        prices: vec![2050.0, 2150.0],
        extremes: vec![
            // Rising lows above the 2100 stop
            (2110.0, 2160.0),
            (2120.0, 2170.0),
            (2130.0, 2180.0),
            // Rolling over around the buyback price
            (2154.0, 2160.0),
            (2153.0, 2159.0),
            (2152.0, 2158.0),
            (2151.0, 2157.0),
            (2150.0, 2156.0),
        ],
        ..Default::default()
    };
    let h = harness(script, Decimal::ZERO);
    h.paper.open_position("USDT-ETH", -10.0, 2000.0).await;

    let request = CycleRequest {
        market: MarketInfo::parse("USDT-ETH", MarketKind::Margin(QuoteConvention::Linear)).unwrap(),
        params: TradeParams::new(2000.0, 1800.0, 2100.0).unwrap(),
        run_mode: RunMode::Simulation,
        limits: SaleLimits::for_run(RunMode::Simulation, None, None),
    };
    let outcome = PositionCycle::new(h.ports.clone(), settings(), request)
        .run(std::future::pending())
        .await
        .unwrap();

    let exit = outcome.exit.clone().unwrap();
    assert_eq!(exit.decision, ExitDecision::StopLoss);
    assert_eq!(outcome.status_tag(), "stop");
    assert_eq!(h.paper.leverage("USDT-ETH").await, Some(5.0));

    // 10 contracts bought back at 2150
    assert_relative_eq!(outcome.summary.proceeds, 21500.0, epsilon = 1e-9);
    assert_relative_eq!(outcome.summary.value_original, 20000.0, epsilon = 1e-9);
    assert!(outcome.summary.gain < -1500.0);

    let reference = outcome.buyback_price.unwrap();
    assert_relative_eq!(reference, 2150.0 * 1.0025, epsilon = 1e-9);
    let plan = outcome.reentry.unwrap();
    assert_eq!(plan.direction, Direction::Short);
    assert_relative_eq!(plan.notional, -4300.0, epsilon = 1e-9);
    assert_relative_eq!(plan.target_price, reference / 0.9, epsilon = 1e-9);
    assert_relative_eq!(plan.stop_price, reference * 1.04, epsilon = 1e-9);
}

// ============================================================================
// Interrupts
// ============================================================================

#[tokio::test]
async fn test_shutdown_while_monitoring() {
    let script = ReplayScript {
        prices: vec![0.0016],
        ..Default::default()
    };
    let h = harness(script, Decimal::ZERO);
    h.paper.deposit("LTC", dec!(100)).await;

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let store = h.store.clone();
    tokio::spawn(async move {
        wait_for_job(&store).await;
        let _ = tx.send(());
    });

    let outcome = PositionCycle::new(h.ports.clone(), settings(), ltc_request(RunMode::Simulation))
        .run(async {
            let _ = rx.await;
        })
        .await
        .unwrap();

    assert!(outcome.interrupted());
    assert_eq!(outcome.status_tag(), "interrupted");
    assert_eq!(outcome.summary.quantity_sold, 0.0);
    assert_eq!(h.paper.balance("LTC").await, dec!(100));
    assert_eq!(h.store.snapshot().await.removed_jobs, vec![1]);
}
