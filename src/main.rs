//! exitbot - Position exit and re-entry engine
//!
//! Runs one exit cycle in simulation against the paper gateway, driven by a
//! replayed market.

use anyhow::{bail, Context, Result};
use clap::Parser;
use rust_decimal::prelude::*;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use exitbot::adapters::cli::{CheckCmd, CliApp, Command, RunCmd};
use exitbot::adapters::store::save_plan;
use exitbot::adapters::{LogNotifier, MemoryJobStore, PaperGateway, ReplayMarketData};
use exitbot::application::{CycleRequest, EnginePorts, PositionCycle, SaleLimits};
use exitbot::config::{load_config, Config};
use exitbot::domain::{MarketInfo, MarketKind, QuoteConvention, TradeParams};
use exitbot::ports::MarketDataPort;
use exitbot::strategy::EngineSettings;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if it exists
    dotenvy::dotenv().ok();

    let app = CliApp::parse();

    match app.command {
        Command::Run(cmd) => run_command(cmd, app.verbose, app.debug).await,
        Command::Check(cmd) => check_command(cmd, app.verbose, app.debug),
    }
}

fn init_logging(verbose: bool, debug: bool, level: &str) -> Result<()> {
    let filter = if debug {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    };

    fmt().with_env_filter(filter).with_target(false).init();
    Ok(())
}

/// Config file if present, defaults otherwise
fn load_or_default(path: &Path) -> Result<(Config, bool)> {
    let expanded = shellexpand::tilde(&path.to_string_lossy()).to_string();
    if !Path::new(&expanded).exists() {
        return Ok((Config::default(), false));
    }
    let config = load_config(&expanded).context("Failed to load configuration")?;
    Ok((config, true))
}

async fn run_command(cmd: RunCmd, verbose: bool, debug: bool) -> Result<()> {
    let (mut config, loaded) = load_or_default(&cmd.config)?;
    init_logging(verbose, debug, &config.logging.level)?;
    if !loaded {
        tracing::warn!("Config {} not found, using defaults", cmd.config.display());
    }

    if !cmd.mode.is_simulation() {
        bail!(
            "Run mode '{}' needs an exchange connector; this build only runs simulation modes (s, sns)",
            cmd.mode
        );
    }

    let kind = MarketKind::from(cmd.kind);
    let market = MarketInfo::parse(&cmd.market, kind)
        .context("Invalid market")?
        .with_reference(cmd.reference.clone());
    let params = TradeParams::new(cmd.entry, cmd.target, cmd.stop).context("Invalid trade parameters")?;

    if let Some(speedrun) = cmd.speedrun {
        config.engine.speedrun = speedrun;
        config.validate().context("Invalid speedrun")?;
    }
    let settings = EngineSettings::from(&config);

    let feed: Arc<dyn MarketDataPort> = Arc::new(
        ReplayMarketData::from_file(&cmd.replay)
            .with_context(|| format!("Failed to load replay {}", cmd.replay.display()))?,
    );
    let mut paper = PaperGateway::new(feed.clone(), config.exchange.commission_rate)
        .with_min_trade(Decimal::from_f64(config.exchange.paper_min_trade).unwrap_or(Decimal::ZERO));
    if let Some(seed) = config.exchange.paper_partial_fill_seed {
        paper = paper.with_partial_fills(seed);
    }

    let limits = SaleLimits::for_run(cmd.mode, cmd.limit, cmd.portion);
    seed_paper_position(&paper, &market, &params, &limits).await;

    let store = MemoryJobStore::new();
    let ports = EnginePorts::new(
        feed,
        Arc::new(paper),
        Arc::new(store.clone()),
        Arc::new(LogNotifier::new()),
    );
    let request = CycleRequest {
        market: market.clone(),
        params,
        run_mode: cmd.mode,
        limits,
    };

    tracing::info!("Starting exit cycle on {} ({})", market.name, cmd.mode);

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Shutdown signal received"),
            Err(e) => {
                tracing::warn!("Ctrl+C handler unavailable: {}", e);
                std::future::pending::<()>().await
            }
        }
    };
    let outcome = PositionCycle::new(ports, settings, request)
        .run(shutdown)
        .await
        .context("Exit cycle failed")?;

    println!("Status: {}", outcome.status_tag());
    println!("{}", outcome.summary);
    if let Some(price) = outcome.buyback_price {
        println!("Buyback reference: {:.8}", price);
    }
    if let Some(plan) = &outcome.reentry {
        let path = config
            .exchange
            .plan_dir()
            .join(format!("{}.json", market.name.to_lowercase()));
        save_plan(&path, plan).context("Failed to write re-entry plan")?;
        println!(
            "Re-entry: {} {} at {:.8} (target {:.8}, stop {:.8}) -> {}",
            plan.direction,
            plan.market,
            plan.price,
            plan.target_price,
            plan.stop_price,
            path.display()
        );
    }

    let snapshot = store.snapshot().await;
    tracing::debug!("Job store at exit: {}", serde_json::to_string(&snapshot)?);
    tracing::info!("exitbot stopped");
    Ok(())
}

/// Fund the paper gateway with the simulated position
async fn seed_paper_position(paper: &PaperGateway, market: &MarketInfo, params: &TradeParams, limits: &SaleLimits) {
    let amount = limits.limit.unwrap_or(exitbot::application::SIMULATION_BALANCE);
    match market.kind {
        MarketKind::Spot => paper.deposit(&market.currency, amount).await,
        MarketKind::Margin(convention) => {
            let sim = amount.to_f64().unwrap_or(0.0);
            let contracts = match convention {
                QuoteConvention::Inverse => params.entry_price * sim,
                QuoteConvention::Linear => sim / params.entry_price,
            };
            let signed = params.implied_direction().sign() * contracts;
            paper.open_position(&market.name, signed, params.entry_price).await;
        }
    }
}

fn check_command(cmd: CheckCmd, verbose: bool, debug: bool) -> Result<()> {
    let config = load_config(&cmd.config).context("Failed to load configuration")?;
    init_logging(verbose, debug, &config.logging.level)?;

    let settings = EngineSettings::from(&config);
    println!("Config {} is valid", cmd.config.display());
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}
