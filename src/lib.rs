//! exitbot - Position exit and re-entry engine
//!
//! Holds one open position, recalculates its stop from TD setups, confirms
//! breaches against manipulation wicks, liquidates in tranches and watches
//! for a buyback after the exit.
//!
//! # Modules
//!
//! - `domain`: Core types (Direction, PositionState, ExitLedger, ReentryPlan)
//! - `ports`: Trait abstractions (MarketDataPort, OrderGateway, JobStore, Notifier)
//! - `strategy`: Pure rules (stops, confirmation filters, exit signals, re-entry)
//! - `application`: Controllers and the position cycle
//! - `adapters`: In-process implementations (paper gateway, memory store, CLI)
//! - `config`: Configuration loading and validation

pub mod domain;
pub mod ports;
pub mod strategy;
pub mod adapters;
pub mod config;
pub mod application;
