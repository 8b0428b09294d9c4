//! Adapters Layer - Port Implementations
//!
//! In-process implementations of the port traits plus the CLI:
//! - Paper: simulated order gateway with fills and commission
//! - Store: in-memory job store and the re-entry plan file
//! - Notify: log-only notifier
//! - Replay: scripted market data
//! - CLI: Command-line interface definitions

pub mod cli;
pub mod notify;
pub mod paper;
pub mod replay;
pub mod store;

pub use cli::CliApp;
pub use notify::LogNotifier;
pub use paper::PaperGateway;
pub use replay::{ReplayMarketData, ReplayScript};
pub use store::MemoryJobStore;
