//! Paper trading adapter
//!
//! Simulated order gateway for simulation run modes.

mod gateway;

pub use gateway::{PaperGateway, PAPER_MIN_TRADE_CODE};
