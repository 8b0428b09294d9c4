//! Configuration Module
//!
//! Loads and validates configuration from TOML files.

pub mod loader;

pub use loader::{
    BuybackSection, Config, ConfigError, EngineSection, ExchangeSection, ExitSection, LoggingSection, SaleSection,
    StopsSection, load_config,
};
